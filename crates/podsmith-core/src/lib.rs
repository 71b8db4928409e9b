//! Core types for podsmith.
//!
//! This crate defines the resolved declaration model podsmith consumes
//! ([`Program`], [`ProgramModel`]), the extracted service [`Topology`], the
//! [`Diagnostics`] sink, the `Cloud.toml` [`OverrideDocument`], and the
//! per-compilation [`CompilationContext`].

pub mod config;
pub mod context;
pub mod diagnostics;
pub mod error;
pub mod naming;
pub mod program;
pub mod topology;

pub use config::OverrideDocument;
pub use context::CompilationContext;
pub use diagnostics::{Diagnostic, DiagnosticCode, Diagnostics, Location, Severity};
pub use error::{Error, Result};
pub use program::{ArtifactInfo, Declaration, Expr, Program, ProgramModel, SourceLocation, TypeRef};
pub use topology::{
    ClientDecl, KeyMaterial, ListenerDecl, ResourceDecl, ScheduledTaskDecl, ServiceDecl, TlsConfig,
    Topology, TrustMaterial,
};
