//! Service topology extraction for podsmith.
//!
//! Turns a resolved [`ProgramModel`](podsmith_core::ProgramModel) into a
//! [`Topology`](podsmith_core::Topology): services with their listener
//! ports and TLS material, outbound clients carrying key material, and an
//! optional scheduled task. Unresolvable constructs become diagnostics,
//! never panics or early returns.

pub mod extractor;
pub mod resolver;
pub mod tls;

pub use extractor::{TopologyExtractor, extract};
pub use resolver::{IndexedRef, ReferenceIndex, build_index};
