//! Per-compilation state.

use std::path::{Path, PathBuf};

use crate::config::OverrideDocument;
use crate::diagnostics::Diagnostics;
use crate::program::ProgramModel;

/// Everything one compilation needs, threaded by argument through each
/// stage. Build a fresh context per program; nothing is shared between
/// compilations.
pub struct CompilationContext<'a> {
    pub program: &'a dyn ProgramModel,
    pub overrides: &'a OverrideDocument,
    /// Root that relative paths in source and `Cloud.toml` resolve against.
    pub project_dir: PathBuf,
    /// Directory the bundle is written under.
    pub target_dir: PathBuf,
    pub diagnostics: Diagnostics,
}

impl<'a> CompilationContext<'a> {
    pub fn new(
        program: &'a dyn ProgramModel,
        overrides: &'a OverrideDocument,
        project_dir: impl Into<PathBuf>,
    ) -> Self {
        let project_dir = project_dir.into();
        let target_dir = project_dir.join("target");
        Self {
            program,
            overrides,
            project_dir,
            target_dir,
            diagnostics: Diagnostics::new(),
        }
    }

    pub fn with_target_dir(mut self, target_dir: impl Into<PathBuf>) -> Self {
        self.target_dir = target_dir.into();
        self
    }

    pub fn artifact_name(&self) -> &str {
        &self.program.artifact().name
    }

    /// Resolve a project-relative path; absolute paths pass through.
    pub fn resolve(&self, path: impl AsRef<Path>) -> PathBuf {
        let path = path.as_ref();
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.project_dir.join(path)
        }
    }
}
