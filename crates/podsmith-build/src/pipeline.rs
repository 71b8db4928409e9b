//! Handler pipeline.
//!
//! Synthesis runs an ordered list of [`ArtifactHandler`]s over one
//! [`BundleModel`]. Each handler declares which model slices it reads and
//! writes; a pipeline is only constructed when every read is satisfied by
//! the resolver or an earlier handler.
//!
//! ```text
//! service: NetworkExposure → Secret → Config → Compute → Autoscaler → BuildRecipe
//! batch:   Secret → Config → ScheduledJob → BuildRecipe
//! ```

use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;

use podsmith_core::{ArtifactInfo, Topology};

use crate::error::Result;
use crate::handlers::{
    AutoscalerHandler, BuildRecipeHandler, ComputeHandler, ConfigHandler,
    NetworkExposureHandler, ScheduledJobHandler, SecretHandler,
};
use crate::k8s::Document;
use crate::model::BundleModel;

/// Read-only inputs shared by every handler.
pub struct SynthesisContext<'a> {
    /// DNS-label form of the artifact name; every resource name derives from it.
    pub app_name: String,
    pub topology: &'a Topology,
    pub artifact: &'a ArtifactInfo,
    pub project_dir: &'a Path,
}

/// A part of the [`BundleModel`] handlers exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Slice {
    Ports,
    Probes,
    Resources,
    Env,
    Autoscaling,
    Schedule,
    Image,
    Secrets,
    ConfigMaps,
    Volumes,
    Mounts,
    Workload,
    BuildRecipe,
}

impl fmt::Display for Slice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Slices populated before the first handler runs.
pub const RESOLVED_SLICES: &[Slice] = &[
    Slice::Ports,
    Slice::Probes,
    Slice::Resources,
    Slice::Env,
    Slice::Autoscaling,
    Slice::Schedule,
    Slice::Image,
    Slice::Secrets,
    Slice::ConfigMaps,
    Slice::Volumes,
];

/// One synthesis stage.
pub trait ArtifactHandler {
    fn name(&self) -> &'static str;

    fn reads(&self) -> &'static [Slice];

    fn writes(&self) -> &'static [Slice];

    /// Refine `model` and return the documents this stage emits.
    fn handle(&self, ctx: &SynthesisContext<'_>, model: &mut BundleModel) -> Result<Vec<Document>>;
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("handler {handler} reads {slice} before any stage writes it")]
    UnsatisfiedRead { handler: &'static str, slice: Slice },
}

pub struct Pipeline {
    handlers: Vec<Box<dyn ArtifactHandler>>,
}

impl Pipeline {
    /// Validate the declared slices and build the pipeline.
    pub fn new(handlers: Vec<Box<dyn ArtifactHandler>>) -> std::result::Result<Self, PipelineError> {
        let mut written: BTreeSet<Slice> = RESOLVED_SLICES.iter().copied().collect();
        for handler in &handlers {
            if let Some(slice) = handler.reads().iter().find(|s| !written.contains(*s)) {
                return Err(PipelineError::UnsatisfiedRead {
                    handler: handler.name(),
                    slice: *slice,
                });
            }
            written.extend(handler.writes().iter().copied());
        }
        Ok(Self { handlers })
    }

    /// Long-running service workloads.
    pub fn service() -> std::result::Result<Self, PipelineError> {
        Self::new(vec![
            Box::new(NetworkExposureHandler),
            Box::new(SecretHandler),
            Box::new(ConfigHandler),
            Box::new(ComputeHandler),
            Box::new(AutoscalerHandler),
            Box::new(BuildRecipeHandler),
        ])
    }

    /// Scheduled batch entry points.
    pub fn batch() -> std::result::Result<Self, PipelineError> {
        Self::new(vec![
            Box::new(SecretHandler),
            Box::new(ConfigHandler),
            Box::new(ScheduledJobHandler),
            Box::new(BuildRecipeHandler),
        ])
    }

    pub fn handler_names(&self) -> Vec<&'static str> {
        self.handlers.iter().map(|h| h.name()).collect()
    }

    /// Run every handler in order. The first failure aborts the run and
    /// discards the documents gathered so far.
    pub fn run(&self, ctx: &SynthesisContext<'_>, model: &mut BundleModel) -> Result<Vec<Document>> {
        let mut documents = Vec::new();
        for handler in &self.handlers {
            match handler.handle(ctx, model) {
                Ok(docs) => {
                    tracing::debug!(handler = handler.name(), documents = docs.len(), "handler finished");
                    documents.extend(docs);
                }
                Err(e) => {
                    tracing::warn!(handler = handler.name(), error = %e, "handler failed");
                    return Err(e);
                }
            }
        }
        Ok(documents)
    }
}
