//! Bundle synthesis for podsmith.
//!
//! # Synthesis pipeline
//!
//! ```text
//! podsmith generate
//!   1. Resolve     ── Cloud.toml → ResolvedConfig (defaults, mounts, reserved paths)
//!   2. Model       ── Topology + ResolvedConfig → BundleModel (ports, TLS secrets, config maps)
//!   3. Handlers    ── Pipeline::service() / Pipeline::batch() → Kubernetes documents
//!   4. Write       ── kubernetes/<app>/*.yaml, docker/<app>/Dockerfile + build context
//!   5. Image       ── docker build (settings.buildImage / --build-image)
//! ```
//!
//! A fatal error in steps 1-3 is recorded as a synthesis diagnostic and
//! nothing is written.

pub mod artifacts;
pub mod bundle;
pub mod dockerfile;
pub mod error;
pub mod handlers;
pub mod image;
pub mod k8s;
pub mod model;
pub mod pipeline;
pub mod resolver;

pub use bundle::{Bundle, BundleError, BundleOutput, write_bundle};
pub use dockerfile::DockerfileGenerator;
pub use error::SynthesisError;
pub use image::{DockerCli, ImageBuildError, ImageBuilder, build_image};
pub use pipeline::{ArtifactHandler, Pipeline, SynthesisContext};

use podsmith_core::{CompilationContext, Topology, naming};

/// Turn an extracted topology into a bundle.
///
/// An empty topology, or a compilation that already carries error
/// diagnostics, yields an empty bundle. Fatal synthesis errors are recorded
/// in `ctx.diagnostics` as well as returned.
pub fn synthesize(
    ctx: &mut CompilationContext<'_>,
    topology: &Topology,
) -> Result<Bundle, SynthesisError> {
    let artifact = ctx.program.artifact();
    let app_name = naming::dns_label(&artifact.name);

    if topology.is_empty() {
        tracing::info!(app = %app_name, "no services or scheduled task found");
        return Ok(Bundle::empty(app_name));
    }
    if ctx.diagnostics.has_errors() {
        tracing::warn!(
            app = %app_name,
            errors = ctx.diagnostics.errors().count(),
            "skipping synthesis: compilation has errors"
        );
        return Ok(Bundle::empty(app_name));
    }

    let result = run(ctx, topology, app_name);
    if let Err(e) = &result {
        ctx.diagnostics.synthesis_error(e.to_string());
    }
    result
}

fn run(
    ctx: &CompilationContext<'_>,
    topology: &Topology,
    app_name: String,
) -> Result<Bundle, SynthesisError> {
    let artifact = ctx.program.artifact();
    let resolved = resolver::resolve(ctx.overrides, &ctx.project_dir, artifact)?;

    let synthesis = SynthesisContext {
        app_name,
        topology,
        artifact,
        project_dir: &ctx.project_dir,
    };
    let mut model = artifacts::build_model(&synthesis, resolved)?;

    let pipeline = if topology.task.is_some() {
        Pipeline::batch()?
    } else {
        Pipeline::service()?
    };
    tracing::debug!(app = %synthesis.app_name, handlers = ?pipeline.handler_names(), "running handlers");
    let documents = pipeline.run(&synthesis, &mut model)?;

    tracing::info!(app = %synthesis.app_name, documents = documents.len(), "bundle synthesized");
    Ok(Bundle {
        app_name: synthesis.app_name,
        documents,
        image: model.image.reference(),
        build: model.build,
        settings: model.settings,
    })
}
