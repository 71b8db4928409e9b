use std::path::Path;
use std::process::{Command, Stdio};

use crate::bundle::BundleOutput;

#[derive(Debug, thiserror::Error)]
pub enum ImageBuildError {
    #[error("docker CLI not found, install it from https://docs.docker.com/get-docker/")]
    NotFound { source: std::io::Error },

    #[error("docker build failed for {tag}: {detail}")]
    Failed { tag: String, detail: String },
}

/// Abstraction over the container image build for testability.
///
/// Production code uses [`DockerCli`], tests use mockall-generated mocks.
pub trait ImageBuilder {
    /// Build `dockerfile` against `context_dir` and tag the result.
    fn build(&self, context_dir: &Path, dockerfile: &Path, tag: &str) -> Result<(), ImageBuildError>;
}

/// Real docker CLI builder. Output streams to the terminal.
pub struct DockerCli;

impl ImageBuilder for DockerCli {
    fn build(&self, context_dir: &Path, dockerfile: &Path, tag: &str) -> Result<(), ImageBuildError> {
        let status = Command::new("docker")
            .arg("build")
            .arg("-t")
            .arg(tag)
            .arg("-f")
            .arg(dockerfile)
            .arg(context_dir)
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .map_err(|e| ImageBuildError::NotFound { source: e })?;

        if status.success() {
            Ok(())
        } else {
            Err(ImageBuildError::Failed {
                tag: tag.to_owned(),
                detail: format!("exit code: {status}"),
            })
        }
    }
}

/// Build the image of a written bundle. Bundles without a Dockerfile are
/// skipped.
pub fn build_image<B: ImageBuilder + ?Sized>(
    builder: &B,
    output: &BundleOutput,
    tag: &str,
) -> Result<bool, ImageBuildError> {
    let Some(dockerfile) = &output.dockerfile else {
        tracing::debug!(tag, "bundle has no Dockerfile; skipping image build");
        return Ok(false);
    };
    let context_dir = dockerfile.parent().unwrap_or(output.root.as_path());
    tracing::info!(tag, context = %context_dir.display(), "building image");
    builder.build(context_dir, dockerfile, tag)?;
    tracing::info!(tag, "image built");
    Ok(true)
}
