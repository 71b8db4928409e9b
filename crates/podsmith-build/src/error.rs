use std::path::PathBuf;

use crate::pipeline::PipelineError;

/// Fatal problems found while synthesizing a bundle. Any of these aborts
/// synthesis before a single document is written.
#[derive(Debug, thiserror::Error)]
pub enum SynthesisError {
    #[error(transparent)]
    Config(#[from] podsmith_core::Error),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error("mount path {mount_path} for {file} collides with reserved path {reserved}")]
    ReservedMountPath {
        file: String,
        mount_path: String,
        reserved: String,
    },

    #[error("cannot determine a file name for {file}")]
    MissingFileName { file: String },

    #[error("no mount_path given for {file}")]
    MissingMountPath { file: String },

    #[error("failed to read {path}")]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("{path} is not valid UTF-8 and cannot be stored in a config map")]
    NonUtf8Config { path: PathBuf },

    #[error("primary config file name {file_name} is used more than once")]
    DuplicatePrimaryConfig { file_name: String },

    #[error("file name {file_name} is mounted twice at {mount_path} with different content")]
    DuplicateMountFile {
        file_name: String,
        mount_path: String,
    },

    #[error("{first} and {second} are both mounted at {mount_path}")]
    MountPathCollision {
        mount_path: String,
        first: String,
        second: String,
    },

    #[error("cannot detect port for probe {probe}: the deployment exposes no ports")]
    ProbePortUndetectable { probe: &'static str },

    #[error("{probe} probe port {port} is not exposed by the deployment")]
    ProbePortNotExposed { probe: &'static str, port: u16 },

    #[error("{probe} probe path {path} is not served by a get resource on port {port}")]
    ProbePathNotServed {
        probe: &'static str,
        path: String,
        port: u16,
    },
}

pub type Result<T> = std::result::Result<T, SynthesisError>;
