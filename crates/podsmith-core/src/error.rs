use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to load config from {path}")]
    ConfigLoad {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config at {path}")]
    ConfigParse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("invalid entry under `{key}` in Cloud.toml")]
    ConfigEntry {
        key: String,
        source: toml::de::Error,
    },

    #[error("invalid value for `{key}` in Cloud.toml: expected {expected}")]
    ConfigType { key: String, expected: &'static str },

    // ── Program model ──
    #[error("failed to read program model from {path}")]
    ModelLoad {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse program model at {path}")]
    ModelParse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("failed to read {path}")]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },
}
