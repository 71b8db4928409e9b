//! `Cloud.toml` override document.
//!
//! The document is optional and every key in it is optional. It is kept as a
//! raw TOML table and read through dotted keys (`cloud.deployment.replicas`);
//! callers supply the default for each key, so an absent key is never an
//! error. A key that is present with the wrong type is.
//!
//! Array-of-table entries (`[[cloud.config.maps]]` and friends) decode into
//! the typed entry structs below.

use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// File name of the override document inside a project directory.
pub const OVERRIDE_FILE_NAME: &str = "Cloud.toml";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct OverrideDocument {
    table: toml::Table,
}

impl OverrideDocument {
    /// Load `Cloud.toml` from the project directory, or return an empty
    /// document if there is none.
    pub fn load(project_dir: &Path) -> crate::Result<Self> {
        Self::load_file(&project_dir.join(OVERRIDE_FILE_NAME))
    }

    /// Load an override document from an explicit path; a missing file
    /// yields an empty document.
    pub fn load_file(path: &Path) -> crate::Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no override document; using defaults");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|e| crate::Error::ConfigLoad {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::parse(&content).map_err(|e| crate::Error::ConfigParse {
            path: path.to_path_buf(),
            source: e,
        })
    }

    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        let table = content.parse::<toml::Table>()?;
        Ok(Self { table })
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Resolve a dotted key.
    pub fn lookup(&self, key: &str) -> Option<&toml::Value> {
        let mut parts = key.split('.');
        let mut current = self.table.get(parts.next()?)?;
        for part in parts {
            current = current.as_table()?.get(part)?;
        }
        Some(current)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.lookup(key).is_some()
    }

    pub fn string(&self, key: &str) -> crate::Result<Option<String>> {
        match self.lookup(key) {
            None => Ok(None),
            Some(toml::Value::String(s)) => Ok(Some(s.clone())),
            Some(_) => Err(type_error(key, "a string")),
        }
    }

    pub fn string_or(&self, key: &str, default: &str) -> crate::Result<String> {
        Ok(self.string(key)?.unwrap_or_else(|| default.to_owned()))
    }

    pub fn integer(&self, key: &str) -> crate::Result<Option<i64>> {
        match self.lookup(key) {
            None => Ok(None),
            Some(toml::Value::Integer(i)) => Ok(Some(*i)),
            Some(_) => Err(type_error(key, "an integer")),
        }
    }

    /// An integer that must fit `T` (replica counts, ports, percentages).
    pub fn number<T: TryFrom<i64>>(&self, key: &str) -> crate::Result<Option<T>> {
        match self.integer(key)? {
            None => Ok(None),
            Some(i) => T::try_from(i)
                .map(Some)
                .map_err(|_| type_error(key, "a non-negative integer in range")),
        }
    }

    pub fn number_or<T: TryFrom<i64>>(&self, key: &str, default: T) -> crate::Result<T> {
        Ok(self.number(key)?.unwrap_or(default))
    }

    pub fn boolean(&self, key: &str) -> crate::Result<Option<bool>> {
        match self.lookup(key) {
            None => Ok(None),
            Some(toml::Value::Boolean(b)) => Ok(Some(*b)),
            Some(_) => Err(type_error(key, "a boolean")),
        }
    }

    pub fn boolean_or(&self, key: &str, default: bool) -> crate::Result<bool> {
        Ok(self.boolean(key)?.unwrap_or(default))
    }

    pub fn table(&self, key: &str) -> crate::Result<Option<&toml::Table>> {
        match self.lookup(key) {
            None => Ok(None),
            Some(toml::Value::Table(t)) => Ok(Some(t)),
            Some(_) => Err(type_error(key, "a table")),
        }
    }

    /// Decode an array of tables; absent means no entries.
    pub fn entries<T: DeserializeOwned>(&self, key: &str) -> crate::Result<Vec<T>> {
        let Some(value) = self.lookup(key) else {
            return Ok(Vec::new());
        };
        let toml::Value::Array(items) = value else {
            return Err(type_error(key, "an array of tables"));
        };
        items
            .iter()
            .map(|item| {
                item.clone()
                    .try_into::<T>()
                    .map_err(|e| crate::Error::ConfigEntry {
                        key: key.to_owned(),
                        source: e,
                    })
            })
            .collect()
    }

    /// Decode a single table into `T`, if present.
    pub fn section<T: DeserializeOwned>(&self, key: &str) -> crate::Result<Option<T>> {
        match self.table(key)? {
            None => Ok(None),
            Some(t) => toml::Value::Table(t.clone())
                .try_into::<T>()
                .map(Some)
                .map_err(|e| crate::Error::ConfigEntry {
                    key: key.to_owned(),
                    source: e,
                }),
        }
    }
}

fn type_error(key: &str, expected: &'static str) -> crate::Error {
    crate::Error::ConfigType {
        key: key.to_owned(),
        expected,
    }
}

/// `[[container.copy.files]]`: extra file copied into the image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CopyFileEntry {
    #[serde(rename = "sourceFile")]
    pub source_file: String,
    pub target: String,
}

/// `[[cloud.config.envs]]`: env var read from a config map key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigEnvEntry {
    pub name: String,
    pub key_ref: String,
    pub config_name: String,
}

/// `[[cloud.secret.envs]]`: env var read from a secret key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretEnvEntry {
    pub name: String,
    pub key_ref: String,
    pub secret_name: String,
}

/// `[[cloud.config.maps]]`, `[[cloud.secret.files]]`, `[[cloud.config.files]]`.
///
/// `mount_path` is ignored for primary config files, which always land on
/// the primary config mount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMountEntry {
    pub file: String,
    #[serde(default)]
    pub mount_path: Option<String>,
}

/// `[[cloud.deployment.storage.volumes]]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeEntry {
    pub name: String,
    pub local_path: String,
    #[serde(default = "default_volume_size")]
    pub size: String,
}

/// `[cloud.deployment.probes.<kind>]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeEntry {
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default = "default_probe_path")]
    pub path: String,
}

/// `[cloud.secure_socket.<listener>]`: TLS paths for fields source left unresolved.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TlsOverrideEntry {
    #[serde(default)]
    pub cert_file: Option<String>,
    #[serde(default)]
    pub key_file: Option<String>,
    #[serde(default)]
    pub keystore: Option<String>,
    #[serde(default)]
    pub truststore: Option<String>,
}

fn default_volume_size() -> String {
    "1Gi".to_owned()
}

fn default_probe_path() -> String {
    "/".to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_walks_nested_tables() {
        let doc = OverrideDocument::parse(
            r#"
[cloud.deployment]
replicas = 3
"#,
        )
        .unwrap();
        assert_eq!(doc.number_or::<u32>("cloud.deployment.replicas", 1).unwrap(), 3);
        assert_eq!(doc.number_or::<u32>("cloud.deployment.missing", 1).unwrap(), 1);
        assert!(doc.lookup("cloud.deployment.replicas.deeper").is_none());
    }

    #[test]
    fn wrong_type_is_an_error() {
        let doc = OverrideDocument::parse("[cloud.deployment]\nreplicas = \"three\"\n").unwrap();
        let err = doc.number::<u32>("cloud.deployment.replicas").unwrap_err();
        assert!(err.to_string().contains("cloud.deployment.replicas"), "got: {err}");
    }

    #[test]
    fn negative_count_is_out_of_range() {
        let doc = OverrideDocument::parse("[cloud.deployment]\nreplicas = -1\n").unwrap();
        assert!(doc.number::<u32>("cloud.deployment.replicas").is_err());
    }

    #[test]
    fn entries_decode_array_of_tables() {
        let doc = OverrideDocument::parse(
            r#"
[[cloud.config.maps]]
file = "conf/app.json"
mount_path = "/etc/app"

[[cloud.config.maps]]
file = "conf/extra.json"
"#,
        )
        .unwrap();
        let maps: Vec<FileMountEntry> = doc.entries("cloud.config.maps").unwrap();
        assert_eq!(maps.len(), 2);
        assert_eq!(maps[0].mount_path.as_deref(), Some("/etc/app"));
        assert!(maps[1].mount_path.is_none());
    }

    #[test]
    fn absent_entries_are_empty() {
        let doc = OverrideDocument::default();
        let volumes: Vec<VolumeEntry> = doc.entries("cloud.deployment.storage.volumes").unwrap();
        assert!(volumes.is_empty());
    }

    #[test]
    fn section_applies_field_defaults() {
        let doc = OverrideDocument::parse("[cloud.deployment.probes.readiness]\nport = 9090\n").unwrap();
        let probe: ProbeEntry = doc
            .section("cloud.deployment.probes.readiness")
            .unwrap()
            .unwrap();
        assert_eq!(probe.port, Some(9090));
        assert_eq!(probe.path, "/");
    }
}
