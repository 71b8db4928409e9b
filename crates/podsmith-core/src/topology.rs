//! Service topology extracted from a program.

use std::path::Path;

/// A listener bound to a port, with optional TLS material.
///
/// `port == 0` means the port could not be determined statically; a
/// diagnostic has already been raised for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenerDecl {
    pub name: String,
    pub port: u16,
    pub tls: Option<TlsConfig>,
}

impl ListenerDecl {
    pub fn new(name: impl Into<String>, port: u16) -> Self {
        Self {
            name: name.into(),
            port,
            tls: None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.port != 0
    }
}

/// Key material of a TLS endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyMaterial {
    CertAndKey { cert_path: String, key_path: String },
    Keystore { path: String },
}

impl KeyMaterial {
    pub fn paths(&self) -> Vec<&str> {
        match self {
            Self::CertAndKey {
                cert_path,
                key_path,
            } => vec![cert_path, key_path],
            Self::Keystore { path } => vec![path],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrustMaterial {
    pub path: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TlsConfig {
    pub key: Option<KeyMaterial>,
    pub trust: Option<TrustMaterial>,
}

impl TlsConfig {
    pub fn is_empty(&self) -> bool {
        self.key.is_none() && self.trust.is_none()
    }

    /// Parent directory shared by every key file, if they agree.
    pub fn key_dir(&self) -> Option<&Path> {
        let paths = self.key.as_ref()?.paths();
        common_parent(&paths)
    }

    pub fn trust_dir(&self) -> Option<&Path> {
        self.trust.as_ref().map(|t| parent_of(&t.path))
    }

    /// Whether key and trust material live in the same directory.
    pub fn shares_directory(&self) -> bool {
        match (self.key_dir(), self.trust_dir()) {
            (Some(k), Some(t)) => k == t,
            _ => false,
        }
    }
}

fn parent_of(path: &str) -> &Path {
    Path::new(path).parent().unwrap_or_else(|| Path::new(""))
}

fn common_parent<'a>(paths: &[&'a str]) -> Option<&'a Path> {
    let first = parent_of(*paths.first()?);
    paths
        .iter()
        .all(|p| parent_of(p) == first)
        .then_some(first)
}

/// A resource method (`get hello`) of a service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceDecl {
    pub method: String,
    pub relative_path: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceDecl {
    pub absolute_path: String,
    pub listeners: Vec<ListenerDecl>,
    pub resources: Vec<ResourceDecl>,
}

impl ServiceDecl {
    /// Full request path of a resource: service base path joined with the
    /// resource path.
    pub fn resource_path(&self, resource: &ResourceDecl) -> String {
        let base = self.absolute_path.trim_end_matches('/');
        let rel = resource.relative_path.trim_start_matches('/');
        if rel.is_empty() || rel == "." {
            if base.is_empty() {
                "/".to_owned()
            } else {
                base.to_owned()
            }
        } else {
            format!("{base}/{rel}")
        }
    }

    /// Whether a `get`/`default` resource serves `path`.
    pub fn serves_get(&self, path: &str) -> bool {
        let wanted = path.trim_end_matches('/');
        self.resources
            .iter()
            .filter(|r| r.method.eq_ignore_ascii_case("get") || r.method == "default")
            .any(|r| self.resource_path(r).trim_end_matches('/') == wanted)
    }
}

/// Cron fields of a scheduled entry point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledTaskDecl {
    pub minute: String,
    pub hour: String,
    pub day_of_month: String,
    pub month: String,
    pub day_of_week: String,
}

impl ScheduledTaskDecl {
    pub fn cron_expression(&self) -> String {
        format!(
            "{} {} {} {} {}",
            self.minute, self.hour, self.day_of_month, self.month, self.day_of_week
        )
    }
}

/// Outbound client whose TLS material must be mounted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientDecl {
    pub name: String,
    pub tls: TlsConfig,
}

/// Everything extraction found in one program.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Topology {
    pub services: Vec<ServiceDecl>,
    pub clients: Vec<ClientDecl>,
    pub task: Option<ScheduledTaskDecl>,
}

impl Topology {
    /// No service and no scheduled task: nothing to deploy.
    pub fn is_empty(&self) -> bool {
        self.services.is_empty() && self.task.is_none()
    }

    pub fn listeners(&self) -> impl Iterator<Item = &ListenerDecl> {
        self.services.iter().flat_map(|s| s.listeners.iter())
    }
}
