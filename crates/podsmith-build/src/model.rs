//! Intermediate models mutated by the handler pipeline.
//!
//! The configuration resolver and artifact model builder produce a
//! [`BundleModel`]; handlers read slices of it, refine it (mounts, the
//! build recipe), and emit Kubernetes documents from it.

use std::collections::BTreeMap;
use std::path::PathBuf;

use podsmith_core::config::CopyFileEntry;

/// Working directory of the application inside the image.
pub const APP_HOME: &str = "/home/app";
/// Dependency artifacts inside the image.
pub const JARS_DIR: &str = "/home/app/jars";
/// Mount point of the consolidated primary configuration.
pub const PRIMARY_CONFIG_DIR: &str = "/home/app/conf";
/// Env var listing the primary configuration files, `:`-separated.
pub const CONFIG_FILES_ENV: &str = "CONFIG_FILES";

/// Paths no user mount may shadow. `PRIMARY_CONFIG_DIR` is reserved
/// separately because the primary config map itself mounts there.
pub const RESERVED_PATHS: &[&str] = &[APP_HOME, JARS_DIR];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settings {
    pub single_yaml: bool,
    pub build_image: bool,
    pub native: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            single_yaml: true,
            build_image: false,
            native: false,
        }
    }
}

/// One exposure target: a distinct port and the listener that named it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortModel {
    pub name: String,
    pub port: u16,
    pub listener: String,
}

/// A probe as configured; the port is bound later against exposed ports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeModel {
    pub port: Option<u16>,
    pub path: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Probes {
    pub liveness: Option<ProbeModel>,
    pub readiness: Option<ProbeModel>,
}

/// Resource quantities, kept as the opaque strings Kubernetes accepts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceModel {
    pub min_memory: String,
    pub max_memory: String,
    pub min_cpu: String,
    pub max_cpu: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvSource {
    Literal(String),
    ConfigMapKey { name: String, key: String },
    SecretKey { name: String, key: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvModel {
    pub name: String,
    pub source: EnvSource,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutoscalingModel {
    pub enabled: bool,
    pub min_replicas: u32,
    pub max_replicas: u32,
    pub cpu_percentage: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretModel {
    pub name: String,
    /// File name → raw content.
    pub data: BTreeMap<String, Vec<u8>>,
    pub mount_path: String,
    pub read_only: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigMapModel {
    pub name: String,
    pub data: BTreeMap<String, String>,
    pub mount_path: String,
    pub read_only: bool,
    pub primary_config: bool,
}

/// A persistent volume claim mounted into the workload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeModel {
    pub name: String,
    pub mount_path: String,
    pub size: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MountSource {
    Secret(String),
    ConfigMap(String),
    Claim(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountModel {
    pub volume_name: String,
    pub mount_path: String,
    pub read_only: bool,
    pub source: MountSource,
}

/// Image coordinates and build inputs from `container.*`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageModel {
    pub repository: Option<String>,
    pub name: String,
    pub tag: String,
    pub base: String,
    pub cmd: Option<String>,
    pub env: BTreeMap<String, String>,
    pub copy_files: Vec<CopyFileEntry>,
}

impl ImageModel {
    /// `repository/name:tag`, or `name:tag` without a repository.
    pub fn reference(&self) -> String {
        match &self.repository {
            Some(repo) => format!("{}/{}:{}", repo.trim_end_matches('/'), self.name, self.tag),
            None => format!("{}:{}", self.name, self.tag),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentModel {
    pub name: String,
    pub image: String,
    pub replicas: u32,
    pub ports: Vec<PortModel>,
    pub env: Vec<EnvModel>,
    pub probes: Probes,
    pub resources: ResourceModel,
    pub mounts: Vec<MountModel>,
    pub internal_domain_name: String,
    pub autoscaling: AutoscalingModel,
}

impl DeploymentModel {
    pub fn container_ports(&self) -> impl Iterator<Item = u16> + '_ {
        self.ports.iter().map(|p| p.port)
    }
}

/// A Dockerfile step, rendered in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instruction {
    Workdir(String),
    Copy {
        source: String,
        target: String,
        from_stage: Option<String>,
    },
    Env {
        name: String,
        value: String,
    },
    Run(String),
}

impl Instruction {
    pub fn copy(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self::Copy {
            source: source.into(),
            target: target.into(),
            from_stage: None,
        }
    }
}

/// How the container starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entrypoint {
    /// `CMD <command>`, interpreted by the image shell.
    Shell(String),
    /// `CMD ["arg", ...]`, for images without a shell.
    Exec(Vec<String>),
}

/// Stage compiling the native executable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuilderStage {
    pub image: String,
    pub instructions: Vec<Instruction>,
}

/// A file copied into the image build context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextFile {
    /// Absolute source path.
    pub source: PathBuf,
    /// Path relative to the build context directory.
    pub target: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildModel {
    pub base_image: String,
    pub entrypoint: Entrypoint,
    pub exposed_ports: Vec<u16>,
    pub instructions: Vec<Instruction>,
    pub builder: Option<BuilderStage>,
    pub context_files: Vec<ContextFile>,
}

/// Everything the handlers work on for one application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleModel {
    pub app_name: String,
    pub labels: BTreeMap<String, String>,
    pub deployment: DeploymentModel,
    pub secrets: Vec<SecretModel>,
    pub config_maps: Vec<ConfigMapModel>,
    pub volumes: Vec<VolumeModel>,
    pub image: ImageModel,
    /// Cron expression of the batch entry point.
    pub schedule: Option<String>,
    pub build: Option<BuildModel>,
    pub settings: Settings,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image(repository: Option<&str>) -> ImageModel {
        ImageModel {
            repository: repository.map(str::to_owned),
            name: "hello".to_owned(),
            tag: "v1".to_owned(),
            base: "eclipse-temurin:17-jre-alpine".to_owned(),
            cmd: None,
            env: BTreeMap::new(),
            copy_files: vec![],
        }
    }

    #[test]
    fn image_reference_with_and_without_repository() {
        assert_eq!(image(None).reference(), "hello:v1");
        assert_eq!(image(Some("docker.io/acme/")).reference(), "docker.io/acme/hello:v1");
    }

    #[test]
    fn settings_default_to_single_yaml_without_image_build() {
        let settings = Settings::default();
        assert!(settings.single_yaml);
        assert!(!settings.build_image);
        assert!(!settings.native);
    }
}
