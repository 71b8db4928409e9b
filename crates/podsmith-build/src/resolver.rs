//! Configuration resolver.
//!
//! Reads every `Cloud.toml` key synthesis needs, with its default, in a
//! fixed order: deployment shape, resources, env vars, file mounts, then
//! volumes. File mounts are loaded from the project directory here, so a
//! missing or misplaced file fails before any model is built.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use podsmith_core::config::{
    ConfigEnvEntry, CopyFileEntry, FileMountEntry, ProbeEntry, SecretEnvEntry, VolumeEntry,
};
use podsmith_core::{ArtifactInfo, OverrideDocument, naming};

use crate::error::{Result, SynthesisError};
use crate::model::{
    AutoscalingModel, EnvModel, EnvSource, ImageModel, PRIMARY_CONFIG_DIR, ProbeModel, Probes,
    RESERVED_PATHS, ResourceModel, Settings, VolumeModel,
};

pub const DEFAULT_BASE_IMAGE: &str = "eclipse-temurin:17-jre-alpine";
pub const DEFAULT_NATIVE_BASE_IMAGE: &str = "gcr.io/distroless/base";
pub const DEFAULT_TAG: &str = "latest";
pub const DEFAULT_MIN_MEMORY: &str = "100Mi";
pub const DEFAULT_MAX_MEMORY: &str = "512Mi";
pub const DEFAULT_MIN_CPU: &str = "200m";
pub const DEFAULT_MAX_CPU: &str = "500m";
pub const DEFAULT_CPU_PERCENTAGE: u32 = 50;

/// A file loaded for mounting, keyed by its file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedFile {
    pub source: String,
    pub file_name: String,
    pub content: Vec<u8>,
}

/// Files sharing one mount directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountGroup {
    pub mount_path: String,
    pub files: Vec<LoadedFile>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedConfig {
    pub settings: Settings,
    pub image: ImageModel,
    pub replicas: u32,
    pub internal_domain_name: String,
    pub probes: Probes,
    pub resources: ResourceModel,
    pub autoscaling: AutoscalingModel,
    pub env: Vec<EnvModel>,
    pub config_files: Vec<MountGroup>,
    pub secret_files: Vec<MountGroup>,
    pub primary_config: Vec<LoadedFile>,
    pub volumes: Vec<VolumeModel>,
}

/// Resolve the override document for `artifact`, loading mounted files
/// relative to `project_dir`.
pub fn resolve(
    overrides: &OverrideDocument,
    project_dir: &Path,
    artifact: &ArtifactInfo,
) -> Result<ResolvedConfig> {
    let app = naming::dns_label(&artifact.name);

    let settings = Settings {
        single_yaml: overrides.boolean_or("settings.singleYAML", true)?,
        build_image: overrides.boolean_or("settings.buildImage", false)?,
        native: overrides.boolean_or("settings.native", false)?,
    };
    let image = resolve_image(overrides, &artifact.name, settings.native)?;

    // Deployment shape.
    let replicas = overrides.number_or::<u32>("cloud.deployment.replicas", 1)?;
    let internal_domain_name = naming::dns_label(&overrides.string_or(
        "cloud.deployment.internal_domain_name",
        &format!("{app}-svc"),
    )?);
    let probes = Probes {
        liveness: resolve_probe(overrides, "liveness")?,
        readiness: resolve_probe(overrides, "readiness")?,
    };
    let autoscaling = resolve_autoscaling(overrides, replicas)?;

    let resources = ResourceModel {
        min_memory: overrides.string_or("cloud.deployment.min_memory", DEFAULT_MIN_MEMORY)?,
        max_memory: overrides.string_or("cloud.deployment.max_memory", DEFAULT_MAX_MEMORY)?,
        min_cpu: overrides.string_or("cloud.deployment.min_cpu", DEFAULT_MIN_CPU)?,
        max_cpu: overrides.string_or("cloud.deployment.max_cpu", DEFAULT_MAX_CPU)?,
    };

    let mut env = Vec::new();
    for entry in overrides.entries::<ConfigEnvEntry>("cloud.config.envs")? {
        env.push(EnvModel {
            name: entry.name,
            source: EnvSource::ConfigMapKey {
                name: entry.config_name,
                key: entry.key_ref,
            },
        });
    }
    for entry in overrides.entries::<SecretEnvEntry>("cloud.secret.envs")? {
        env.push(EnvModel {
            name: entry.name,
            source: EnvSource::SecretKey {
                name: entry.secret_name,
                key: entry.key_ref,
            },
        });
    }

    let config_files = load_mounts(
        project_dir,
        overrides.entries::<FileMountEntry>("cloud.config.maps")?,
    )?;
    let secret_files = load_mounts(
        project_dir,
        overrides.entries::<FileMountEntry>("cloud.secret.files")?,
    )?;
    let primary_config = overrides
        .entries::<FileMountEntry>("cloud.config.files")?
        .iter()
        .map(|entry| load_file(project_dir, &entry.file))
        .collect::<Result<Vec<_>>>()?;

    let mut volumes = Vec::new();
    for entry in overrides.entries::<VolumeEntry>("cloud.deployment.storage.volumes")? {
        let mount_path = normalize_mount_path(&entry.local_path);
        check_reserved(&entry.name, &mount_path, true)?;
        volumes.push(VolumeModel {
            name: naming::dns_label(&entry.name),
            mount_path,
            size: entry.size,
        });
    }

    tracing::debug!(
        app = %app,
        replicas,
        env = env.len(),
        config_mounts = config_files.len(),
        secret_mounts = secret_files.len(),
        primary_config = primary_config.len(),
        volumes = volumes.len(),
        "overrides resolved"
    );

    Ok(ResolvedConfig {
        settings,
        image,
        replicas,
        internal_domain_name,
        probes,
        resources,
        autoscaling,
        env,
        config_files,
        secret_files,
        primary_config,
        volumes,
    })
}

fn resolve_image(overrides: &OverrideDocument, artifact_name: &str, native: bool) -> Result<ImageModel> {
    let default_base = if native {
        DEFAULT_NATIVE_BASE_IMAGE
    } else {
        DEFAULT_BASE_IMAGE
    };
    let mut env = BTreeMap::new();
    if let Some(table) = overrides.table("container.image.env")? {
        for name in table.keys() {
            let key = format!("container.image.env.{name}");
            if let Some(value) = overrides.string(&key)? {
                env.insert(name.clone(), value);
            }
        }
    }
    Ok(ImageModel {
        repository: overrides.string("container.image.repository")?,
        name: overrides.string_or("container.image.name", &naming::dns_label(artifact_name))?,
        tag: overrides.string_or("container.image.tag", DEFAULT_TAG)?,
        base: overrides.string_or("container.image.base", default_base)?,
        cmd: overrides.string("container.image.cmd")?,
        env,
        copy_files: overrides.entries::<CopyFileEntry>("container.copy.files")?,
    })
}

fn resolve_probe(overrides: &OverrideDocument, kind: &str) -> Result<Option<ProbeModel>> {
    let entry = overrides.section::<ProbeEntry>(&format!("cloud.deployment.probes.{kind}"))?;
    Ok(entry.map(|e| ProbeModel {
        port: e.port,
        path: e.path,
    }))
}

fn resolve_autoscaling(overrides: &OverrideDocument, replicas: u32) -> Result<AutoscalingModel> {
    let min_replicas =
        overrides.number_or::<u32>("cloud.deployment.autoscaling.min_replicas", replicas)?;
    let max_replicas = overrides.number_or::<u32>(
        "cloud.deployment.autoscaling.max_replicas",
        min_replicas.saturating_add(1),
    )?;
    Ok(AutoscalingModel {
        enabled: overrides.boolean_or("cloud.deployment.autoscaling.enable", true)?,
        min_replicas,
        max_replicas: max_replicas.max(min_replicas),
        cpu_percentage: overrides
            .number_or::<u32>("cloud.deployment.autoscaling.cpu", DEFAULT_CPU_PERCENTAGE)?,
    })
}

/// Load non-primary mounts, grouped by mount directory in first-seen order.
fn load_mounts(project_dir: &Path, entries: Vec<FileMountEntry>) -> Result<Vec<MountGroup>> {
    let mut groups: Vec<MountGroup> = Vec::new();
    for entry in entries {
        let Some(mount_path) = entry.mount_path.as_deref() else {
            return Err(SynthesisError::MissingMountPath { file: entry.file });
        };
        let mount_path = normalize_mount_path(mount_path);
        check_reserved(&entry.file, &mount_path, true)?;
        let file = load_file(project_dir, &entry.file)?;

        match groups.iter_mut().find(|g| g.mount_path == mount_path) {
            Some(group) => {
                if let Some(existing) = group.files.iter().find(|f| f.file_name == file.file_name) {
                    if existing.content != file.content {
                        return Err(SynthesisError::DuplicateMountFile {
                            file_name: file.file_name,
                            mount_path,
                        });
                    }
                    continue;
                }
                group.files.push(file);
            }
            None => groups.push(MountGroup {
                mount_path,
                files: vec![file],
            }),
        }
    }
    Ok(groups)
}

/// Read a project file, keyed by its file name.
pub fn load_file(project_dir: &Path, file: &str) -> Result<LoadedFile> {
    let path = Path::new(file);
    let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
        return Err(SynthesisError::MissingFileName {
            file: file.to_owned(),
        });
    };
    let full: PathBuf = if path.is_absolute() {
        path.to_path_buf()
    } else {
        project_dir.join(path)
    };
    let content = std::fs::read(&full).map_err(|e| SynthesisError::ReadFile {
        path: full.clone(),
        source: e,
    })?;
    Ok(LoadedFile {
        source: file.to_owned(),
        file_name: file_name.to_owned(),
        content,
    })
}

/// Absolute, without a trailing slash. Relative paths resolve under the
/// application home directory.
pub fn normalize_mount_path(path: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    if trimmed.starts_with('/') {
        trimmed.to_owned()
    } else if trimmed.is_empty() || trimmed == "." {
        crate::model::APP_HOME.to_owned()
    } else {
        format!("{}/{}", crate::model::APP_HOME, trimmed.trim_start_matches("./"))
    }
}

/// Reject mounts over reserved runtime paths. `include_primary` also
/// reserves the primary config directory, which only the primary config
/// map may use.
pub fn check_reserved(file: &str, mount_path: &str, include_primary: bool) -> Result<()> {
    let reserved = RESERVED_PATHS
        .iter()
        .copied()
        .chain(include_primary.then_some(PRIMARY_CONFIG_DIR))
        .find(|r| *r == mount_path);
    match reserved {
        Some(r) => Err(SynthesisError::ReservedMountPath {
            file: file.to_owned(),
            mount_path: mount_path.to_owned(),
            reserved: r.to_owned(),
        }),
        None => Ok(()),
    }
}
