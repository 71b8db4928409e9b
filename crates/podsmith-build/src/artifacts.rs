//! Artifact model builder.
//!
//! Merges the extracted topology with the resolved overrides into the
//! [`BundleModel`] the handlers work on:
//!
//! - **Port wiring**: one exposure target per distinct port. The first
//!   listener on a port names it (`port-<n>-<listener>`), and the same
//!   name is used for the container port and the service port.
//! - **TLS secrets**: key and trust material in one directory fold into
//!   `<owner>-secure-socket`; otherwise `<owner>-keystore` and
//!   `<owner>-truststore`. Each secret mounts at the parent directory of
//!   its material, so the program finds files at the paths it names.
//! - **Primary config**: every `cloud.config.files` entry merges into the
//!   `<app>-config` map, keyed by file name.
//!
//! Secrets landing on the same mount path are merged into one. Any other
//! pair of resources on one path is fatal, since the container spec would
//! carry the same `mountPath` twice.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use podsmith_core::{TlsConfig, Topology, naming};

use crate::error::{Result, SynthesisError};
use crate::model::{
    BundleModel, ConfigMapModel, DeploymentModel, PRIMARY_CONFIG_DIR, PortModel, SecretModel,
    VolumeModel,
};
use crate::pipeline::SynthesisContext;
use crate::resolver::{LoadedFile, MountGroup, ResolvedConfig, check_reserved, load_file, normalize_mount_path};

pub fn build_model(ctx: &SynthesisContext<'_>, resolved: ResolvedConfig) -> Result<BundleModel> {
    let app = ctx.app_name.as_str();
    let topology = ctx.topology;

    let ports = wire_ports(topology);

    let mut secrets = SecretSet::default();
    for group in resolved.secret_files {
        let name = mount_resource_name(app, &group, "secret");
        secrets.add(name, group.mount_path, group.files)?;
    }
    let mut seen_listeners = Vec::new();
    for listener in topology.listeners() {
        let Some(tls) = &listener.tls else { continue };
        if seen_listeners.contains(&listener.name) {
            continue;
        }
        seen_listeners.push(listener.name.clone());
        add_tls_secrets(&mut secrets, ctx.project_dir, &listener.name, tls)?;
    }
    for client in &topology.clients {
        add_tls_secrets(&mut secrets, ctx.project_dir, &client.name, &client.tls)?;
    }

    let mut config_maps: Vec<ConfigMapModel> = Vec::new();
    if let Some(primary) = consolidate_primary_config(app, resolved.primary_config)? {
        config_maps.push(primary);
    }
    for group in resolved.config_files {
        let base = mount_resource_name(app, &group, "config-map");
        let name = unique_name(&base, |n| config_maps.iter().any(|c| c.name == n));
        let mut data = BTreeMap::new();
        for file in group.files {
            data.insert(file.file_name, utf8(file.content, &file.source)?);
        }
        config_maps.push(ConfigMapModel {
            name,
            data,
            mount_path: group.mount_path,
            read_only: true,
            primary_config: false,
        });
    }

    check_mount_paths(&secrets.items, &config_maps, &resolved.volumes)?;

    let labels = BTreeMap::from([("app".to_owned(), app.to_owned())]);
    let deployment = DeploymentModel {
        name: format!("{app}-deployment"),
        image: resolved.image.reference(),
        replicas: resolved.replicas,
        ports,
        env: resolved.env,
        probes: resolved.probes,
        resources: resolved.resources,
        mounts: Vec::new(),
        internal_domain_name: resolved.internal_domain_name,
        autoscaling: resolved.autoscaling,
    };

    tracing::debug!(
        app,
        ports = deployment.ports.len(),
        secrets = secrets.items.len(),
        config_maps = config_maps.len(),
        "artifact model built"
    );

    Ok(BundleModel {
        app_name: app.to_owned(),
        labels,
        deployment,
        secrets: secrets.items,
        config_maps,
        volumes: resolved.volumes,
        image: resolved.image,
        schedule: topology.task.as_ref().map(|t| t.cron_expression()),
        build: None,
        settings: resolved.settings,
    })
}

/// One exposure target per distinct resolved port, in discovery order.
pub fn wire_ports(topology: &Topology) -> Vec<PortModel> {
    let mut ports: Vec<PortModel> = Vec::new();
    for listener in topology.listeners() {
        if !listener.is_resolved() || ports.iter().any(|p| p.port == listener.port) {
            continue;
        }
        let index = ports.len() + 1;
        ports.push(PortModel {
            name: naming::port_name(index, &listener.name),
            port: listener.port,
            listener: listener.name.clone(),
        });
    }
    ports
}

/// Reject two distinct resources mounted at the same path.
fn check_mount_paths(
    secrets: &[SecretModel],
    config_maps: &[ConfigMapModel],
    volumes: &[VolumeModel],
) -> Result<()> {
    let mounts = secrets
        .iter()
        .map(|s| (s.mount_path.as_str(), format!("secret {}", s.name)))
        .chain(
            config_maps
                .iter()
                .map(|c| (c.mount_path.as_str(), format!("config map {}", c.name))),
        )
        .chain(
            volumes
                .iter()
                .map(|v| (v.mount_path.as_str(), format!("volume {}", v.name))),
        );

    let mut seen: BTreeMap<&str, String> = BTreeMap::new();
    for (mount_path, owner) in mounts {
        if let Some(first) = seen.get(mount_path) {
            return Err(SynthesisError::MountPathCollision {
                mount_path: mount_path.to_owned(),
                first: first.clone(),
                second: owner,
            });
        }
        seen.insert(mount_path, owner);
    }
    Ok(())
}

/// Merge primary config files into the `<app>-config` map.
pub fn consolidate_primary_config(
    app: &str,
    files: Vec<LoadedFile>,
) -> Result<Option<ConfigMapModel>> {
    if files.is_empty() {
        return Ok(None);
    }
    let mut data = BTreeMap::new();
    for file in files {
        if data.contains_key(&file.file_name) {
            return Err(SynthesisError::DuplicatePrimaryConfig {
                file_name: file.file_name,
            });
        }
        let content = utf8(file.content, &file.source)?;
        data.insert(file.file_name, content);
    }
    Ok(Some(ConfigMapModel {
        name: format!("{app}-config"),
        data,
        mount_path: PRIMARY_CONFIG_DIR.to_owned(),
        read_only: true,
        primary_config: true,
    }))
}

fn add_tls_secrets(
    secrets: &mut SecretSet,
    project_dir: &Path,
    owner: &str,
    tls: &TlsConfig,
) -> Result<()> {
    let key_paths: Vec<&str> = tls.key.as_ref().map(|k| k.paths()).unwrap_or_default();
    let trust_path = tls.trust.as_ref().map(|t| t.path.as_str());

    let mut groups: Vec<(String, Vec<&str>)> = Vec::new();
    if tls.shares_directory() {
        let mut all = key_paths.clone();
        all.extend(trust_path);
        groups.push(("secure-socket".to_owned(), all));
    } else {
        for (i, (_, paths)) in group_by_parent(&key_paths).into_iter().enumerate() {
            let suffix = if i == 0 {
                "keystore".to_owned()
            } else {
                format!("keystore-{}", i + 1)
            };
            groups.push((suffix, paths));
        }
        if let Some(path) = trust_path {
            groups.push(("truststore".to_owned(), vec![path]));
        }
    }

    for (suffix, paths) in groups {
        let Some(first) = paths.first() else { continue };
        let mount_path = normalize_mount_path(&parent_dir(first));
        check_reserved(first, &mount_path, true)?;
        let files = paths
            .iter()
            .map(|p| load_file(project_dir, p))
            .collect::<Result<Vec<_>>>()?;
        secrets.add(naming::dns_label(&format!("{owner}-{suffix}")), mount_path, files)?;
    }
    Ok(())
}

fn group_by_parent<'a>(paths: &[&'a str]) -> Vec<(String, Vec<&'a str>)> {
    let mut groups: Vec<(String, Vec<&'a str>)> = Vec::new();
    for &path in paths {
        let parent = parent_dir(path);
        match groups.iter_mut().find(|(p, _)| *p == parent) {
            Some((_, members)) => members.push(path),
            None => groups.push((parent, vec![path])),
        }
    }
    groups
}

fn parent_dir(path: &str) -> String {
    Path::new(path)
        .parent()
        .map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn mount_resource_name(app: &str, group: &MountGroup, suffix: &str) -> String {
    let stem = group
        .files
        .first()
        .and_then(|f| Path::new(&f.file_name).file_stem())
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    naming::dns_label(&format!("{app}-{stem}-{suffix}"))
}

fn unique_name(base: &str, taken: impl Fn(&str) -> bool) -> String {
    if !taken(base) {
        return base.to_owned();
    }
    (2..)
        .map(|i| format!("{base}-{i}"))
        .find(|candidate| !taken(candidate))
        .unwrap_or_else(|| base.to_owned())
}

fn utf8(content: Vec<u8>, source: &str) -> Result<String> {
    String::from_utf8(content).map_err(|_| SynthesisError::NonUtf8Config {
        path: PathBuf::from(source),
    })
}

/// Secrets keyed by mount path.
#[derive(Debug, Default)]
struct SecretSet {
    items: Vec<SecretModel>,
}

impl SecretSet {
    fn add(&mut self, name: String, mount_path: String, files: Vec<LoadedFile>) -> Result<()> {
        let index = match self.items.iter().position(|s| s.mount_path == mount_path) {
            Some(i) => {
                tracing::debug!(secret = %self.items[i].name, merged = %name, %mount_path, "merging secrets sharing a mount path");
                i
            }
            None => {
                let name = unique_name(&name, |n| self.items.iter().any(|s| s.name == n));
                self.items.push(SecretModel {
                    name,
                    data: BTreeMap::new(),
                    mount_path,
                    read_only: true,
                });
                self.items.len() - 1
            }
        };
        let secret = &mut self.items[index];
        for file in files {
            match secret.data.get(&file.file_name) {
                Some(existing) if *existing != file.content => {
                    return Err(SynthesisError::DuplicateMountFile {
                        file_name: file.file_name,
                        mount_path: secret.mount_path.clone(),
                    });
                }
                Some(_) => {}
                None => {
                    secret.data.insert(file.file_name, file.content);
                }
            }
        }
        Ok(())
    }
}
