//! Pod template pieces shared by the Deployment and CronJob handlers.

use std::collections::BTreeMap;

use podsmith_core::naming;

use crate::k8s::{
    ClaimVolumeSource, ConfigMapVolumeSource, Container, ContainerPort, Document, EnvVar,
    EnvVarSource, KeySelector, ObjectMeta, PersistentVolumeClaim, Probe, PvcSpec,
    ResourceRequirements, SecretVolumeSource, Volume, VolumeMount,
};
use crate::model::{BundleModel, EnvSource, MountModel, MountSource};

/// Emit a claim per configured volume and mount it into the workload.
pub fn claims(model: &mut BundleModel) -> Vec<Document> {
    let mut documents = Vec::with_capacity(model.volumes.len());
    for volume in &model.volumes {
        let claim_name = naming::suffixed_label(&volume.name, "pvc");
        documents.push(Document::PersistentVolumeClaim(PersistentVolumeClaim {
            api_version: "v1".to_owned(),
            kind: "PersistentVolumeClaim".to_owned(),
            metadata: ObjectMeta::new(&claim_name, &model.labels),
            spec: PvcSpec {
                access_modes: vec!["ReadWriteOnce".to_owned()],
                resources: ResourceRequirements {
                    limits: BTreeMap::new(),
                    requests: BTreeMap::from([("storage".to_owned(), volume.size.clone())]),
                },
            },
        }));
        model.deployment.mounts.push(MountModel {
            volume_name: naming::suffixed_label(&volume.name, "volume"),
            mount_path: volume.mount_path.clone(),
            read_only: false,
            source: MountSource::Claim(claim_name),
        });
    }
    documents
}

pub fn container(model: &BundleModel, liveness: Option<Probe>, readiness: Option<Probe>) -> Container {
    let deployment = &model.deployment;
    let resources = &deployment.resources;
    Container {
        name: model.app_name.clone(),
        image: deployment.image.clone(),
        image_pull_policy: Some("IfNotPresent".to_owned()),
        ports: deployment
            .ports
            .iter()
            .map(|p| ContainerPort {
                name: p.name.clone(),
                container_port: p.port,
                protocol: "TCP".to_owned(),
            })
            .collect(),
        env: deployment.env.iter().map(env_var).collect(),
        resources: Some(ResourceRequirements {
            limits: BTreeMap::from([
                ("memory".to_owned(), resources.max_memory.clone()),
                ("cpu".to_owned(), resources.max_cpu.clone()),
            ]),
            requests: BTreeMap::from([
                ("memory".to_owned(), resources.min_memory.clone()),
                ("cpu".to_owned(), resources.min_cpu.clone()),
            ]),
        }),
        liveness_probe: liveness,
        readiness_probe: readiness,
        volume_mounts: deployment
            .mounts
            .iter()
            .map(|m| VolumeMount {
                name: m.volume_name.clone(),
                mount_path: m.mount_path.clone(),
                read_only: m.read_only.then_some(true),
            })
            .collect(),
    }
}

pub fn volumes(model: &BundleModel) -> Vec<Volume> {
    model
        .deployment
        .mounts
        .iter()
        .map(|m| {
            let mut volume = Volume {
                name: m.volume_name.clone(),
                secret: None,
                config_map: None,
                persistent_volume_claim: None,
            };
            match &m.source {
                MountSource::Secret(name) => {
                    volume.secret = Some(SecretVolumeSource {
                        secret_name: name.clone(),
                    })
                }
                MountSource::ConfigMap(name) => {
                    volume.config_map = Some(ConfigMapVolumeSource { name: name.clone() })
                }
                MountSource::Claim(name) => {
                    volume.persistent_volume_claim = Some(ClaimVolumeSource {
                        claim_name: name.clone(),
                    })
                }
            }
            volume
        })
        .collect()
}

fn env_var(env: &crate::model::EnvModel) -> EnvVar {
    match &env.source {
        EnvSource::Literal(value) => EnvVar {
            name: env.name.clone(),
            value: Some(value.clone()),
            value_from: None,
        },
        EnvSource::ConfigMapKey { name, key } => EnvVar {
            name: env.name.clone(),
            value: None,
            value_from: Some(EnvVarSource {
                config_map_key_ref: Some(KeySelector {
                    name: name.clone(),
                    key: key.clone(),
                }),
                ..EnvVarSource::default()
            }),
        },
        EnvSource::SecretKey { name, key } => EnvVar {
            name: env.name.clone(),
            value: None,
            value_from: Some(EnvVarSource {
                secret_key_ref: Some(KeySelector {
                    name: name.clone(),
                    key: key.clone(),
                }),
                ..EnvVarSource::default()
            }),
        },
    }
}
