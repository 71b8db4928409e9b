use podsmith_core::Topology;

use crate::error::{Result, SynthesisError};
use crate::k8s::{
    Deployment, DeploymentSpec, Document, HttpGetAction, LabelSelector, ObjectMeta, PodSpec,
    PodTemplateSpec, Probe,
};
use crate::model::{BundleModel, DeploymentModel, ProbeModel};
use crate::pipeline::{ArtifactHandler, Slice, SynthesisContext};

use super::pod;

const PROBE_INITIAL_DELAY_SECONDS: u32 = 30;
const PROBE_PERIOD_SECONDS: u32 = 5;

/// Emits the Deployment, its volume claims, and its bound probes.
pub struct ComputeHandler;

impl ArtifactHandler for ComputeHandler {
    fn name(&self) -> &'static str {
        "compute"
    }

    fn reads(&self) -> &'static [Slice] {
        &[
            Slice::Ports,
            Slice::Probes,
            Slice::Resources,
            Slice::Env,
            Slice::Image,
            Slice::Volumes,
            Slice::Mounts,
        ]
    }

    fn writes(&self) -> &'static [Slice] {
        &[Slice::Workload]
    }

    fn handle(&self, ctx: &SynthesisContext<'_>, model: &mut BundleModel) -> Result<Vec<Document>> {
        let liveness = model
            .deployment
            .probes
            .liveness
            .as_ref()
            .map(|p| bind_probe("liveness", p, &model.deployment, ctx.topology))
            .transpose()?;
        let readiness = model
            .deployment
            .probes
            .readiness
            .as_ref()
            .map(|p| bind_probe("readiness", p, &model.deployment, ctx.topology))
            .transpose()?;

        let mut documents = pod::claims(model);

        let deployment = Deployment {
            api_version: "apps/v1".to_owned(),
            kind: "Deployment".to_owned(),
            metadata: ObjectMeta::new(&model.deployment.name, &model.labels),
            spec: DeploymentSpec {
                replicas: model.deployment.replicas,
                selector: LabelSelector {
                    match_labels: model.labels.clone(),
                },
                template: PodTemplateSpec {
                    metadata: ObjectMeta::new(&model.app_name, &model.labels),
                    spec: PodSpec {
                        containers: vec![pod::container(model, liveness, readiness)],
                        volumes: pod::volumes(model),
                        restart_policy: None,
                    },
                },
            },
        };
        tracing::debug!(
            deployment = %model.deployment.name,
            replicas = model.deployment.replicas,
            mounts = model.deployment.mounts.len(),
            "deployment synthesized"
        );
        documents.push(Document::Deployment(deployment));
        Ok(documents)
    }
}

/// Bind a probe to an exposed port and check that a `get` resource of a
/// service on that port serves its path.
pub(crate) fn bind_probe(
    kind: &'static str,
    probe: &ProbeModel,
    deployment: &DeploymentModel,
    topology: &Topology,
) -> Result<Probe> {
    let port = match probe.port {
        Some(port) if deployment.container_ports().any(|p| p == port) => port,
        Some(port) => return Err(SynthesisError::ProbePortNotExposed { probe: kind, port }),
        None => deployment
            .container_ports()
            .next()
            .ok_or(SynthesisError::ProbePortUndetectable { probe: kind })?,
    };

    let path = if probe.path.starts_with('/') {
        probe.path.clone()
    } else {
        format!("/{}", probe.path)
    };
    let served = topology
        .services
        .iter()
        .filter(|s| s.listeners.iter().any(|l| l.port == port))
        .any(|s| s.serves_get(&path));
    if !served {
        return Err(SynthesisError::ProbePathNotServed {
            probe: kind,
            path,
            port,
        });
    }

    Ok(Probe {
        http_get: HttpGetAction { path, port },
        initial_delay_seconds: Some(PROBE_INITIAL_DELAY_SECONDS),
        period_seconds: Some(PROBE_PERIOD_SECONDS),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AutoscalingModel, PortModel, Probes, ResourceModel};
    use podsmith_core::{ListenerDecl, ResourceDecl, ServiceDecl};

    fn deployment(ports: &[u16]) -> DeploymentModel {
        DeploymentModel {
            name: "hello-deployment".to_owned(),
            image: "hello:latest".to_owned(),
            replicas: 1,
            ports: ports
                .iter()
                .map(|p| PortModel {
                    name: format!("port-{p}"),
                    port: *p,
                    listener: "ep".to_owned(),
                })
                .collect(),
            env: vec![],
            probes: Probes::default(),
            resources: ResourceModel {
                min_memory: "100Mi".to_owned(),
                max_memory: "512Mi".to_owned(),
                min_cpu: "200m".to_owned(),
                max_cpu: "500m".to_owned(),
            },
            mounts: vec![],
            internal_domain_name: "hello-svc".to_owned(),
            autoscaling: AutoscalingModel {
                enabled: true,
                min_replicas: 1,
                max_replicas: 2,
                cpu_percentage: 50,
            },
        }
    }

    fn topology() -> Topology {
        Topology {
            services: vec![ServiceDecl {
                absolute_path: "/probe".to_owned(),
                listeners: vec![ListenerDecl::new("ep", 9091)],
                resources: vec![ResourceDecl {
                    method: "get".to_owned(),
                    relative_path: "readyz".to_owned(),
                }],
            }],
            ..Topology::default()
        }
    }

    fn probe(port: Option<u16>, path: &str) -> ProbeModel {
        ProbeModel {
            port,
            path: path.to_owned(),
        }
    }

    #[test]
    fn probe_without_port_binds_first_container_port() {
        let bound = bind_probe("readiness", &probe(None, "/probe/readyz"), &deployment(&[9091]), &topology())
            .unwrap();
        assert_eq!(bound.http_get.port, 9091);
    }

    #[test]
    fn probe_with_no_ports_is_fatal() {
        let err = bind_probe("liveness", &probe(None, "/"), &deployment(&[]), &topology()).unwrap_err();
        assert!(err.to_string().contains("cannot detect port for probe"), "got: {err}");
    }

    #[test]
    fn probe_on_unexposed_port_is_fatal() {
        let err = bind_probe("liveness", &probe(Some(8080), "/probe/readyz"), &deployment(&[9091]), &topology())
            .unwrap_err();
        assert!(matches!(err, SynthesisError::ProbePortNotExposed { port: 8080, .. }));
    }

    #[test]
    fn probe_path_must_be_served() {
        let err = bind_probe("readiness", &probe(Some(9091), "/probe/missing"), &deployment(&[9091]), &topology())
            .unwrap_err();
        assert!(matches!(err, SynthesisError::ProbePathNotServed { .. }));
    }
}
