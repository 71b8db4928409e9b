use crate::error::Result;
use crate::k8s::{Document, ObjectMeta, Service, ServicePort, ServiceSpec};
use crate::model::BundleModel;
use crate::pipeline::{ArtifactHandler, Slice, SynthesisContext};

/// Exposes every wired port through one cluster-internal Service.
pub struct NetworkExposureHandler;

impl ArtifactHandler for NetworkExposureHandler {
    fn name(&self) -> &'static str {
        "network-exposure"
    }

    fn reads(&self) -> &'static [Slice] {
        &[Slice::Ports]
    }

    fn writes(&self) -> &'static [Slice] {
        &[]
    }

    fn handle(&self, _ctx: &SynthesisContext<'_>, model: &mut BundleModel) -> Result<Vec<Document>> {
        let deployment = &model.deployment;
        if deployment.ports.is_empty() {
            tracing::debug!(app = %model.app_name, "no resolved ports; skipping service");
            return Ok(Vec::new());
        }
        let service = Service {
            api_version: "v1".to_owned(),
            kind: "Service".to_owned(),
            metadata: ObjectMeta::new(&deployment.internal_domain_name, &model.labels),
            spec: ServiceSpec {
                selector: model.labels.clone(),
                ports: deployment
                    .ports
                    .iter()
                    .map(|p| ServicePort {
                        name: p.name.clone(),
                        port: p.port,
                        target_port: p.port,
                        protocol: "TCP".to_owned(),
                    })
                    .collect(),
                type_: "ClusterIP".to_owned(),
            },
        };
        Ok(vec![Document::Service(service)])
    }
}
