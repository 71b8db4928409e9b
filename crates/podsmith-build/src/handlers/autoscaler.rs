use crate::error::Result;
use crate::k8s::{
    CrossVersionObjectReference, Document, HorizontalPodAutoscaler, HpaSpec, MetricSpec,
    MetricTarget, ObjectMeta, ResourceMetricSource,
};
use crate::model::BundleModel;
use crate::pipeline::{ArtifactHandler, Slice, SynthesisContext};

/// CPU-based horizontal autoscaling for the Deployment.
pub struct AutoscalerHandler;

impl ArtifactHandler for AutoscalerHandler {
    fn name(&self) -> &'static str {
        "autoscaler"
    }

    fn reads(&self) -> &'static [Slice] {
        &[Slice::Workload, Slice::Autoscaling]
    }

    fn writes(&self) -> &'static [Slice] {
        &[]
    }

    fn handle(&self, _ctx: &SynthesisContext<'_>, model: &mut BundleModel) -> Result<Vec<Document>> {
        let scaling = &model.deployment.autoscaling;
        if !scaling.enabled {
            tracing::debug!(app = %model.app_name, "autoscaling disabled");
            return Ok(Vec::new());
        }
        let hpa = HorizontalPodAutoscaler {
            api_version: "autoscaling/v2".to_owned(),
            kind: "HorizontalPodAutoscaler".to_owned(),
            metadata: ObjectMeta::new(format!("{}-hpa", model.app_name), &model.labels),
            spec: HpaSpec {
                scale_target_ref: CrossVersionObjectReference {
                    api_version: "apps/v1".to_owned(),
                    kind: "Deployment".to_owned(),
                    name: model.deployment.name.clone(),
                },
                min_replicas: scaling.min_replicas,
                max_replicas: scaling.max_replicas,
                metrics: vec![MetricSpec {
                    type_: "Resource".to_owned(),
                    resource: ResourceMetricSource {
                        name: "cpu".to_owned(),
                        target: MetricTarget {
                            type_: "Utilization".to_owned(),
                            average_utilization: scaling.cpu_percentage,
                        },
                    },
                }],
            },
        };
        Ok(vec![Document::HorizontalPodAutoscaler(hpa)])
    }
}
