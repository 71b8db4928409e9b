use crate::error::Result;
use crate::k8s::{
    CronJob, CronJobSpec, Document, JobSpec, JobTemplateSpec, ObjectMeta, PodSpec, PodTemplateSpec,
};
use crate::model::BundleModel;
use crate::pipeline::{ArtifactHandler, Slice, SynthesisContext};

use super::pod;

/// Runs the batch entry point on its cron schedule.
pub struct ScheduledJobHandler;

impl ArtifactHandler for ScheduledJobHandler {
    fn name(&self) -> &'static str {
        "scheduled-job"
    }

    fn reads(&self) -> &'static [Slice] {
        &[
            Slice::Schedule,
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

    fn handle(&self, _ctx: &SynthesisContext<'_>, model: &mut BundleModel) -> Result<Vec<Document>> {
        let Some(schedule) = model.schedule.clone() else {
            return Ok(Vec::new());
        };
        let mut documents = pod::claims(model);
        let cron_job = CronJob {
            api_version: "batch/v1".to_owned(),
            kind: "CronJob".to_owned(),
            metadata: ObjectMeta::new(format!("{}-job", model.app_name), &model.labels),
            spec: CronJobSpec {
                schedule,
                job_template: JobTemplateSpec {
                    spec: JobSpec {
                        template: PodTemplateSpec {
                            metadata: ObjectMeta::new(&model.app_name, &model.labels),
                            spec: PodSpec {
                                containers: vec![pod::container(model, None, None)],
                                volumes: pod::volumes(model),
                                restart_policy: Some("OnFailure".to_owned()),
                            },
                        },
                    },
                },
            },
        };
        tracing::debug!(app = %model.app_name, "cron job synthesized");
        documents.push(Document::CronJob(cron_job));
        Ok(documents)
    }
}
