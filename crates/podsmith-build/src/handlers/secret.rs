use base64::Engine as _;
use podsmith_core::naming;

use crate::error::Result;
use crate::k8s::{Document, ObjectMeta, Secret};
use crate::model::{BundleModel, MountModel, MountSource};
use crate::pipeline::{ArtifactHandler, Slice, SynthesisContext};

/// Emits one Secret per mounted secret and mounts it read-only.
pub struct SecretHandler;

impl ArtifactHandler for SecretHandler {
    fn name(&self) -> &'static str {
        "secret"
    }

    fn reads(&self) -> &'static [Slice] {
        &[Slice::Secrets]
    }

    fn writes(&self) -> &'static [Slice] {
        &[Slice::Mounts]
    }

    fn handle(&self, _ctx: &SynthesisContext<'_>, model: &mut BundleModel) -> Result<Vec<Document>> {
        let engine = base64::engine::general_purpose::STANDARD;
        let mut documents = Vec::with_capacity(model.secrets.len());
        for secret in &model.secrets {
            documents.push(Document::Secret(Secret {
                api_version: "v1".to_owned(),
                kind: "Secret".to_owned(),
                metadata: ObjectMeta::new(&secret.name, &model.labels),
                type_: "Opaque".to_owned(),
                data: secret
                    .data
                    .iter()
                    .map(|(file, content)| (file.clone(), engine.encode(content)))
                    .collect(),
            }));
            model.deployment.mounts.push(MountModel {
                volume_name: naming::suffixed_label(&secret.name, "volume"),
                mount_path: secret.mount_path.clone(),
                read_only: secret.read_only,
                source: MountSource::Secret(secret.name.clone()),
            });
        }
        Ok(documents)
    }
}
