use podsmith_core::naming;

use crate::error::Result;
use crate::k8s::{ConfigMap, Document, ObjectMeta};
use crate::model::{
    BundleModel, CONFIG_FILES_ENV, EnvModel, EnvSource, MountModel, MountSource,
};
use crate::pipeline::{ArtifactHandler, Slice, SynthesisContext};

/// Emits config maps, mounts them, and points the runtime at the primary
/// configuration files through `CONFIG_FILES`.
pub struct ConfigHandler;

impl ArtifactHandler for ConfigHandler {
    fn name(&self) -> &'static str {
        "config"
    }

    fn reads(&self) -> &'static [Slice] {
        &[Slice::ConfigMaps]
    }

    fn writes(&self) -> &'static [Slice] {
        &[Slice::Mounts, Slice::Env]
    }

    fn handle(&self, _ctx: &SynthesisContext<'_>, model: &mut BundleModel) -> Result<Vec<Document>> {
        let mut documents = Vec::with_capacity(model.config_maps.len());
        for map in &model.config_maps {
            documents.push(Document::ConfigMap(ConfigMap {
                api_version: "v1".to_owned(),
                kind: "ConfigMap".to_owned(),
                metadata: ObjectMeta::new(&map.name, &model.labels),
                data: map.data.clone(),
            }));
            model.deployment.mounts.push(MountModel {
                volume_name: naming::suffixed_label(&map.name, "volume"),
                mount_path: map.mount_path.clone(),
                read_only: map.read_only,
                source: MountSource::ConfigMap(map.name.clone()),
            });
            if map.primary_config {
                let files = map
                    .data
                    .keys()
                    .map(|file| format!("{}/{file}", map.mount_path))
                    .collect::<Vec<_>>()
                    .join(":");
                model.deployment.env.push(EnvModel {
                    name: CONFIG_FILES_ENV.to_owned(),
                    source: EnvSource::Literal(files),
                });
            }
        }
        Ok(documents)
    }
}
