use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::k8s::Document;
use crate::model::{
    APP_HOME, BuildModel, BuilderStage, BundleModel, ContextFile, Entrypoint, Instruction, JARS_DIR,
};
use crate::pipeline::{ArtifactHandler, Slice, SynthesisContext};

pub const NATIVE_BUILDER_IMAGE: &str = "ghcr.io/graalvm/native-image-community:17";
const NATIVE_BUILD_DIR: &str = "/app/build";

/// Lays out the image build: context files first, then the layer order
/// dependencies → executable → auxiliary files → env → ports → entrypoint.
pub struct BuildRecipeHandler;

impl ArtifactHandler for BuildRecipeHandler {
    fn name(&self) -> &'static str {
        "build-recipe"
    }

    fn reads(&self) -> &'static [Slice] {
        &[Slice::Image, Slice::Ports]
    }

    fn writes(&self) -> &'static [Slice] {
        &[Slice::BuildRecipe]
    }

    fn handle(&self, ctx: &SynthesisContext<'_>, model: &mut BundleModel) -> Result<Vec<Document>> {
        let artifact = ctx.artifact;
        let exe_name = file_name(&artifact.executable);

        let mut context_files = Vec::new();
        let mut artifact_layers = Vec::new();
        for dep in &artifact.dependencies {
            let name = file_name(dep);
            context_files.push(ContextFile {
                source: resolve(ctx.project_dir, dep),
                target: PathBuf::from("jars").join(&name),
            });
            artifact_layers.push(format!("jars/{name}"));
        }
        context_files.push(ContextFile {
            source: resolve(ctx.project_dir, &artifact.executable),
            target: PathBuf::from(&exe_name),
        });

        let mut runtime = vec![Instruction::Workdir(APP_HOME.to_owned())];
        let (builder, entrypoint) = if model.settings.native {
            let builder = native_builder(&artifact_layers, &exe_name, &artifact.main_class, &model.app_name);
            runtime.push(Instruction::Copy {
                source: format!("{NATIVE_BUILD_DIR}/{}", model.app_name),
                target: format!("{APP_HOME}/{}", model.app_name),
                from_stage: Some("builder".to_owned()),
            });
            let entrypoint = Entrypoint::Exec(vec![format!("{APP_HOME}/{}", model.app_name)]);
            (Some(builder), entrypoint)
        } else {
            for layer in &artifact_layers {
                runtime.push(Instruction::copy(layer, format!("{JARS_DIR}/")));
            }
            runtime.push(Instruction::copy(&exe_name, format!("{APP_HOME}/")));
            let entrypoint = Entrypoint::Shell(format!(
                "java -Xdiag -cp \"{exe_name}:jars/*\" {}",
                artifact.main_class
            ));
            (None, entrypoint)
        };

        for (i, copy) in model.image.copy_files.iter().enumerate() {
            let name = file_name(Path::new(&copy.source_file));
            let staged = PathBuf::from("files").join(i.to_string()).join(&name);
            runtime.push(Instruction::copy(staged.to_string_lossy(), &copy.target));
            context_files.push(ContextFile {
                source: resolve(ctx.project_dir, Path::new(&copy.source_file)),
                target: staged,
            });
        }
        for (name, value) in &model.image.env {
            runtime.push(Instruction::Env {
                name: name.clone(),
                value: value.clone(),
            });
        }

        let entrypoint = match &model.image.cmd {
            Some(cmd) => Entrypoint::Shell(cmd.clone()),
            None => entrypoint,
        };

        model.build = Some(BuildModel {
            base_image: model.image.base.clone(),
            entrypoint,
            exposed_ports: model.deployment.container_ports().collect(),
            instructions: runtime,
            builder,
            context_files,
        });
        tracing::debug!(app = %model.app_name, native = model.settings.native, "build recipe laid out");
        Ok(Vec::new())
    }
}

fn native_builder(layers: &[String], exe_name: &str, main_class: &str, app: &str) -> BuilderStage {
    let mut instructions = vec![Instruction::Workdir(NATIVE_BUILD_DIR.to_owned())];
    for layer in layers {
        instructions.push(Instruction::copy(layer, format!("{NATIVE_BUILD_DIR}/jars/")));
    }
    instructions.push(Instruction::copy(exe_name, format!("{NATIVE_BUILD_DIR}/")));
    instructions.push(Instruction::Run(format!(
        "native-image -cp \"{exe_name}:jars/*\" {main_class} -o {app} --no-fallback"
    )));
    BuilderStage {
        image: NATIVE_BUILDER_IMAGE.to_owned(),
        instructions,
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

fn resolve(project_dir: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        project_dir.join(path)
    }
}
