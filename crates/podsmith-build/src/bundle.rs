use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::dockerfile::DockerfileGenerator;
use crate::k8s::Document;
use crate::model::{BuildModel, Settings};

/// The synthesized output of one compilation, ready to be written.
#[derive(Debug, Clone, PartialEq)]
pub struct Bundle {
    pub app_name: String,
    pub documents: Vec<Document>,
    pub build: Option<BuildModel>,
    /// Fully qualified image reference the workload runs.
    pub image: String,
    pub settings: Settings,
}

impl Bundle {
    /// A bundle that writes nothing.
    pub fn empty(app_name: impl Into<String>) -> Self {
        Self {
            app_name: app_name.into(),
            documents: Vec::new(),
            build: None,
            image: String::new(),
            settings: Settings::default(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty() && self.build.is_none()
    }

    pub fn dockerfile(&self) -> Option<String> {
        self.build.as_ref().map(|b| DockerfileGenerator::new(b).render())
    }
}

/// Paths produced by [`write_bundle`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleOutput {
    pub root: PathBuf,
    pub manifests: Vec<PathBuf>,
    pub dockerfile: Option<PathBuf>,
}

/// Write the bundle under `target_dir`:
///
/// ```text
/// <target>/kubernetes/<app>/<app>.yaml          (single YAML)
/// <target>/kubernetes/<app>/<app>-<kind>.yaml   (one file per document)
/// <target>/docker/<app>/Dockerfile
/// <target>/docker/<app>/<build context files>
/// ```
///
/// Previous output for the same application is replaced. If any write
/// fails, the directories created by this call are removed again.
/// Returns `None` for an empty bundle; nothing is touched in that case.
pub fn write_bundle(bundle: &Bundle, target_dir: &Path) -> Result<Option<BundleOutput>, BundleError> {
    if bundle.is_empty() {
        tracing::info!(app = %bundle.app_name, "nothing to emit");
        return Ok(None);
    }

    let kube_dir = target_dir.join("kubernetes").join(&bundle.app_name);
    let docker_dir = target_dir.join("docker").join(&bundle.app_name);

    for dir in [&kube_dir, &docker_dir] {
        if dir.exists() {
            std::fs::remove_dir_all(dir).map_err(|e| BundleError::Cleanup {
                path: dir.clone(),
                source: e,
            })?;
        }
    }

    let result = write_manifests(bundle, &kube_dir).and_then(|manifests| {
        let dockerfile = write_build_context(bundle, &docker_dir)?;
        Ok(BundleOutput {
            root: target_dir.to_path_buf(),
            manifests,
            dockerfile,
        })
    });

    match result {
        Ok(output) => {
            tracing::info!(
                app = %bundle.app_name,
                manifests = output.manifests.len(),
                dockerfile = output.dockerfile.is_some(),
                "bundle written"
            );
            Ok(Some(output))
        }
        Err(e) => {
            for dir in [&kube_dir, &docker_dir] {
                if !dir.exists() {
                    continue;
                }
                if let Err(cleanup) = std::fs::remove_dir_all(dir) {
                    tracing::warn!(path = %dir.display(), error = %cleanup, "failed to remove partial output");
                }
            }
            Err(e)
        }
    }
}

fn write_manifests(bundle: &Bundle, kube_dir: &Path) -> Result<Vec<PathBuf>, BundleError> {
    if bundle.documents.is_empty() {
        return Ok(Vec::new());
    }
    create_dir(kube_dir)?;

    let rendered = bundle
        .documents
        .iter()
        .map(|doc| {
            doc.to_yaml()
                .map(|yaml| (doc, yaml))
                .map_err(|e| BundleError::Render {
                    kind: doc.kind().to_owned(),
                    name: doc.name().to_owned(),
                    source: e,
                })
        })
        .collect::<Result<Vec<_>, _>>()?;

    if bundle.settings.single_yaml {
        let path = kube_dir.join(format!("{}.yaml", bundle.app_name));
        let content = rendered
            .iter()
            .map(|(_, yaml)| yaml.as_str())
            .collect::<Vec<_>>()
            .join("---\n");
        write_file(&path, content.as_bytes())?;
        return Ok(vec![path]);
    }

    let mut seen: HashMap<&str, usize> = HashMap::new();
    let mut paths = Vec::with_capacity(rendered.len());
    for (doc, yaml) in &rendered {
        let suffix = doc.file_suffix();
        let count = seen.entry(suffix).or_insert(0);
        *count += 1;
        let file_name = match *count {
            1 => format!("{}-{suffix}.yaml", bundle.app_name),
            n => format!("{}-{suffix}-{n}.yaml", bundle.app_name),
        };
        let path = kube_dir.join(file_name);
        write_file(&path, yaml.as_bytes())?;
        paths.push(path);
    }
    Ok(paths)
}

fn write_build_context(bundle: &Bundle, docker_dir: &Path) -> Result<Option<PathBuf>, BundleError> {
    let Some(build) = &bundle.build else {
        return Ok(None);
    };
    create_dir(docker_dir)?;

    for file in &build.context_files {
        let dst = docker_dir.join(&file.target);
        if let Some(parent) = dst.parent() {
            create_dir(parent)?;
        }
        std::fs::copy(&file.source, &dst).map_err(|e| BundleError::CopyFile {
            path: file.source.clone(),
            source: e,
        })?;
    }

    let path = docker_dir.join("Dockerfile");
    let content = DockerfileGenerator::new(build).render();
    std::fs::write(&path, content).map_err(|e| BundleError::WriteDockerfile {
        path: path.clone(),
        source: e,
    })?;
    Ok(Some(path))
}

fn create_dir(path: &Path) -> Result<(), BundleError> {
    std::fs::create_dir_all(path).map_err(|e| BundleError::Create {
        path: path.to_path_buf(),
        source: e,
    })
}

fn write_file(path: &Path, content: &[u8]) -> Result<(), BundleError> {
    std::fs::write(path, content).map_err(|e| BundleError::WriteManifest {
        path: path.to_path_buf(),
        source: e,
    })
}

#[derive(Debug, thiserror::Error)]
pub enum BundleError {
    #[error("failed to clean up output directory {path}")]
    Cleanup {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to create directory {path}")]
    Create {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to copy build context file {path}")]
    CopyFile {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to write manifest {path}")]
    WriteManifest {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to write Dockerfile at {path}")]
    WriteDockerfile {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to render {kind} {name} as YAML")]
    Render {
        kind: String,
        name: String,
        source: serde_yaml::Error,
    },
}
