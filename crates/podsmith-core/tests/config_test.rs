use podsmith_core::OverrideDocument;
use podsmith_core::config::{ConfigEnvEntry, CopyFileEntry, FileMountEntry, VolumeEntry};
use tempfile::TempDir;

#[test]
fn load_returns_empty_document_when_no_file() {
    let tmp = TempDir::new().unwrap();
    let doc = OverrideDocument::load(tmp.path()).unwrap();

    assert!(doc.is_empty());
    assert_eq!(doc.number_or::<u32>("cloud.deployment.replicas", 1).unwrap(), 1);
    assert_eq!(
        doc.string_or("container.image.tag", "latest").unwrap(),
        "latest"
    );
    assert!(doc.boolean_or("settings.singleYAML", true).unwrap());
}

#[test]
fn load_parses_full_document() {
    let tmp = TempDir::new().unwrap();
    let toml = r#"
[container.image]
repository = "docker.io/acme"
name = "greeter"
tag = "v1"
base = "eclipse-temurin:21-jre"

[[container.copy.files]]
sourceFile = "data/seed.csv"
target = "/home/app/data/seed.csv"

[cloud.deployment]
replicas = 3
internal_domain_name = "greeter-api"
min_memory = "256Mi"
max_memory = "1Gi"

[[cloud.config.envs]]
name = "LOG_LEVEL"
key_ref = "level"
config_name = "logging"

[[cloud.config.files]]
file = "Config.toml"

[[cloud.deployment.storage.volumes]]
name = "data"
local_path = "/home/app/data"
size = "2Gi"

[settings]
singleYAML = false
"#;
    std::fs::write(tmp.path().join("Cloud.toml"), toml).unwrap();

    let doc = OverrideDocument::load(tmp.path()).unwrap();

    assert_eq!(
        doc.string("container.image.repository").unwrap().as_deref(),
        Some("docker.io/acme")
    );
    assert_eq!(doc.number_or::<u32>("cloud.deployment.replicas", 1).unwrap(), 3);
    assert_eq!(
        doc.string_or("cloud.deployment.min_memory", "100Mi").unwrap(),
        "256Mi"
    );
    assert!(!doc.boolean_or("settings.singleYAML", true).unwrap());

    let copies: Vec<CopyFileEntry> = doc.entries("container.copy.files").unwrap();
    assert_eq!(copies[0].source_file, "data/seed.csv");

    let envs: Vec<ConfigEnvEntry> = doc.entries("cloud.config.envs").unwrap();
    assert_eq!(envs[0].config_name, "logging");

    let primary: Vec<FileMountEntry> = doc.entries("cloud.config.files").unwrap();
    assert_eq!(primary[0].file, "Config.toml");

    let volumes: Vec<VolumeEntry> = doc.entries("cloud.deployment.storage.volumes").unwrap();
    assert_eq!(volumes[0].size, "2Gi");
}

#[test]
fn load_partial_document_fills_defaults() {
    let tmp = TempDir::new().unwrap();
    std::fs::write(
        tmp.path().join("Cloud.toml"),
        "[cloud.deployment]\nmax_cpu = \"1000m\"\n",
    )
    .unwrap();

    let doc = OverrideDocument::load(tmp.path()).unwrap();

    assert_eq!(
        doc.string_or("cloud.deployment.max_cpu", "500m").unwrap(),
        "1000m"
    );
    assert_eq!(
        doc.string_or("cloud.deployment.min_cpu", "200m").unwrap(),
        "200m"
    );
}

#[test]
fn load_invalid_toml_returns_parse_error() {
    let tmp = TempDir::new().unwrap();
    std::fs::write(tmp.path().join("Cloud.toml"), "not valid {{{{ toml").unwrap();

    let result = OverrideDocument::load(tmp.path());
    assert!(result.is_err());

    let err = result.unwrap_err().to_string();
    assert!(err.contains("Cloud.toml"), "got: {err}");
}

#[test]
fn malformed_entry_names_its_key() {
    let doc = OverrideDocument::parse(
        r#"
[[cloud.config.maps]]
mount_path = "/etc/app"
"#,
    )
    .unwrap();

    let err = doc
        .entries::<FileMountEntry>("cloud.config.maps")
        .unwrap_err()
        .to_string();
    assert!(err.contains("cloud.config.maps"), "got: {err}");
}
