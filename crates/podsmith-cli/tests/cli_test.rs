use std::path::Path;

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use serde_json::{Value, json};
use tempfile::TempDir;

fn podsmith() -> assert_cmd::Command {
    cargo_bin_cmd!("podsmith")
}

fn hello_model(listener_port: Value) -> Value {
    json!({
        "package": "demo",
        "artifact": {
            "name": "hello",
            "executable": "target/bin/hello.jar",
            "main_class": "demo.hello.main"
        },
        "units": [{
            "file": "main.bal",
            "declarations": [
                {"kind": "listener", "name": "helloEp",
                 "type_ref": {"module": "http", "name": "Listener"},
                 "init": {"kind": "new", "args": [{"value": listener_port}]},
                 "location": {"file": "main.bal", "line": 3, "column": 1}},
                {"kind": "service", "absolute_path": "/hello",
                 "listeners": [{"kind": "ident", "name": "helloEp"}],
                 "resources": [{"method": "get", "path": "sayHello"}],
                 "location": {"file": "main.bal", "line": 5, "column": 1}}
            ]
        }]
    })
}

/// Project directory with the compiled executable and a program model.
fn project(model: &Value) -> TempDir {
    let tmp = TempDir::new().unwrap();
    let bin = tmp.path().join("target/bin");
    std::fs::create_dir_all(&bin).unwrap();
    std::fs::write(bin.join("hello.jar"), "exe").unwrap();
    std::fs::write(tmp.path().join("model.json"), model.to_string()).unwrap();
    tmp
}

fn generate(dir: &Path) -> assert_cmd::assert::Assert {
    podsmith()
        .current_dir(dir)
        .args(["generate", "--model", "model.json"])
        .assert()
}

// ── Help / Version ──

#[test]
fn shows_help() {
    podsmith()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Generate Kubernetes manifests"));
}

#[test]
fn shows_version() {
    podsmith()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("podsmith"));
}

// ── Generate ──

#[test]
fn generate_writes_manifests_and_dockerfile() {
    let tmp = project(&hello_model(json!({"kind": "int", "value": 9090})));

    generate(tmp.path())
        .success()
        .stdout(predicate::str::contains("Generated"))
        .stdout(predicate::str::contains("Image: hello:latest"));

    let yaml = std::fs::read_to_string(tmp.path().join("target/kubernetes/hello/hello.yaml")).unwrap();
    assert!(yaml.contains("containerPort: 9090"));
    assert!(yaml.contains("name: hello-svc"));

    let dockerfile = std::fs::read_to_string(tmp.path().join("target/docker/hello/Dockerfile")).unwrap();
    assert!(dockerfile.contains("EXPOSE 9090"));
    assert!(tmp.path().join("target/docker/hello/hello.jar").exists());
}

#[test]
fn generate_honors_cloud_toml_and_target() {
    let tmp = project(&hello_model(json!({"kind": "int", "value": 9090})));
    std::fs::write(
        tmp.path().join("Cloud.toml"),
        "[settings]\nsingleYAML = false\n\n[container.image]\ntag = \"v2\"\n",
    )
    .unwrap();

    podsmith()
        .current_dir(tmp.path())
        .args(["generate", "--model", "model.json", "--target", "out"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Image: hello:v2"));

    let kube = tmp.path().join("out/kubernetes/hello");
    assert!(kube.join("hello-deployment.yaml").exists());
    assert!(kube.join("hello-svc.yaml").exists());
    assert!(kube.join("hello-hpa.yaml").exists());
    assert!(!tmp.path().join("target/kubernetes").exists());
}

#[test]
fn generate_fails_on_unresolved_port() {
    let tmp = project(&hello_model(json!({"kind": "ident", "name": "missingPort"})));

    generate(tmp.path())
        .failure()
        .stderr(predicate::str::contains("ERROR [port-not-found]"))
        .stderr(predicate::str::contains("nothing was written"));

    assert!(!tmp.path().join("target/kubernetes").exists());
}

#[test]
fn generate_reports_synthesis_errors() {
    let tmp = project(&hello_model(json!({"kind": "int", "value": 9090})));
    std::fs::write(
        tmp.path().join("Cloud.toml"),
        "[cloud.deployment.probes.liveness]\nport = 8080\npath = \"/hello/sayHello\"\n",
    )
    .unwrap();

    generate(tmp.path())
        .failure()
        .stderr(predicate::str::contains("ERROR [synthesis]"))
        .stderr(predicate::str::contains("8080"));
}

#[test]
fn generate_without_services_writes_nothing() {
    let model = json!({
        "package": "demo",
        "artifact": {"name": "hello", "executable": "target/bin/hello.jar"},
        "units": []
    });
    let tmp = project(&model);

    generate(tmp.path())
        .success()
        .stdout(predicate::str::contains("nothing to generate"));

    assert!(!tmp.path().join("target/kubernetes").exists());
    assert!(!tmp.path().join("target/docker").exists());
}

#[test]
fn generate_fails_on_missing_model() {
    let tmp = TempDir::new().unwrap();

    generate(tmp.path())
        .failure()
        .stderr(predicate::str::contains("failed to read program model"));
}

#[test]
fn generate_fails_on_invalid_cloud_toml() {
    let tmp = project(&hello_model(json!({"kind": "int", "value": 9090})));
    std::fs::write(tmp.path().join("Cloud.toml"), "[settings\n").unwrap();

    generate(tmp.path())
        .failure()
        .stderr(predicate::str::contains("failed to parse config"));
}

// ── Check ──

#[test]
fn check_lists_services() {
    let tmp = project(&hello_model(json!({"kind": "int", "value": 9090})));

    podsmith()
        .current_dir(tmp.path())
        .args(["check", "--model", "model.json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("service /hello [helloEp:9090]"))
        .stdout(predicate::str::contains("OK (0 warning(s))"));

    assert!(!tmp.path().join("target/kubernetes").exists());
}

#[test]
fn check_fails_on_unresolved_port() {
    let tmp = project(&hello_model(json!({"kind": "ident", "name": "missingPort"})));

    podsmith()
        .current_dir(tmp.path())
        .args(["check", "--model", "model.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("[port-not-found] main.bal:"));
}
