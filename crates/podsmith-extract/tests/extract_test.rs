use std::path::PathBuf;

use podsmith_core::program::{
    Annotation, Arg, ClassNode, FunctionNode, ListenerVar, ModuleVar, Param, ResourceNode,
    ServiceNode, CLOUD_MODULE, EXPOSE_ANNOTATION, TASK_ANNOTATION,
};
use podsmith_core::{
    ArtifactInfo, Declaration, DiagnosticCode, Diagnostics, Expr, KeyMaterial, OverrideDocument,
    Program, SourceLocation, TypeRef,
};
use podsmith_extract::{TopologyExtractor, extract};

fn artifact() -> ArtifactInfo {
    ArtifactInfo {
        name: "hello".to_owned(),
        executable: PathBuf::from("target/bin/hello.jar"),
        dependencies: vec![],
        main_class: "demo.hello.main".to_owned(),
    }
}

fn program(decls: Vec<Declaration>) -> Program {
    Program::new("demo", artifact()).with_unit("main.bal", decls)
}

fn loc(line: u32) -> SourceLocation {
    SourceLocation::new("main.bal", line, 1)
}

fn http_listener() -> TypeRef {
    TypeRef::new(Some("http"), "Listener")
}

fn http_new(args: Vec<Arg>) -> Expr {
    Expr::new_object(Some(http_listener()), args)
}

fn service(path: &str, listeners: Vec<Expr>) -> Declaration {
    Declaration::Service(ServiceNode {
        absolute_path: path.to_owned(),
        listeners,
        resources: vec![ResourceNode {
            method: "get".to_owned(),
            path: "sayHello".to_owned(),
        }],
        location: loc(10),
    })
}

fn listener(name: &str, init: Expr) -> Declaration {
    Declaration::Listener(ListenerVar {
        name: name.to_owned(),
        type_ref: http_listener(),
        init: Some(init),
        location: loc(1),
    })
}

fn int_var(name: &str, configurable: bool, init: Option<Expr>) -> Declaration {
    Declaration::Variable(ModuleVar {
        name: name.to_owned(),
        type_ref: TypeRef::new(None, "int"),
        configurable,
        init,
        location: loc(2),
    })
}

fn run(program: &Program) -> (podsmith_core::Topology, Diagnostics) {
    let mut diags = Diagnostics::new();
    let topology = extract(program, &mut diags);
    (topology, diags)
}

#[test]
fn inline_listener_on_literal_port() {
    let p = program(vec![service(
        "/hello",
        vec![http_new(vec![Arg::positional(Expr::int(9090))])],
    )]);
    let (topology, diags) = run(&p);

    assert!(diags.is_empty(), "unexpected: {:?}", diags);
    assert_eq!(topology.services.len(), 1);
    let svc = &topology.services[0];
    assert_eq!(svc.absolute_path, "/hello");
    assert_eq!(svc.listeners[0].port, 9090);
    assert_eq!(svc.listeners[0].name, "hello-ep1");
    assert_eq!(svc.resource_path(&svc.resources[0]), "/hello/sayHello");
}

#[test]
fn service_on_several_listeners_keeps_every_port() {
    let p = program(vec![
        listener("ep", http_new(vec![Arg::positional(Expr::int(8080))])),
        service(
            "/multi",
            vec![
                Expr::ident("ep"),
                http_new(vec![Arg::positional(Expr::int(9091))]),
            ],
        ),
    ]);
    let (topology, diags) = run(&p);

    assert!(diags.is_empty(), "unexpected: {:?}", diags);
    assert_eq!(topology.services.len(), 1);
    let ports: Vec<u16> = topology.services[0].listeners.iter().map(|l| l.port).collect();
    assert_eq!(ports, vec![8080, 9091]);
    assert_eq!(topology.services[0].listeners[0].name, "ep");
    assert_eq!(topology.services[0].listeners[1].name, "multi-ep2");
}

#[test]
fn port_zero_is_reported_as_not_found() {
    let p = program(vec![service(
        "/zero",
        vec![http_new(vec![Arg::positional(Expr::int(0))])],
    )]);
    let (topology, diags) = run(&p);

    assert!(topology.services.is_empty());
    let errors: Vec<String> = diags
        .with_code(DiagnosticCode::PortNotFound)
        .map(ToString::to_string)
        .collect();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("port 0 is not a deployable port"), "{}", errors[0]);
}

#[test]
fn configurable_port_defaulting_to_zero_is_reported() {
    let p = program(vec![
        int_var("port", true, Some(Expr::int(0))),
        service("/zero", vec![http_new(vec![Arg::positional(Expr::ident("port"))])]),
    ]);
    let (topology, diags) = run(&p);

    assert!(topology.services.is_empty());
    assert_eq!(diags.with_code(DiagnosticCode::PortNotFound).count(), 1);
    assert_eq!(diags.with_code(DiagnosticCode::ConfigurableOverridable).count(), 0);
}

#[test]
fn named_listener_with_port_variable() {
    let p = program(vec![
        int_var("port", false, Some(Expr::int(8080))),
        listener(
            "ep",
            Expr::new_object(None, vec![Arg::named("port", Expr::ident("port"))]),
        ),
        service("/api", vec![Expr::ident("ep")]),
    ]);
    let (topology, diags) = run(&p);

    assert!(diags.is_empty());
    assert_eq!(topology.services[0].listeners[0].name, "ep");
    assert_eq!(topology.services[0].listeners[0].port, 8080);
}

#[test]
fn unresolved_listener_reports_once_and_deterministically() {
    let p = program(vec![service(
        "/broken",
        vec![Expr::ident("missing"), Expr::ident("alsoMissing")],
    )]);

    let (first, first_diags) = run(&p);
    let (second, second_diags) = run(&p);

    assert!(first.services.is_empty());
    assert_eq!(first_diags.with_code(DiagnosticCode::PortNotFound).count(), 1);
    assert_eq!(first_diags.len(), 1);
    assert_eq!(first, second);
    let render = |d: &Diagnostics| d.iter().map(ToString::to_string).collect::<Vec<_>>();
    assert_eq!(render(&first_diags), render(&second_diags));
}

#[test]
fn configurable_port_with_default_warns_once() {
    let p = program(vec![
        int_var("port", true, Some(Expr::int(9090))),
        service("/a", vec![http_new(vec![Arg::positional(Expr::ident("port"))])]),
        service("/b", vec![http_new(vec![Arg::positional(Expr::ident("port"))])]),
    ]);
    let (topology, diags) = run(&p);

    assert_eq!(topology.services.len(), 2);
    assert!(topology.listeners().all(|l| l.port == 9090));
    assert!(!diags.has_errors());
    assert_eq!(
        diags.with_code(DiagnosticCode::ConfigurableOverridable).count(),
        1
    );
}

#[test]
fn configurable_port_without_default_is_an_error_but_service_survives() {
    let p = program(vec![
        int_var("port", true, Some(Expr::Required)),
        service("/a", vec![http_new(vec![Arg::positional(Expr::ident("port"))])]),
    ]);
    let (topology, diags) = run(&p);

    assert_eq!(topology.services.len(), 1);
    assert_eq!(topology.services[0].listeners[0].port, 0);
    assert!(!topology.services[0].listeners[0].is_resolved());
    assert_eq!(diags.with_code(DiagnosticCode::ConfigurableNoDefault).count(), 1);
    assert_eq!(diags.with_code(DiagnosticCode::PortNotFound).count(), 0);
}

#[test]
fn custom_listener_binds_exposed_parameter() {
    let echo = TypeRef::new(None, "EchoListener");
    let p = program(vec![
        Declaration::Class(ClassNode {
            type_ref: echo.clone(),
            init_params: vec![
                Param {
                    name: "host".to_owned(),
                    annotations: vec![],
                },
                Param {
                    name: "listenOn".to_owned(),
                    annotations: vec![Annotation {
                        module: Some(CLOUD_MODULE.to_owned()),
                        name: EXPOSE_ANNOTATION.to_owned(),
                        value: None,
                    }],
                },
            ],
            location: loc(1),
        }),
        Declaration::Listener(ListenerVar {
            name: "echo".to_owned(),
            type_ref: echo.clone(),
            init: Some(Expr::new_object(
                Some(echo),
                vec![
                    Arg::positional(Expr::string("0.0.0.0")),
                    Arg::positional(Expr::int(7070)),
                ],
            )),
            location: loc(5),
        }),
        service("/echo", vec![Expr::ident("echo")]),
    ]);
    let (topology, diags) = run(&p);

    assert!(diags.is_empty());
    assert_eq!(topology.services[0].listeners[0].port, 7070);
}

#[test]
fn custom_listener_without_expose_marker_is_not_found() {
    let plain = TypeRef::new(None, "PlainListener");
    let p = program(vec![
        Declaration::Class(ClassNode {
            type_ref: plain.clone(),
            init_params: vec![Param {
                name: "port".to_owned(),
                annotations: vec![],
            }],
            location: loc(1),
        }),
        service(
            "/plain",
            vec![Expr::new_object(Some(plain), vec![Arg::positional(Expr::int(1))])],
        ),
    ]);
    let (topology, diags) = run(&p);

    assert!(topology.services.is_empty());
    assert_eq!(diags.with_code(DiagnosticCode::PortNotFound).count(), 1);
}

#[test]
fn listener_declared_in_another_file_resolves() {
    let p = Program::new("demo", artifact())
        .with_unit(
            "listeners.bal",
            vec![listener(
                "shared",
                http_new(vec![Arg::positional(Expr::int(9443))]),
            )],
        )
        .with_unit("service.bal", vec![service("/x", vec![Expr::ident("shared")])]);
    let (topology, diags) = run(&p);

    assert!(diags.is_empty());
    assert_eq!(topology.services[0].listeners[0].port, 9443);
}

#[test]
fn non_literal_tls_field_drops_service_without_port_error() {
    let p = program(vec![service(
        "/secure",
        vec![http_new(vec![
            Arg::positional(Expr::int(9095)),
            Arg::positional(Expr::mapping([(
                "secureSocket",
                Expr::mapping([(
                    "key",
                    Expr::mapping([
                        ("certFile", Expr::ident("certPath")),
                        ("keyFile", Expr::string("resources/private.key")),
                    ]),
                )]),
            )])),
        ])],
    )]);
    let (topology, diags) = run(&p);

    assert!(topology.services.is_empty());
    assert_eq!(diags.with_code(DiagnosticCode::UnsupportedTlsField).count(), 1);
    assert_eq!(diags.with_code(DiagnosticCode::PortNotFound).count(), 0);
}

#[test]
fn literal_tls_is_attached_to_listener() {
    let p = program(vec![
        Declaration::Variable(ModuleVar {
            name: "cfg".to_owned(),
            type_ref: TypeRef::new(Some("http"), "ListenerConfiguration"),
            configurable: false,
            init: Some(Expr::mapping([(
                "secureSocket",
                Expr::mapping([(
                    "key",
                    Expr::mapping([
                        ("certFile", Expr::string("resources/public.crt")),
                        ("keyFile", Expr::string("resources/private.key")),
                    ]),
                )]),
            )])),
            location: loc(1),
        }),
        service(
            "/secure",
            vec![http_new(vec![
                Arg::positional(Expr::int(9095)),
                Arg::named("config", Expr::ident("cfg")),
            ])],
        ),
    ]);
    let (topology, diags) = run(&p);

    assert!(diags.is_empty());
    let tls = topology.services[0].listeners[0].tls.as_ref().unwrap();
    assert!(matches!(tls.key, Some(KeyMaterial::CertAndKey { .. })));
}

#[test]
fn cloud_toml_fills_unresolved_tls_and_flags_conflicts() {
    let p = program(vec![
        listener(
            "secure",
            http_new(vec![
                Arg::positional(Expr::int(9095)),
                Arg::named(
                    "secureSocket",
                    Expr::mapping([(
                        "key",
                        Expr::mapping([
                            ("path", Expr::string("security/ks.p12")),
                            ("password", Expr::string("ballerina")),
                        ]),
                    )]),
                ),
            ]),
        ),
        service("/s", vec![Expr::ident("secure")]),
    ]);
    let overrides = OverrideDocument::parse(
        r#"
[cloud.secure_socket.secure]
keystore = "other/ks.p12"
truststore = "security/ts.p12"
"#,
    )
    .unwrap();

    let mut diags = Diagnostics::new();
    let topology = TopologyExtractor::new(&p)
        .with_overrides(&overrides)
        .unwrap()
        .extract(&mut diags);

    let tls = topology.services[0].listeners[0].tls.as_ref().unwrap();
    assert_eq!(
        tls.key,
        Some(KeyMaterial::Keystore {
            path: "security/ks.p12".to_owned()
        })
    );
    assert_eq!(tls.trust.as_ref().unwrap().path, "security/ts.p12");
    assert_eq!(diags.with_code(DiagnosticCode::TlsOverrideIgnored).count(), 1);
    assert!(!diags.has_errors());
}

#[test]
fn client_with_key_material_is_extracted() {
    let p = program(vec![Declaration::Variable(ModuleVar {
        name: "backend".to_owned(),
        type_ref: TypeRef::new(Some("http"), "Client"),
        configurable: false,
        init: Some(Expr::Check {
            expr: Box::new(Expr::new_object(
                None,
                vec![
                    Arg::positional(Expr::string("https://backend:9443")),
                    Arg::positional(Expr::mapping([(
                        "secureSocket",
                        Expr::mapping([("cert", Expr::string("resources/ca.crt"))]),
                    )])),
                ],
            )),
        }),
        location: loc(3),
    })]);
    let (topology, diags) = run(&p);

    assert!(diags.is_empty());
    assert_eq!(topology.clients.len(), 1);
    assert_eq!(topology.clients[0].name, "backend");
    assert_eq!(
        topology.clients[0].tls.trust.as_ref().unwrap().path,
        "resources/ca.crt"
    );
    assert!(topology.is_empty());
}

fn main_with_schedule(schedule: Expr) -> Declaration {
    Declaration::Function(FunctionNode {
        name: "main".to_owned(),
        annotations: vec![Annotation {
            module: Some(CLOUD_MODULE.to_owned()),
            name: TASK_ANNOTATION.to_owned(),
            value: Some(Expr::mapping([("schedule", schedule)])),
        }],
        location: loc(20),
    })
}

#[test]
fn scheduled_task_fills_missing_fields_with_wildcards() {
    let p = program(vec![main_with_schedule(Expr::mapping([
        ("minutes", Expr::string("*/5")),
        ("hours", Expr::string("2")),
    ]))]);
    let (topology, diags) = run(&p);

    assert!(diags.is_empty());
    let task = topology.task.unwrap();
    assert_eq!(task.cron_expression(), "*/5 2 * * *");
}

#[test]
fn non_literal_schedule_field_is_rejected() {
    let p = program(vec![main_with_schedule(Expr::mapping([(
        "minutes",
        Expr::ident("interval"),
    )]))]);
    let (topology, diags) = run(&p);

    assert!(topology.task.is_none());
    assert_eq!(diags.with_code(DiagnosticCode::UnsupportedSchedule).count(), 1);
}

#[test]
fn task_alongside_services_is_an_error() {
    let p = program(vec![
        main_with_schedule(Expr::mapping([("minutes", Expr::string("0"))])),
        service("/hello", vec![http_new(vec![Arg::positional(Expr::int(9090))])]),
    ]);
    let (_, diags) = run(&p);

    assert_eq!(diags.with_code(DiagnosticCode::TaskWithServices).count(), 1);
}

#[test]
fn empty_program_yields_empty_topology() {
    let (topology, diags) = run(&program(vec![]));
    assert!(topology.is_empty());
    assert!(diags.is_empty());
}

#[test]
fn extracts_from_serialized_model() {
    let json = r#"{
        "package": "demo",
        "artifact": {"name": "hello", "executable": "target/bin/hello.jar"},
        "units": [{
            "file": "main.bal",
            "declarations": [
                {"kind": "listener", "name": "ep",
                 "type_ref": {"module": "http", "name": "Listener"},
                 "init": {"kind": "new", "args": [{"value": {"kind": "int", "value": 9090}}]}},
                {"kind": "service", "absolute_path": "/hello",
                 "listeners": [{"kind": "ident", "name": "ep"}],
                 "resources": [{"method": "get", "path": "sayHello"}]},
                {"kind": "type_definition"}
            ]
        }]
    }"#;
    let p: Program = serde_json::from_str(json).unwrap();
    let (topology, diags) = run(&p);

    assert!(diags.is_empty());
    assert_eq!(topology.services[0].listeners[0].port, 9090);
    assert!(topology.services[0].serves_get("/hello/sayHello"));
}
