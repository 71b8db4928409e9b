//! Topology extraction.
//!
//! Walks every top-level declaration once and dispatches by kind:
//!
//! ```text
//! Service   → resolve each listener expression → ServiceDecl
//! Variable  → client with secureSocket         → ClientDecl
//! Function  → `main` with @cloud:Task          → ScheduledTaskDecl
//! anything else is ignored
//! ```
//!
//! Listener expressions resolve through three shapes: a name looked up in
//! the [`ReferenceIndex`], an inline `new T(port)`, and an inline
//! `new T(port, config)` carrying TLS material. Custom listener types bind
//! their port through the init parameter marked `@cloud:Expose`.
//!
//! Problems become diagnostics; extraction always walks the whole program.

use std::collections::{BTreeMap, HashSet};

use podsmith_core::config::TlsOverrideEntry;
use podsmith_core::program::{
    Arg, Declaration, Expr, FunctionNode, ModuleVar, ProgramModel, ServiceNode, TypeKind,
    CLOUD_MODULE, MAIN_FUNCTION, TASK_ANNOTATION,
};
use podsmith_core::{
    ClientDecl, DiagnosticCode, Diagnostics, KeyMaterial, ListenerDecl, OverrideDocument,
    ResourceDecl, ScheduledTaskDecl, ServiceDecl, SourceLocation, TlsConfig, Topology,
    TrustMaterial, TypeRef,
};

use crate::resolver::{build_index, IndexedRef, ListenerBinding, ReferenceIndex};
use crate::tls::{self, Reported};

/// Override key holding per-listener TLS paths.
pub const TLS_OVERRIDE_KEY: &str = "cloud.secure_socket";

const MAX_INDIRECTION: usize = 8;

/// Why a listener could not be resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Failure {
    /// Not resolvable; the caller reports "failed to retrieve port".
    NotFound(String),
    /// A more specific diagnostic was already raised.
    Reported,
}

impl From<Reported> for Failure {
    fn from(_: Reported) -> Self {
        Self::Reported
    }
}

type Resolution = Result<ListenerDecl, Failure>;

pub struct TopologyExtractor<'p> {
    program: &'p dyn ProgramModel,
    index: ReferenceIndex<'p>,
    tls_overrides: BTreeMap<String, TlsOverrideEntry>,
    /// Configurable variables already diagnosed, so shared ports warn once.
    diagnosed_vars: HashSet<String>,
}

impl<'p> TopologyExtractor<'p> {
    pub fn new(program: &'p dyn ProgramModel) -> Self {
        Self {
            program,
            index: build_index(program),
            tls_overrides: BTreeMap::new(),
            diagnosed_vars: HashSet::new(),
        }
    }

    /// Read per-listener TLS paths from `[cloud.secure_socket.<listener>]`.
    ///
    /// Source values stay authoritative: an override only fills a field
    /// the source left unresolved, and a conflicting override is flagged.
    pub fn with_overrides(mut self, overrides: &OverrideDocument) -> podsmith_core::Result<Self> {
        if let Some(table) = overrides.table(TLS_OVERRIDE_KEY)? {
            for name in table.keys() {
                let key = format!("{TLS_OVERRIDE_KEY}.{name}");
                if let Some(entry) = overrides.section::<TlsOverrideEntry>(&key)? {
                    self.tls_overrides.insert(name.clone(), entry);
                }
            }
        }
        Ok(self)
    }

    /// Extract the topology, recording problems in `diagnostics`.
    pub fn extract(mut self, diagnostics: &mut Diagnostics) -> Topology {
        let mut topology = Topology::default();
        let mut task_location = None;
        let program = self.program;

        for (_, decl) in program.declarations() {
            match decl {
                Declaration::Service(service) => {
                    if let Some(s) = self.extract_service(service, diagnostics) {
                        topology.services.push(s);
                    }
                }
                Declaration::Variable(var) => {
                    if let Some(client) = self.extract_client(var, diagnostics) {
                        topology.clients.push(client);
                    }
                }
                Declaration::Function(function) if topology.task.is_none() => {
                    if let Some(task) = extract_task(function, diagnostics) {
                        topology.task = Some(task);
                        task_location = Some(function.location.clone());
                    }
                }
                _ => {}
            }
        }

        if let (Some(location), false) = (task_location, topology.services.is_empty()) {
            diagnostics.error(
                DiagnosticCode::TaskWithServices,
                "a scheduled task cannot be deployed together with services",
                &location,
            );
        }

        tracing::info!(
            services = topology.services.len(),
            clients = topology.clients.len(),
            scheduled = topology.task.is_some(),
            "topology extracted"
        );
        topology
    }

    fn extract_service(
        &mut self,
        service: &ServiceNode,
        diagnostics: &mut Diagnostics,
    ) -> Option<ServiceDecl> {
        let mut listeners = Vec::with_capacity(service.listeners.len());
        let mut failure: Option<Failure> = None;

        if service.listeners.is_empty() {
            failure = Some(Failure::NotFound("service is not attached to a listener".to_owned()));
        }

        for (i, expr) in service.listeners.iter().enumerate() {
            let inline_name = inline_listener_name(&service.absolute_path, i);
            match self.resolve_listener(expr, &inline_name, &service.location, diagnostics, 0) {
                Ok(listener) => listeners.push(listener),
                Err(f) => {
                    // Keep the first NotFound so a later one cannot mask it.
                    if !matches!(failure, Some(Failure::NotFound(_))) {
                        failure = Some(f);
                    }
                }
            }
        }

        match failure {
            None => {
                tracing::debug!(
                    path = %service.absolute_path,
                    ports = ?listeners.iter().map(|l| l.port).collect::<Vec<_>>(),
                    "service resolved"
                );
                Some(ServiceDecl {
                    absolute_path: service.absolute_path.clone(),
                    listeners,
                    resources: service
                        .resources
                        .iter()
                        .map(|r| ResourceDecl {
                            method: r.method.clone(),
                            relative_path: r.path.clone(),
                        })
                        .collect(),
                })
            }
            Some(Failure::NotFound(reason)) => {
                diagnostics.error(
                    DiagnosticCode::PortNotFound,
                    format!(
                        "failed to retrieve port for service '{}': {reason}",
                        service.absolute_path
                    ),
                    &service.location,
                );
                None
            }
            Some(Failure::Reported) => None,
        }
    }

    fn resolve_listener(
        &mut self,
        expr: &Expr,
        inline_name: &str,
        location: &SourceLocation,
        diagnostics: &mut Diagnostics,
        depth: usize,
    ) -> Resolution {
        if depth > MAX_INDIRECTION {
            return Err(Failure::NotFound("listener reference chain is too deep".to_owned()));
        }
        match expr.unwrap_check() {
            Expr::Ident { name } => {
                let binding = match self.index.get(name) {
                    Some(IndexedRef::Listener(binding)) => *binding,
                    _ => {
                        return Err(Failure::NotFound(format!(
                            "listener '{name}' could not be resolved"
                        )));
                    }
                };
                self.resolve_binding(binding, diagnostics, depth)
            }
            Expr::New {
                type_ref: Some(ty),
                args,
            } => self.resolve_construction(inline_name, ty, args, location, diagnostics),
            other => Err(Failure::NotFound(format!(
                "unsupported listener expression '{}'",
                other.describe()
            ))),
        }
    }

    fn resolve_binding(
        &mut self,
        binding: ListenerBinding<'p>,
        diagnostics: &mut Diagnostics,
        depth: usize,
    ) -> Resolution {
        let Some(init) = binding.init else {
            return Err(Failure::NotFound(format!(
                "listener '{}' has no initializer",
                binding.name
            )));
        };
        let mut listener = match init.unwrap_check() {
            Expr::New { type_ref, args } => {
                let ty = type_ref.as_ref().unwrap_or(binding.type_ref);
                self.resolve_construction(binding.name, ty, args, binding.location, diagnostics)?
            }
            Expr::Ident { .. } => {
                let mut aliased =
                    self.resolve_listener(init, binding.name, binding.location, diagnostics, depth + 1)?;
                aliased.name = binding.name.to_owned();
                aliased
            }
            other => {
                return Err(Failure::NotFound(format!(
                    "unsupported initializer '{}' for listener '{}'",
                    other.describe(),
                    binding.name
                )));
            }
        };
        self.apply_tls_override(&mut listener, binding.location, diagnostics);
        Ok(listener)
    }

    fn resolve_construction(
        &mut self,
        name: &str,
        ty: &TypeRef,
        args: &[Arg],
        location: &SourceLocation,
        diagnostics: &mut Diagnostics,
    ) -> Resolution {
        match self.program.classify(ty) {
            TypeKind::BuiltinListener => {
                let port_arg = positional(args, 0).or_else(|| named(args, "port"));
                let Some(port_arg) = port_arg else {
                    return Err(Failure::NotFound(format!("'{ty}' is constructed without a port")));
                };
                let port = self.resolve_port(port_arg, location, diagnostics, 0)?;
                let tls = self.resolve_listener_tls(args, location, diagnostics)?;
                Ok(ListenerDecl {
                    name: name.to_owned(),
                    port,
                    tls,
                })
            }
            TypeKind::CustomListener => {
                let Some(class) = self.program.class(ty) else {
                    return Err(Failure::NotFound(format!("listener type '{ty}' is not declared")));
                };
                let Some((position, param)) = class.exposed_param() else {
                    return Err(Failure::NotFound(format!(
                        "listener type '{ty}' has no init parameter marked @{CLOUD_MODULE}:Expose"
                    )));
                };
                let Some(port_arg) = named(args, param).or_else(|| positional(args, position))
                else {
                    return Err(Failure::NotFound(format!(
                        "no argument bound to exposed parameter '{param}' of '{ty}'"
                    )));
                };
                let port = self.resolve_port(port_arg, location, diagnostics, 0)?;
                Ok(ListenerDecl::new(name, port))
            }
            TypeKind::Client | TypeKind::Other => {
                Err(Failure::NotFound(format!("'{ty}' is not a listener type")))
            }
        }
    }

    fn resolve_listener_tls(
        &self,
        args: &[Arg],
        location: &SourceLocation,
        diagnostics: &mut Diagnostics,
    ) -> Result<Option<TlsConfig>, Failure> {
        if let Some(ss) = named(args, "secureSocket") {
            return Ok(tls::parse_config(&self.index, ss, true, location, diagnostics)?);
        }
        let config = positional(args, 1).or_else(|| named(args, "config"));
        match config {
            Some(config) => Ok(tls::parse_config(&self.index, config, false, location, diagnostics)?),
            None => Ok(None),
        }
    }

    fn resolve_port(
        &mut self,
        expr: &Expr,
        location: &SourceLocation,
        diagnostics: &mut Diagnostics,
        depth: usize,
    ) -> Result<u16, Failure> {
        match expr.unwrap_check() {
            Expr::Int { value } => literal_port(*value),
            Expr::Ident { name } if depth <= MAX_INDIRECTION => {
                let var = match self.index.get(name) {
                    Some(IndexedRef::Port(var)) => *var,
                    _ => {
                        return Err(Failure::NotFound(format!(
                            "port variable '{name}' could not be resolved"
                        )));
                    }
                };
                if var.configurable {
                    return self.resolve_configurable_port(var, diagnostics);
                }
                match var.init.as_ref() {
                    Some(init) => self.resolve_port(init, &var.location, diagnostics, depth + 1),
                    None => Err(Failure::NotFound(format!(
                        "port variable '{name}' has no value"
                    ))),
                }
            }
            other => Err(Failure::NotFound(format!(
                "unsupported port expression '{}'",
                other.describe()
            ))),
        }
    }

    /// A configurable port resolves to its default, which the deployment
    /// may override; without a default the port stays 0.
    fn resolve_configurable_port(
        &mut self,
        var: &ModuleVar,
        diagnostics: &mut Diagnostics,
    ) -> Result<u16, Failure> {
        let first_sighting = self.diagnosed_vars.insert(var.name.clone());
        match var.init.as_ref().map(Expr::unwrap_check) {
            None | Some(Expr::Required) => {
                if first_sighting {
                    diagnostics.error(
                        DiagnosticCode::ConfigurableNoDefault,
                        format!(
                            "configurable variable '{}' has no default value; \
                             the port cannot be determined",
                            var.name
                        ),
                        &var.location,
                    );
                }
                Ok(0)
            }
            Some(Expr::Int { value }) => {
                let port = literal_port(*value)?;
                if first_sighting {
                    diagnostics.warning(
                        DiagnosticCode::ConfigurableOverridable,
                        format!(
                            "port {port} of configurable variable '{}' may be overridden at runtime",
                            var.name
                        ),
                        &var.location,
                    );
                }
                Ok(port)
            }
            Some(other) => Err(Failure::NotFound(format!(
                "default '{}' of configurable variable '{}' is not a literal",
                other.describe(),
                var.name
            ))),
        }
    }

    fn apply_tls_override(
        &self,
        listener: &mut ListenerDecl,
        location: &SourceLocation,
        diagnostics: &mut Diagnostics,
    ) {
        let Some(entry) = self.tls_overrides.get(&listener.name) else {
            return;
        };
        let mut tls = listener.tls.take().unwrap_or_default();

        let override_key = match (&entry.keystore, &entry.cert_file, &entry.key_file) {
            (Some(path), _, _) => Some(KeyMaterial::Keystore { path: path.clone() }),
            (None, Some(cert), Some(key)) => Some(KeyMaterial::CertAndKey {
                cert_path: cert.clone(),
                key_path: key.clone(),
            }),
            _ => None,
        };
        if let Some(key) = override_key {
            if tls.key.is_none() {
                tls.key = Some(key);
            } else if tls.key.as_ref() != Some(&key) {
                flag_ignored(&listener.name, "key", diagnostics, location);
            }
        }

        if let Some(path) = entry.truststore.clone() {
            let trust = TrustMaterial { path };
            if tls.trust.is_none() {
                tls.trust = Some(trust);
            } else if tls.trust.as_ref() != Some(&trust) {
                flag_ignored(&listener.name, "truststore", diagnostics, location);
            }
        }

        listener.tls = if tls.is_empty() { None } else { Some(tls) };
    }

    fn extract_client(&self, var: &ModuleVar, diagnostics: &mut Diagnostics) -> Option<ClientDecl> {
        if self.program.classify(&var.type_ref) != TypeKind::Client {
            return None;
        }
        let Some(Expr::New { args, .. }) = var.init.as_ref().map(Expr::unwrap_check) else {
            return None;
        };
        let parsed = match named(args, "secureSocket") {
            Some(ss) => tls::parse_config(&self.index, ss, true, &var.location, diagnostics),
            None => match positional(args, 1).or_else(|| named(args, "config")) {
                Some(config) => tls::parse_config(&self.index, config, false, &var.location, diagnostics),
                None => Ok(None),
            },
        };
        match parsed {
            Ok(Some(tls)) => {
                tracing::debug!(client = %var.name, "client TLS material found");
                Some(ClientDecl {
                    name: var.name.clone(),
                    tls,
                })
            }
            Ok(None) | Err(Reported) => None,
        }
    }
}

/// Extract the topology of `program` without overrides.
pub fn extract(program: &dyn ProgramModel, diagnostics: &mut Diagnostics) -> Topology {
    TopologyExtractor::new(program).extract(diagnostics)
}

fn extract_task(function: &FunctionNode, diagnostics: &mut Diagnostics) -> Option<ScheduledTaskDecl> {
    if function.name != MAIN_FUNCTION {
        return None;
    }
    let annotation = function
        .annotations
        .iter()
        .find(|a| a.is(CLOUD_MODULE, TASK_ANNOTATION))?;
    let schedule = annotation.value.as_ref().and_then(|v| v.field("schedule"));
    let Some(schedule) = schedule else {
        diagnostics.error(
            DiagnosticCode::UnsupportedSchedule,
            format!("@{CLOUD_MODULE}:{TASK_ANNOTATION} requires a 'schedule' record"),
            &function.location,
        );
        return None;
    };

    let mut failed = false;
    let mut field = |name: &str| -> String {
        match schedule.field(name) {
            None => "*".to_owned(),
            Some(value) => match value.as_str() {
                Some(s) => s.to_owned(),
                None => {
                    diagnostics.error(
                        DiagnosticCode::UnsupportedSchedule,
                        format!(
                            "schedule field '{name}' must be a string literal, found '{}'",
                            value.describe()
                        ),
                        &function.location,
                    );
                    failed = true;
                    String::new()
                }
            },
        }
    };
    let task = ScheduledTaskDecl {
        minute: field("minutes"),
        hour: field("hours"),
        day_of_month: field("dayOfMonth"),
        month: field("monthOfYear"),
        day_of_week: field("daysOfWeek"),
    };
    if failed {
        None
    } else {
        tracing::debug!(cron = %task.cron_expression(), "scheduled task found");
        Some(task)
    }
}

fn flag_ignored(listener: &str, field: &str, diagnostics: &mut Diagnostics, location: &SourceLocation) {
    diagnostics.warning(
        DiagnosticCode::TlsOverrideIgnored,
        format!(
            "Cloud.toml {field} for listener '{listener}' conflicts with the value in source; \
             the source value is used"
        ),
        location,
    );
}

/// A literal port; 0 means "pick any" at runtime and cannot be exposed.
fn literal_port(value: i64) -> Result<u16, Failure> {
    match u16::try_from(value) {
        Ok(0) => Err(Failure::NotFound("port 0 is not a deployable port".to_owned())),
        Ok(port) => Ok(port),
        Err(_) => Err(Failure::NotFound(format!("port {value} is out of range"))),
    }
}

fn positional(args: &[Arg], position: usize) -> Option<&Expr> {
    args.iter()
        .filter(|a| a.name.is_none())
        .nth(position)
        .map(|a| &a.value)
}

fn named<'a>(args: &'a [Arg], name: &str) -> Option<&'a Expr> {
    args.iter()
        .find(|a| a.name.as_deref() == Some(name))
        .map(|a| &a.value)
}

/// Name for a listener constructed inline in a service declaration.
fn inline_listener_name(service_path: &str, position: usize) -> String {
    let base = service_path.trim_matches('/');
    let base = if base.is_empty() { "root" } else { base };
    format!("{base}-ep{}", position + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inline_names_derive_from_service_path() {
        assert_eq!(inline_listener_name("/hello", 0), "hello-ep1");
        assert_eq!(inline_listener_name("/", 1), "root-ep2");
    }

    #[test]
    fn literal_port_rejects_zero_and_out_of_range() {
        assert_eq!(literal_port(9090), Ok(9090));
        assert!(matches!(literal_port(0), Err(Failure::NotFound(reason)) if reason.contains("port 0")));
        assert!(matches!(literal_port(70000), Err(Failure::NotFound(reason)) if reason.contains("out of range")));
    }

    #[test]
    fn positional_skips_named_arguments() {
        let args = vec![
            Arg::named("host", Expr::string("0.0.0.0")),
            Arg::positional(Expr::int(8080)),
        ];
        assert_eq!(positional(&args, 0), Some(&Expr::int(8080)));
        assert_eq!(named(&args, "host"), Some(&Expr::string("0.0.0.0")));
        assert!(positional(&args, 1).is_none());
    }
}
