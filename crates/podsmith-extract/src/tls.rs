//! TLS material inside listener and client configuration literals.
//!
//! Recognized shapes of the `secureSocket` record:
//!
//! ```text
//! { key: { certFile: "a.crt", keyFile: "a.key" }, mutualSsl: { cert: "ca.crt" } }
//! { key: { path: "ks.p12", password: "..." },     cert: { path: "ts.p12", password: "..." } }
//! { cert: "ca.crt" }
//! ```
//!
//! Every path and password must be a string literal. Anything computed at
//! runtime cannot be mounted, so it is reported instead of guessed.

use podsmith_core::program::Expr;
use podsmith_core::{DiagnosticCode, Diagnostics, KeyMaterial, SourceLocation, TlsConfig, TrustMaterial};

use crate::resolver::{IndexedRef, ReferenceIndex};

/// Marker for a failure that has already been reported as a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reported;

/// Bound on identifier chains (`cfg` → `base` → ...) followed for configs.
const MAX_INDIRECTION: usize = 8;

/// Parse TLS material from a listener/client configuration argument.
///
/// `config` is either the whole configuration record (holding a
/// `secureSocket` field) or, with `is_secure_socket`, the `secureSocket`
/// value itself.
pub fn parse_config(
    index: &ReferenceIndex<'_>,
    config: &Expr,
    is_secure_socket: bool,
    location: &SourceLocation,
    diagnostics: &mut Diagnostics,
) -> Result<Option<TlsConfig>, Reported> {
    let Some(record) = deref_mapping(index, config, location, diagnostics, 0)? else {
        return Ok(None);
    };
    let secure_socket = if is_secure_socket {
        record
    } else {
        match record.field("secureSocket") {
            Some(ss) => match deref_mapping(index, ss, location, diagnostics, 0)? {
                Some(ss) => ss,
                None => return Ok(None),
            },
            None => return Ok(None),
        }
    };
    parse_secure_socket(secure_socket, location, diagnostics).map(|tls| {
        if tls.is_empty() { None } else { Some(tls) }
    })
}

/// Follow identifiers to a mapping literal.
///
/// `Ok(None)` when the expression carries no configuration (`()`, missing);
/// an identifier that does not resolve to a literal record is unsupported.
fn deref_mapping<'e>(
    index: &'e ReferenceIndex<'_>,
    expr: &'e Expr,
    location: &SourceLocation,
    diagnostics: &mut Diagnostics,
    depth: usize,
) -> Result<Option<&'e Expr>, Reported> {
    match expr.unwrap_check() {
        mapping @ Expr::Mapping { .. } => Ok(Some(mapping)),
        Expr::Ident { name } if depth < MAX_INDIRECTION => match index.get(name) {
            Some(IndexedRef::Config(var)) => match var.init.as_ref() {
                Some(init) => deref_mapping(index, init, location, diagnostics, depth + 1),
                None => Ok(None),
            },
            _ => {
                diagnostics.error(
                    DiagnosticCode::UnsupportedTlsField,
                    format!(
                        "listener configuration '{name}' does not resolve to a record literal; \
                         TLS material cannot be determined"
                    ),
                    location,
                );
                Err(Reported)
            }
        },
        other => {
            diagnostics.error(
                DiagnosticCode::UnsupportedTlsField,
                format!(
                    "unsupported listener configuration '{}'; only record literals are supported",
                    other.describe()
                ),
                location,
            );
            Err(Reported)
        }
    }
}

fn parse_secure_socket(
    ss: &Expr,
    location: &SourceLocation,
    diagnostics: &mut Diagnostics,
) -> Result<TlsConfig, Reported> {
    let mut failed = false;
    let mut tls = TlsConfig::default();

    if let Some(key) = ss.field("key") {
        match parse_key(key, location, diagnostics) {
            Ok(k) => tls.key = k,
            Err(Reported) => failed = true,
        }
    }

    let trust = ss
        .field("cert")
        .or_else(|| ss.field("mutualSsl").and_then(|m| m.field("cert")));
    if let Some(cert) = trust {
        match parse_trust(cert, location, diagnostics) {
            Ok(t) => tls.trust = t,
            Err(Reported) => failed = true,
        }
    }

    if failed { Err(Reported) } else { Ok(tls) }
}

fn parse_key(
    key: &Expr,
    location: &SourceLocation,
    diagnostics: &mut Diagnostics,
) -> Result<Option<KeyMaterial>, Reported> {
    if !matches!(key.unwrap_check(), Expr::Mapping { .. }) {
        return Err(unsupported("key", key, location, diagnostics));
    }
    if let Some(path) = key.field("path") {
        let path = literal("key.path", path, location, diagnostics)?;
        if let Some(password) = key.field("password") {
            literal("key.password", password, location, diagnostics)?;
        }
        return Ok(Some(KeyMaterial::Keystore { path }));
    }
    match (key.field("certFile"), key.field("keyFile")) {
        (Some(cert), Some(keyfile)) => {
            let cert_path = literal("key.certFile", cert, location, diagnostics);
            let key_path = literal("key.keyFile", keyfile, location, diagnostics);
            Ok(Some(KeyMaterial::CertAndKey {
                cert_path: cert_path?,
                key_path: key_path?,
            }))
        }
        (None, None) => Ok(None),
        _ => {
            diagnostics.error(
                DiagnosticCode::UnsupportedTlsField,
                "secureSocket key requires both 'certFile' and 'keyFile'",
                location,
            );
            Err(Reported)
        }
    }
}

fn parse_trust(
    cert: &Expr,
    location: &SourceLocation,
    diagnostics: &mut Diagnostics,
) -> Result<Option<TrustMaterial>, Reported> {
    match cert.unwrap_check() {
        Expr::Str { value } => Ok(Some(TrustMaterial {
            path: value.clone(),
        })),
        Expr::Mapping { .. } => {
            let Some(path) = cert.field("path") else {
                return Ok(None);
            };
            let path = literal("cert.path", path, location, diagnostics)?;
            if let Some(password) = cert.field("password") {
                literal("cert.password", password, location, diagnostics)?;
            }
            Ok(Some(TrustMaterial { path }))
        }
        _ => Err(unsupported("cert", cert, location, diagnostics)),
    }
}

fn literal(
    field: &str,
    value: &Expr,
    location: &SourceLocation,
    diagnostics: &mut Diagnostics,
) -> Result<String, Reported> {
    match value.as_str() {
        Some(s) => Ok(s.to_owned()),
        None => Err(unsupported(field, value, location, diagnostics)),
    }
}

fn unsupported(
    field: &str,
    value: &Expr,
    location: &SourceLocation,
    diagnostics: &mut Diagnostics,
) -> Reported {
    diagnostics.error(
        DiagnosticCode::UnsupportedTlsField,
        format!(
            "secureSocket field '{field}' must be a string literal, found '{}'",
            value.describe()
        ),
        location,
    );
    Reported
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::build_index;
    use podsmith_core::program::{ArtifactInfo, Program};
    use std::path::PathBuf;

    fn empty_program() -> Program {
        Program::new(
            "demo",
            ArtifactInfo {
                name: "demo".to_owned(),
                executable: PathBuf::from("demo.jar"),
                dependencies: vec![],
                main_class: "demo.main".to_owned(),
            },
        )
    }

    fn parse(config: Expr) -> (Result<Option<TlsConfig>, Reported>, Diagnostics) {
        let program = empty_program();
        let index = build_index(&program);
        let mut diags = Diagnostics::new();
        let result = parse_config(
            &index,
            &config,
            false,
            &SourceLocation::default(),
            &mut diags,
        );
        (result, diags)
    }

    #[test]
    fn cert_and_key_with_mutual_ssl() {
        let (result, diags) = parse(Expr::mapping([(
            "secureSocket",
            Expr::mapping([
                (
                    "key",
                    Expr::mapping([
                        ("certFile", Expr::string("resources/public.crt")),
                        ("keyFile", Expr::string("resources/private.key")),
                    ]),
                ),
                (
                    "mutualSsl",
                    Expr::mapping([("cert", Expr::string("resources/ca.crt"))]),
                ),
            ]),
        )]));
        let tls = result.unwrap().unwrap();
        assert!(diags.is_empty());
        assert!(matches!(tls.key, Some(KeyMaterial::CertAndKey { .. })));
        assert_eq!(tls.trust.unwrap().path, "resources/ca.crt");
    }

    #[test]
    fn keystore_and_truststore_records() {
        let (result, _) = parse(Expr::mapping([(
            "secureSocket",
            Expr::mapping([
                (
                    "key",
                    Expr::mapping([
                        ("path", Expr::string("security/ks.p12")),
                        ("password", Expr::string("secret")),
                    ]),
                ),
                (
                    "cert",
                    Expr::mapping([
                        ("path", Expr::string("security/ts.p12")),
                        ("password", Expr::string("secret")),
                    ]),
                ),
            ]),
        )]));
        let tls = result.unwrap().unwrap();
        assert_eq!(
            tls.key,
            Some(KeyMaterial::Keystore {
                path: "security/ks.p12".to_owned()
            })
        );
        assert!(tls.shares_directory());
    }

    #[test]
    fn non_literal_password_is_reported() {
        let (result, diags) = parse(Expr::mapping([(
            "secureSocket",
            Expr::mapping([(
                "key",
                Expr::mapping([
                    ("path", Expr::string("security/ks.p12")),
                    ("password", Expr::ident("keystorePassword")),
                ]),
            )]),
        )]));
        assert_eq!(result, Err(Reported));
        assert_eq!(diags.with_code(DiagnosticCode::UnsupportedTlsField).count(), 1);
    }

    #[test]
    fn config_without_secure_socket_has_no_tls() {
        let (result, diags) = parse(Expr::mapping([("timeout", Expr::int(30))]));
        assert_eq!(result, Ok(None));
        assert!(diags.is_empty());
    }
}
