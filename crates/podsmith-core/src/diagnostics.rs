//! Diagnostics raised while analyzing a program.
//!
//! Extraction never aborts on a recoverable condition: it records a
//! [`Diagnostic`] in the [`Diagnostics`] sink handed to it and carries on,
//! so one run reports every problem in the program. Any error-severity
//! entry suppresses bundle emission.

use std::fmt;

use crate::program::SourceLocation;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Warning => f.write_str("WARNING"),
            Self::Error => f.write_str("ERROR"),
        }
    }
}

/// Stable diagnostic codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticCode {
    /// A service's listener port could not be determined.
    PortNotFound,
    /// A TLS field is not a string literal.
    UnsupportedTlsField,
    /// A configurable port has no default value.
    ConfigurableNoDefault,
    /// A configurable port has a default that may be overridden at runtime.
    ConfigurableOverridable,
    /// A schedule field is not a string literal.
    UnsupportedSchedule,
    /// A scheduled task was declared next to services.
    TaskWithServices,
    /// An override TLS value conflicts with the value found in source.
    TlsOverrideIgnored,
    /// A fatal condition raised while synthesizing the bundle.
    Synthesis,
}

impl DiagnosticCode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PortNotFound => "port-not-found",
            Self::UnsupportedTlsField => "unsupported-tls-field",
            Self::ConfigurableNoDefault => "configurable-no-default",
            Self::ConfigurableOverridable => "configurable-overridable",
            Self::UnsupportedSchedule => "unsupported-schedule",
            Self::TaskWithServices => "task-with-services",
            Self::TlsOverrideIgnored => "tls-override-ignored",
            Self::Synthesis => "synthesis",
        }
    }
}

impl fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a diagnostic points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    Source(SourceLocation),
    /// Raised while synthesizing; there is no source position.
    Synthesis,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Source(loc) => loc.fmt(f),
            Self::Synthesis => f.write_str("<synthesis>"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub code: DiagnosticCode,
    pub message: String,
    pub location: Location,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}] {}: {}",
            self.severity, self.code, self.location, self.message
        )
    }
}

/// Append-only diagnostic sink for one compilation.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    items: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        tracing::debug!(
            severity = %diagnostic.severity,
            code = %diagnostic.code,
            location = %diagnostic.location,
            "{}",
            diagnostic.message
        );
        self.items.push(diagnostic);
    }

    pub fn error(&mut self, code: DiagnosticCode, message: impl Into<String>, location: &SourceLocation) {
        self.push(Diagnostic {
            severity: Severity::Error,
            code,
            message: message.into(),
            location: Location::Source(location.clone()),
        });
    }

    pub fn warning(
        &mut self,
        code: DiagnosticCode,
        message: impl Into<String>,
        location: &SourceLocation,
    ) {
        self.push(Diagnostic {
            severity: Severity::Warning,
            code,
            message: message.into(),
            location: Location::Source(location.clone()),
        });
    }

    /// Record a fatal synthesis failure.
    pub fn synthesis_error(&mut self, message: impl Into<String>) {
        self.push(Diagnostic {
            severity: Severity::Error,
            code: DiagnosticCode::Synthesis,
            message: message.into(),
            location: Location::Synthesis,
        });
    }

    pub fn has_errors(&self) -> bool {
        self.items.iter().any(|d| d.severity == Severity::Error)
    }

    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter().filter(|d| d.severity == Severity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter().filter(|d| d.severity == Severity::Warning)
    }

    pub fn with_code(&self, code: DiagnosticCode) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter().filter(move |d| d.code == code)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl Extend<Diagnostic> for Diagnostics {
    fn extend<T: IntoIterator<Item = Diagnostic>>(&mut self, iter: T) {
        for diagnostic in iter {
            self.push(diagnostic);
        }
    }
}

impl<'a> IntoIterator for &'a Diagnostics {
    type Item = &'a Diagnostic;
    type IntoIter = std::slice::Iter<'a, Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn warnings_do_not_count_as_errors() {
        let mut sink = Diagnostics::new();
        sink.warning(
            DiagnosticCode::ConfigurableOverridable,
            "port may be overridden at runtime",
            &SourceLocation::new("main.bal", 3, 1),
        );
        assert!(!sink.has_errors());
        assert_eq!(sink.warnings().count(), 1);
    }

    #[test]
    fn display_includes_code_and_location() {
        let mut sink = Diagnostics::new();
        sink.error(
            DiagnosticCode::PortNotFound,
            "failed to retrieve port",
            &SourceLocation::new("main.bal", 7, 9),
        );
        let rendered = sink.iter().next().unwrap().to_string();
        assert_eq!(rendered, "ERROR [port-not-found] main.bal:7:9: failed to retrieve port");
    }

    #[test]
    fn synthesis_errors_have_no_source_location() {
        let mut sink = Diagnostics::new();
        sink.synthesis_error("cannot detect port for probe");
        let d = sink.errors().next().unwrap();
        assert_eq!(d.location, Location::Synthesis);
        assert!(sink.has_errors());
    }
}
