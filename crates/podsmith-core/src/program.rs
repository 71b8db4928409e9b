//! Resolved declaration model handed over by the compiler front end.
//!
//! podsmith never parses source text. The front end resolves the program
//! and serializes every compilation unit's top-level declarations into the
//! shapes below; extraction walks them by kind.
//!
//! # Shape
//!
//! ```text
//! Program
//!   ├── package / artifact     identity and build outputs
//!   ├── units[]                one per source file
//!   │     └── declarations[]   Listener | Variable | Service | Function | Class | Other
//!   ├── external_classes[]     classes from dependencies (custom listeners)
//!   └── types{}                explicit type classification from the resolver
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Module name carrying the deployment annotations (`@cloud:Task`, `@cloud:Expose`).
pub const CLOUD_MODULE: &str = "cloud";
/// Annotation marking the init parameter of a custom listener that binds the port.
pub const EXPOSE_ANNOTATION: &str = "Expose";
/// Annotation carrying the cron schedule of a batch entry point.
pub const TASK_ANNOTATION: &str = "Task";
/// Entry point function name.
pub const MAIN_FUNCTION: &str = "main";

/// Built-in listener types, keyed by `module:Name`.
const BUILTIN_LISTENERS: &[&str] = &[
    "http:Listener",
    "grpc:Listener",
    "websocket:Listener",
    "graphql:Listener",
    "tcp:Listener",
];

/// Built-in outbound client types, keyed by `module:Name`.
const BUILTIN_CLIENTS: &[&str] = &[
    "http:Client",
    "grpc:Client",
    "websocket:Client",
    "graphql:Client",
    "tcp:Client",
];

/// Position of a construct in the source program.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLocation {
    pub file: String,
    pub line: u32,
    pub column: u32,
}

impl SourceLocation {
    pub fn new(file: impl Into<String>, line: u32, column: u32) -> Self {
        Self {
            file: file.into(),
            line,
            column,
        }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}

/// A (possibly module-qualified) type reference such as `http:Listener`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TypeRef {
    #[serde(default)]
    pub module: Option<String>,
    pub name: String,
}

impl TypeRef {
    pub fn new(module: Option<&str>, name: impl Into<String>) -> Self {
        Self {
            module: module.map(str::to_owned),
            name: name.into(),
        }
    }

    /// `module:Name`, or just `Name` for unqualified types.
    pub fn qualified(&self) -> String {
        self.to_string()
    }

    pub fn is_int(&self) -> bool {
        self.module.is_none() && self.name == "int"
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.module {
            Some(module) => write!(f, "{module}:{}", self.name),
            None => f.write_str(&self.name),
        }
    }
}

/// A named field of a mapping constructor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub value: Expr,
}

/// A positional or named argument of a `new` expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Arg {
    #[serde(default)]
    pub name: Option<String>,
    pub value: Expr,
}

impl Arg {
    pub fn positional(value: Expr) -> Self {
        Self { name: None, value }
    }

    pub fn named(name: impl Into<String>, value: Expr) -> Self {
        Self {
            name: Some(name.into()),
            value,
        }
    }
}

/// Expression forms the extractor understands.
///
/// Anything else arrives as [`Expr::Unsupported`] carrying its source text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Expr {
    Int {
        value: i64,
    },
    Str {
        value: String,
    },
    Bool {
        value: bool,
    },
    Ident {
        name: String,
    },
    Mapping {
        #[serde(default)]
        fields: Vec<Field>,
    },
    /// `new T(args)`; `type_ref` is `None` for the implicit `new(args)` form.
    New {
        #[serde(default)]
        type_ref: Option<TypeRef>,
        #[serde(default)]
        args: Vec<Arg>,
    },
    /// `check <expr>`
    Check {
        expr: Box<Expr>,
    },
    /// `= ?` on a configurable variable.
    Required,
    Unsupported {
        text: String,
    },
}

impl Expr {
    pub fn int(value: i64) -> Self {
        Self::Int { value }
    }

    pub fn string(value: impl Into<String>) -> Self {
        Self::Str {
            value: value.into(),
        }
    }

    pub fn ident(name: impl Into<String>) -> Self {
        Self::Ident { name: name.into() }
    }

    pub fn mapping<I, K>(fields: I) -> Self
    where
        I: IntoIterator<Item = (K, Expr)>,
        K: Into<String>,
    {
        Self::Mapping {
            fields: fields
                .into_iter()
                .map(|(name, value)| Field {
                    name: name.into(),
                    value,
                })
                .collect(),
        }
    }

    pub fn new_object(type_ref: Option<TypeRef>, args: Vec<Arg>) -> Self {
        Self::New { type_ref, args }
    }

    pub fn unsupported(text: impl Into<String>) -> Self {
        Self::Unsupported { text: text.into() }
    }

    /// Strips any `check` wrappers.
    pub fn unwrap_check(&self) -> &Expr {
        match self {
            Self::Check { expr } => expr.unwrap_check(),
            other => other,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self.unwrap_check() {
            Self::Int { value } => Some(*value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self.unwrap_check() {
            Self::Str { value } => Some(value),
            _ => None,
        }
    }

    /// Looks up a field of a mapping constructor.
    pub fn field(&self, name: &str) -> Option<&Expr> {
        match self.unwrap_check() {
            Self::Mapping { fields } => fields.iter().find(|f| f.name == name).map(|f| &f.value),
            _ => None,
        }
    }

    /// Short rendering used in diagnostics.
    pub fn describe(&self) -> String {
        match self.unwrap_check() {
            Self::Int { value } => value.to_string(),
            Self::Str { value } => format!("\"{value}\""),
            Self::Bool { value } => value.to_string(),
            Self::Ident { name } => name.clone(),
            Self::Mapping { .. } => "{...}".to_owned(),
            Self::New { type_ref, .. } => match type_ref {
                Some(t) => format!("new {t}(...)"),
                None => "new(...)".to_owned(),
            },
            Self::Check { expr } => expr.describe(),
            Self::Required => "?".to_owned(),
            Self::Unsupported { text } => text.clone(),
        }
    }
}

/// An annotation attached to a function or parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    #[serde(default)]
    pub module: Option<String>,
    pub name: String,
    #[serde(default)]
    pub value: Option<Expr>,
}

impl Annotation {
    pub fn is(&self, module: &str, name: &str) -> bool {
        self.module.as_deref() == Some(module) && self.name == name
    }
}

/// `listener T name = <init>;`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListenerVar {
    pub name: String,
    pub type_ref: TypeRef,
    #[serde(default)]
    pub init: Option<Expr>,
    #[serde(default)]
    pub location: SourceLocation,
}

/// Module-level variable, optionally `configurable`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleVar {
    pub name: String,
    pub type_ref: TypeRef,
    #[serde(default)]
    pub configurable: bool,
    #[serde(default)]
    pub init: Option<Expr>,
    #[serde(default)]
    pub location: SourceLocation,
}

/// A resource method of a service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceNode {
    pub method: String,
    pub path: String,
}

/// `service <path> on <listeners> { ... }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceNode {
    #[serde(default = "default_service_path")]
    pub absolute_path: String,
    pub listeners: Vec<Expr>,
    #[serde(default)]
    pub resources: Vec<ResourceNode>,
    #[serde(default)]
    pub location: SourceLocation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionNode {
    pub name: String,
    #[serde(default)]
    pub annotations: Vec<Annotation>,
    #[serde(default)]
    pub location: SourceLocation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Param {
    pub name: String,
    #[serde(default)]
    pub annotations: Vec<Annotation>,
}

/// A class declaration; only its `init` parameters matter here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassNode {
    pub type_ref: TypeRef,
    #[serde(default)]
    pub init_params: Vec<Param>,
    #[serde(default)]
    pub location: SourceLocation,
}

impl ClassNode {
    /// Index and name of the init parameter carrying `@cloud:Expose`.
    pub fn exposed_param(&self) -> Option<(usize, &str)> {
        self.init_params.iter().enumerate().find_map(|(i, p)| {
            p.annotations
                .iter()
                .any(|a| a.is(CLOUD_MODULE, EXPOSE_ANNOTATION))
                .then_some((i, p.name.as_str()))
        })
    }
}

/// Top-level declaration of a compilation unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Declaration {
    Listener(ListenerVar),
    Variable(ModuleVar),
    Service(ServiceNode),
    Function(FunctionNode),
    Class(ClassNode),
    #[serde(other)]
    Other,
}

impl Declaration {
    pub fn location(&self) -> Option<&SourceLocation> {
        match self {
            Self::Listener(l) => Some(&l.location),
            Self::Variable(v) => Some(&v.location),
            Self::Service(s) => Some(&s.location),
            Self::Function(f) => Some(&f.location),
            Self::Class(c) => Some(&c.location),
            Self::Other => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompilationUnit {
    pub file: String,
    #[serde(default)]
    pub declarations: Vec<Declaration>,
}

/// Classification of a type reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeKind {
    BuiltinListener,
    CustomListener,
    Client,
    Other,
}

/// Build outputs of the compiled program.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactInfo {
    /// Output artifact name; every bundle name derives from it.
    pub name: String,
    /// Primary executable artifact, relative to the project directory.
    pub executable: PathBuf,
    /// Dependency artifacts, relative to the project directory.
    #[serde(default)]
    pub dependencies: Vec<PathBuf>,
    /// Entry point passed to the runtime by the default invocation.
    #[serde(default = "default_main_class")]
    pub main_class: String,
}

/// Collaborator interface over a resolved program.
pub trait ProgramModel {
    fn package_name(&self) -> &str;

    fn artifact(&self) -> &ArtifactInfo;

    fn units(&self) -> &[CompilationUnit];

    /// Classify the exposed type of a declaration.
    fn classify(&self, ty: &TypeRef) -> TypeKind;

    /// Class declaration for `ty`, from the program or its dependencies.
    fn class(&self, ty: &TypeRef) -> Option<&ClassNode>;

    /// Every top-level declaration paired with its unit, in source order.
    fn declarations(&self) -> Box<dyn Iterator<Item = (&CompilationUnit, &Declaration)> + '_> {
        Box::new(
            self.units()
                .iter()
                .flat_map(|u| u.declarations.iter().map(move |d| (u, d))),
        )
    }
}

/// Serde-backed [`ProgramModel`], as written by the front end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Program {
    pub package: String,
    pub artifact: ArtifactInfo,
    #[serde(default)]
    pub units: Vec<CompilationUnit>,
    #[serde(default)]
    pub external_classes: Vec<ClassNode>,
    /// Explicit classifications keyed by qualified type name.
    #[serde(default)]
    pub types: BTreeMap<String, TypeKind>,
}

impl Program {
    /// A program with no units, for building models incrementally.
    pub fn new(package: impl Into<String>, artifact: ArtifactInfo) -> Self {
        Self {
            package: package.into(),
            artifact,
            units: Vec::new(),
            external_classes: Vec::new(),
            types: BTreeMap::new(),
        }
    }

    /// Load a program model from its JSON form.
    pub fn load(path: &Path) -> crate::Result<Self> {
        tracing::debug!(path = %path.display(), "loading program model");
        let content = std::fs::read_to_string(path).map_err(|e| crate::Error::ModelLoad {
            path: path.to_path_buf(),
            source: e,
        })?;
        serde_json::from_str(&content).map_err(|e| crate::Error::ModelParse {
            path: path.to_path_buf(),
            source: e,
        })
    }

    pub fn with_unit(mut self, file: impl Into<String>, declarations: Vec<Declaration>) -> Self {
        self.units.push(CompilationUnit {
            file: file.into(),
            declarations,
        });
        self
    }

    fn local_classes(&self) -> impl Iterator<Item = &ClassNode> {
        self.units
            .iter()
            .flat_map(|u| u.declarations.iter())
            .filter_map(|d| match d {
                Declaration::Class(c) => Some(c),
                _ => None,
            })
    }
}

impl ProgramModel for Program {
    fn package_name(&self) -> &str {
        &self.package
    }

    fn artifact(&self) -> &ArtifactInfo {
        &self.artifact
    }

    fn units(&self) -> &[CompilationUnit] {
        &self.units
    }

    fn classify(&self, ty: &TypeRef) -> TypeKind {
        let qualified = ty.qualified();
        if let Some(kind) = self.types.get(&qualified) {
            return *kind;
        }
        if BUILTIN_LISTENERS.contains(&qualified.as_str()) {
            return TypeKind::BuiltinListener;
        }
        if BUILTIN_CLIENTS.contains(&qualified.as_str()) {
            return TypeKind::Client;
        }
        if self.class(ty).is_some() {
            return TypeKind::CustomListener;
        }
        TypeKind::Other
    }

    fn class(&self, ty: &TypeRef) -> Option<&ClassNode> {
        self.local_classes()
            .chain(self.external_classes.iter())
            .find(|c| {
                c.type_ref.name == ty.name
                    && (ty.module.is_none()
                        || c.type_ref.module.is_none()
                        || c.type_ref.module == ty.module)
            })
    }
}

fn default_service_path() -> String {
    "/".to_owned()
}

fn default_main_class() -> String {
    "main".to_owned()
}
