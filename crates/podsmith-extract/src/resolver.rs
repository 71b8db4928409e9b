//! Module-level name index.
//!
//! Services usually attach to a listener by name (`service on ep`), and
//! listeners take their port or configuration from other module-level
//! variables, possibly declared in another file. The index is built once
//! over every compilation unit so the extractor can follow those names.

use std::collections::HashMap;

use podsmith_core::program::{Declaration, Expr, ListenerVar, ModuleVar, ProgramModel, TypeKind};
use podsmith_core::{SourceLocation, TypeRef};

/// A listener bound to a module-level name, from either a `listener`
/// declaration or a variable typed as a listener.
#[derive(Debug, Clone, Copy)]
pub struct ListenerBinding<'p> {
    pub name: &'p str,
    pub type_ref: &'p TypeRef,
    pub init: Option<&'p Expr>,
    pub location: &'p SourceLocation,
}

impl<'p> From<&'p ListenerVar> for ListenerBinding<'p> {
    fn from(l: &'p ListenerVar) -> Self {
        Self {
            name: &l.name,
            type_ref: &l.type_ref,
            init: l.init.as_ref(),
            location: &l.location,
        }
    }
}

impl<'p> From<&'p ModuleVar> for ListenerBinding<'p> {
    fn from(v: &'p ModuleVar) -> Self {
        Self {
            name: &v.name,
            type_ref: &v.type_ref,
            init: v.init.as_ref(),
            location: &v.location,
        }
    }
}

/// What a module-level name refers to.
#[derive(Debug, Clone, Copy)]
pub enum IndexedRef<'p> {
    Listener(ListenerBinding<'p>),
    /// An `int` variable, possibly `configurable`.
    Port(&'p ModuleVar),
    /// A variable initialized with a mapping literal (listener configuration).
    Config(&'p ModuleVar),
}

#[derive(Debug, Default)]
pub struct ReferenceIndex<'p> {
    entries: HashMap<&'p str, IndexedRef<'p>>,
}

impl<'p> ReferenceIndex<'p> {
    pub fn get(&self, name: &str) -> Option<&IndexedRef<'p>> {
        self.entries.get(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn insert(&mut self, name: &'p str, entry: IndexedRef<'p>) {
        // First definition wins; the front end reports redeclarations.
        self.entries.entry(name).or_insert(entry);
    }
}

/// Index every resolvable module-level name of the program.
pub fn build_index(program: &dyn ProgramModel) -> ReferenceIndex<'_> {
    let mut index = ReferenceIndex::default();

    for (_, decl) in program.declarations() {
        match decl {
            Declaration::Listener(l) => index.insert(&l.name, IndexedRef::Listener(l.into())),
            Declaration::Variable(v) => {
                if let Some(entry) = classify_variable(program, v) {
                    index.insert(&v.name, entry);
                }
            }
            _ => {}
        }
    }

    tracing::debug!(entries = index.len(), "reference index built");
    index
}

fn classify_variable<'p>(program: &dyn ProgramModel, v: &'p ModuleVar) -> Option<IndexedRef<'p>> {
    if v.type_ref.is_int() {
        return Some(IndexedRef::Port(v));
    }
    match program.classify(&v.type_ref) {
        TypeKind::BuiltinListener | TypeKind::CustomListener => {
            return Some(IndexedRef::Listener(v.into()));
        }
        TypeKind::Client => return None,
        TypeKind::Other => {}
    }
    match v.init.as_ref().map(Expr::unwrap_check) {
        Some(Expr::Mapping { .. }) => Some(IndexedRef::Config(v)),
        _ => None,
    }
}
