mod check;
mod generate;

use std::path::Path;

use podsmith_core::{Diagnostics, OverrideDocument, Program, Topology};
use podsmith_extract::TopologyExtractor;

pub use check::check;
pub use generate::{GenerateArgs, generate};

/// Inputs of one compilation, loaded from disk.
pub(crate) struct Inputs {
    pub program: Program,
    pub overrides: OverrideDocument,
}

pub(crate) fn load_inputs(
    model: &Path,
    cloud_toml: Option<&Path>,
    project_dir: &Path,
) -> anyhow::Result<Inputs> {
    let program = Program::load(model)?;
    let overrides = match cloud_toml {
        Some(path) => OverrideDocument::load_file(path)?,
        None => OverrideDocument::load(project_dir)?,
    };
    tracing::debug!(
        package = %program.package,
        artifact = %program.artifact.name,
        overrides = !overrides.is_empty(),
        "inputs loaded"
    );
    Ok(Inputs { program, overrides })
}

pub(crate) fn extract(inputs: &Inputs, diagnostics: &mut Diagnostics) -> anyhow::Result<Topology> {
    let topology = TopologyExtractor::new(&inputs.program)
        .with_overrides(&inputs.overrides)?
        .extract(diagnostics);
    Ok(topology)
}

/// Print every diagnostic to stderr, errors and warnings alike.
pub(crate) fn report(diagnostics: &Diagnostics) {
    for diagnostic in diagnostics.iter() {
        eprintln!("{diagnostic}");
    }
}
