use std::path::Path;

use podsmith_core::Diagnostics;

use super::{extract, load_inputs, report};

pub fn check(model: &Path, cloud_toml: Option<&Path>, project_dir: &Path) -> anyhow::Result<()> {
    let inputs = load_inputs(model, cloud_toml, project_dir)?;
    let mut diagnostics = Diagnostics::new();
    let topology = extract(&inputs, &mut diagnostics)?;
    report(&diagnostics);

    let errors = diagnostics.errors().count();
    if errors > 0 {
        anyhow::bail!("check failed with {errors} error(s)");
    }

    if topology.is_empty() {
        println!("No services or scheduled task found.");
        return Ok(());
    }
    for service in &topology.services {
        let ports = service
            .listeners
            .iter()
            .map(|l| format!("{}:{}", l.name, l.port))
            .collect::<Vec<_>>()
            .join(", ");
        println!("service {} [{ports}]", service.absolute_path);
    }
    if let Some(task) = &topology.task {
        println!("task \"{}\"", task.cron_expression());
    }
    println!("OK ({} warning(s))", diagnostics.warnings().count());
    Ok(())
}
