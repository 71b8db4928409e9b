use std::path::PathBuf;

use podsmith_build::{DockerCli, build_image, synthesize, write_bundle};
use podsmith_core::CompilationContext;

use super::{extract, load_inputs, report};

pub struct GenerateArgs {
    pub model: PathBuf,
    pub cloud_toml: Option<PathBuf>,
    pub target: Option<PathBuf>,
    pub project_dir: PathBuf,
    pub build_image: bool,
}

/// Extract, synthesize, and write the bundle; optionally build the image.
pub fn generate(args: GenerateArgs) -> anyhow::Result<()> {
    let inputs = load_inputs(&args.model, args.cloud_toml.as_deref(), &args.project_dir)?;

    let mut ctx = CompilationContext::new(&inputs.program, &inputs.overrides, &args.project_dir);
    if let Some(target) = args.target {
        ctx = ctx.with_target_dir(target);
    }

    let topology = extract(&inputs, &mut ctx.diagnostics)?;
    let synthesized = synthesize(&mut ctx, &topology);
    report(&ctx.diagnostics);

    let errors = ctx.diagnostics.errors().count();
    if errors > 0 {
        anyhow::bail!("generation failed with {errors} error(s); nothing was written");
    }
    let bundle = synthesized?;

    let Some(output) = write_bundle(&bundle, &ctx.target_dir)? else {
        println!("No services or scheduled task found; nothing to generate.");
        return Ok(());
    };

    for manifest in &output.manifests {
        println!("Generated {}", manifest.display());
    }
    if let Some(dockerfile) = &output.dockerfile {
        println!("Generated {}", dockerfile.display());
    }

    if args.build_image || bundle.settings.build_image {
        println!("Building image {}...", bundle.image);
        build_image(&DockerCli, &output, &bundle.image)?;
        println!("Built {}", bundle.image);
    } else {
        println!("Image: {}", bundle.image);
    }
    Ok(())
}
