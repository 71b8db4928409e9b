mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "podsmith",
    about = "Generate Kubernetes manifests and a Dockerfile from a compiled program"
)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract the service topology and write the deployment bundle
    Generate {
        /// Program model (JSON) written by the compiler front end
        #[arg(long)]
        model: PathBuf,
        /// Override document (default: <project-dir>/Cloud.toml)
        #[arg(long)]
        cloud_toml: Option<PathBuf>,
        /// Directory the bundle is written under (default: <project-dir>/target)
        #[arg(long)]
        target: Option<PathBuf>,
        /// Root that relative paths resolve against
        #[arg(long, default_value = ".")]
        project_dir: PathBuf,
        /// Build the container image after writing the bundle
        #[arg(long)]
        build_image: bool,
    },
    /// Extract the service topology and report diagnostics without writing anything
    Check {
        /// Program model (JSON) written by the compiler front end
        #[arg(long)]
        model: PathBuf,
        /// Override document (default: <project-dir>/Cloud.toml)
        #[arg(long)]
        cloud_toml: Option<PathBuf>,
        /// Root that relative paths resolve against
        #[arg(long, default_value = ".")]
        project_dir: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Generate {
            model,
            cloud_toml,
            target,
            project_dir,
            build_image,
        } => commands::generate(commands::GenerateArgs {
            model,
            cloud_toml,
            target,
            project_dir,
            build_image,
        })?,
        Commands::Check {
            model,
            cloud_toml,
            project_dir,
        } => commands::check(&model, cloud_toml.as_deref(), &project_dir)?,
    }

    Ok(())
}
