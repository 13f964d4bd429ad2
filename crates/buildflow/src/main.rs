mod commands;
mod progress;

use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "buildflow")]
#[command(about = "Build container images on your cluster, straight from a project directory", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Package the project and submit a builder job
    Deploy {
        /// Project directory containing the Dockerfile
        #[arg(short = 'p', long = "project-dir", default_value = ".")]
        project_dir: PathBuf,
        /// Build context store (s3, local)
        #[arg(short = 'm', long = "build-context-manager")]
        build_context_manager: String,
        /// Namespace the secrets and job are applied in
        #[arg(short = 'n', long, default_value = "default")]
        namespace: String,
        /// Bucket (or directory for `local`) the build context is uploaded to
        #[arg(short = 'b', long = "build-context-bucket")]
        build_context_bucket: String,
        /// Packaging deadline in seconds
        #[arg(long, default_value_t = 120)]
        package_timeout: u64,
        /// Upload deadline in seconds
        #[arg(long, default_value_t = 300)]
        upload_timeout: u64,
        /// Deadline in seconds for each cluster apply
        #[arg(long, default_value_t = 30)]
        apply_timeout: u64,
    },
    /// Show version information
    Version,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Values already in the environment win over .env entries
    let dotenv = match load_dotenv() {
        Ok(path) => path,
        Err(e) => {
            eprintln!("{} {:#}", "✗".red().bold(), e);
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Some(path) = dotenv {
        tracing::debug!("Loaded environment from {}", path.display());
    }

    let result = match cli.command {
        Commands::Version => {
            println!("buildflow {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        Commands::Deploy {
            project_dir,
            build_context_manager,
            namespace,
            build_context_bucket,
            package_timeout,
            upload_timeout,
            apply_timeout,
        } => {
            commands::deploy::handle(commands::deploy::DeployArgs {
                project_dir,
                backend: build_context_manager,
                namespace,
                bucket: build_context_bucket,
                package_timeout,
                upload_timeout,
                apply_timeout,
            })
            .await
        }
    };

    if let Err(e) = result {
        eprintln!();
        eprintln!("{} {}", "✗".red().bold(), commands::error_message(&e));
        std::process::exit(1);
    }
}

/// Load `.env` from the working directory or its ancestors, if present
fn load_dotenv() -> anyhow::Result<Option<PathBuf>> {
    match dotenvy::dotenv() {
        Ok(path) => Ok(Some(path)),
        Err(e) if e.not_found() => Ok(None),
        Err(e) => Err(anyhow::Error::new(e).context("Failed to load .env")),
    }
}
