use crate::progress::StageProgress;
use anyhow::Context;
use buildflow_build::CredentialProvisioner;
use buildflow_cluster::KubeGateway;
use buildflow_config::Settings;
use buildflow_pipeline::{DeployRequest, Pipeline, StageTimeouts};
use colored::Colorize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

pub struct DeployArgs {
    pub project_dir: PathBuf,
    pub backend: String,
    pub namespace: String,
    pub bucket: String,
    pub package_timeout: u64,
    pub upload_timeout: u64,
    pub apply_timeout: u64,
}

pub async fn handle(args: DeployArgs) -> anyhow::Result<()> {
    println!("{}", "Submitting build...".blue().bold());

    let settings = Settings::from_env().context("Failed to load configuration")?;

    let credentials = Arc::new(CredentialProvisioner::new(
        settings.registry.clone(),
        settings.object_store.clone(),
    ));
    let gateway = Arc::new(KubeGateway::new(
        args.namespace.clone(),
        settings.kubeconfig.clone(),
    ));
    let timeouts = StageTimeouts {
        package: Duration::from_secs(args.package_timeout),
        upload: Duration::from_secs(args.upload_timeout),
        apply: Duration::from_secs(args.apply_timeout),
    };

    let pipeline = Pipeline::new(&settings, credentials, gateway)?
        .with_timeouts(timeouts)
        .with_observer(Arc::new(StageProgress::new()));

    println!("  Project:     {}", args.project_dir.display().to_string().cyan());
    println!("  Destination: {}", pipeline.destination().cyan());
    println!("  Store:       {} ({})", args.backend.cyan(), args.bucket);
    println!("  Namespace:   {}", args.namespace.cyan());
    println!();

    let namespace = args.namespace;
    let request = DeployRequest {
        project_dir: args.project_dir,
        backend: args.backend,
        bucket: args.bucket,
    };
    let outcome = pipeline.run(&request).await?;

    println!();
    println!("{}", "✓ Build job submitted".green().bold());
    println!("  Context key: {}", outcome.key);
    println!("  Context:     {}", outcome.location);
    println!("  Secrets:     {}", outcome.secrets.join(", "));
    println!("  Job:         {}", outcome.job_name.cyan());
    println!();
    println!(
        "Follow the build with: kubectl -n {} logs -f job/{}",
        namespace, outcome.job_name
    );

    Ok(())
}
