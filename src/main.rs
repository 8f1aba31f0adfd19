//! EFS PV provisioner - Entry Point
//!
//! Runs one provision, deprovision or resolve call against the mounted
//! EFS file system. A reconciliation loop drives the provisioner by
//! invoking these subcommands; it owns watching, retries and backoff.

mod cli;

use anyhow::Context;
use clap::Parser;
use log::{info, warn};
use std::fs;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use cli::{Cli, Commands};
use efs_pv_provisioner::error::ProvisionError;
use efs_pv_provisioner::error::handlers::{error_to_exit_code, handle_error};
use efs_pv_provisioner::storage::filesystem::directory_exists;
use efs_pv_provisioner::storage::local_path;
use efs_pv_provisioner::utils::logging::setup_logging;
use efs_pv_provisioner::volume::{PROVISIONER_NAME, PersistentVolume};
use efs_pv_provisioner::{DiskGidAllocator, EfsProvisioner, Provisioner, ProvisionerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    setup_logging();

    let config = ProvisionerConfig::load(cli.config.as_deref(), cli.overrides())
        .context("failed to load provisioner configuration")?;

    info!(
        "{} using file system {} mounted at {} (subpath {})",
        PROVISIONER_NAME, config.file_system_id, config.mount_point, config.sub_path
    );

    let storage_root = local_path(&config.mount_point, &config.sub_path, "");
    if !directory_exists(&storage_root) {
        warn!("Storage root {} does not exist yet", storage_root.display());
    }

    match cli.command {
        Commands::Provision(args) => {
            let provisioner = build_provisioner(&config)?;
            let options = args.into_options();
            let volume = run_blocking(move || provisioner.provision(&options)).await?;
            println!("{}", serde_json::to_string_pretty(&volume)?);
        }
        Commands::Deprovision { volume } => {
            let provisioner = build_provisioner(&config)?;
            let volume = read_volume(&volume)?;
            run_blocking(move || provisioner.deprovision(&volume)).await?;
        }
        Commands::Resolve { handle } => {
            let provisioner = build_provisioner(&config)?;
            let path = run_blocking(move || {
                provisioner
                    .resolve_handle(&handle)
                    .map_err(ProvisionError::from)
            })
            .await?;
            println!("{}", path.display());
        }
    }

    Ok(())
}

fn build_provisioner(config: &ProvisionerConfig) -> anyhow::Result<Arc<EfsProvisioner>> {
    let allocator = DiskGidAllocator::new(&config.gid_state_dir).with_context(|| {
        format!(
            "failed to open gid state directory {}",
            config.gid_state_dir
        )
    })?;
    Ok(Arc::new(EfsProvisioner::from_config(
        config,
        Arc::new(allocator),
    )))
}

fn read_volume(path: &Path) -> anyhow::Result<PersistentVolume> {
    let content = if path == Path::new("-") {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("failed to read volume from stdin")?;
        buf
    } else {
        fs::read_to_string(path)
            .with_context(|| format!("failed to read volume from {}", path.display()))?
    };
    serde_json::from_str(&content).context("failed to parse volume JSON")
}

/// Run a provisioner call on the blocking pool, exiting with its error code on failure
async fn run_blocking<T, F>(op: F) -> anyhow::Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, ProvisionError> + Send + 'static,
{
    match tokio::task::spawn_blocking(op)
        .await
        .context("provisioner task panicked")?
    {
        Ok(value) => Ok(value),
        Err(e) => {
            handle_error(&e);
            std::process::exit(error_to_exit_code(&e));
        }
    }
}
