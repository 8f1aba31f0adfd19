//! Command-line interface
//!
//! Global flags override the configuration file and environment. Each
//! subcommand performs a single provisioner call and prints its result.

use clap::{Args, Parser, Subcommand};
use std::collections::BTreeMap;
use std::path::PathBuf;

use efs_pv_provisioner::config::ConfigOverrides;
use efs_pv_provisioner::volume::{
    AccessMode, PersistentVolumeClaim, ProvisionOptions, ReclaimPolicy, StorageClass,
};

#[derive(Parser)]
#[command(
    name = "efs-pv-provisioner",
    version,
    about = "Provision EFS-backed persistent volumes as directories"
)]
pub struct Cli {
    /// Config file (TOML, YAML or JSON)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// The ID of the EFS file system (fs-abcdefg)
    #[arg(long, global = true)]
    pub file_system_id: Option<String>,

    /// The path in this process where the EFS file system is mounted
    #[arg(long = "mountpoint", global = true)]
    pub mount_point: Option<String>,

    /// The subpath in the EFS file system that will be used for persistent volumes
    #[arg(long = "subpath", global = true)]
    pub sub_path: Option<String>,

    /// State directory of the GID allocator
    #[arg(long, global = true)]
    pub gid_state_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create the directory for a claim and print the volume as JSON
    Provision(ProvisionArgs),

    /// Remove the directory behind a volume printed by `provision`
    Deprovision {
        /// Volume JSON file, or `-` for stdin
        #[arg(short, long)]
        volume: PathBuf,
    },

    /// Validate a volume handle and print the local path it designates
    Resolve {
        #[arg(long)]
        handle: String,
    },
}

#[derive(Args)]
pub struct ProvisionArgs {
    #[arg(long)]
    pub namespace: String,

    #[arg(long)]
    pub claim: String,

    #[arg(long)]
    pub volume_name: String,

    /// Requested storage quantity, e.g. 5Gi
    #[arg(long, default_value = "1Gi")]
    pub capacity: String,

    #[arg(long = "access-mode", default_value = "ReadWriteMany")]
    pub access_modes: Vec<AccessMode>,

    #[arg(long, default_value = "efs-sc")]
    pub storage_class: String,

    /// Storage class parameter, e.g. gidAllocate=false
    #[arg(long = "param", value_parser = parse_key_val)]
    pub parameters: Vec<(String, String)>,

    #[arg(long)]
    pub reclaim_policy: Option<ReclaimPolicy>,

    #[arg(long = "mount-option")]
    pub mount_options: Vec<String>,
}

impl Cli {
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            file_system_id: self.file_system_id.clone(),
            mount_point: self.mount_point.clone(),
            sub_path: self.sub_path.clone(),
            gid_state_dir: self
                .gid_state_dir
                .as_ref()
                .map(|p| p.to_string_lossy().into_owned()),
        }
    }
}

impl ProvisionArgs {
    pub fn into_options(self) -> ProvisionOptions {
        ProvisionOptions {
            pv_name: self.volume_name,
            pvc: PersistentVolumeClaim {
                namespace: self.namespace,
                name: self.claim,
                access_modes: self.access_modes,
                storage_request: self.capacity,
                selector: None,
            },
            storage_class: StorageClass {
                name: self.storage_class,
                parameters: self.parameters.into_iter().collect::<BTreeMap<_, _>>(),
                reclaim_policy: self.reclaim_policy,
                mount_options: (!self.mount_options.is_empty()).then_some(self.mount_options),
            },
        }
    }
}

fn parse_key_val(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got {s}"))?;
    Ok((key.to_string(), value.to_string()))
}
