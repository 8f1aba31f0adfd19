//! Configuration management for the EFS provisioner
//!
//! Values are layered, lowest precedence first: built-in defaults, an
//! optional TOML/YAML/JSON file, `EFS_PROVISIONER_*` environment variables
//! (e.g. `EFS_PROVISIONER_FILE_SYSTEM_ID`),
//! and finally command-line flags.

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::Path;

const ENV_PREFIX: &str = "EFS_PROVISIONER";

pub const DEFAULT_MOUNT_POINT: &str = "/efs";
pub const DEFAULT_SUB_PATH: &str = "/persistentvolumes";
pub const DEFAULT_GID_STATE_DIR: &str = "/var/lib/efs-pv-provisioner/gids";

/// Provisioner configuration
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct ProvisionerConfig {
    /// ID of the EFS file system (fs-abcdefg)
    /// Environment: EFS_PROVISIONER_FILE_SYSTEM_ID
    pub file_system_id: String,

    /// Where the EFS file system is mounted in this process's view
    pub mount_point: String,

    /// Subpath in the EFS file system that holds provisioned volumes
    pub sub_path: String,

    /// State directory of the disk-backed GID allocator
    pub gid_state_dir: String,
}

/// Values given on the command line; `None` leaves lower layers in place
#[derive(Debug, Default, Clone)]
pub struct ConfigOverrides {
    pub file_system_id: Option<String>,
    pub mount_point: Option<String>,
    pub sub_path: Option<String>,
    pub gid_state_dir: Option<String>,
}

impl ProvisionerConfig {
    /// Load configuration from defaults, `path`, the environment and `overrides`
    pub fn load(path: Option<&Path>, overrides: ConfigOverrides) -> Result<Self, ConfigError> {
        Self::load_with_env_prefix(path, overrides, ENV_PREFIX)
    }

    fn load_with_env_prefix(
        path: Option<&Path>,
        overrides: ConfigOverrides,
        env_prefix: &str,
    ) -> Result<Self, ConfigError> {
        let mut builder = Config::builder()
            .set_default("file_system_id", "")?
            .set_default("mount_point", DEFAULT_MOUNT_POINT)?
            .set_default("sub_path", DEFAULT_SUB_PATH)?
            .set_default("gid_state_dir", DEFAULT_GID_STATE_DIR)?;

        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(true));
        }

        let settings = builder
            .add_source(Environment::with_prefix(env_prefix))
            .set_override_option("file_system_id", overrides.file_system_id)?
            .set_override_option("mount_point", overrides.mount_point)?
            .set_override_option("sub_path", overrides.sub_path)?
            .set_override_option("gid_state_dir", overrides.gid_state_dir)?
            .build()?;

        let config: ProvisionerConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Validation for all configuration values
    fn validate(&self) -> Result<(), ConfigError> {
        if self.file_system_id.is_empty() {
            return Err(ConfigError::Message(
                "file_system_id cannot be empty".into(),
            ));
        }

        // The handle format uses ':' as its only separator
        if self.file_system_id.contains(':') {
            return Err(ConfigError::Message(
                "file_system_id cannot contain ':'".into(),
            ));
        }

        if self.mount_point.is_empty() {
            return Err(ConfigError::Message("mount_point cannot be empty".into()));
        }

        if self.sub_path.is_empty() {
            return Err(ConfigError::Message("sub_path cannot be empty".into()));
        }

        if self.gid_state_dir.is_empty() {
            return Err(ConfigError::Message(
                "gid_state_dir cannot be empty".into(),
            ));
        }

        Ok(())
    }
}
