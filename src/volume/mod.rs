//! Volume provisioning
//!
//! Volume types and the provision/deprovision lifecycle.

pub mod lifecycle;
pub mod parameters;
pub mod types;

pub use lifecycle::{EFS_CSI_DRIVER_NAME, EfsProvisioner, PROVISIONER_NAME, Provisioner};
pub use types::*;
