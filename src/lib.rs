pub mod config;
pub mod error;
pub mod gid;
pub mod storage;
pub mod utils;
pub mod volume;

pub use config::ProvisionerConfig;
pub use error::{DirectoryError, GidError, PathError, ProvisionError};
pub use gid::{DiskGidAllocator, GidAllocator};
pub use volume::{EfsProvisioner, Provisioner};
