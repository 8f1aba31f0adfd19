//! Error handlers
//!
//! Maps provisioner errors onto process exit codes for the driver binary.

use crate::error::types::{PathError, ProvisionError};
use log::error;

/// Log a provisioner error
pub fn handle_error(err: &ProvisionError) {
    error!("Provisioner error: {}", err);
}

/// Convert error to a process exit code
///
/// Request-shaped problems exit with 2 so a calling loop can tell them
/// apart from filesystem or allocator failures, which exit with 1.
pub fn error_to_exit_code(err: &ProvisionError) -> i32 {
    match err {
        ProvisionError::SelectorNotSupported => 2,
        ProvisionError::InvalidParameterValue { .. } => 2,
        ProvisionError::InvalidRequest(_) => 2,
        ProvisionError::DriverMismatch { .. } => 2,
        ProvisionError::Handle(PathError::InvalidHandleFormat(_)) => 2,
        ProvisionError::Handle(PathError::FilesystemMismatch { .. }) => 2,
        ProvisionError::Handle(PathError::InvalidSubpath(_)) => 2,
        ProvisionError::GidAllocationFailed(_) => 1,
        ProvisionError::DirectoryCreateFailed(_) => 1,
        ProvisionError::DirectoryRemoveFailed(_) => 1,
        ProvisionError::GidReleaseFailed(_) => 1,
    }
}
