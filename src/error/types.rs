//! Error types
//!
//! Defines domain-specific error types for each layer of the provisioner.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Volume handle decoding errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PathError {
    #[error("invalid volumeHandle: {0}")]
    InvalidHandleFormat(String),

    #[error(
        "file system ID {found} in volumeHandle doesn't match configured file system ID {expected}"
    )]
    FilesystemMismatch { found: String, expected: String },

    #[error("invalid subpath {0} in volume")]
    InvalidSubpath(String),
}

/// Directory lifecycle errors
#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("failed to create directory {}: {source}", .path.display())]
    CreateFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to remove directory {}: {source}", .path.display())]
    RemoveFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// GID allocator errors
#[derive(Debug, Error)]
pub enum GidError {
    #[error("invalid value {value} for parameter {key}: {reason}")]
    InvalidParameter {
        key: String,
        value: String,
        reason: String,
    },

    #[error("invalid storage class name {0:?}")]
    InvalidStorageClass(String),

    #[error("volume {0} has no storage class")]
    MissingStorageClass(String),

    #[error("invalid gid annotation {0:?}")]
    InvalidAnnotation(String),

    #[error("no free gid in range [{min}, {max}] for storage class {class}")]
    RangeExhausted { class: String, min: u32, max: u32 },

    #[error("gid store I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Errors surfaced by provision and deprovision
#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("claim.Spec.Selector is not supported")]
    SelectorNotSupported,

    #[error("invalid value {value} for parameter {key}")]
    InvalidParameterValue { key: String, value: String },

    #[error("invalid provision request: {0}")]
    InvalidRequest(String),

    #[error("gid allocation failed: {0}")]
    GidAllocationFailed(#[source] GidError),

    #[error("directory create failed: {0}")]
    DirectoryCreateFailed(#[source] DirectoryError),

    #[error("volume's driver {found} is not {expected}")]
    DriverMismatch { found: String, expected: String },

    #[error(transparent)]
    Handle(#[from] PathError),

    #[error("directory remove failed: {0}")]
    DirectoryRemoveFailed(#[source] DirectoryError),

    #[error("gid release failed: {0}")]
    GidReleaseFailed(#[source] GidError),
}
