//! File system operations
//!
//! Thin wrappers over the POSIX calls used by the directory lifecycle.

use std::fs::{self, DirBuilder, Permissions};
use std::io::{ErrorKind, Result};
use std::os::unix::fs::{DirBuilderExt, PermissionsExt};
use std::path::Path;

use nix::unistd::{Gid, chown};

/// Create a directory and any missing parents
pub fn create_directory(path: &Path, mode: u32) -> Result<()> {
    DirBuilder::new().recursive(true).mode(mode).create(path)
}

/// Apply mode bits, bypassing the process umask
pub fn set_mode(path: &Path, mode: u32) -> Result<()> {
    fs::set_permissions(path, Permissions::from_mode(mode))
}

/// Change the group of a path, leaving its owner as is
pub fn set_group(path: &Path, gid: u32) -> Result<()> {
    chown(path, None, Some(Gid::from_raw(gid)))?;
    Ok(())
}

/// Recursively remove a directory; returns false if it was already gone
pub fn remove_tree(path: &Path) -> Result<bool> {
    match fs::remove_dir_all(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

/// Check if directory exists
pub fn directory_exists(path: &Path) -> bool {
    path.is_dir()
}
