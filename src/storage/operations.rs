//! Storage operations
//!
//! Creates and removes volume directories on the mounted filesystem.

use log::{debug, error, info, warn};
use std::io;
use std::path::Path;

use crate::error::DirectoryError;
use crate::storage::filesystem::{create_directory as mkdir_all, remove_tree, set_group, set_mode};
use crate::storage::permissions::directory_mode;

/// Creates a volume directory with the mode and group implied by `gid`.
///
/// Mode bits are re-applied after creation since the umask may have
/// masked them. If chmod or chown fails, the directory is removed again
/// before the error is returned.
pub fn create_directory(path: &Path, gid: Option<u32>) -> Result<(), DirectoryError> {
    let mode = directory_mode(gid);

    create_with(path, mode, |path| {
        set_mode(path, mode)?;
        match gid {
            Some(gid) => set_group(path, gid),
            None => Ok(()),
        }
    })?;

    info!(
        "Created directory {} (mode {:o}, gid {:?})",
        path.display(),
        mode,
        gid
    );
    Ok(())
}

/// Create `path`, then run `configure` on it; removes `path` if `configure` fails.
fn create_with<F>(path: &Path, mode: u32, configure: F) -> Result<(), DirectoryError>
where
    F: FnOnce(&Path) -> io::Result<()>,
{
    let create_failed = |source| DirectoryError::CreateFailed {
        path: path.to_path_buf(),
        source,
    };

    mkdir_all(path, mode).map_err(|e| {
        error!("Failed to create directory {}: {}", path.display(), e);
        create_failed(e)
    })?;

    if let Err(e) = configure(path) {
        warn!(
            "Rolling back directory {} after configuration failure: {}",
            path.display(),
            e
        );
        if let Err(rollback) = remove_tree(path) {
            error!("Rollback of {} failed: {}", path.display(), rollback);
        }
        return Err(create_failed(e));
    }

    Ok(())
}

/// Recursively removes a volume directory. A missing directory is not an error.
///
/// `path` must come from a decoded and validated volume handle.
pub fn remove_directory(path: &Path) -> Result<(), DirectoryError> {
    match remove_tree(path) {
        Ok(true) => {
            info!("Removed directory {}", path.display());
            Ok(())
        }
        Ok(false) => {
            debug!("Directory {} already absent", path.display());
            Ok(())
        }
        Err(e) => {
            error!("Failed to remove directory {}: {}", path.display(), e);
            Err(DirectoryError::RemoveFailed {
                path: path.to_path_buf(),
                source: e,
            })
        }
    }
}
