//! Disk-backed GID allocator
//!
//! One directory per storage class under the state directory, one file
//! per reserved GID inside it. Reservations are created with `create_new`
//! so two processes sharing the state directory never hand out the same
//! GID. A `last_reserved` file remembers where the next scan starts.
//! Allocation and release hold an exclusive `flock` on the class's
//! `gid.lock` file.

use std::fs::{self, DirBuilder, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::os::unix::fs::{DirBuilderExt, OpenOptionsExt};
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use nix::fcntl::{Flock, FlockArg};

use crate::error::GidError;
use crate::gid::allocator::{GidAllocator, GidRange, volume_gid};
use crate::volume::{PersistentVolume, ProvisionOptions};

const LAST_RESERVED_FILE: &str = "last_reserved";
const LOCK_FILE: &str = "gid.lock";

pub struct DiskGidAllocator {
    path: PathBuf,
}

impl DiskGidAllocator {
    pub fn new(state_dir: impl Into<PathBuf>) -> Result<Self, GidError> {
        let path = state_dir.into();
        DirBuilder::new().recursive(true).mode(0o755).create(&path)?;
        Ok(DiskGidAllocator { path })
    }

    fn class_dir(&self, class: &str) -> Result<PathBuf, GidError> {
        if class.is_empty() || class == "." || class == ".." || class.contains('/') {
            return Err(GidError::InvalidStorageClass(class.to_string()));
        }
        let dir = self.path.join(class);
        DirBuilder::new().recursive(true).mode(0o755).create(&dir)?;
        Ok(dir)
    }

    /// Exclusive lock on a class directory, released on drop
    fn lock(&self, dir: &Path) -> Result<Flock<File>, GidError> {
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .mode(0o600)
            .open(dir.join(LOCK_FILE))?;
        Flock::lock(file, FlockArg::LockExclusive).map_err(|(_, errno)| GidError::Io(errno.into()))
    }

    /// Returns false if `gid` is already taken. Caller holds the class lock.
    fn reserve(&self, dir: &Path, gid: u32, owner: &str) -> Result<bool, GidError> {
        let reservation = dir.join(gid.to_string());
        let mut f = match OpenOptions::new()
            .write(true)
            .create_new(true)
            .mode(0o600)
            .open(&reservation)
        {
            Ok(f) => f,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => return Ok(false),
            Err(e) => return Err(e.into()),
        };

        if let Err(e) = f.write_all(owner.as_bytes()) {
            warn!("Dropping reservation of gid {} after write failure: {}", gid, e);
            let _ = fs::remove_file(&reservation);
            return Err(e.into());
        }

        fs::write(dir.join(LAST_RESERVED_FILE), gid.to_string())?;
        Ok(true)
    }

    fn last_reserved(&self, dir: &Path) -> Option<u32> {
        fs::read_to_string(dir.join(LAST_RESERVED_FILE))
            .ok()
            .and_then(|s| s.trim().parse().ok())
    }
}

impl GidAllocator for DiskGidAllocator {
    fn allocate_next(&self, options: &ProvisionOptions) -> Result<u32, GidError> {
        let class = &options.storage_class.name;
        let range = GidRange::from_parameters(&options.storage_class.parameters)?;
        let dir = self.class_dir(class)?;
        let _lock = self.lock(&dir)?;

        let mut candidate = match self.last_reserved(&dir) {
            Some(last) if range.contains(last) => range.next_after(last),
            _ => range.min,
        };

        for _ in 0..range.size() {
            if self.reserve(&dir, candidate, &options.pv_name)? {
                info!(
                    "Allocated gid {} to volume {} (storage class {})",
                    candidate, options.pv_name, class
                );
                return Ok(candidate);
            }
            candidate = range.next_after(candidate);
        }

        Err(GidError::RangeExhausted {
            class: class.clone(),
            min: range.min,
            max: range.max,
        })
    }

    fn release(&self, volume: &PersistentVolume) -> Result<(), GidError> {
        let Some(gid) = volume_gid(volume)? else {
            debug!("Volume {} has no gid to release", volume.name);
            return Ok(());
        };

        let class = &volume.spec.storage_class_name;
        if class.is_empty() {
            return Err(GidError::MissingStorageClass(volume.name.clone()));
        }
        let dir = self.class_dir(class)?;
        let _lock = self.lock(&dir)?;

        match fs::remove_file(dir.join(gid.to_string())) {
            Ok(()) => info!("Released gid {} of volume {}", gid, volume.name),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("Gid {} of volume {} was not reserved", gid, volume.name)
            }
            Err(e) => return Err(e.into()),
        }
        Ok(())
    }
}
