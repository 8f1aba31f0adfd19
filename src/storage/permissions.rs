//! Directory permissions
//!
//! Mode bits applied to provisioned volume directories.

/// World-writable mode used when no GID isolates the volume
pub const SHARED_MODE: u32 = 0o777;

/// Owner/group mode used when the volume is owned by an allocated GID
pub const GROUP_MODE: u32 = 0o771;

/// Set-group-ID bit, so entries created inside inherit the directory group
pub const SETGID_BIT: u32 = 0o2000;

/// Mode for a volume directory with or without an allocated GID
pub fn directory_mode(gid: Option<u32>) -> u32 {
    match gid {
        Some(_) => GROUP_MODE | SETGID_BIT,
        None => SHARED_MODE,
    }
}
