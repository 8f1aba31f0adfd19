//! GID allocation
//!
//! The allocator contract used by the provisioner, plus a disk-backed
//! implementation for running outside a cluster.

pub mod allocator;
pub mod store;

pub use allocator::{GidAllocator, GidRange, VOLUME_GID_ANNOTATION_KEY, volume_gid};
pub use store::DiskGidAllocator;
