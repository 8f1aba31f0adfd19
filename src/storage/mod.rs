//! Volume directory storage
//!
//! Handles directory creation and removal, permissions, and volume handle
//! validation.

pub mod filesystem;
pub mod operations;
pub mod permissions;
pub mod validation;

// Re-export commonly used functions
pub use operations::{create_directory, remove_directory};
pub use validation::{decode_handle, directory_name, encode_handle, local_path, remote_path};
