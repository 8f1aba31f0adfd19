//! Path validation
//!
//! Derives volume directory names and paths, and encodes/decodes the
//! `<filesystemID>:<absolutePath>` volume handle. Decoding is the only
//! gate in front of a recursive delete, so it normalizes the handle path
//! before checking that it stays strictly inside the storage root.

use std::path::PathBuf;

use crate::error::PathError;

const HANDLE_SEPARATOR: char = ':';

/// Directory name for a claim: `namespace-claimName-volumeName`
pub fn directory_name(namespace: &str, claim_name: &str, volume_name: &str) -> String {
    format!("{}-{}-{}", namespace, claim_name, volume_name)
}

/// Absolute storage root on the shared filesystem
pub fn storage_root(sub_path: &str) -> String {
    join(&["/", sub_path])
}

/// Absolute path of the volume directory as seen from the filesystem root
pub fn remote_path(sub_path: &str, directory_name: &str) -> String {
    join(&["/", sub_path, "/", directory_name])
}

/// Path of the volume directory under the local mount point
pub fn local_path(mount_point: &str, sub_path: &str, directory_name: &str) -> PathBuf {
    PathBuf::from(join(&[mount_point, "/", sub_path, "/", directory_name]))
}

/// Encode a volume handle
pub fn encode_handle(file_system_id: &str, remote_path: &str) -> String {
    format!("{}{}{}", file_system_id, HANDLE_SEPARATOR, remote_path)
}

/// Decode a volume handle into the local path it designates.
///
/// Fails unless the handle has exactly one separator, names the expected
/// filesystem, and its path normalizes to a strict descendant of the
/// storage root.
pub fn decode_handle(
    handle: &str,
    expected_file_system_id: &str,
    sub_path: &str,
    mount_point: &str,
) -> Result<PathBuf, PathError> {
    let parts: Vec<&str> = handle.split(HANDLE_SEPARATOR).collect();
    if parts.len() != 2 {
        return Err(PathError::InvalidHandleFormat(handle.to_string()));
    }

    let (file_system_id, raw_path) = (parts[0], parts[1]);
    if file_system_id != expected_file_system_id {
        return Err(PathError::FilesystemMismatch {
            found: file_system_id.to_string(),
            expected: expected_file_system_id.to_string(),
        });
    }

    let normalized = clean(raw_path);
    if !is_strictly_inside(&normalized, &storage_root(sub_path)) {
        return Err(PathError::InvalidSubpath(raw_path.to_string()));
    }

    Ok(PathBuf::from(join(&[mount_point, "/", &normalized])))
}

/// `path` must already be clean.
fn is_strictly_inside(path: &str, root: &str) -> bool {
    let prefix = if root == "/" {
        "/".to_string()
    } else {
        format!("{}/", root)
    };
    path.starts_with(&prefix) && path.len() > prefix.len()
}

/// Join non-empty elements with `/` and clean the result.
fn join(elems: &[&str]) -> String {
    let non_empty: Vec<&str> = elems.iter().copied().filter(|e| !e.is_empty()).collect();
    if non_empty.is_empty() {
        return String::new();
    }
    clean(&non_empty.join("/"))
}

/// Lexical path normalization.
///
/// Collapses repeated slashes, drops `.` segments, resolves `..` against
/// the preceding segment and drops trailing slashes. `..` at the root of
/// an absolute path stays at the root. An empty path cleans to `.`.
pub fn clean(path: &str) -> String {
    if path.is_empty() {
        return ".".to_string();
    }

    let rooted = path.starts_with('/');
    let mut segments: Vec<&str> = Vec::new();

    for segment in path.split('/') {
        match segment {
            "" | "." => continue,
            ".." => match segments.last() {
                Some(&last) if last != ".." => {
                    segments.pop();
                }
                _ if rooted => {}
                _ => segments.push(".."),
            },
            other => segments.push(other),
        }
    }

    let body = segments.join("/");
    match (rooted, body.is_empty()) {
        (true, true) => "/".to_string(),
        (true, false) => format!("/{}", body),
        (false, true) => ".".to_string(),
        (false, false) => body,
    }
}
