//! GID allocator contract
//!
//! The provisioner asks an allocator for one GID per volume and hands it
//! back on deprovision. Allocators own their range bookkeeping; the
//! provisioner only passes the storage class through and records the
//! allocated value on the volume.

use std::collections::BTreeMap;

use crate::error::GidError;
use crate::volume::{PersistentVolume, ProvisionOptions};

/// Annotation recording the allocated GID on a volume
pub const VOLUME_GID_ANNOTATION_KEY: &str = "pv.beta.kubernetes.io/gid";

pub const DEFAULT_GID_MIN: u32 = 2000;
pub const DEFAULT_GID_MAX: u32 = i32::MAX as u32;

const ABSOLUTE_GID_MIN: i64 = 2000;
const ABSOLUTE_GID_MAX: i64 = i32::MAX as i64;

pub trait GidAllocator: Send + Sync {
    /// Reserve the next free GID in the range configured by the storage class
    fn allocate_next(&self, options: &ProvisionOptions) -> Result<u32, GidError>;

    /// Release the GID recorded on `volume`, if any
    fn release(&self, volume: &PersistentVolume) -> Result<(), GidError>;
}

/// Inclusive GID range taken from `gidMin`/`gidMax` storage class parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GidRange {
    pub min: u32,
    pub max: u32,
}

impl Default for GidRange {
    fn default() -> Self {
        Self {
            min: DEFAULT_GID_MIN,
            max: DEFAULT_GID_MAX,
        }
    }
}

impl GidRange {
    /// Parse the range from storage class parameters. Keys match case-insensitively.
    pub fn from_parameters(parameters: &BTreeMap<String, String>) -> Result<Self, GidError> {
        let mut range = GidRange::default();

        for (key, value) in parameters {
            match key.to_lowercase().as_str() {
                "gidmin" => range.min = parse_bound(key, value)?,
                "gidmax" => range.max = parse_bound(key, value)?,
                _ => {}
            }
        }

        if range.min > range.max {
            return Err(GidError::InvalidParameter {
                key: "gidMin".into(),
                value: range.min.to_string(),
                reason: format!("gidMin must be <= gidMax ({})", range.max),
            });
        }

        Ok(range)
    }

    pub fn contains(&self, gid: u32) -> bool {
        (self.min..=self.max).contains(&gid)
    }

    pub fn size(&self) -> u64 {
        u64::from(self.max - self.min) + 1
    }

    /// The GID after `gid`, wrapping to the start of the range
    pub fn next_after(&self, gid: u32) -> u32 {
        if gid >= self.max || gid < self.min {
            self.min
        } else {
            gid + 1
        }
    }
}

fn parse_bound(key: &str, value: &str) -> Result<u32, GidError> {
    let invalid = |reason: String| GidError::InvalidParameter {
        key: key.to_string(),
        value: value.to_string(),
        reason,
    };

    let parsed: i64 = value.trim().parse().map_err(|e| invalid(format!("{e}")))?;
    if parsed < ABSOLUTE_GID_MIN {
        return Err(invalid(format!("must be >= {ABSOLUTE_GID_MIN}")));
    }
    if parsed > ABSOLUTE_GID_MAX {
        return Err(invalid(format!("must be <= {ABSOLUTE_GID_MAX}")));
    }
    Ok(parsed as u32)
}

/// The GID recorded on a volume by a previous provision
pub fn volume_gid(volume: &PersistentVolume) -> Result<Option<u32>, GidError> {
    match volume.annotations.get(VOLUME_GID_ANNOTATION_KEY) {
        None => Ok(None),
        Some(value) => value
            .parse()
            .map(Some)
            .map_err(|_| GidError::InvalidAnnotation(value.clone())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_default_range() {
        let range = GidRange::from_parameters(&BTreeMap::new()).unwrap();
        assert_eq!(range, GidRange { min: 2000, max: 2147483647 });
    }

    #[test]
    fn test_range_keys_are_case_insensitive() {
        let range =
            GidRange::from_parameters(&params(&[("gidMin", "3000"), ("GIDMAX", "3010")])).unwrap();
        assert_eq!(range, GidRange { min: 3000, max: 3010 });
        assert_eq!(range.size(), 11);
    }

    #[test]
    fn test_range_rejects_bad_bounds() {
        for pairs in [
            vec![("gidMin", "abc")],
            vec![("gidMin", "1999")],
            vec![("gidMax", "2147483648")],
            vec![("gidMin", "5000"), ("gidMax", "4000")],
        ] {
            assert!(
                matches!(
                    GidRange::from_parameters(&params(&pairs)),
                    Err(GidError::InvalidParameter { .. })
                ),
                "accepted {pairs:?}"
            );
        }
    }

    #[test]
    fn test_next_after_wraps() {
        let range = GidRange { min: 2000, max: 2002 };
        assert_eq!(range.next_after(2000), 2001);
        assert_eq!(range.next_after(2002), 2000);
        assert_eq!(range.next_after(10), 2000);
    }
}
