//! Volume types
//!
//! The subset of the cluster's claim, storage class and volume objects
//! that the provisioner reads and produces. Field names serialize in the
//! camelCase form the cluster API uses.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Capacity resource key
pub const RESOURCE_STORAGE: &str = "storage";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccessMode {
    ReadWriteOnce,
    ReadOnlyMany,
    ReadWriteMany,
    ReadWriteOncePod,
}

impl FromStr for AccessMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ReadWriteOnce" | "RWO" => Ok(AccessMode::ReadWriteOnce),
            "ReadOnlyMany" | "ROX" => Ok(AccessMode::ReadOnlyMany),
            "ReadWriteMany" | "RWX" => Ok(AccessMode::ReadWriteMany),
            "ReadWriteOncePod" | "RWOP" => Ok(AccessMode::ReadWriteOncePod),
            other => Err(format!("unknown access mode: {other}")),
        }
    }
}

/// What happens to the volume once its claim is released
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReclaimPolicy {
    Retain,
    #[default]
    Delete,
    Recycle,
}

impl FromStr for ReclaimPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Retain" => Ok(ReclaimPolicy::Retain),
            "Delete" => Ok(ReclaimPolicy::Delete),
            "Recycle" => Ok(ReclaimPolicy::Recycle),
            other => Err(format!("unknown reclaim policy: {other}")),
        }
    }
}

impl fmt::Display for ReclaimPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelSelector {
    #[serde(default)]
    pub match_labels: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistentVolumeClaim {
    pub namespace: String,
    pub name: String,
    #[serde(default)]
    pub access_modes: Vec<AccessMode>,
    /// Requested `storage` quantity, e.g. `1Mi`
    pub storage_request: String,
    #[serde(default)]
    pub selector: Option<LabelSelector>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageClass {
    pub name: String,
    #[serde(default)]
    pub parameters: BTreeMap<String, String>,
    #[serde(default)]
    pub reclaim_policy: Option<ReclaimPolicy>,
    #[serde(default)]
    pub mount_options: Option<Vec<String>>,
}

/// Everything the reconciliation loop hands over for one provision call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvisionOptions {
    pub pv_name: String,
    pub pvc: PersistentVolumeClaim,
    pub storage_class: StorageClass,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CsiVolumeSource {
    pub driver: String,
    pub volume_handle: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistentVolumeSpec {
    pub persistent_volume_reclaim_policy: ReclaimPolicy,
    #[serde(default)]
    pub access_modes: Vec<AccessMode>,
    #[serde(default)]
    pub capacity: BTreeMap<String, String>,
    #[serde(default)]
    pub storage_class_name: String,
    #[serde(default)]
    pub csi: Option<CsiVolumeSource>,
    #[serde(default)]
    pub mount_options: Vec<String>,
}

/// Volume descriptor returned by provision and consumed by deprovision
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistentVolume {
    pub name: String,
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
    pub spec: PersistentVolumeSpec,
}

impl PersistentVolume {
    /// The CSI volume handle, if the volume has a CSI source
    pub fn volume_handle(&self) -> Option<&str> {
        self.spec.csi.as_ref().map(|csi| csi.volume_handle.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_access_modes() {
        assert_eq!("RWX".parse::<AccessMode>(), Ok(AccessMode::ReadWriteMany));
        assert_eq!(
            "ReadWriteOnce".parse::<AccessMode>(),
            Ok(AccessMode::ReadWriteOnce)
        );
        assert!("rwx".parse::<AccessMode>().is_err());
    }

    #[test]
    fn test_volume_json_shape() {
        let json = r#"{
            "name": "pvc-1",
            "spec": {
                "persistentVolumeReclaimPolicy": "Retain",
                "storageClassName": "efs-sc",
                "csi": { "driver": "efs.csi.aws.com", "volumeHandle": "fs-1:/pv/x" }
            }
        }"#;
        let pv: PersistentVolume = serde_json::from_str(json).unwrap();
        assert_eq!(pv.spec.persistent_volume_reclaim_policy, ReclaimPolicy::Retain);
        assert_eq!(pv.volume_handle(), Some("fs-1:/pv/x"));
        assert!(pv.annotations.is_empty());
        assert!(pv.spec.mount_options.is_empty());
    }
}
