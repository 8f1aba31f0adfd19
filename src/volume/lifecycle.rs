//! Volume lifecycle
//!
//! Turns a provision request into a directory on the shared filesystem and
//! a volume descriptor pointing at it, and tears both down again.
//!
//! Provision: validate request, allocate GID (if requested), create the
//! directory, build the descriptor. Deprovision: release GID, check the
//! driver, decode and validate the handle, remove the directory. Each step
//! aborts the call on failure; retrying is the caller's job.

use log::{info, warn};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use crate::config::ProvisionerConfig;
use crate::error::{PathError, ProvisionError};
use crate::gid::{GidAllocator, VOLUME_GID_ANNOTATION_KEY};
use crate::storage::{
    create_directory, decode_handle, directory_name, encode_handle, local_path, remote_path,
    remove_directory,
};
use crate::volume::parameters::ClassParameters;
use crate::volume::types::{
    CsiVolumeSource, PersistentVolume, PersistentVolumeSpec, ProvisionOptions, RESOURCE_STORAGE,
};

/// Name the provisioner registers under with the reconciliation loop
pub const PROVISIONER_NAME: &str = "aws.k8s.logmein.com/efs-csi-pv-provisioner";

/// CSI driver that mounts the volumes this provisioner creates
pub const EFS_CSI_DRIVER_NAME: &str = "efs.csi.aws.com";

/// The two calls a reconciliation loop makes into a provisioner
pub trait Provisioner: Send + Sync {
    /// Create the storage asset for a claim and describe it as a volume
    fn provision(&self, options: &ProvisionOptions) -> Result<PersistentVolume, ProvisionError>;

    /// Remove the storage asset behind a volume
    fn deprovision(&self, volume: &PersistentVolume) -> Result<(), ProvisionError>;
}

/// Provisions volumes as directories under `sub_path` on one EFS file system
pub struct EfsProvisioner {
    file_system_id: String,
    mount_point: String,
    sub_path: String,
    allocator: Arc<dyn GidAllocator>,
}

impl EfsProvisioner {
    pub fn new(
        file_system_id: impl Into<String>,
        mount_point: impl Into<String>,
        sub_path: impl Into<String>,
        allocator: Arc<dyn GidAllocator>,
    ) -> Self {
        Self {
            file_system_id: file_system_id.into(),
            mount_point: mount_point.into(),
            sub_path: sub_path.into(),
            allocator,
        }
    }

    pub fn from_config(config: &ProvisionerConfig, allocator: Arc<dyn GidAllocator>) -> Self {
        Self::new(
            config.file_system_id.clone(),
            config.mount_point.clone(),
            config.sub_path.clone(),
            allocator,
        )
    }

    /// Local path of the directory backing a claim
    pub fn local_path_for(&self, options: &ProvisionOptions) -> PathBuf {
        local_path(&self.mount_point, &self.sub_path, &Self::directory_for(options))
    }

    /// Path of the directory backing a claim, relative to the file system root
    pub fn remote_path_for(&self, options: &ProvisionOptions) -> String {
        remote_path(&self.sub_path, &Self::directory_for(options))
    }

    /// Decode a handle of this file system into the local path it designates
    pub fn resolve_handle(&self, handle: &str) -> Result<PathBuf, PathError> {
        decode_handle(handle, &self.file_system_id, &self.sub_path, &self.mount_point)
    }

    fn directory_for(options: &ProvisionOptions) -> String {
        directory_name(&options.pvc.namespace, &options.pvc.name, &options.pv_name)
    }

    fn validate_request(options: &ProvisionOptions) -> Result<ClassParameters, ProvisionError> {
        if options.pvc.selector.is_some() {
            return Err(ProvisionError::SelectorNotSupported);
        }

        for (field, value) in [
            ("claim namespace", options.pvc.namespace.as_str()),
            ("claim name", options.pvc.name.as_str()),
            ("volume name", options.pv_name.as_str()),
        ] {
            validate_name_component(field, value)?;
        }

        ClassParameters::parse(&options.storage_class.parameters)
    }

    fn build_volume(&self, options: &ProvisionOptions, gid: Option<u32>) -> PersistentVolume {
        let class = &options.storage_class;

        let mut capacity = BTreeMap::new();
        capacity.insert(
            RESOURCE_STORAGE.to_string(),
            options.pvc.storage_request.clone(),
        );

        let mut annotations = BTreeMap::new();
        if let Some(gid) = gid {
            annotations.insert(VOLUME_GID_ANNOTATION_KEY.to_string(), gid.to_string());
        }

        PersistentVolume {
            name: options.pv_name.clone(),
            annotations,
            spec: PersistentVolumeSpec {
                persistent_volume_reclaim_policy: class.reclaim_policy.unwrap_or_default(),
                access_modes: options.pvc.access_modes.clone(),
                capacity,
                storage_class_name: class.name.clone(),
                csi: Some(CsiVolumeSource {
                    driver: EFS_CSI_DRIVER_NAME.to_string(),
                    volume_handle: encode_handle(
                        &self.file_system_id,
                        &self.remote_path_for(options),
                    ),
                }),
                mount_options: class.mount_options.clone().unwrap_or_default(),
            },
        }
    }
}

/// Names become one path component of the volume directory
fn validate_name_component(field: &str, value: &str) -> Result<(), ProvisionError> {
    if value.is_empty() {
        return Err(ProvisionError::InvalidRequest(format!("{field} is empty")));
    }
    if value == "." || value == ".." || value.contains('/') || value.contains('\0') {
        return Err(ProvisionError::InvalidRequest(format!(
            "{field} {value:?} is not a valid path component"
        )));
    }
    Ok(())
}

impl Provisioner for EfsProvisioner {
    fn provision(&self, options: &ProvisionOptions) -> Result<PersistentVolume, ProvisionError> {
        let parameters = Self::validate_request(options)?;

        let gid = if parameters.gid_allocate {
            let gid = self
                .allocator
                .allocate_next(options)
                .map_err(ProvisionError::GidAllocationFailed)?;
            Some(gid)
        } else {
            None
        };

        // A GID allocated above stays allocated if this fails.
        let path = self.local_path_for(options);
        create_directory(&path, gid).map_err(ProvisionError::DirectoryCreateFailed)?;

        let volume = self.build_volume(options, gid);
        info!(
            "Provisioned volume {} for claim {}/{} at {}",
            volume.name,
            options.pvc.namespace,
            options.pvc.name,
            path.display()
        );
        Ok(volume)
    }

    fn deprovision(&self, volume: &PersistentVolume) -> Result<(), ProvisionError> {
        // Runs before the handle is validated, so a malformed handle still
        // releases the volume's GID.
        self.allocator
            .release(volume)
            .map_err(ProvisionError::GidReleaseFailed)?;

        let csi = match &volume.spec.csi {
            Some(csi) if csi.driver == EFS_CSI_DRIVER_NAME => csi,
            other => {
                let found = other
                    .as_ref()
                    .map(|csi| csi.driver.clone())
                    .unwrap_or_default();
                warn!("Refusing to deprovision volume {} with driver {:?}", volume.name, found);
                return Err(ProvisionError::DriverMismatch {
                    found,
                    expected: EFS_CSI_DRIVER_NAME.to_string(),
                });
            }
        };

        let path = self.resolve_handle(&csi.volume_handle).inspect_err(|e| {
            warn!("Rejected handle of volume {}: {}", volume.name, e);
        })?;

        remove_directory(&path).map_err(ProvisionError::DirectoryRemoveFailed)?;

        info!("Deprovisioned volume {} at {}", volume.name, path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GidError;
    use crate::volume::types::{
        AccessMode, LabelSelector, PersistentVolumeClaim, ReclaimPolicy, StorageClass,
    };
    use std::fs;
    use std::sync::Mutex;
    use tempfile::tempdir;

    /// Hands out GIDs from 5000 upwards and records releases
    #[derive(Default)]
    struct RecordingAllocator {
        next: Mutex<u32>,
        allocated: Mutex<Vec<String>>,
        released: Mutex<Vec<String>>,
        fail_allocate: bool,
    }

    impl GidAllocator for RecordingAllocator {
        fn allocate_next(&self, options: &ProvisionOptions) -> Result<u32, GidError> {
            if self.fail_allocate {
                return Err(GidError::RangeExhausted {
                    class: options.storage_class.name.clone(),
                    min: 0,
                    max: 0,
                });
            }
            let mut next = self.next.lock().unwrap();
            *next += 1;
            self.allocated.lock().unwrap().push(options.pv_name.clone());
            Ok(5000 + *next)
        }

        fn release(&self, volume: &PersistentVolume) -> Result<(), GidError> {
            self.released.lock().unwrap().push(volume.name.clone());
            Ok(())
        }
    }

    fn options(gid_allocate: &str) -> ProvisionOptions {
        let mut parameters = BTreeMap::new();
        parameters.insert("gidAllocate".to_string(), gid_allocate.to_string());
        ProvisionOptions {
            pv_name: "pvc-123456".into(),
            pvc: PersistentVolumeClaim {
                namespace: "my-ns".into(),
                name: "my-pvc".into(),
                access_modes: vec![AccessMode::ReadWriteMany],
                storage_request: "1Mi".into(),
                selector: None,
            },
            storage_class: StorageClass {
                name: "efs-sc".into(),
                parameters,
                reclaim_policy: Some(ReclaimPolicy::Retain),
                mount_options: Some(vec!["something".into(), "something-else".into()]),
            },
        }
    }

    fn provisioner(mount: &str, allocator: Arc<RecordingAllocator>) -> EfsProvisioner {
        EfsProvisioner::new("fs-123456", mount, "/persistentvolumes", allocator)
    }

    #[test]
    fn test_provision_builds_descriptor() {
        let root = tempdir().unwrap();
        let mount = root.path().to_str().unwrap();
        let allocator = Arc::new(RecordingAllocator::default());
        let p = provisioner(mount, allocator.clone());

        let pv = p.provision(&options("false")).unwrap();

        assert_eq!(pv.name, "pvc-123456");
        assert_eq!(pv.spec.persistent_volume_reclaim_policy, ReclaimPolicy::Retain);
        assert_eq!(pv.spec.access_modes, vec![AccessMode::ReadWriteMany]);
        assert_eq!(pv.spec.capacity.get("storage").map(String::as_str), Some("1Mi"));
        assert_eq!(pv.spec.storage_class_name, "efs-sc");
        assert_eq!(pv.spec.mount_options, vec!["something", "something-else"]);
        let csi = pv.spec.csi.as_ref().unwrap();
        assert_eq!(csi.driver, EFS_CSI_DRIVER_NAME);
        assert_eq!(
            csi.volume_handle,
            "fs-123456:/persistentvolumes/my-ns-my-pvc-pvc-123456"
        );
        assert!(pv.annotations.is_empty());
        assert!(allocator.allocated.lock().unwrap().is_empty());
        assert!(
            root.path()
                .join("persistentvolumes/my-ns-my-pvc-pvc-123456")
                .is_dir()
        );
    }

    #[test]
    fn test_provision_with_gid_records_annotation() {
        let root = tempdir().unwrap();
        let mount = root.path().to_str().unwrap();
        let allocator = Arc::new(RecordingAllocator::default());
        let p = provisioner(mount, allocator.clone());

        let mut opts = options("true");
        opts.storage_class.reclaim_policy = None;
        opts.storage_class.mount_options = None;

        // Chown to an arbitrary GID needs privileges; only the allocation
        // and its ordering are checked when running unprivileged.
        match p.provision(&opts) {
            Ok(pv) => {
                assert_eq!(
                    pv.annotations.get(VOLUME_GID_ANNOTATION_KEY).map(String::as_str),
                    Some("5001")
                );
                assert_eq!(pv.spec.persistent_volume_reclaim_policy, ReclaimPolicy::Delete);
                assert!(pv.spec.mount_options.is_empty());
            }
            Err(ProvisionError::DirectoryCreateFailed(_)) => {
                assert!(!p.local_path_for(&opts).exists());
            }
            Err(e) => panic!("unexpected error: {e}"),
        }
        assert_eq!(*allocator.allocated.lock().unwrap(), vec!["pvc-123456"]);
        assert!(allocator.released.lock().unwrap().is_empty());
    }

    #[test]
    fn test_provision_rejects_selector() {
        let allocator = Arc::new(RecordingAllocator::default());
        let p = provisioner("/nonexistent-mount", allocator.clone());
        let mut opts = options("true");
        opts.pvc.selector = Some(LabelSelector::default());

        assert!(matches!(
            p.provision(&opts),
            Err(ProvisionError::SelectorNotSupported)
        ));
        assert!(allocator.allocated.lock().unwrap().is_empty());
    }

    #[test]
    fn test_provision_rejects_bad_parameters_and_names() {
        let allocator = Arc::new(RecordingAllocator::default());
        let p = provisioner("/nonexistent-mount", allocator.clone());

        assert!(matches!(
            p.provision(&options("maybe")),
            Err(ProvisionError::InvalidParameterValue { .. })
        ));

        for (ns, claim, volume) in [("", "c", "v"), ("..", "c", "v"), ("ns", "a/b", "v")] {
            let mut opts = options("false");
            opts.pvc.namespace = ns.into();
            opts.pvc.name = claim.into();
            opts.pv_name = volume.into();
            assert!(matches!(
                p.provision(&opts),
                Err(ProvisionError::InvalidRequest(_))
            ));
        }
        assert!(allocator.allocated.lock().unwrap().is_empty());
    }

    #[test]
    fn test_allocation_failure_aborts_before_create() {
        let root = tempdir().unwrap();
        let allocator = Arc::new(RecordingAllocator {
            fail_allocate: true,
            ..Default::default()
        });
        let p = provisioner(root.path().to_str().unwrap(), allocator);
        let opts = options("true");

        assert!(matches!(
            p.provision(&opts),
            Err(ProvisionError::GidAllocationFailed(_))
        ));
        assert!(!p.local_path_for(&opts).exists());
    }

    #[test]
    fn test_create_failure_keeps_allocated_gid() {
        let root = tempdir().unwrap();
        fs::write(root.path().join("persistentvolumes"), b"not a directory").unwrap();
        let allocator = Arc::new(RecordingAllocator::default());
        let p = provisioner(root.path().to_str().unwrap(), allocator.clone());

        assert!(matches!(
            p.provision(&options("true")),
            Err(ProvisionError::DirectoryCreateFailed(_))
        ));
        assert_eq!(allocator.allocated.lock().unwrap().len(), 1);
        assert!(allocator.released.lock().unwrap().is_empty());
    }

    #[test]
    fn test_deprovision_removes_directory() {
        let root = tempdir().unwrap();
        let allocator = Arc::new(RecordingAllocator::default());
        let p = provisioner(root.path().to_str().unwrap(), allocator.clone());
        let opts = options("false");

        let pv = p.provision(&opts).unwrap();
        p.deprovision(&pv).unwrap();

        assert!(!p.local_path_for(&opts).exists());
        assert!(root.path().join("persistentvolumes").is_dir());
        assert_eq!(*allocator.released.lock().unwrap(), vec!["pvc-123456"]);

        p.deprovision(&pv).unwrap();
    }

    #[test]
    fn test_deprovision_releases_before_validating_handle() {
        let root = tempdir().unwrap();
        let allocator = Arc::new(RecordingAllocator::default());
        let p = provisioner(root.path().to_str().unwrap(), allocator.clone());

        let mut pv = p.provision(&options("false")).unwrap();
        pv.spec.csi.as_mut().unwrap().volume_handle = "fs-123456:/persistentvolumes/..".into();

        assert!(matches!(
            p.deprovision(&pv),
            Err(ProvisionError::Handle(PathError::InvalidSubpath(_)))
        ));
        assert_eq!(allocator.released.lock().unwrap().len(), 1);
        assert!(root.path().join("persistentvolumes").is_dir());
    }

    #[test]
    fn test_deprovision_rejects_foreign_driver() {
        let root = tempdir().unwrap();
        let allocator = Arc::new(RecordingAllocator::default());
        let p = provisioner(root.path().to_str().unwrap(), allocator);

        let mut pv = p.provision(&options("false")).unwrap();
        pv.spec.csi.as_mut().unwrap().driver = "efs.something".into();
        assert!(matches!(
            p.deprovision(&pv),
            Err(ProvisionError::DriverMismatch { .. })
        ));

        pv.spec.csi = None;
        assert!(matches!(
            p.deprovision(&pv),
            Err(ProvisionError::DriverMismatch { .. })
        ));
        assert!(p.local_path_for(&options("false")).is_dir());
    }
}
