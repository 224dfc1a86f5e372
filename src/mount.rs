//! Mounting logical volumes for snapshot executors
//!
//! Executors read from or write to a volume's filesystem through a host
//! directory under the configured mount root. The controller mounts the LV
//! there before launching an executor and unmounts it before cleanup.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use kube::ResourceExt;
use nix::errno::Errno;
use nix::mount::MsFlags;
use tracing::{debug, info};

#[cfg(test)]
use mockall::automock;

use crate::crd::LogicalVolume;
use crate::lvmd::VolumeService;
use crate::Error;

/// Options for mounting a logical volume
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MountOptions {
    /// Mount read-only
    pub read_only: bool,
    /// Filesystem-specific options passed as mount data
    pub flags: Vec<String>,
}

impl MountOptions {
    /// Read-write mount with no extra flags (restore target)
    pub fn read_write() -> Self {
        Self::default()
    }

    /// Read-only mount that does not replay the journal (backup source)
    pub fn read_only_no_recovery() -> Self {
        Self {
            read_only: true,
            flags: vec!["norecovery".to_string()],
        }
    }

    /// Generic mount flags for the syscall
    pub fn ms_flags(&self) -> MsFlags {
        if self.read_only {
            MsFlags::MS_RDONLY
        } else {
            MsFlags::empty()
        }
    }

    /// Filesystem data string, `None` when there is nothing to pass
    pub fn data(&self) -> Option<String> {
        (!self.flags.is_empty()).then(|| self.flags.join(","))
    }
}

/// Filesystems volumes are formatted with, tried in order
pub const FILESYSTEMS: &[&str] = &["xfs", "ext4", "btrfs"];

/// Where a volume ended up mounted
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MountResponse {
    /// Block device that was mounted
    pub device_path: String,
    /// Host directory the device is mounted on
    pub mount_path: String,
}

/// Trait abstracting mount management for testability
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Mounter: Send + Sync {
    /// Mount the volume's device; succeeds if it is already mounted
    async fn mount(&self, lv: &LogicalVolume, options: &MountOptions)
        -> Result<MountResponse, Error>;

    /// Unmount the volume; succeeds if it is not mounted
    async fn unmount(&self, lv: &LogicalVolume) -> Result<(), Error>;
}

/// [`Mounter`] issuing mount(2)/umount(2) on the node
pub struct HostMounter {
    volumes: Arc<dyn VolumeService>,
    mount_root: PathBuf,
}

impl HostMounter {
    /// Create a mounter placing mounts under `mount_root`
    pub fn new(volumes: Arc<dyn VolumeService>, mount_root: impl Into<PathBuf>) -> Self {
        Self {
            volumes,
            mount_root: mount_root.into(),
        }
    }

    async fn device_path(&self, lv: &LogicalVolume) -> Result<String, Error> {
        let volume_id = lv.volume_id();
        if volume_id.is_empty() {
            return Err(Error::mount(format!(
                "{} has no backing volume yet",
                lv.name_any()
            )));
        }
        let volumes = self.volumes.list_volumes(&lv.spec.device_class).await?;
        volumes
            .into_iter()
            .find(|v| v.name == volume_id)
            .map(|v| v.path)
            .ok_or_else(|| {
                Error::mount(format!(
                    "volume {} not found in device class '{}'",
                    volume_id, lv.spec.device_class
                ))
            })
    }
}

/// Host directory a LogicalVolume is mounted on
pub fn mount_path(mount_root: &Path, lv: &LogicalVolume) -> Result<PathBuf, Error> {
    Ok(mount_root.join(lv.uid_or_err()?))
}

#[async_trait]
impl Mounter for HostMounter {
    async fn mount(
        &self,
        lv: &LogicalVolume,
        options: &MountOptions,
    ) -> Result<MountResponse, Error> {
        let device_path = self.device_path(lv).await?;
        let target = mount_path(&self.mount_root, lv)?;
        let response = MountResponse {
            device_path: device_path.clone(),
            mount_path: target.display().to_string(),
        };

        if is_mounted(&target).await? {
            debug!(lv = %lv.name_any(), target = %target.display(), "Volume already mounted");
            return Ok(response);
        }

        tokio::fs::create_dir_all(&target)
            .await
            .map_err(|e| Error::mount(format!("create {}: {}", target.display(), e)))?;

        let fs_type = mount_device(&device_path, &target, options)?;
        info!(
            lv = %lv.name_any(),
            device = %device_path,
            target = %target.display(),
            fs_type,
            "Mounted volume"
        );
        Ok(response)
    }

    async fn unmount(&self, lv: &LogicalVolume) -> Result<(), Error> {
        let target = mount_path(&self.mount_root, lv)?;
        if !is_mounted(&target).await? {
            debug!(lv = %lv.name_any(), "Volume not mounted, nothing to unmount");
            return Ok(());
        }

        nix::mount::umount(target.as_path())
            .map_err(|e| Error::mount(format!("umount {}: {}", target.display(), e)))?;

        if let Err(e) = tokio::fs::remove_dir(&target).await {
            debug!(target = %target.display(), error = %e, "Mount directory not removed");
        }
        info!(lv = %lv.name_any(), target = %target.display(), "Unmounted volume");
        Ok(())
    }
}

// EINVAL from mount(2) means the superblock did not match the filesystem
// type, so the next candidate is tried.
fn mount_device(device: &str, target: &Path, options: &MountOptions) -> Result<&'static str, Error> {
    let data = options.data();
    for fs_type in FILESYSTEMS {
        match nix::mount::mount(
            Some(device),
            target,
            Some(*fs_type),
            options.ms_flags(),
            data.as_deref(),
        ) {
            Ok(()) => return Ok(*fs_type),
            Err(Errno::EINVAL) => {
                debug!(device, fs_type, "Filesystem type did not match");
            }
            Err(e) => {
                return Err(Error::mount(format!(
                    "mount {} on {}: {}",
                    device,
                    target.display(),
                    e
                )))
            }
        }
    }
    Err(Error::mount(format!(
        "{} has no filesystem among {:?}",
        device, FILESYSTEMS
    )))
}

async fn is_mounted(target: &Path) -> Result<bool, Error> {
    let mounts = tokio::fs::read_to_string("/proc/self/mounts")
        .await
        .map_err(|e| Error::mount(format!("read /proc/self/mounts: {}", e)))?;
    Ok(mounts_contain(&mounts, target))
}

/// True when `target` is a mount point in a `/proc/self/mounts` listing
fn mounts_contain(mounts: &str, target: &Path) -> bool {
    mounts
        .lines()
        .filter_map(|line| line.split_whitespace().nth(1))
        .any(|mount_point| Path::new(&unescape_mount_field(mount_point)) == target)
}

// /proc/self/mounts escapes space, tab, newline and backslash as octal
fn unescape_mount_field(field: &str) -> String {
    field
        .replace("\\040", " ")
        .replace("\\011", "\t")
        .replace("\\012", "\n")
        .replace("\\134", "\\")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::{LogicalVolumeSpec, LogicalVolumeStatus};
    use crate::lvmd::{MockVolumeService, Volume};
    use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
    use kube::api::ObjectMeta;

    fn lv_with_volume(volume_id: &str) -> LogicalVolume {
        LogicalVolume {
            metadata: ObjectMeta {
                name: Some("snapshot-1".to_string()),
                uid: Some("uid-1".to_string()),
                ..Default::default()
            },
            spec: LogicalVolumeSpec {
                name: "snapshot-1".to_string(),
                node_name: "node-a".to_string(),
                size: Quantity("1Gi".to_string()),
                device_class: "ssd".to_string(),
                lvcreate_option_class: None,
                source: None,
                access_type: None,
            },
            status: Some(LogicalVolumeStatus {
                volume_id: volume_id.to_string(),
                ..Default::default()
            }),
        }
    }

    #[test]
    fn backup_mounts_read_only_without_recovery() {
        let backup = MountOptions::read_only_no_recovery();
        assert_eq!(backup.ms_flags(), MsFlags::MS_RDONLY);
        assert_eq!(backup.data().as_deref(), Some("norecovery"));

        let restore = MountOptions::read_write();
        assert!(restore.ms_flags().is_empty());
        assert_eq!(restore.data(), None);
    }

    #[test]
    fn mount_table_lookup() {
        let table = "\
/dev/sda1 / ext4 rw,relatime 0 0
/dev/ssd/uid-1 /var/lib/lvm-operator/snapshots/uid-1 xfs ro,norecovery 0 0
/dev/ssd/uid-2 /mnt/with\\040space ext4 rw 0 0
";
        assert!(mounts_contain(
            table,
            Path::new("/var/lib/lvm-operator/snapshots/uid-1")
        ));
        assert!(mounts_contain(table, Path::new("/mnt/with space")));
        assert!(!mounts_contain(
            table,
            Path::new("/var/lib/lvm-operator/snapshots/uid-3")
        ));
    }

    #[test]
    fn mount_path_is_keyed_by_uid() {
        let lv = lv_with_volume("uid-1");
        assert_eq!(
            mount_path(Path::new("/mnt/root"), &lv).unwrap(),
            PathBuf::from("/mnt/root/uid-1")
        );
    }

    #[tokio::test]
    async fn device_path_comes_from_volume_listing() {
        let mut volumes = MockVolumeService::new();
        volumes
            .expect_list_volumes()
            .withf(|dc| dc == "ssd")
            .returning(|_| {
                Ok(vec![Volume {
                    name: "uid-1".to_string(),
                    size_bytes: 1 << 30,
                    path: "/dev/ssd/uid-1".to_string(),
                }])
            });
        let mounter = HostMounter::new(Arc::new(volumes), "/mnt/root");

        let path = mounter.device_path(&lv_with_volume("uid-1")).await.unwrap();
        assert_eq!(path, "/dev/ssd/uid-1");
    }

    #[tokio::test]
    async fn mounting_requires_a_backing_volume() {
        let mounter = HostMounter::new(Arc::new(MockVolumeService::new()), "/mnt/root");
        let err = mounter.device_path(&lv_with_volume("")).await.unwrap_err();
        assert!(matches!(err, Error::Mount(_)));
    }

    #[tokio::test]
    async fn unmounting_an_unmounted_volume_succeeds() {
        let mounter = HostMounter::new(Arc::new(MockVolumeService::new()), "/nonexistent/root");
        mounter.unmount(&lv_with_volume("uid-1")).await.unwrap();
    }
}
