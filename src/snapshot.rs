//! Snapshot context resolution
//!
//! Decides whether a LogicalVolume takes part in an online backup or restore.
//! The CSI snapshotter names the LV backing a VolumeSnapshot `snapshot-<id>`
//! and the matching VolumeSnapshotContent `snapcontent-<id>`; the content
//! names the VolumeSnapshotClass whose parameters select the snapshot mode.
//!
//! The context is rebuilt on every pass and never cached.

use kube::ResourceExt;
use tracing::debug;

use crate::controller::KubeClient;
use crate::crd::{LogicalVolume, SnapshotPhase, VolumeSnapshotClass, VolumeSnapshotContent};
use crate::Error;

const SNAPSHOT_VOLUME_PREFIX: &str = "snapshot-";
const SNAPSHOT_CONTENT_PREFIX: &str = "snapcontent-";

/// External snapshot objects related to a LogicalVolume
#[derive(Clone, Debug, Default)]
pub struct SnapshotContext {
    /// Source LogicalVolume (restore context only)
    pub source: Option<LogicalVolume>,
    /// VolumeSnapshotContent the volume belongs to
    pub content: Option<VolumeSnapshotContent>,
    /// VolumeSnapshotClass of that content
    pub class: Option<VolumeSnapshotClass>,
    /// Populate this volume from the source's backup
    pub should_restore: bool,
    /// Copy this volume out to the backup repository
    pub should_backup: bool,
}

impl SnapshotContext {
    /// Repository snapshot id recorded on the source volume
    pub fn source_snapshot_id(&self) -> Option<String> {
        self.source
            .as_ref()
            .and_then(|s| s.snapshot_status())
            .map(|s| s.snapshot_id.clone())
            .filter(|id| !id.is_empty())
    }

    /// Name of the source LogicalVolume
    pub fn source_name(&self) -> Option<String> {
        self.source.as_ref().map(|s| s.name_any())
    }
}

/// VolumeSnapshotContent name for a snapshot-backed volume name
pub fn content_name_for(volume_name: &str) -> Option<String> {
    volume_name
        .strip_prefix(SNAPSHOT_VOLUME_PREFIX)
        .filter(|id| !id.is_empty())
        .map(|id| format!("{}{}", SNAPSHOT_CONTENT_PREFIX, id))
}

/// True when the class enables online snapshot mode
pub fn is_online(class: Option<&VolumeSnapshotClass>) -> bool {
    class.is_some_and(VolumeSnapshotClass::is_online)
}

/// Restore context: is this volume a clone of an online snapshot?
///
/// A missing source, content or class means there is nothing to restore.
pub async fn restore_context(
    lv: &LogicalVolume,
    kube: &dyn KubeClient,
) -> Result<SnapshotContext, Error> {
    let Some(source_name) = lv.spec.source.as_deref() else {
        return Ok(SnapshotContext::default());
    };
    let Some(source) = kube.get_logical_volume(source_name).await? else {
        debug!(lv = %lv.name_any(), source = %source_name, "Source volume not found");
        return Ok(SnapshotContext::default());
    };

    let (content, class) = lookup_snapshot(&source.spec.name, kube).await?;
    let source_ready = source
        .snapshot_status()
        .map_or(true, |s| s.phase == SnapshotPhase::Succeeded);
    let should_restore = source_ready && is_online(class.as_ref());

    Ok(SnapshotContext {
        source: Some(source),
        content,
        class,
        should_restore,
        should_backup: false,
    })
}

/// Backup context: is this volume the target of an online snapshot?
pub async fn backup_context(
    lv: &LogicalVolume,
    kube: &dyn KubeClient,
) -> Result<SnapshotContext, Error> {
    let (content, class) = lookup_snapshot(&lv.spec.name, kube).await?;
    let should_backup = is_online(class.as_ref());

    Ok(SnapshotContext {
        source: None,
        content,
        class,
        should_restore: false,
        should_backup,
    })
}

async fn lookup_snapshot(
    volume_name: &str,
    kube: &dyn KubeClient,
) -> Result<(Option<VolumeSnapshotContent>, Option<VolumeSnapshotClass>), Error> {
    let Some(content_name) = content_name_for(volume_name) else {
        return Ok((None, None));
    };
    let Some(content) = kube.get_volume_snapshot_content(&content_name).await? else {
        return Ok((None, None));
    };
    let class = match content.spec.volume_snapshot_class_name.as_deref() {
        Some(class_name) => kube.get_volume_snapshot_class(class_name).await?,
        None => None,
    };
    Ok((Some(content), class))
}
