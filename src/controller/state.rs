//! LogicalVolume lifecycle state machine
//!
//! Pure functions from an observed LogicalVolume to the next step of each
//! workflow. The orchestrators perform the effects; everything deciding
//! *which* effect runs lives here and needs no store to test.
//!
//! ```text
//!  NoVolume ──create──► Created ──restore launched──► Restoring ──phase terminal──► Restored
//!                          │
//!                          └──backup launched──► BackingUp ──phase terminal──► BackupCleanup
//!
//!  any ──deletionTimestamp──► Deleting
//! ```

use kube::ResourceExt;

use crate::crd::{ConditionType, LogicalVolume, SnapshotOperation, SnapshotPhase};

/// Message recorded once the LVM snapshot of a finished backup is removed
pub const SNAPSHOT_REMOVED_MESSAGE: &str = "LVM snapshot removed after successful backup";

/// Lifecycle state observed from a LogicalVolume
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VolumeState {
    /// No backing LV confirmed yet
    NoVolume,
    /// Backing LV exists, no snapshot workflow in progress
    Created,
    /// Restore executor launched or pending
    Restoring,
    /// Restore finished (succeeded or failed)
    Restored,
    /// Backup executor launched or pending
    BackingUp,
    /// Backup finished (succeeded or failed), cleanup steps remain or are done
    BackupCleanup,
    /// Deletion requested
    Deleting,
}

impl VolumeState {
    /// Observe the state of `lv`
    pub fn observe(lv: &LogicalVolume) -> Self {
        if lv.metadata.deletion_timestamp.is_some() {
            return Self::Deleting;
        }
        if lv.volume_id().is_empty() {
            return Self::NoVolume;
        }
        match lv.snapshot_status() {
            None => Self::Created,
            Some(s) => match (s.operation, s.phase.is_terminal()) {
                (SnapshotOperation::Restore, false) => Self::Restoring,
                (SnapshotOperation::Restore, true) => Self::Restored,
                (SnapshotOperation::Backup, false) => Self::BackingUp,
                (SnapshotOperation::Backup, true) => Self::BackupCleanup,
            },
        }
    }
}

/// Next step of the restore workflow
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RestoreStep {
    /// Launch the restore executor
    Launch,
    /// Executor already launched; wait for it to report
    AwaitExecutor,
    /// Workflow finished; unmount and clean up the executor
    Cleanup,
    /// Nothing left to do
    Idle,
}

/// Next step of the backup workflow
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BackupStep {
    /// Launch the backup executor
    Launch,
    /// Executor already launched; wait for it to report
    AwaitExecutor,
    /// Workflow finished; unmount and clean up the executor
    CleanupExecutor,
    /// Backup succeeded and executor is cleaned; remove the LVM snapshot
    RemoveSnapshotVolume,
    /// LVM snapshot removed; record the confirmation message
    ConfirmRemoval,
    /// Nothing left to do
    Idle,
}

/// Next step of the deletion path
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeletionStep {
    /// Finalizer already gone
    Released,
    /// Remove the backing LV, launching the repository snapshot delete first
    Release {
        /// Run the snapshot-delete orchestrator before removing the LV
        launch_snapshot_delete: bool,
    },
}

/// Decide the next restore step
///
/// Once an ensured condition exists, true or false, the executor is never
/// launched again.
pub fn plan_restore(lv: &LogicalVolume) -> RestoreStep {
    if lv.snapshot_status().is_some_and(|s| s.phase.is_terminal()) {
        return match lv.condition(ConditionType::RestoreExecutorCleaned) {
            None => RestoreStep::Cleanup,
            Some(_) => RestoreStep::Idle,
        };
    }
    if lv.condition(ConditionType::RestoreExecutorEnsured).is_some() {
        return RestoreStep::AwaitExecutor;
    }
    RestoreStep::Launch
}

/// Decide the next backup step
pub fn plan_backup(lv: &LogicalVolume) -> BackupStep {
    let finished = lv.snapshot_status().filter(|s| s.phase.is_terminal());
    let Some(snapshot) = finished else {
        return match lv.condition(ConditionType::BackupExecutorEnsured) {
            Some(_) => BackupStep::AwaitExecutor,
            None => BackupStep::Launch,
        };
    };

    let executor_cleaned = match lv.condition(ConditionType::BackupExecutorCleaned) {
        None => return BackupStep::CleanupExecutor,
        Some(c) => c.is_true(),
    };
    if !executor_cleaned || snapshot.phase != SnapshotPhase::Succeeded {
        return BackupStep::Idle;
    }

    match lv.condition(ConditionType::BackupSnapshotVolumeCleaned) {
        None => BackupStep::RemoveSnapshotVolume,
        Some(c) if c.is_true() && !removal_confirmed(lv) => BackupStep::ConfirmRemoval,
        Some(_) => BackupStep::Idle,
    }
}

fn removal_confirmed(lv: &LogicalVolume) -> bool {
    lv.status
        .as_ref()
        .is_some_and(|s| s.message == SNAPSHOT_REMOVED_MESSAGE)
}

/// Decide the deletion step
pub fn plan_deletion(lv: &LogicalVolume, finalizer: &str) -> DeletionStep {
    if !lv.has_finalizer(finalizer) {
        return DeletionStep::Released;
    }
    DeletionStep::Release {
        launch_snapshot_delete: needs_snapshot_delete(lv)
            && lv.condition(ConditionType::DeleteExecutorEnsured).is_none(),
    }
}

/// True when a repository snapshot must be deleted with the volume
pub fn needs_snapshot_delete(lv: &LogicalVolume) -> bool {
    lv.snapshot_status()
        .is_some_and(|s| s.has_succeeded_snapshot())
}

/// True when the finalizer may be stripped once the backing LV is removed
pub fn can_release_finalizer(lv: &LogicalVolume) -> bool {
    !needs_snapshot_delete(lv)
        || lv
            .condition(ConditionType::DeleteExecutorEnsured)
            .is_some_and(|c| c.is_true())
}

/// True when this node owns the volume
pub fn belongs_to_node(lv: &LogicalVolume, node_name: &str) -> bool {
    lv.spec.node_name == node_name
}

/// True when the node-cleanup path has taken over this volume
pub fn is_pending_deletion(lv: &LogicalVolume, annotation: &str) -> bool {
    lv.annotations().contains_key(annotation)
}
