//! Backup orchestration
//!
//! Copies an online snapshot volume out to the backup repository. The volume
//! is mounted read-only without journal replay, a backup executor is launched
//! once, and after it reports a terminal phase the executor is cleaned up.
//! A successful backup finally removes the LVM snapshot volume.

use kube::ResourceExt;
use tracing::{debug, info, instrument, warn};

use super::conditions::{record_condition, record_outcome, update_status};
use super::context::Context;
use super::outcome::Outcome;
use super::state::{plan_backup, BackupStep, SNAPSHOT_REMOVED_MESSAGE};
use crate::crd::{ConditionType, LogicalVolume, SnapshotOperation, SnapshotStatus};
use crate::executor::{ExecutorKind, ExecutorRequest};
use crate::mount::MountOptions;
use crate::snapshot::SnapshotContext;
use crate::Error;

/// Drive the backup workflow one step
#[instrument(skip(ctx, lv, snapshot), fields(lv = %lv.name_any()))]
pub async fn run_backup(
    ctx: &Context,
    lv: &LogicalVolume,
    snapshot: &SnapshotContext,
) -> Result<Outcome, Error> {
    let name = lv.name_any();
    match plan_backup(lv) {
        BackupStep::Launch => launch(ctx, lv, snapshot).await,
        BackupStep::AwaitExecutor => {
            debug!("Backup executor running");
            Ok(Outcome::Done)
        }
        BackupStep::CleanupExecutor => {
            let result = cleanup_executor(ctx, lv).await;
            if let Err(e) = &result {
                warn!(error = %e, "Backup executor cleanup failed");
            }
            record_condition(ctx, &name, ConditionType::BackupExecutorCleaned, &result).await?;
            Ok(Outcome::RetryAfter(ctx.config.requeue_after))
        }
        BackupStep::RemoveSnapshotVolume => {
            let result = remove_snapshot_volume(ctx, lv).await;
            record_outcome(ctx, &name, ConditionType::BackupSnapshotVolumeCleaned, result).await?;
            Ok(Outcome::RetryAfter(ctx.config.requeue_after))
        }
        BackupStep::ConfirmRemoval => {
            update_status(ctx, &name, |status| {
                status.message = SNAPSHOT_REMOVED_MESSAGE.to_string();
            })
            .await?;
            Ok(Outcome::Done)
        }
        BackupStep::Idle => Ok(Outcome::Done),
    }
}

async fn launch(
    ctx: &Context,
    lv: &LogicalVolume,
    snapshot: &SnapshotContext,
) -> Result<Outcome, Error> {
    let name = lv.name_any();
    let lv = update_status(ctx, &name, |status| {
        if status.snapshot.is_none() {
            status.snapshot = Some(SnapshotStatus::pending(SnapshotOperation::Backup));
        }
    })
    .await?;

    let result = async {
        let mount = ctx
            .mounter
            .mount(&lv, &MountOptions::read_only_no_recovery())
            .await?;
        let request = ExecutorRequest::new(ExecutorKind::Backup, lv.clone())
            .with_mount(mount)
            .with_snapshot(snapshot.content.clone(), snapshot.class.clone());
        ctx.executors.executor(request).execute().await
    }
    .await;
    record_outcome(ctx, &name, ConditionType::BackupExecutorEnsured, result).await?;

    info!("Backup executor launched");
    Ok(Outcome::Done)
}

async fn cleanup_executor(ctx: &Context, lv: &LogicalVolume) -> Result<(), Error> {
    ctx.mounter.unmount(lv).await?;
    let request = ExecutorRequest::new(ExecutorKind::Cleanup(SnapshotOperation::Backup), lv.clone());
    ctx.executors.executor(request).execute().await
}

async fn remove_snapshot_volume(ctx: &Context, lv: &LogicalVolume) -> Result<(), Error> {
    match ctx
        .volumes
        .remove_volume(lv.volume_id(), &lv.spec.device_class)
        .await
    {
        Ok(()) => {
            info!(volume_id = %lv.volume_id(), "Removed LVM snapshot volume after backup");
            Ok(())
        }
        Err(e) if e.is_not_found() => Ok(()),
        Err(e) => Err(e),
    }
}
