//! Restore orchestration
//!
//! Populates a freshly created clone from the backup of its source volume.
//! The executor is launched at most once; its outcome lands in
//! `RestoreExecutorEnsured` and the executor itself drives `status.snapshot`
//! to a terminal phase. Cleanup then unmounts and removes the executor.

use kube::ResourceExt;
use tracing::{debug, info, instrument, warn};

use super::conditions::{record_condition, record_outcome, update_status};
use super::context::Context;
use super::outcome::Outcome;
use super::state::{plan_restore, RestoreStep};
use crate::crd::{ConditionType, LogicalVolume, SnapshotOperation, SnapshotStatus};
use crate::executor::{ExecutorKind, ExecutorRequest};
use crate::mount::MountOptions;
use crate::snapshot::SnapshotContext;
use crate::Error;

/// Drive the restore workflow one step
#[instrument(skip(ctx, lv, snapshot), fields(lv = %lv.name_any()))]
pub async fn run_restore(
    ctx: &Context,
    lv: &LogicalVolume,
    snapshot: &SnapshotContext,
) -> Result<Outcome, Error> {
    match plan_restore(lv) {
        RestoreStep::Launch => launch(ctx, lv, snapshot).await,
        RestoreStep::AwaitExecutor => {
            debug!("Restore executor running");
            Ok(Outcome::Done)
        }
        RestoreStep::Cleanup => {
            cleanup(ctx, lv).await?;
            Ok(Outcome::Done)
        }
        RestoreStep::Idle => Ok(Outcome::Done),
    }
}

async fn launch(
    ctx: &Context,
    lv: &LogicalVolume,
    snapshot: &SnapshotContext,
) -> Result<Outcome, Error> {
    let name = lv.name_any();
    if !ctx.kube.persistent_volume_exists(&lv.spec.name).await? {
        debug!(pv = %lv.spec.name, "Waiting for PersistentVolume before restoring");
        return Ok(Outcome::RetryAfter(ctx.config.requeue_after));
    }

    let lv = update_status(ctx, &name, |status| {
        if status.snapshot.is_none() {
            status.snapshot = Some(SnapshotStatus::pending(SnapshotOperation::Restore));
        }
    })
    .await?;

    let result = execute(ctx, &lv, snapshot).await;
    record_outcome(ctx, &name, ConditionType::RestoreExecutorEnsured, result).await?;

    info!(source = ?snapshot.source_name(), "Restore executor launched");
    Ok(Outcome::Done)
}

async fn execute(
    ctx: &Context,
    lv: &LogicalVolume,
    snapshot: &SnapshotContext,
) -> Result<(), Error> {
    let mount = ctx.mounter.mount(lv, &MountOptions::read_write()).await?;
    let request = ExecutorRequest::new(ExecutorKind::Restore, lv.clone())
        .with_mount(mount)
        .with_snapshot(snapshot.content.clone(), snapshot.class.clone())
        .with_source(snapshot.source_name())
        .with_snapshot_id(snapshot.source_snapshot_id());
    ctx.executors.executor(request).execute().await
}

async fn cleanup(ctx: &Context, lv: &LogicalVolume) -> Result<(), Error> {
    let result = async {
        ctx.mounter.unmount(lv).await?;
        let request =
            ExecutorRequest::new(ExecutorKind::Cleanup(SnapshotOperation::Restore), lv.clone());
        ctx.executors.executor(request).execute().await
    }
    .await;
    if let Err(e) = &result {
        warn!(error = %e, "Restore cleanup failed");
    }
    record_condition(ctx, &lv.name_any(), ConditionType::RestoreExecutorCleaned, &result).await?;
    Ok(())
}
