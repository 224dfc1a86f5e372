//! Deletion path
//!
//! Removes the backing LV and releases the finalizer. A volume whose backup
//! produced a repository snapshot first launches a delete executor for it;
//! the finalizer is held until that launch is recorded as successful.

use kube::ResourceExt;
use tracing::{info, instrument, warn};

use super::conditions::{record_condition, update_metadata};
use super::context::Context;
use super::outcome::Outcome;
use super::state::{can_release_finalizer, plan_deletion, DeletionStep};
use crate::crd::{ConditionType, LogicalVolume};
use crate::executor::{ExecutorKind, ExecutorRequest};
use crate::snapshot::backup_context;
use crate::Error;

/// Run the deletion path for a LogicalVolume with a deletion timestamp
#[instrument(skip(ctx, lv), fields(lv = %lv.name_any()))]
pub async fn delete_volume(ctx: &Context, lv: &LogicalVolume) -> Result<Outcome, Error> {
    let launch_snapshot_delete = match plan_deletion(lv, &ctx.keys.finalizer) {
        DeletionStep::Released => return Ok(Outcome::Done),
        DeletionStep::Release {
            launch_snapshot_delete,
        } => launch_snapshot_delete,
    };

    let name = lv.name_any();
    let mut lv = lv.clone();
    if launch_snapshot_delete {
        let result = delete_snapshot(ctx, &lv).await;
        if let Err(e) = &result {
            warn!(error = %e, "Failed to launch repository snapshot delete");
        }
        lv = record_condition(ctx, &name, ConditionType::DeleteExecutorEnsured, &result).await?;
    }

    let uid = lv.uid_or_err()?;
    match ctx.volumes.remove_volume(&uid, &lv.spec.device_class).await {
        Ok(()) => info!(volume_id = %uid, "Removed backing volume"),
        Err(e) if e.is_not_found() => {}
        Err(e) => return Err(e),
    }

    if !can_release_finalizer(&lv) {
        warn!("Repository snapshot delete not confirmed, keeping finalizer");
        return Ok(Outcome::Done);
    }

    let finalizer = ctx.keys.finalizer.clone();
    update_metadata(ctx, &name, |meta| {
        let Some(finalizers) = meta.finalizers.as_mut() else {
            return false;
        };
        let before = finalizers.len();
        finalizers.retain(|f| *f != finalizer);
        finalizers.len() != before
    })
    .await?;
    info!("Released finalizer");
    Ok(Outcome::Done)
}

async fn delete_snapshot(ctx: &Context, lv: &LogicalVolume) -> Result<(), Error> {
    let snapshot = backup_context(lv, ctx.kube.as_ref()).await?;
    ctx.mounter.unmount(lv).await?;
    let snapshot_id = lv.snapshot_status().map(|s| s.snapshot_id.clone());
    let request = ExecutorRequest::new(ExecutorKind::Delete, lv.clone())
        .with_snapshot(snapshot.content, snapshot.class)
        .with_snapshot_id(snapshot_id);
    ctx.executors.executor(request).execute().await
}
