//! Reconcile dispatcher
//!
//! Entry point handed to the controller runtime. Each pass re-reads the
//! LogicalVolume, routes it to the deletion path or walks the normal path in
//! a fixed order, stopping at the first step that fails or asks for a delay.

use std::sync::Arc;
use std::time::Duration;

use kube::api::DynamicObject;
use kube::runtime::controller::Action;
use kube::ResourceExt;
use tracing::{debug, error, info, instrument};

use super::backup::run_backup;
use super::conditions::update_metadata;
use super::context::Context;
use super::deletion::delete_volume;
use super::outcome::Outcome;
use super::restore::run_restore;
use super::state::{belongs_to_node, is_pending_deletion, VolumeState};
use super::volume::{create_volume, expand_volume};
use crate::crd::{LogicalVolume, CREATED_BY_LABEL, CREATED_BY_VALUE};
use crate::snapshot::{backup_context, restore_context};
use crate::Error;

/// Reconcile a LogicalVolume
///
/// The watched object only supplies the key; the volume is fetched fresh so
/// both schema groups go through the same normalized path.
#[instrument(skip(obj, ctx), fields(lv = %obj.name_any()))]
pub async fn reconcile(obj: Arc<DynamicObject>, ctx: Arc<Context>) -> Result<Action, Error> {
    let outcome = reconcile_volume(&obj.name_any(), &ctx).await?;
    debug!(?outcome, "Reconcile pass finished");
    Ok(outcome.into())
}

/// Run one reconcile pass for the named LogicalVolume
pub async fn reconcile_volume(name: &str, ctx: &Context) -> Result<Outcome, Error> {
    let Some(lv) = ctx.kube.get_logical_volume(name).await? else {
        debug!("LogicalVolume is gone");
        return Ok(Outcome::Done);
    };
    if !belongs_to_node(&lv, &ctx.config.node_name) {
        return Ok(Outcome::Done);
    }

    if is_pending_deletion(&lv, &ctx.keys.pending_deletion) {
        if lv.has_finalizer(&ctx.keys.finalizer) {
            error!(
                finalizer = %ctx.keys.finalizer,
                "Volume is pending deletion but still carries the finalizer"
            );
        }
        return Ok(Outcome::Done);
    }

    if VolumeState::observe(&lv) == VolumeState::Deleting {
        return delete_volume(ctx, &lv).await;
    }
    reconcile_normal(ctx, &lv).await
}

async fn reconcile_normal(ctx: &Context, lv: &LogicalVolume) -> Result<Outcome, Error> {
    let name = lv.name_any();
    let requeue = Outcome::RetryAfter(ctx.config.requeue_after);

    if !lv.has_finalizer(&ctx.keys.finalizer) {
        let finalizer = ctx.keys.finalizer.clone();
        update_metadata(ctx, &name, |meta| {
            let finalizers = meta.finalizers.get_or_insert_with(Vec::new);
            if finalizers.contains(&finalizer) {
                return false;
            }
            finalizers.push(finalizer.clone());
            true
        })
        .await?;
        info!("Added finalizer");
        return Ok(requeue);
    }

    if lv.labels().get(CREATED_BY_LABEL).map(String::as_str) != Some(CREATED_BY_VALUE) {
        update_metadata(ctx, &name, |meta| {
            let labels = meta.labels.get_or_insert_with(Default::default);
            labels
                .insert(CREATED_BY_LABEL.to_string(), CREATED_BY_VALUE.to_string())
                .as_deref()
                != Some(CREATED_BY_VALUE)
        })
        .await?;
        return Ok(requeue);
    }

    let restore = restore_context(lv, ctx.kube.as_ref()).await?;

    if VolumeState::observe(lv) == VolumeState::NoVolume {
        return create_volume(ctx, lv, restore.should_restore).await;
    }

    expand_volume(ctx, lv).await?;

    if restore.should_restore {
        let outcome = run_restore(ctx, lv, &restore).await?;
        if !outcome.is_done() {
            return Ok(outcome);
        }
    }

    let backup = backup_context(lv, ctx.kube.as_ref()).await?;
    if backup.should_backup {
        return run_backup(ctx, lv, &backup).await;
    }
    Ok(Outcome::Done)
}

/// Error policy for the LogicalVolume controller
pub fn error_policy(obj: Arc<DynamicObject>, error: &Error, _ctx: Arc<Context>) -> Action {
    error!(?error, lv = %obj.name_any(), "Reconciliation failed");
    Action::requeue(Duration::from_secs(5))
}
