//! Condition tracker and fetch-fresh-then-write helpers
//!
//! Every status or metadata write re-reads the LogicalVolume, applies a
//! mutation to the fresh copy and writes it back conditional on its
//! resourceVersion. Conflicts re-run the whole sequence. A mutation that
//! changes nothing skips the write.

use kube::api::ObjectMeta;
use tracing::debug;

use super::context::Context;
use crate::crd::{Condition, ConditionStatus, ConditionType, LogicalVolume, LogicalVolumeStatus};
use crate::retry::retry_on_conflict;
use crate::Error;

/// Set a condition, keeping its transition time when the status is unchanged
///
/// Returns true when anything changed.
pub fn set_condition(status: &mut LogicalVolumeStatus, condition: Condition) -> bool {
    match status
        .conditions
        .iter_mut()
        .find(|c| c.type_ == condition.type_)
    {
        Some(existing) if existing.status == condition.status => {
            if existing.reason == condition.reason && existing.message == condition.message {
                return false;
            }
            existing.reason = condition.reason;
            existing.message = condition.message;
            true
        }
        Some(existing) => {
            *existing = condition;
            true
        }
        None => {
            status.conditions.push(condition);
            true
        }
    }
}

/// Condition describing the outcome of a workflow step
pub fn outcome_condition(type_: ConditionType, result: &Result<(), Error>) -> Condition {
    match result {
        Ok(()) => Condition::new(type_, ConditionStatus::True, "Succeeded", ""),
        Err(e) => Condition::new(type_, ConditionStatus::False, "Failed", e.to_string()),
    }
}

async fn fetch(ctx: &Context, name: &str) -> Result<LogicalVolume, Error> {
    ctx.kube
        .get_logical_volume(name)
        .await?
        .ok_or_else(|| Error::internal(format!("logical volume {} disappeared", name)))
}

/// Apply `mutate` to the freshest status and write it back
pub async fn update_status<F>(ctx: &Context, name: &str, mutate: F) -> Result<LogicalVolume, Error>
where
    F: Fn(&mut LogicalVolumeStatus),
{
    let mutate = &mutate;
    retry_on_conflict(&ctx.retry, "update_status", move || async move {
        let mut lv = fetch(ctx, name).await?;
        let status = lv.status.get_or_insert_with(Default::default);
        let before = status.clone();
        mutate(status);
        if *status == before {
            debug!(lv = %name, "Status unchanged, skipping write");
            return Ok(lv);
        }
        ctx.kube.patch_logical_volume_status(&lv).await
    })
    .await
}

/// Apply `mutate` to the freshest metadata and write it back
///
/// `mutate` returns false when it made no change.
pub async fn update_metadata<F>(
    ctx: &Context,
    name: &str,
    mutate: F,
) -> Result<LogicalVolume, Error>
where
    F: Fn(&mut ObjectMeta) -> bool,
{
    let mutate = &mutate;
    retry_on_conflict(&ctx.retry, "update_metadata", move || async move {
        let mut lv = fetch(ctx, name).await?;
        if !mutate(&mut lv.metadata) {
            return Ok(lv);
        }
        ctx.kube.patch_logical_volume_metadata(&lv).await
    })
    .await
}

/// Record the outcome of a workflow step as a condition
pub async fn record_condition(
    ctx: &Context,
    name: &str,
    type_: ConditionType,
    result: &Result<(), Error>,
) -> Result<LogicalVolume, Error> {
    let condition = outcome_condition(type_, result);
    update_status(ctx, name, |status| {
        set_condition(status, condition.clone());
    })
    .await
}

/// Record the outcome of a step, then hand back the step's own result
///
/// When the step failed, a failure to record it is logged and the step's
/// error is returned in its place.
pub async fn record_outcome(
    ctx: &Context,
    name: &str,
    type_: ConditionType,
    result: Result<(), Error>,
) -> Result<LogicalVolume, Error> {
    let recorded = record_condition(ctx, name, type_, &result).await;
    match (result, recorded) {
        (Ok(()), recorded) => recorded,
        (Err(primary), Ok(_)) => Err(primary),
        (Err(primary), Err(e)) => {
            tracing::error!(
                lv = %name,
                condition = ?type_,
                error = %e,
                primary = %primary,
                "Failed to record step failure"
            );
            Err(primary)
        }
    }
}

/// Record a failure in `status.code`/`status.message`
///
/// A failure to write is logged and swallowed so it never masks `primary`.
pub async fn record_error(ctx: &Context, name: &str, primary: &Error) {
    let code = primary.status_code();
    let message = primary.status_message();
    if let Err(e) = update_status(ctx, name, |status| status.record_error(code, message.clone())).await
    {
        tracing::error!(
            lv = %name,
            error = %e,
            primary = %primary,
            "Failed to record error in status"
        );
    }
}
