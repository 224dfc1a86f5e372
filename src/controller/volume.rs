//! Backing LV creation and expansion
//!
//! Both operations talk to the volume-management service and persist their
//! result in status. Remote and validation failures are recorded in
//! `status.code` and `status.message` and then returned so the controller
//! backs off. Resource-store failures are returned without recording; the
//! next pass adopts whatever the interrupted pass created.

use kube::ResourceExt;
use tracing::{debug, info, instrument};

use super::conditions::{record_error, update_metadata, update_status};
use super::context::Context;
use super::outcome::Outcome;
use crate::crd::{quantity_from_bytes, AccessType, LogicalVolume};
use crate::lvmd::Volume;
use crate::Error;

/// Ensure the backing LV exists and record it in status
///
/// A volume already present on the node is adopted rather than recreated.
/// `restore` marks the volume as needing a filesystem restore on first mount.
#[instrument(skip(ctx, lv), fields(lv = %lv.name_any()))]
pub async fn create_volume(ctx: &Context, lv: &LogicalVolume, restore: bool) -> Result<Outcome, Error> {
    if !lv.status_code().is_ok() {
        debug!(code = %lv.status_code(), "Previous create failed, waiting for a spec change");
        return Ok(Outcome::Done);
    }

    let name = lv.name_any();
    let result = ensure_volume(ctx, lv, restore).await;
    match result {
        Ok(Some(volume)) => {
            let volume_id = volume.name.clone();
            let size = quantity_from_bytes(volume.size_bytes);
            update_status(ctx, &name, |status| {
                status.volume_id = volume_id.clone();
                if status.current_size.is_none() {
                    status.current_size = Some(size.clone());
                }
                status.clear_error();
            })
            .await?;
            info!(volume_id = %volume.name, "Backing volume ready");
            Ok(Outcome::Done)
        }
        Ok(None) => Ok(Outcome::RetryAfter(ctx.config.requeue_after)),
        Err(e) if e.is_store_error() => Err(e),
        Err(e) => {
            record_error(ctx, &name, &e).await;
            Err(e)
        }
    }
}

// Ok(None) means the snapshot source is not ready yet
async fn ensure_volume(
    ctx: &Context,
    lv: &LogicalVolume,
    restore: bool,
) -> Result<Option<Volume>, Error> {
    let uid = lv.uid_or_err()?;
    let existing = ctx
        .volumes
        .list_volumes(&lv.spec.device_class)
        .await?
        .into_iter()
        .find(|v| v.name == uid);

    let volume = match existing {
        Some(volume) => {
            info!(volume_id = %uid, "Adopting existing backing volume");
            volume
        }
        None => match create_backing(ctx, lv, &uid, restore).await? {
            Some(volume) => {
                info!(volume_id = %volume.name, size = volume.size_bytes, "Created backing volume");
                volume
            }
            None => return Ok(None),
        },
    };

    if restore {
        let key = ctx.keys.restore_required.clone();
        update_metadata(ctx, &lv.name_any(), |meta| {
            let annotations = meta.annotations.get_or_insert_with(Default::default);
            annotations.insert(key.clone(), "true".to_string()).is_none()
        })
        .await?;
    }
    Ok(Some(volume))
}

async fn create_backing(
    ctx: &Context,
    lv: &LogicalVolume,
    uid: &str,
    restore: bool,
) -> Result<Option<Volume>, Error> {
    let device_class = lv.spec.device_class.as_str();
    let requested = lv.requested_size_bytes()?;

    let volume = match lv.spec.source.as_deref() {
        Some(source_name) if !restore => {
            let access = AccessType::parse(lv.spec.access_type.as_deref())?;
            let Some(source) = ctx.kube.get_logical_volume(source_name).await? else {
                debug!(source = %source_name, "Snapshot source not found yet");
                return Ok(None);
            };
            if source.volume_id().is_empty() {
                debug!(source = %source_name, "Snapshot source has no backing volume yet");
                return Ok(None);
            }
            let source_size = match source.current_size_bytes()? {
                Some(size) => size,
                None => source.requested_size_bytes()?,
            };
            if requested < source_size {
                return Err(Error::internal(format!(
                    "requested size {} is smaller than source volume size {}",
                    requested, source_size
                )));
            }
            ctx.volumes
                .create_snapshot_volume(
                    uid,
                    device_class,
                    source.volume_id(),
                    requested,
                    access.as_str(),
                )
                .await?
        }
        _ => {
            let option_class = lv.spec.lvcreate_option_class.as_deref().unwrap_or_default();
            ctx.volumes
                .create_volume(uid, device_class, requested, option_class)
                .await?
        }
    };
    Ok(Some(volume))
}

/// Grow the backing LV when the requested size exceeds the current size
///
/// An unknown current size is treated as needing a resize.
#[instrument(skip(ctx, lv), fields(lv = %lv.name_any()))]
pub async fn expand_volume(ctx: &Context, lv: &LogicalVolume) -> Result<(), Error> {
    let name = lv.name_any();
    let result = resize(ctx, lv).await;
    match result {
        Ok(None) => Ok(()),
        Ok(Some(size)) => {
            let size = quantity_from_bytes(size);
            update_status(ctx, &name, |status| {
                status.current_size = Some(size.clone());
                status.clear_error();
            })
            .await?;
            Ok(())
        }
        Err(e) if e.is_store_error() => Err(e),
        Err(e) => {
            record_error(ctx, &name, &e).await;
            Err(e)
        }
    }
}

async fn resize(ctx: &Context, lv: &LogicalVolume) -> Result<Option<i64>, Error> {
    let requested = lv.requested_size_bytes()?;
    if let Some(current) = lv.current_size_bytes()? {
        if requested <= current {
            return Ok(None);
        }
    }
    let size = ctx
        .volumes
        .resize_volume(lv.volume_id(), &lv.spec.device_class, requested)
        .await?;
    info!(requested, size, "Expanded backing volume");
    Ok(Some(size))
}
