//! Integration tests for LogicalVolume CRD operations
//!
//! These tests tell the story of how LogicalVolume resources move through the
//! API server: the CSI driver creates them, the node controller records
//! progress in status, and the finalizer holds deletion until storage is
//! released.

use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use kube::api::{Api, DeleteParams, Patch, PatchParams, PostParams};
use kube::{Client, ResourceExt};

use lvm_operator::controller::FIELD_MANAGER;
use lvm_operator::crd::{
    LogicalVolume, LogicalVolumeSpec, SchemaGroup, SnapshotOperation, SnapshotPhase, StatusCode,
};

use super::helpers::ensure_test_cluster;

// =============================================================================
// Test Fixtures
// =============================================================================

fn sample_volume(name: &str) -> LogicalVolume {
    LogicalVolume::new(
        name,
        LogicalVolumeSpec {
            name: name.to_string(),
            node_name: "kind-worker".to_string(),
            size: Quantity("1Gi".to_string()),
            device_class: "ssd".to_string(),
            lvcreate_option_class: None,
            source: None,
            access_type: None,
        },
    )
}

async fn cleanup_volume(client: &Client, name: &str) {
    let api: Api<LogicalVolume> = Api::all(client.clone());
    let _ = api
        .patch(
            name,
            &PatchParams::default(),
            &Patch::Merge(serde_json::json!({ "metadata": { "finalizers": null } })),
        )
        .await;
    let _ = api.delete(name, &DeleteParams::default()).await;
}

// =============================================================================
// Stories
// =============================================================================

/// Story: The CSI driver asks for a new volume
///
/// Expected behavior:
/// - The LogicalVolume is created cluster-scoped
/// - The spec round-trips through the API server unchanged
#[tokio::test]
#[ignore = "requires kind cluster - run with: cargo test --test kind -- --ignored"]
async fn story_csi_driver_creates_logical_volume() {
    let client = ensure_test_cluster()
        .await
        .expect("failed to setup cluster");
    let api: Api<LogicalVolume> = Api::all(client.clone());
    let name = "test-lv-create";
    cleanup_volume(&client, name).await;

    api.create(&PostParams::default(), &sample_volume(name))
        .await
        .expect("failed to create LogicalVolume");

    let fetched = api.get(name).await.expect("failed to get LogicalVolume");
    assert_eq!(fetched.spec.node_name, "kind-worker");
    assert_eq!(fetched.spec.device_class, "ssd");
    assert_eq!(fetched.requested_size_bytes().unwrap(), 1 << 30);
    assert!(fetched.uid().is_some());
    assert!(fetched.status.is_none());

    cleanup_volume(&client, name).await;
}

/// Story: The node controller records the backing volume and a backup
///
/// Expected behavior:
/// - Status writes go through the status subresource
/// - `code` serializes as the upper-case gRPC name and snapshot fields survive
#[tokio::test]
#[ignore = "requires kind cluster - run with: cargo test --test kind -- --ignored"]
async fn story_controller_records_progress_in_status() {
    let client = ensure_test_cluster()
        .await
        .expect("failed to setup cluster");
    let api: Api<LogicalVolume> = Api::all(client.clone());
    let name = "test-lv-status";
    cleanup_volume(&client, name).await;

    let created = api
        .create(&PostParams::default(), &sample_volume(name))
        .await
        .expect("failed to create LogicalVolume");
    let uid = created.uid().unwrap();

    let status = serde_json::json!({
        "status": {
            "volumeID": uid,
            "code": "OK",
            "currentSize": "1Gi",
            "snapshot": {
                "operation": "backup",
                "phase": "succeeded",
                "snapshotID": "repo-1"
            }
        }
    });
    api.patch_status(name, &PatchParams::apply(FIELD_MANAGER), &Patch::Merge(&status))
        .await
        .expect("failed to patch status");

    let fetched = api.get(name).await.expect("failed to get LogicalVolume");
    assert_eq!(fetched.volume_id(), uid);
    assert_eq!(fetched.status_code(), StatusCode::Ok);
    assert_eq!(fetched.current_size_bytes().unwrap(), Some(1 << 30));
    let snapshot = fetched.snapshot_status().unwrap();
    assert_eq!(snapshot.operation, SnapshotOperation::Backup);
    assert_eq!(snapshot.phase, SnapshotPhase::Succeeded);
    assert!(snapshot.has_succeeded_snapshot());

    cleanup_volume(&client, name).await;
}

/// Story: Deleting a volume waits for the controller to release storage
///
/// Expected behavior:
/// - With the finalizer present, delete only sets a deletion timestamp
/// - Removing the finalizer lets the object go
#[tokio::test]
#[ignore = "requires kind cluster - run with: cargo test --test kind -- --ignored"]
async fn story_finalizer_holds_deletion_until_released() {
    let client = ensure_test_cluster()
        .await
        .expect("failed to setup cluster");
    let api: Api<LogicalVolume> = Api::all(client.clone());
    let name = "test-lv-finalizer";
    cleanup_volume(&client, name).await;
    let finalizer = SchemaGroup::Current.keys().finalizer;

    let mut lv = sample_volume(name);
    lv.metadata.finalizers = Some(vec![finalizer.clone()]);
    api.create(&PostParams::default(), &lv)
        .await
        .expect("failed to create LogicalVolume");

    api.delete(name, &DeleteParams::default())
        .await
        .expect("failed to delete LogicalVolume");
    let pending = api.get(name).await.expect("volume should still exist");
    assert!(pending.metadata.deletion_timestamp.is_some());
    assert!(pending.has_finalizer(&finalizer));

    api.patch(
        name,
        &PatchParams::default(),
        &Patch::Merge(serde_json::json!({ "metadata": { "finalizers": null } })),
    )
    .await
    .expect("failed to remove finalizer");

    let gone = api.get_opt(name).await.expect("failed to query volume");
    assert!(gone.is_none());
}
