//! Resource store access for the controller
//!
//! LogicalVolumes are read and written through `DynamicObject` with the
//! ApiResource of the configured [`SchemaGroup`], then normalized into the
//! typed [`LogicalVolume`]. Everything above this module is group-agnostic.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::PersistentVolume;
use kube::api::{Api, DynamicObject, Patch, PatchParams};
use kube::{Client, ResourceExt};
use serde::de::DeserializeOwned;

#[cfg(test)]
use mockall::automock;

use crate::crd::{
    HasApiResource, LogicalVolume, SchemaGroup, VolumeSnapshotClass, VolumeSnapshotContent,
};
use crate::Error;

/// Field manager recorded on every write
pub const FIELD_MANAGER: &str = "lvm-operator";

/// Trait abstracting Kubernetes client operations for testability
#[cfg_attr(test, automock)]
#[async_trait]
pub trait KubeClient: Send + Sync {
    /// Fetch a LogicalVolume by name, `None` when it does not exist
    async fn get_logical_volume(&self, name: &str) -> Result<Option<LogicalVolume>, Error>;

    /// Write finalizers, labels and annotations of `lv`
    ///
    /// The write is conditional on `lv`'s resourceVersion; a stale copy
    /// fails with a conflict.
    async fn patch_logical_volume_metadata(
        &self,
        lv: &LogicalVolume,
    ) -> Result<LogicalVolume, Error>;

    /// Write the status of `lv`, conditional on its resourceVersion
    async fn patch_logical_volume_status(&self, lv: &LogicalVolume)
        -> Result<LogicalVolume, Error>;

    /// True when the named PersistentVolume exists
    async fn persistent_volume_exists(&self, name: &str) -> Result<bool, Error>;

    /// Fetch a VolumeSnapshotContent by name
    async fn get_volume_snapshot_content(
        &self,
        name: &str,
    ) -> Result<Option<VolumeSnapshotContent>, Error>;

    /// Fetch a VolumeSnapshotClass by name
    async fn get_volume_snapshot_class(
        &self,
        name: &str,
    ) -> Result<Option<VolumeSnapshotClass>, Error>;
}

/// Real Kubernetes client implementation
pub struct KubeStore {
    volumes: Api<DynamicObject>,
    persistent_volumes: Api<PersistentVolume>,
    contents: Api<DynamicObject>,
    classes: Api<DynamicObject>,
}

impl KubeStore {
    /// Create a store for LogicalVolumes of `schema`
    pub fn new(client: Client, schema: SchemaGroup) -> Self {
        Self {
            volumes: Api::all_with(client.clone(), &schema.api_resource()),
            persistent_volumes: Api::all(client.clone()),
            contents: Api::all_with(client.clone(), &VolumeSnapshotContent::api_resource()),
            classes: Api::all_with(client, &VolumeSnapshotClass::api_resource()),
        }
    }

    async fn patch_volume(
        &self,
        lv: &LogicalVolume,
        body: serde_json::Value,
        status: bool,
    ) -> Result<LogicalVolume, Error> {
        let name = lv.name_any();
        let params = PatchParams::apply(FIELD_MANAGER);
        let patch = Patch::Merge(&body);
        let obj = if status {
            self.volumes.patch_status(&name, &params, &patch).await
        } else {
            self.volumes.patch(&name, &params, &patch).await
        }
        .map_err(conflict_aware)?;
        normalize(obj)
    }
}

#[async_trait]
impl KubeClient for KubeStore {
    async fn get_logical_volume(&self, name: &str) -> Result<Option<LogicalVolume>, Error> {
        self.volumes.get_opt(name).await?.map(normalize).transpose()
    }

    async fn patch_logical_volume_metadata(
        &self,
        lv: &LogicalVolume,
    ) -> Result<LogicalVolume, Error> {
        let body = serde_json::json!({
            "metadata": {
                "resourceVersion": lv.resource_version(),
                "finalizers": lv.finalizers(),
                "labels": lv.labels(),
                "annotations": lv.annotations(),
            }
        });
        self.patch_volume(lv, body, false).await
    }

    async fn patch_logical_volume_status(
        &self,
        lv: &LogicalVolume,
    ) -> Result<LogicalVolume, Error> {
        let body = serde_json::json!({
            "metadata": { "resourceVersion": lv.resource_version() },
            "status": lv.status,
        });
        self.patch_volume(lv, body, true).await
    }

    async fn persistent_volume_exists(&self, name: &str) -> Result<bool, Error> {
        Ok(self.persistent_volumes.get_opt(name).await?.is_some())
    }

    async fn get_volume_snapshot_content(
        &self,
        name: &str,
    ) -> Result<Option<VolumeSnapshotContent>, Error> {
        self.contents.get_opt(name).await?.map(normalize).transpose()
    }

    async fn get_volume_snapshot_class(
        &self,
        name: &str,
    ) -> Result<Option<VolumeSnapshotClass>, Error> {
        self.classes.get_opt(name).await?.map(normalize).transpose()
    }
}

/// Convert a dynamic object into its typed form
pub fn normalize<T: DeserializeOwned>(obj: DynamicObject) -> Result<T, Error> {
    let value = serde_json::to_value(obj)?;
    Ok(serde_json::from_value(value)?)
}

// A resourceVersion precondition failure comes back as 409 Conflict
fn conflict_aware(err: kube::Error) -> Error {
    match &err {
        kube::Error::Api(resp) if resp.code == 409 && resp.reason == "Conflict" => {
            Error::conflict(resp.message.clone())
        }
        _ => Error::Kube(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::StatusCode;

    fn dynamic_lv(api_version: &str) -> DynamicObject {
        serde_json::from_value(serde_json::json!({
            "apiVersion": api_version,
            "kind": "LogicalVolume",
            "metadata": {
                "name": "pvc-1",
                "uid": "uid-1",
                "resourceVersion": "42",
                "finalizers": ["topolvm.cybozu.com/logicalvolume"]
            },
            "spec": {
                "name": "pvc-1",
                "nodeName": "node-a",
                "size": "1Gi",
                "deviceClass": "ssd"
            },
            "status": {
                "volumeID": "uid-1",
                "code": "OK",
                "message": "",
                "currentSize": "1Gi"
            }
        }))
        .unwrap()
    }

    #[test]
    fn legacy_objects_normalize_into_the_typed_volume() {
        let lv: LogicalVolume = normalize(dynamic_lv("topolvm.cybozu.com/v1")).unwrap();
        assert_eq!(lv.name_any(), "pvc-1");
        assert_eq!(lv.spec.node_name, "node-a");
        assert_eq!(lv.volume_id(), "uid-1");
        assert_eq!(lv.status_code(), StatusCode::Ok);
        assert!(lv.has_finalizer("topolvm.cybozu.com/logicalvolume"));
        assert_eq!(lv.resource_version().as_deref(), Some("42"));
    }

    #[test]
    fn current_objects_normalize_into_the_typed_volume() {
        let lv: LogicalVolume = normalize(dynamic_lv("topolvm.io/v1")).unwrap();
        assert_eq!(lv.current_size_bytes().unwrap(), Some(1 << 30));
    }

    #[test]
    fn malformed_objects_are_serialization_errors() {
        let obj: DynamicObject = serde_json::from_value(serde_json::json!({
            "apiVersion": "topolvm.io/v1",
            "kind": "LogicalVolume",
            "metadata": { "name": "broken" },
            "spec": { "nodeName": 7 }
        }))
        .unwrap();
        let result: Result<LogicalVolume, Error> = normalize(obj);
        assert!(matches!(result, Err(Error::Serialization(_))));
    }

    #[test]
    fn resource_version_conflicts_become_conflict_errors() {
        let err = conflict_aware(kube::Error::Api(kube::core::ErrorResponse {
            status: "Failure".to_string(),
            message: "the object has been modified".to_string(),
            reason: "Conflict".to_string(),
            code: 409,
        }));
        assert!(matches!(err, Error::Conflict(_)));
        assert!(err.is_conflict());

        let err = conflict_aware(kube::Error::Api(kube::core::ErrorResponse {
            status: "Failure".to_string(),
            message: "not found".to_string(),
            reason: "NotFound".to_string(),
            code: 404,
        }));
        assert!(err.is_not_found());
    }
}
