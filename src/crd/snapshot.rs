//! External snapshot resource types
//!
//! Typed structs for the CSI external-snapshotter resources
//! (VolumeSnapshotContent, VolumeSnapshotClass). Only the fields the
//! snapshot context builder reads are modelled.

use std::collections::BTreeMap;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::discovery::ApiResource;
use serde::{Deserialize, Serialize};

use super::schema::{SNAPSHOT_MODE_ONLINE, SNAPSHOT_MODE_PARAMETER};

/// Types with a compile-time known apiVersion and kind
pub trait HasApiResource {
    /// Full API version (e.g., "snapshot.storage.k8s.io/v1")
    const API_VERSION: &'static str;
    /// Resource kind
    const KIND: &'static str;
    /// Lower-case plural resource name
    const PLURAL: &'static str;

    /// Build an ApiResource from the type's constants.
    fn api_resource() -> ApiResource {
        let (group, version) = Self::API_VERSION
            .split_once('/')
            .unwrap_or(("", Self::API_VERSION));
        ApiResource {
            group: group.to_string(),
            version: version.to_string(),
            api_version: Self::API_VERSION.to_string(),
            kind: Self::KIND.to_string(),
            plural: Self::PLURAL.to_string(),
        }
    }
}

// =============================================================================
// VolumeSnapshotContent
// =============================================================================

/// CSI VolumeSnapshotContent (cluster-scoped)
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VolumeSnapshotContent {
    /// Resource metadata
    #[serde(default)]
    pub metadata: ObjectMeta,
    /// Content specification
    #[serde(default)]
    pub spec: VolumeSnapshotContentSpec,
}

impl HasApiResource for VolumeSnapshotContent {
    const API_VERSION: &'static str = "snapshot.storage.k8s.io/v1";
    const KIND: &'static str = "VolumeSnapshotContent";
    const PLURAL: &'static str = "volumesnapshotcontents";
}

/// VolumeSnapshotContent spec
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VolumeSnapshotContentSpec {
    /// CSI driver name
    #[serde(default)]
    pub driver: String,
    /// Delete or Retain
    #[serde(default)]
    pub deletion_policy: String,
    /// Snapshot class used to create this content
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume_snapshot_class_name: Option<String>,
    /// Bound VolumeSnapshot
    #[serde(default)]
    pub volume_snapshot_ref: SnapshotReference,
}

/// Reference from a content to its VolumeSnapshot
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotReference {
    /// VolumeSnapshot name
    #[serde(default)]
    pub name: String,
    /// VolumeSnapshot namespace
    #[serde(default)]
    pub namespace: String,
    /// VolumeSnapshot uid
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
}

// =============================================================================
// VolumeSnapshotClass
// =============================================================================

/// CSI VolumeSnapshotClass (cluster-scoped)
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VolumeSnapshotClass {
    /// Resource metadata
    #[serde(default)]
    pub metadata: ObjectMeta,
    /// CSI driver name
    #[serde(default)]
    pub driver: String,
    /// Delete or Retain
    #[serde(default)]
    pub deletion_policy: String,
    /// Driver-specific parameters
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub parameters: BTreeMap<String, String>,
}

impl HasApiResource for VolumeSnapshotClass {
    const API_VERSION: &'static str = "snapshot.storage.k8s.io/v1";
    const KIND: &'static str = "VolumeSnapshotClass";
    const PLURAL: &'static str = "volumesnapshotclasses";
}

impl VolumeSnapshotClass {
    /// True when the class enables online snapshot (backup/restore) mode
    pub fn is_online(&self) -> bool {
        self.parameters
            .get(SNAPSHOT_MODE_PARAMETER)
            .is_some_and(|mode| mode == SNAPSHOT_MODE_ONLINE)
    }
}
