//! LogicalVolume Custom Resource Definition
//!
//! A LogicalVolume describes one LVM logical volume on a specific node. The
//! spec is written by the provisioning path; the status is owned by the
//! node-local controller in this crate.

use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use kube::{CustomResource, CustomResourceExt, ResourceExt};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::schema::SchemaGroup;
use super::types::{Condition, ConditionType, SnapshotStatus, StatusCode};
use crate::Error;

/// Specification for a LogicalVolume
#[derive(CustomResource, Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "topolvm.io",
    version = "v1",
    kind = "LogicalVolume",
    plural = "logicalvolumes",
    shortname = "lv",
    status = "LogicalVolumeStatus",
    printcolumn = r#"{"name":"Node","type":"string","jsonPath":".spec.nodeName"}"#,
    printcolumn = r#"{"name":"Size","type":"string","jsonPath":".spec.size"}"#,
    printcolumn = r#"{"name":"VolumeID","type":"string","jsonPath":".status.volumeID"}"#,
    printcolumn = r#"{"name":"Code","type":"string","jsonPath":".status.code"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct LogicalVolumeSpec {
    /// Volume name as known to the volume plugin (e.g. `pvc-<uid>` or `snapshot-<uid>`)
    pub name: String,

    /// Node that owns the volume group this volume is carved from
    pub node_name: String,

    /// Requested size
    pub size: Quantity,

    /// Device class (maps to one volume group)
    #[serde(default)]
    pub device_class: String,

    /// Named set of extra lvcreate options
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lvcreate_option_class: Option<String>,

    /// Name of the LogicalVolume this one is a snapshot of
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,

    /// Access type of a snapshot volume: `ro` or `rw`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_type: Option<String>,
}

/// Status for a LogicalVolume
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LogicalVolumeStatus {
    /// Identifier of the backing LV; empty until the LV is confirmed to exist
    #[serde(default, rename = "volumeID")]
    pub volume_id: String,

    /// Outcome code of the last operation
    #[serde(default)]
    pub code: StatusCode,

    /// Human-readable outcome message of the last operation
    #[serde(default)]
    pub message: String,

    /// Last known actual size; absent when unknown
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_size: Option<Quantity>,

    /// Snapshot workflow sub-step conditions
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,

    /// Backup / restore workflow progress
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<SnapshotStatus>,
}

impl LogicalVolumeStatus {
    /// Find a condition by type
    pub fn condition(&self, type_: ConditionType) -> Option<&Condition> {
        self.conditions.iter().find(|c| c.type_ == type_.as_str())
    }

    /// Record a remote or local failure in `code`/`message`
    pub fn record_error(&mut self, code: StatusCode, message: impl Into<String>) {
        self.code = code;
        self.message = message.into();
    }

    /// Clear the error fields after a successful operation
    pub fn clear_error(&mut self) {
        self.code = StatusCode::Ok;
        self.message.clear();
    }
}

/// Access type of a snapshot volume
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AccessType {
    /// Read-only snapshot
    ReadOnly,
    /// Writable snapshot
    ReadWrite,
}

impl AccessType {
    /// Parse the `spec.accessType` value
    pub fn parse(value: Option<&str>) -> Result<Self, Error> {
        match value {
            Some("ro") => Ok(Self::ReadOnly),
            Some("rw") => Ok(Self::ReadWrite),
            Some(other) => Err(Error::validation(format!(
                "invalid access type '{}' for snapshot volume, expected 'ro' or 'rw'",
                other
            ))),
            None => Err(Error::validation(
                "access type is required for a snapshot volume",
            )),
        }
    }

    /// Value sent to the volume-management service
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ReadOnly => "ro",
            Self::ReadWrite => "rw",
        }
    }
}

impl LogicalVolume {
    /// Backing LV identifier, empty when the LV has not been confirmed yet
    pub fn volume_id(&self) -> &str {
        self.status
            .as_ref()
            .map(|s| s.volume_id.as_str())
            .unwrap_or_default()
    }

    /// Last recorded status code, `OK` when there is no status yet
    pub fn status_code(&self) -> StatusCode {
        self.status.as_ref().map(|s| s.code).unwrap_or_default()
    }

    /// Snapshot workflow status, if any
    pub fn snapshot_status(&self) -> Option<&SnapshotStatus> {
        self.status.as_ref().and_then(|s| s.snapshot.as_ref())
    }

    /// Find a condition by type
    pub fn condition(&self, type_: ConditionType) -> Option<&Condition> {
        self.status.as_ref().and_then(|s| s.condition(type_))
    }

    /// Immutable identifier used as the LV name on the node
    pub fn uid_or_err(&self) -> Result<String, Error> {
        self.uid()
            .ok_or_else(|| Error::validation(format!("{} has no uid", self.name_any())))
    }

    /// Returns true if the finalizer is present
    pub fn has_finalizer(&self, finalizer: &str) -> bool {
        self.finalizers().iter().any(|f| f == finalizer)
    }

    /// Returns the annotation value for `key`
    pub fn annotation(&self, key: &str) -> Option<&str> {
        self.annotations().get(key).map(String::as_str)
    }

    /// Requested size in bytes
    pub fn requested_size_bytes(&self) -> Result<i64, Error> {
        parse_quantity(&self.spec.size)
    }

    /// Last known size in bytes, `None` when unknown
    pub fn current_size_bytes(&self) -> Result<Option<i64>, Error> {
        self.status
            .as_ref()
            .and_then(|s| s.current_size.as_ref())
            .map(parse_quantity)
            .transpose()
    }
}

/// CRD manifest for the given schema group
///
/// Both groups share the same schema; only the group and CRD name differ.
pub fn crd_for(schema: SchemaGroup) -> CustomResourceDefinition {
    let mut crd = LogicalVolume::crd();
    crd.metadata.name = Some(format!("logicalvolumes.{}", schema.group()));
    crd.spec.group = schema.group().to_string();
    crd
}

const DECIMAL_SUFFIXES: [(&str, u32); 6] =
    [("k", 1), ("M", 2), ("G", 3), ("T", 4), ("P", 5), ("E", 6)];
const BINARY_SUFFIXES: [(&str, u32); 6] = [
    ("Ki", 1),
    ("Mi", 2),
    ("Gi", 3),
    ("Ti", 4),
    ("Pi", 5),
    ("Ei", 6),
];

/// Parse a byte quantity such as `1Gi`, `512Mi`, `1.5G` or `1048576`
pub fn parse_quantity(quantity: &Quantity) -> Result<i64, Error> {
    let raw = quantity.0.trim();
    let invalid = || Error::validation(format!("invalid size quantity '{}'", raw));

    let split = raw
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(raw.len());
    let (number, suffix) = raw.split_at(split);

    let multiplier: u128 = if suffix.is_empty() {
        1
    } else if let Some((_, exp)) = BINARY_SUFFIXES.iter().find(|(s, _)| *s == suffix) {
        1024u128.pow(*exp)
    } else if let Some((_, exp)) = DECIMAL_SUFFIXES.iter().find(|(s, _)| *s == suffix) {
        1000u128.pow(*exp)
    } else {
        return Err(invalid());
    };

    let (int_part, frac_part) = number.split_once('.').unwrap_or((number, ""));
    if int_part.is_empty() && frac_part.is_empty() {
        return Err(invalid());
    }

    let int: u128 = if int_part.is_empty() {
        0
    } else {
        int_part.parse().map_err(|_| invalid())?
    };
    let mut total = int.checked_mul(multiplier).ok_or_else(invalid)?;

    if !frac_part.is_empty() {
        let frac: u128 = frac_part.parse().map_err(|_| invalid())?;
        let scale = u32::try_from(frac_part.len())
            .ok()
            .and_then(|len| 10u128.checked_pow(len))
            .ok_or_else(invalid)?;
        let frac_bytes = frac
            .checked_mul(multiplier)
            .ok_or_else(invalid)?
            .div_ceil(scale);
        total = total.checked_add(frac_bytes).ok_or_else(invalid)?;
    }

    i64::try_from(total).map_err(|_| invalid())
}

/// Format a byte count as a quantity, using the largest exact binary suffix
pub fn quantity_from_bytes(bytes: i64) -> Quantity {
    if bytes > 0 {
        for (suffix, exp) in BINARY_SUFFIXES.iter().rev() {
            let unit = 1024i64.pow(*exp);
            if bytes % unit == 0 {
                return Quantity(format!("{}{}", bytes / unit, suffix));
            }
        }
    }
    Quantity(bytes.to_string())
}
