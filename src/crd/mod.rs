//! Custom Resource Definitions for the LVM operator
//!
//! The LogicalVolume CRD owned by this controller plus the external
//! snapshot resources it reads.

mod logical_volume;
mod schema;
mod snapshot;
mod types;

pub use logical_volume::{
    crd_for, parse_quantity, quantity_from_bytes, AccessType, LogicalVolume, LogicalVolumeSpec,
    LogicalVolumeStatus,
};
pub use schema::{
    MetadataKeys, SchemaGroup, CREATED_BY_LABEL, CREATED_BY_VALUE, SNAPSHOT_MODE_ONLINE,
    SNAPSHOT_MODE_PARAMETER,
};
pub use snapshot::{
    HasApiResource, SnapshotReference, VolumeSnapshotClass, VolumeSnapshotContent,
    VolumeSnapshotContentSpec,
};
pub use types::{
    Condition, ConditionStatus, ConditionType, SnapshotError, SnapshotOperation, SnapshotPhase,
    SnapshotStatus, StatusCode,
};
