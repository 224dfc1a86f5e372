//! Shared status types for LogicalVolume resources

use std::fmt;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Outcome code of the last volume operation
///
/// Mirrors the gRPC status-code taxonomy used by the volume-management
/// service so remote failures can be recorded without translation.
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub enum StatusCode {
    /// Operation completed successfully
    #[default]
    #[serde(rename = "OK")]
    Ok,
    /// Operation was cancelled
    Cancelled,
    /// Unknown error
    Unknown,
    /// Client specified an invalid argument
    InvalidArgument,
    /// Deadline expired before the operation could complete
    DeadlineExceeded,
    /// Requested entity was not found
    NotFound,
    /// Entity already exists
    AlreadyExists,
    /// Caller lacks permission
    PermissionDenied,
    /// Some resource (e.g. free extents) has been exhausted
    ResourceExhausted,
    /// System is not in a state required for the operation
    FailedPrecondition,
    /// Operation was aborted
    Aborted,
    /// Operation was attempted past the valid range
    OutOfRange,
    /// Operation is not implemented
    Unimplemented,
    /// Internal error
    Internal,
    /// Service is currently unavailable
    Unavailable,
    /// Unrecoverable data loss or corruption
    DataLoss,
    /// Request lacks valid authentication credentials
    Unauthenticated,
}

impl StatusCode {
    /// Returns true for the success code
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok)
    }
}

impl From<tonic::Code> for StatusCode {
    fn from(code: tonic::Code) -> Self {
        match code {
            tonic::Code::Ok => Self::Ok,
            tonic::Code::Cancelled => Self::Cancelled,
            tonic::Code::Unknown => Self::Unknown,
            tonic::Code::InvalidArgument => Self::InvalidArgument,
            tonic::Code::DeadlineExceeded => Self::DeadlineExceeded,
            tonic::Code::NotFound => Self::NotFound,
            tonic::Code::AlreadyExists => Self::AlreadyExists,
            tonic::Code::PermissionDenied => Self::PermissionDenied,
            tonic::Code::ResourceExhausted => Self::ResourceExhausted,
            tonic::Code::FailedPrecondition => Self::FailedPrecondition,
            tonic::Code::Aborted => Self::Aborted,
            tonic::Code::OutOfRange => Self::OutOfRange,
            tonic::Code::Unimplemented => Self::Unimplemented,
            tonic::Code::Internal => Self::Internal,
            tonic::Code::Unavailable => Self::Unavailable,
            tonic::Code::DataLoss => Self::DataLoss,
            tonic::Code::Unauthenticated => Self::Unauthenticated,
        }
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Ok => "OK",
            Self::Cancelled => "Cancelled",
            Self::Unknown => "Unknown",
            Self::InvalidArgument => "InvalidArgument",
            Self::DeadlineExceeded => "DeadlineExceeded",
            Self::NotFound => "NotFound",
            Self::AlreadyExists => "AlreadyExists",
            Self::PermissionDenied => "PermissionDenied",
            Self::ResourceExhausted => "ResourceExhausted",
            Self::FailedPrecondition => "FailedPrecondition",
            Self::Aborted => "Aborted",
            Self::OutOfRange => "OutOfRange",
            Self::Unimplemented => "Unimplemented",
            Self::Internal => "Internal",
            Self::Unavailable => "Unavailable",
            Self::DataLoss => "DataLoss",
            Self::Unauthenticated => "Unauthenticated",
        };
        f.write_str(name)
    }
}

/// Condition status following Kubernetes conventions
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub enum ConditionStatus {
    /// Condition is true
    True,
    /// Condition is false
    False,
    /// Condition status is unknown
    #[default]
    Unknown,
}

impl From<bool> for ConditionStatus {
    fn from(value: bool) -> Self {
        if value {
            Self::True
        } else {
            Self::False
        }
    }
}

impl fmt::Display for ConditionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::True => write!(f, "True"),
            Self::False => write!(f, "False"),
            Self::Unknown => write!(f, "Unknown"),
        }
    }
}

/// Named sub-steps of the snapshot workflows recorded as conditions
///
/// Each type is an independent entry in `status.conditions`; recording one
/// never touches another.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ConditionType {
    /// Backup executor was launched (or failed to launch)
    BackupExecutorEnsured,
    /// Backup executor resources were cleaned up
    BackupExecutorCleaned,
    /// The LVM snapshot volume backing a finished backup was removed
    BackupSnapshotVolumeCleaned,
    /// Restore executor was launched (or failed to launch)
    RestoreExecutorEnsured,
    /// Restore executor resources were cleaned up
    RestoreExecutorCleaned,
    /// Delete executor was launched (or failed to launch)
    DeleteExecutorEnsured,
}

impl ConditionType {
    /// Wire name stored in `condition.type`
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BackupExecutorEnsured => "BackupExecutorEnsured",
            Self::BackupExecutorCleaned => "BackupExecutorCleaned",
            Self::BackupSnapshotVolumeCleaned => "BackupSnapshotVolumeCleaned",
            Self::RestoreExecutorEnsured => "RestoreExecutorEnsured",
            Self::RestoreExecutorCleaned => "RestoreExecutorCleaned",
            Self::DeleteExecutorEnsured => "DeleteExecutorEnsured",
        }
    }
}

impl fmt::Display for ConditionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kubernetes-style condition for status reporting
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct Condition {
    /// Type of condition (e.g., BackupExecutorEnsured)
    #[serde(rename = "type")]
    pub type_: String,

    /// Status of the condition (True, False, Unknown)
    pub status: ConditionStatus,

    /// Machine-readable reason for the condition
    pub reason: String,

    /// Human-readable message
    #[serde(default)]
    pub message: String,

    /// Last time the condition transitioned
    #[serde(rename = "lastTransitionTime")]
    pub last_transition_time: DateTime<Utc>,
}

impl Condition {
    /// Create a new condition with the current timestamp
    pub fn new(
        type_: ConditionType,
        status: ConditionStatus,
        reason: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            type_: type_.as_str().to_string(),
            status,
            reason: reason.into(),
            message: message.into(),
            last_transition_time: Utc::now(),
        }
    }

    /// Returns true if this condition has status True
    pub fn is_true(&self) -> bool {
        self.status == ConditionStatus::True
    }
}

/// Kind of snapshot workflow recorded in `status.snapshot`
#[derive(Clone, Copy, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotOperation {
    /// Volume contents are being copied out to the backup repository
    Backup,
    /// Volume contents are being populated from the backup repository
    Restore,
}

impl fmt::Display for SnapshotOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Backup => write!(f, "backup"),
            Self::Restore => write!(f, "restore"),
        }
    }
}

/// Phase of a snapshot workflow
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotPhase {
    /// Executor launched, waiting for it to report
    #[default]
    Pending,
    /// Executor reported success
    Succeeded,
    /// Executor reported failure
    Failed,
}

impl SnapshotPhase {
    /// Succeeded and Failed are terminal
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}

impl fmt::Display for SnapshotPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Succeeded => write!(f, "succeeded"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Error reported by a snapshot executor
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotError {
    /// Machine-readable error code
    #[serde(default)]
    pub code: String,
    /// Human-readable error message
    #[serde(default)]
    pub message: String,
}

/// Progress and outcome of a backup or restore workflow
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotStatus {
    /// Workflow kind
    pub operation: SnapshotOperation,

    /// Current phase
    #[serde(default)]
    pub phase: SnapshotPhase,

    /// Human-readable progress message
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,

    /// Error details when the phase is failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<SnapshotError>,

    /// Identifier of the snapshot in the backup repository
    #[serde(default, rename = "snapshotID", skip_serializing_if = "String::is_empty")]
    pub snapshot_id: String,

    /// When the workflow started
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
}

impl SnapshotStatus {
    /// A freshly started workflow in the pending phase
    pub fn pending(operation: SnapshotOperation) -> Self {
        Self {
            operation,
            phase: SnapshotPhase::Pending,
            message: String::new(),
            error: None,
            snapshot_id: String::new(),
            start_time: Some(Utc::now()),
        }
    }

    /// True when the workflow succeeded and produced a repository snapshot
    pub fn has_succeeded_snapshot(&self) -> bool {
        self.phase == SnapshotPhase::Succeeded && !self.snapshot_id.is_empty()
    }
}
