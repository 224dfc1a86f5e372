//! Error types for the LVM operator

use thiserror::Error;

use crate::crd::StatusCode;

/// Main error type for LogicalVolume reconciliation
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Kubernetes API error
    #[error("kubernetes error: {0}")]
    Kube(#[from] kube::Error),

    /// Stale write rejected by the API server
    #[error("conflict: {0}")]
    Conflict(String),

    /// Volume-management service returned a non-OK status
    #[error("volume service error ({code}): {message}")]
    Rpc {
        /// Status code returned by the service
        code: StatusCode,
        /// Status message returned by the service
        message: String,
    },

    /// Validation error for LogicalVolume specs
    #[error("validation error: {0}")]
    Validation(String),

    /// Internal invariant violated
    #[error("internal error: {0}")]
    Internal(String),

    /// Serialization/deserialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Mount or unmount failure
    #[error("mount error: {0}")]
    Mount(String),

    /// Snapshot executor failure
    #[error("executor error: {0}")]
    Executor(String),
}

impl Error {
    /// Create a validation error with the given message
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create an internal error with the given message
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Create a conflict error with the given message
    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    /// Create a serialization error with the given message
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization(msg.into())
    }

    /// Create a mount error with the given message
    pub fn mount(msg: impl Into<String>) -> Self {
        Self::Mount(msg.into())
    }

    /// Create an executor error with the given message
    pub fn executor(msg: impl Into<String>) -> Self {
        Self::Executor(msg.into())
    }

    /// Create an RPC error with an explicit code
    pub fn rpc(code: StatusCode, msg: impl Into<String>) -> Self {
        Self::Rpc {
            code,
            message: msg.into(),
        }
    }

    /// True for optimistic-concurrency failures that a re-fetch can resolve
    pub fn is_conflict(&self) -> bool {
        match self {
            Self::Conflict(_) => true,
            Self::Kube(kube::Error::Api(resp)) => resp.code == 409 && resp.reason != "AlreadyExists",
            _ => false,
        }
    }

    /// True for resource-store failures, which the next pass retries
    ///
    /// These never reach `status.code`; they say nothing about the volume.
    pub fn is_store_error(&self) -> bool {
        matches!(self, Self::Kube(_) | Self::Conflict(_))
    }

    /// True when the target object or volume does not exist
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Rpc { code, .. } => *code == StatusCode::NotFound,
            Self::Kube(kube::Error::Api(resp)) => resp.code == 404,
            _ => false,
        }
    }

    /// True when a create raced with an existing object
    pub fn is_already_exists(&self) -> bool {
        match self {
            Self::Rpc { code, .. } => *code == StatusCode::AlreadyExists,
            Self::Kube(kube::Error::Api(resp)) => resp.code == 409 && resp.reason == "AlreadyExists",
            _ => false,
        }
    }

    /// Code persisted into `status.code` for this error
    ///
    /// Remote failures keep their service code; everything local is Internal.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Rpc { code, .. } => *code,
            _ => StatusCode::Internal,
        }
    }

    /// Message persisted into `status.message` for this error
    pub fn status_message(&self) -> String {
        match self {
            Self::Rpc { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}

impl From<tonic::Status> for Error {
    fn from(status: tonic::Status) -> Self {
        Self::Rpc {
            code: status.code().into(),
            message: status.message().to_string(),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
