//! LVM operator - node-local controller for LVM-backed LogicalVolumes
//!
//! Each node runs one controller instance. It watches LogicalVolume resources,
//! keeps the ones scheduled to its node backed by a real LVM logical volume,
//! expands them on request, drives snapshot backup/restore through executor
//! Jobs, and releases storage before letting a deleted resource go.
//!
//! # Architecture
//!
//! - The volume-management daemon (lvmd) on the node owns the LVM commands;
//!   the controller reaches it over gRPC.
//! - A reconcile pass walks its steps in order and stops at the first one
//!   that fails or waits on an external event. Progress lives in `status`
//!   and conditions, never in memory.
//!
//! # Modules
//!
//! - [`crd`] - LogicalVolume CRD, status types, external snapshot resources
//! - [`controller`] - Reconcile dispatcher, volume engine, snapshot orchestrators
//! - [`lvmd`] - Volume-management service client
//! - [`proto`] - gRPC definitions for the volume-management service
//! - [`mount`] - Mount/unmount of logical volumes for executors
//! - [`executor`] - Backup/restore/delete/cleanup executors run as Jobs
//! - [`snapshot`] - Snapshot context resolution
//! - [`retry`] - Conflict retry for fetch-fresh-then-write updates
//! - [`error`] - Error types for the operator

#![deny(missing_docs)]

pub mod controller;
pub mod crd;
pub mod error;
pub mod executor;
pub mod lvmd;
pub mod mount;
pub mod proto;
pub mod retry;
pub mod snapshot;

pub use error::Error;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

// =============================================================================
// Default Configuration Constants
// =============================================================================

/// Default address of the node-local volume-management daemon
pub const DEFAULT_LVMD_ENDPOINT: &str = "unix:///run/topolvm/lvmd.sock";

/// Default host directory under which volumes are mounted for executors
pub const DEFAULT_MOUNT_ROOT: &str = "/var/lib/lvm-operator/snapshots";

/// Default delay before re-checking an external event (executor, PV binding)
pub const DEFAULT_REQUEUE_SECS: u64 = 1;
