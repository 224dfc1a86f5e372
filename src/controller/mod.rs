//! LogicalVolume controller
//!
//! Reconciliation logic for the LogicalVolumes of one node. The dispatcher
//! routes each pass; the workflows it drives are decided by the pure state
//! machine in [`state`] and carried out by the orchestrators.

mod backup;
mod client;
mod conditions;
mod context;
mod deletion;
mod dispatcher;
mod outcome;
mod restore;
pub mod state;
mod volume;

#[cfg(test)]
mod testing;

#[cfg(test)]
pub use client::MockKubeClient;
pub use client::{normalize, KubeClient, KubeStore, FIELD_MANAGER};
pub use conditions::{set_condition, update_metadata, update_status};
pub use context::{Context, ContextBuilder, ControllerConfig};
pub use dispatcher::{error_policy, reconcile, reconcile_volume};
pub use outcome::Outcome;
pub use state::{belongs_to_node, VolumeState};
