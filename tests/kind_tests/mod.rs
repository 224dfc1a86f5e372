//! Integration tests for the LVM operator
//!
//! These tests require a Kubernetes cluster (kind) to run and tell the story
//! of how the CSI driver and the node controller share LogicalVolume
//! resources through the API server.
//!
//! - `crd_operations`: Stories about creating, reading, updating, and deleting
//!   LogicalVolume resources, their status subresource and finalizers
//!
//! ```bash
//! cargo test --test kind -- --ignored
//! ```

mod crd_operations;
mod helpers;
