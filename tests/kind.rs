//! End-to-end integration tests for the LVM operator
//!
//! These tests require a Kubernetes cluster to run. They are ignored by default
//! and can be run with:
//!
//! ```bash
//! cargo test --test kind -- --ignored
//! ```
//!
//! The current kubeconfig context is used; the LogicalVolume CRD is applied
//! before each story.

mod kind_tests;
