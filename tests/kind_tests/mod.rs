//! Integration tests against a kind cluster
//!
//! # Test Organization
//!
//! - `crd_operations`: Stories about creating and reading Sentry resources
//!   through the Kubernetes API
//!
//! - `rollout`: Stories about the reconciler creating real objects on a
//!   cluster through the live client
//!
//! # Running These Tests
//!
//! ```bash
//! cargo test --test kind -- --ignored
//! ```

mod crd_operations;
mod helpers;
