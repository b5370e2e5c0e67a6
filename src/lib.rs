//! Sentry operator - deploys and upgrades Sentry from a Sentry custom resource
//!
//! A `Sentry` resource names an image, replica counts, database and cache
//! coordinates, and a Secret holding credentials. The operator turns it into:
//! - a schema migration Job and a superuser bootstrap Job, run once each and
//!   awaited in that order
//! - web, worker, and cron Deployments
//! - a Service in front of the web tier
//!
//! Every object carries a controller owner reference to its Sentry, so
//! deleting the Sentry removes everything through garbage collection.
//!
//! # Modules
//!
//! - [`crd`] - The Sentry custom resource and its defaults
//! - [`workload`] - Pure builders for the Jobs, Deployments, and Service
//! - [`controller`] - Reconciliation, secret validation, and Job polling
//! - [`error`] - Error types for the operator

#![deny(missing_docs)]

pub mod controller;
pub mod crd;
pub mod error;
pub mod workload;

pub use error::Error;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;
