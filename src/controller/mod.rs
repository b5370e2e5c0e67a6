//! Controller for Sentry resources
//!
//! Reconciliation follows the Kubernetes controller pattern: read the Sentry,
//! build the desired objects, and converge the cluster toward them.

mod client;
mod readiness;
mod sentry;
mod validate;

pub use client::{CreateOutcome, SentryKubeClient, SentryKubeClientImpl, FIELD_MANAGER};
pub use readiness::{
    await_job_completion, is_job_complete, is_job_failed, job_failure_message, PollConfig,
    DEFAULT_JOB_TIMEOUT, DEFAULT_POLL_INTERVAL,
};
pub use sentry::{
    error_policy, reconcile, reconcile_key, Context, Outcome, ReconcileConfig,
    DEFAULT_REQUEUE_INTERVAL, DEFAULT_RETRY_INTERVAL, DEFAULT_SLOW_RETRY_INTERVAL,
};
pub use validate::{missing_keys, validate_secret};
