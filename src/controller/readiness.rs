//! Waiting for one-shot Jobs to finish
//!
//! The reconciler blocks on each task Job before moving on, so later phases
//! never start against an unmigrated database. The wait is bounded by a
//! deadline and interrupted by a [`CancellationToken`] on shutdown.

use std::time::Duration;

use k8s_openapi::api::batch::v1::Job;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::client::SentryKubeClient;
use crate::{Error, Result};

/// Default interval between Job status checks
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Default deadline for a single Job to complete
pub const DEFAULT_JOB_TIMEOUT: Duration = Duration::from_secs(600);

/// Polling cadence and deadline for [`await_job_completion`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PollConfig {
    /// Sleep between checks
    pub interval: Duration,
    /// Overall deadline measured from the first check
    pub timeout: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            timeout: DEFAULT_JOB_TIMEOUT,
        }
    }
}

fn has_condition(job: &Job, type_: &str) -> bool {
    job.status
        .as_ref()
        .and_then(|s| s.conditions.as_ref())
        .map(|conditions| {
            conditions
                .iter()
                .any(|c| c.type_ == type_ && c.status == "True")
        })
        .unwrap_or(false)
}

/// Check if a Job has completed successfully
pub fn is_job_complete(job: &Job) -> bool {
    has_condition(job, "Complete")
}

/// Check if a Job has failed
pub fn is_job_failed(job: &Job) -> bool {
    has_condition(job, "Failed")
}

/// Extract the reason and message from a failed Job
pub fn job_failure_message(job: &Job) -> String {
    job.status
        .as_ref()
        .and_then(|s| s.conditions.as_ref())
        .and_then(|conditions| {
            conditions
                .iter()
                .find(|c| c.type_ == "Failed" && c.status == "True")
        })
        .map(|c| match (&c.reason, &c.message) {
            (Some(reason), Some(message)) => format!("{reason}: {message}"),
            (Some(text), None) | (None, Some(text)) => text.clone(),
            (None, None) => "job failed".to_string(),
        })
        .unwrap_or_else(|| "job failed".to_string())
}

/// Poll a Job until it completes
///
/// Checks immediately, then every `config.interval`. Returns
/// - `Ok(())` once the Job reports `Complete=True`
/// - [`Error::TaskFailed`] once it reports `Failed=True`
/// - [`Error::TaskNotFound`] if the Job is gone
/// - [`Error::TaskTimeout`] once `config.timeout` has elapsed
/// - [`Error::Cancelled`] as soon as `cancel` fires
///
/// API errors are returned as-is; retrying them is the caller's business.
pub async fn await_job_completion(
    kube: &dyn SentryKubeClient,
    name: &str,
    namespace: &str,
    config: PollConfig,
    cancel: &CancellationToken,
) -> Result<()> {
    let deadline = Instant::now() + config.timeout;

    loop {
        if cancel.is_cancelled() {
            return Err(Error::cancelled(name));
        }

        let job = kube
            .get_job(name, namespace)
            .await?
            .ok_or_else(|| Error::task_not_found(name, namespace))?;

        if is_job_complete(&job) {
            info!(job = %name, "job completed");
            return Ok(());
        }
        if is_job_failed(&job) {
            return Err(Error::task_failed(
                name,
                namespace,
                job_failure_message(&job),
            ));
        }

        let now = Instant::now();
        if now >= deadline {
            return Err(Error::task_timeout(name, namespace, config.timeout));
        }

        debug!(job = %name, "job not complete yet, waiting");
        tokio::select! {
            _ = cancel.cancelled() => return Err(Error::cancelled(name)),
            _ = tokio::time::sleep(config.interval.min(deadline - now)) => {}
        }
    }
}
