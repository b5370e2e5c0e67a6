//! Sentry controller implementation
//!
//! A reconciliation pass converges one Sentry resource in three strictly
//! sequential phases:
//!
//! 1. One-shot Jobs, in order: schema migration, then superuser bootstrap.
//!    Each Job is created once and awaited before the next starts. A Job that
//!    already exists is never recreated.
//! 2. Long-running Deployments (web, worker, cron): created when absent,
//!    replaced when their spec hash or any managed field no longer matches.
//! 3. The web Service: created once, never updated.
//!
//! Nothing is cached between passes. Every pass re-reads the Sentry and
//! rebuilds the desired objects from its spec.

use std::sync::Arc;
use std::time::Duration;

use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::batch::v1::Job;
use k8s_openapi::api::core::v1::Service;
use kube::runtime::controller::Action;
use kube::runtime::reflector::ObjectRef;
use kube::{Client, ResourceExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use super::client::{CreateOutcome, SentryKubeClient, SentryKubeClientImpl};
use super::readiness::{await_job_completion, is_job_complete, PollConfig};
use super::validate::validate_secret;
use crate::crd::{Sentry, SentryPhase, SentryStatus};
use crate::workload::{
    build, deployment_matches, long_running_roles, spec_hash, Instance, Role, TargetObject,
    ONE_SHOT_TASKS,
};
use crate::{Error, Result};

/// Default delay before re-running a pass that changed something
pub const DEFAULT_REQUEUE_INTERVAL: Duration = Duration::from_secs(5);

/// Delay before retrying after a transient failure
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_secs(5);

/// Delay before retrying after a failure that needs user action
///
/// Secrets are not watched, so a fixed secret is only noticed on retry.
pub const DEFAULT_SLOW_RETRY_INTERVAL: Duration = Duration::from_secs(60);

/// Timing knobs for the reconciler
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReconcileConfig {
    /// Job completion polling
    pub poll: PollConfig,
    /// Requeue delay after a pass that created or updated objects
    pub requeue_interval: Duration,
    /// Requeue delay after a retryable error
    pub retry_interval: Duration,
    /// Requeue delay after a non-retryable error
    pub slow_retry_interval: Duration,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            poll: PollConfig::default(),
            requeue_interval: DEFAULT_REQUEUE_INTERVAL,
            retry_interval: DEFAULT_RETRY_INTERVAL,
            slow_retry_interval: DEFAULT_SLOW_RETRY_INTERVAL,
        }
    }
}

/// Controller context
pub struct Context {
    /// Kubernetes client for API operations (trait object for testability)
    pub kube: Arc<dyn SentryKubeClient>,
    /// Timing configuration
    pub config: ReconcileConfig,
    /// Cancelled on shutdown to interrupt Job waits
    pub cancel: CancellationToken,
}

impl Context {
    /// Create a context from any client implementation
    pub fn new(
        kube: Arc<dyn SentryKubeClient>,
        config: ReconcileConfig,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            kube,
            config,
            cancel,
        }
    }

    /// Create a context backed by a real Kubernetes client
    pub fn from_client(client: Client, config: ReconcileConfig, cancel: CancellationToken) -> Self {
        Self::new(Arc::new(SentryKubeClientImpl::new(client)), config, cancel)
    }

    /// Create a context for testing with a mock client and fast polling
    #[cfg(test)]
    pub fn for_testing(kube: Arc<dyn SentryKubeClient>) -> Self {
        Self::new(
            kube,
            ReconcileConfig {
                poll: PollConfig {
                    interval: Duration::from_millis(10),
                    timeout: Duration::from_millis(200),
                },
                ..Default::default()
            },
            CancellationToken::new(),
        )
    }
}

/// Result of a successful reconciliation pass
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// The Sentry no longer exists; nothing was done
    Deleted,
    /// Objects were created or updated; another pass should follow soon
    Progressing,
    /// Every object already existed and matched
    Converged,
}

impl Outcome {
    /// Whether the caller should run another pass soon
    pub fn requeue(self) -> bool {
        matches!(self, Outcome::Progressing)
    }
}

// =============================================================================
// Reconciliation pass
// =============================================================================

/// Run one reconciliation pass for the Sentry identified by `key`
///
/// Safe to call repeatedly and concurrently for different keys. Any error
/// aborts the pass; objects created before the failure stay in place and
/// are picked up by the next pass.
pub async fn reconcile_key(key: &ObjectRef<Sentry>, ctx: &Context) -> Result<Outcome> {
    let namespace = key.namespace.as_deref().ok_or_else(|| Error::MissingNamespace {
        name: key.name.clone(),
    })?;

    let Some(sentry) = ctx.kube.get_sentry(&key.name, namespace).await? else {
        info!(sentry = %key.name, "sentry not found, nothing to do");
        return Ok(Outcome::Deleted);
    };

    let instance = Instance::from_sentry(&sentry)?;
    validate_secret(ctx.kube.as_ref(), &instance.namespace, &instance.spec).await?;

    let mut changed = false;

    for role in ONE_SHOT_TASKS {
        changed |= sync_role(role, &instance, ctx).await?;
    }

    for role in long_running_roles() {
        changed |= sync_role(role, &instance, ctx).await?;
    }

    changed |= sync_role(Role::Exposure, &instance, ctx).await?;

    Ok(if changed {
        Outcome::Progressing
    } else {
        Outcome::Converged
    })
}

/// Converge the object for one role; returns true if it was created or updated
async fn sync_role(role: Role, instance: &Instance, ctx: &Context) -> Result<bool> {
    match build(role, instance)? {
        TargetObject::Job(job) => ensure_task(role, job, instance, ctx).await,
        TargetObject::Deployment(deployment) => {
            ensure_workload(role, deployment, instance, ctx).await
        }
        TargetObject::Service(service) => ensure_exposure(service, instance, ctx).await,
    }
}

/// Create the Job if absent, then wait for it to complete
///
/// A completed Job is left alone. An existing Job that has not completed yet
/// is awaited but never recreated.
async fn ensure_task(role: Role, job: Job, instance: &Instance, ctx: &Context) -> Result<bool> {
    let name = job.name_any();
    let namespace = instance.namespace.as_str();

    let created = match ctx.kube.get_job(&name, namespace).await? {
        Some(existing) if is_job_complete(&existing) => {
            debug!(job = %name, %role, "job already completed");
            return Ok(false);
        }
        Some(_) => {
            info!(job = %name, %role, "job exists but has not completed");
            false
        }
        None => match ctx.kube.create_job(namespace, &job).await? {
            CreateOutcome::Created => {
                info!(job = %name, %role, "created job");
                true
            }
            CreateOutcome::AlreadyExists => {
                debug!(job = %name, %role, "job was created concurrently");
                false
            }
        },
    };

    info!(job = %name, "waiting for job to complete");
    await_job_completion(ctx.kube.as_ref(), &name, namespace, ctx.config.poll, &ctx.cancel)
        .await?;

    Ok(created)
}

/// Create the Deployment if absent, replace it if it has drifted
///
/// Drift is a spec hash that differs from the desired one, or a live object
/// whose managed fields were changed without touching the hash annotation.
async fn ensure_workload(
    role: Role,
    desired: Deployment,
    instance: &Instance,
    ctx: &Context,
) -> Result<bool> {
    let name = desired.name_any();
    let namespace = instance.namespace.as_str();

    let Some(live) = ctx.kube.get_deployment(&name, namespace).await? else {
        return match ctx.kube.create_deployment(namespace, &desired).await? {
            CreateOutcome::Created => {
                info!(deployment = %name, %role, "created deployment");
                Ok(true)
            }
            CreateOutcome::AlreadyExists => {
                debug!(deployment = %name, %role, "deployment was created concurrently");
                Ok(false)
            }
        };
    };

    let hash_matches = spec_hash(&live).is_some() && spec_hash(&live) == spec_hash(&desired);
    if hash_matches && deployment_matches(&live, &desired) {
        debug!(deployment = %name, %role, "deployment up to date");
        return Ok(false);
    }
    if hash_matches {
        info!(deployment = %name, %role, "deployment edited outside the operator");
    }

    let mut replacement = desired;
    replacement.metadata.resource_version = live.metadata.resource_version;
    ctx.kube.replace_deployment(namespace, &replacement).await?;
    info!(deployment = %name, %role, "updated deployment");

    Ok(true)
}

/// Create the Service if absent
async fn ensure_exposure(
    service: Service,
    instance: &Instance,
    ctx: &Context,
) -> Result<bool> {
    let name = service.name_any();
    let namespace = instance.namespace.as_str();

    if ctx.kube.get_service(&name, namespace).await?.is_some() {
        debug!(service = %name, "service already exists");
        return Ok(false);
    }

    match ctx.kube.create_service(namespace, &service).await? {
        CreateOutcome::Created => {
            info!(service = %name, "created service");
            Ok(true)
        }
        CreateOutcome::AlreadyExists => {
            debug!(service = %name, "service was created concurrently");
            Ok(false)
        }
    }
}

// =============================================================================
// Controller entry points
// =============================================================================

/// Reconcile a Sentry resource
///
/// Runs [`reconcile_key`] and records the outcome in the Sentry's status.
#[instrument(skip(sentry, ctx), fields(sentry = %sentry.name_any()))]
pub async fn reconcile(sentry: Arc<Sentry>, ctx: Arc<Context>) -> Result<Action> {
    info!("reconciling sentry");
    let key = ObjectRef::from_obj(sentry.as_ref());

    match reconcile_key(&key, &ctx).await {
        Ok(Outcome::Deleted) => Ok(Action::await_change()),
        Ok(Outcome::Progressing) => {
            let status = SentryStatus::with_phase(SentryPhase::Progressing)
                .message("rolling out sentry components");
            update_status(&sentry, status, &ctx).await?;
            Ok(Action::requeue(ctx.config.requeue_interval))
        }
        Ok(Outcome::Converged) => {
            let status = SentryStatus::with_phase(SentryPhase::Ready)
                .message("all sentry components are up to date");
            update_status(&sentry, status, &ctx).await?;
            Ok(Action::await_change())
        }
        Err(e @ Error::Cancelled { .. }) => {
            info!(error = %e, "reconciliation interrupted by shutdown, status left as is");
            Err(e)
        }
        Err(e) => {
            warn!(error = %e, "reconciliation pass failed");
            let status = SentryStatus::with_phase(SentryPhase::Failed).message(e.to_string());
            if let Err(status_err) = update_status(&sentry, status, &ctx).await {
                warn!(error = %status_err, "failed to record failure in status");
            }
            Err(e)
        }
    }
}

/// Patch the status unless it already says the same thing
async fn update_status(sentry: &Sentry, status: SentryStatus, ctx: &Context) -> Result<()> {
    let status = status.observed_generation(sentry.metadata.generation);
    if sentry.status.as_ref() == Some(&status) {
        debug!("status unchanged");
        return Ok(());
    }

    let namespace = sentry.namespace().ok_or_else(|| Error::MissingNamespace {
        name: sentry.name_any(),
    })?;
    ctx.kube
        .patch_status(&sentry.name_any(), &namespace, &status)
        .await?;
    debug!(phase = %status.phase, "status updated");
    Ok(())
}

/// Error policy for the controller
///
/// Transient failures retry quickly. Failures that need someone to fix the
/// Secret or look at a failed Job retry on a slower schedule.
pub fn error_policy(sentry: Arc<Sentry>, error: &Error, ctx: Arc<Context>) -> Action {
    error!(
        ?error,
        sentry = %sentry.name_any(),
        retryable = error.is_retryable(),
        "reconciliation failed"
    );

    if error.is_retryable() {
        Action::requeue(ctx.config.retry_interval)
    } else {
        Action::requeue(ctx.config.slow_retry_interval)
    }
}
