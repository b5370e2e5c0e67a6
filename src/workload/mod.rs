//! Desired-state objects for a Sentry installation
//!
//! A Sentry installation is a fixed topology of six objects, one per [`Role`]:
//! - Migration: Job running `sentry upgrade`
//! - Bootstrap: Job creating the superuser
//! - Web, Worker, Cron: Deployments running the long-lived processes
//! - Exposure: Service in front of the web tier
//!
//! [`build`] turns a role and an [`Instance`] into the object the cluster
//! should hold. It performs no I/O.

pub mod env;
pub mod templates;

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write;

use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::batch::v1::Job;
use k8s_openapi::api::core::v1::Service;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::{Resource, ResourceExt};

use crate::crd::{Sentry, SentrySpec};
use crate::{Error, Result};

pub use templates::{build_deployment, build_job, build_service, deployment_matches};

/// Annotation carrying the hash of the desired Deployment spec
pub const SPEC_HASH_ANNOTATION: &str = "sentry.io/spec-hash";

/// Value of the `app.kubernetes.io/managed-by` label
pub const MANAGED_BY: &str = "sentry-operator";

// =============================================================================
// Roles
// =============================================================================

/// A component of the Sentry topology
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Role {
    /// Database schema migration Job
    Migration,
    /// Superuser bootstrap Job
    Bootstrap,
    /// Web UI Deployment
    Web,
    /// Background worker Deployment
    Worker,
    /// Scheduler Deployment
    Cron,
    /// Service exposing the web UI
    Exposure,
}

/// The kind of object a role is realized as
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ObjectKind {
    /// Run-to-completion Job
    OneShotTask,
    /// Replicated Deployment
    LongRunningWorkload,
    /// Service
    NetworkExposure,
}

/// One-shot tasks in the order they must run. Schema before superuser.
pub const ONE_SHOT_TASKS: [Role; 2] = [Role::Migration, Role::Bootstrap];

/// Long-running workloads; the order they are synced in carries no meaning
pub fn long_running_roles() -> BTreeSet<Role> {
    BTreeSet::from([Role::Web, Role::Worker, Role::Cron])
}

impl Role {
    /// Every role
    pub const ALL: [Role; 6] = [
        Role::Migration,
        Role::Bootstrap,
        Role::Web,
        Role::Worker,
        Role::Cron,
        Role::Exposure,
    ];

    /// Kind of object this role is realized as
    pub fn kind(self) -> ObjectKind {
        match self {
            Role::Migration | Role::Bootstrap => ObjectKind::OneShotTask,
            Role::Web | Role::Worker | Role::Cron => ObjectKind::LongRunningWorkload,
            Role::Exposure => ObjectKind::NetworkExposure,
        }
    }

    fn suffix(self) -> &'static str {
        match self {
            Role::Migration => "upgrader",
            Role::Bootstrap => "createuser",
            Role::Web | Role::Exposure => "web-ui",
            Role::Worker => "worker",
            Role::Cron => "cron",
        }
    }

    /// Stable object name for this role within an installation
    ///
    /// The name is the idempotency key: a pass finds existing objects by it.
    pub fn object_name(self, app: &str) -> String {
        format!("{}-{}", app, self.suffix())
    }

    /// Container arguments for the `sentry` entrypoint
    pub fn args(self) -> Vec<String> {
        let args: &[&str] = match self {
            Role::Migration => &["upgrade", "--noinput"],
            Role::Bootstrap => &[
                "createuser",
                "--no-input",
                "--superuser",
                "--email",
                "$(SENTRY_SU_EMAIL)",
                "--password",
                "$(SENTRY_SU_PASSWORD)",
            ],
            Role::Web => &["run", "web"],
            Role::Worker => &["run", "worker"],
            Role::Cron => &["run", "cron"],
            Role::Exposure => &[],
        };
        args.iter().map(|s| s.to_string()).collect()
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Migration => write!(f, "migration"),
            Self::Bootstrap => write!(f, "bootstrap"),
            Self::Web => write!(f, "web"),
            Self::Worker => write!(f, "worker"),
            Self::Cron => write!(f, "cron"),
            Self::Exposure => write!(f, "exposure"),
        }
    }
}

// =============================================================================
// Instance
// =============================================================================

/// A Sentry resource resolved for one reconciliation pass
///
/// Holds the defaulted spec together with the identity every built object
/// needs. Built once per pass and passed by reference from there on.
#[derive(Clone, Debug, PartialEq)]
pub struct Instance {
    /// Name of the Sentry resource, used as the object name prefix
    pub name: String,
    /// Namespace all objects live in
    pub namespace: String,
    /// Spec with defaults applied
    pub spec: SentrySpec,
    /// Controller owner reference pointing at the Sentry resource
    pub owner: OwnerReference,
}

impl Instance {
    /// Resolve a Sentry resource, applying spec defaults
    pub fn from_sentry(sentry: &Sentry) -> Result<Self> {
        let name = sentry.name_any();
        let namespace = sentry
            .namespace()
            .ok_or_else(|| Error::MissingNamespace { name: name.clone() })?;
        let owner = sentry
            .controller_owner_ref(&())
            .ok_or_else(|| Error::MissingOwnerReference { name: name.clone() })?;

        Ok(Self {
            name,
            namespace,
            spec: sentry.spec.clone().with_defaults(),
            owner: OwnerReference {
                block_owner_deletion: Some(true),
                ..owner
            },
        })
    }

    /// Labels applied to a role's object and its pods
    pub fn labels(&self, role: Role) -> BTreeMap<String, String> {
        BTreeMap::from([
            ("app".to_string(), role.object_name(&self.name)),
            ("app.kubernetes.io/instance".to_string(), self.name.clone()),
            (
                "app.kubernetes.io/managed-by".to_string(),
                MANAGED_BY.to_string(),
            ),
        ])
    }

    /// Replica count for a long-running role
    pub fn replicas(&self, role: Role) -> i32 {
        match role {
            Role::Web => self.spec.sentry_web_replicas,
            Role::Worker => self.spec.sentry_workers,
            _ => 1,
        }
    }
}

// =============================================================================
// Building
// =============================================================================

/// An object the cluster should hold for some role
#[derive(Clone, Debug, PartialEq)]
pub enum TargetObject {
    /// One-shot task
    Job(Job),
    /// Long-running workload
    Deployment(Deployment),
    /// Network exposure
    Service(Service),
}

/// Build the desired object for a role
pub fn build(role: Role, instance: &Instance) -> Result<TargetObject> {
    Ok(match role.kind() {
        ObjectKind::OneShotTask => TargetObject::Job(build_job(role, instance)),
        ObjectKind::LongRunningWorkload => {
            TargetObject::Deployment(build_deployment(role, instance)?)
        }
        ObjectKind::NetworkExposure => TargetObject::Service(build_service(instance)),
    })
}

/// Spec hash recorded on a Deployment, if any
pub fn spec_hash(deployment: &Deployment) -> Option<&str> {
    deployment
        .metadata
        .annotations
        .as_ref()
        .and_then(|a| a.get(SPEC_HASH_ANNOTATION))
        .map(String::as_str)
}

/// Compact hex digest of `input`: the first 8 bytes of its SHA-256
pub fn deterministic_hash(input: &str) -> String {
    use aws_lc_rs::digest;
    let hash = digest::digest(&digest::SHA256, input.as_bytes());
    hash.as_ref()[..8]
        .iter()
        .fold(String::with_capacity(16), |mut s, b| {
            let _ = write!(s, "{:02x}", b);
            s
        })
}
