//! Object templates for each Sentry role
//!
//! Every builder here is a pure function of `(role, instance)`. The reconciler
//! relies on that: two builds from the same spec must be structurally equal,
//! otherwise the spec-hash comparison would report drift on every pass.

use std::collections::BTreeMap;

use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::batch::v1::{Job, JobSpec};
use k8s_openapi::api::core::v1::{
    Container, ContainerPort, HTTPGetAction, PodSpec, PodTemplateSpec, Probe, Service,
    ServicePort, ServiceSpec,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;

use super::env::{container_env, WEB_PORT};
use super::{deterministic_hash, Instance, Role, SPEC_HASH_ANNOTATION};
use crate::Result;

/// Name of the web port on both the container and the Service
pub const WEB_PORT_NAME: &str = "sentry-http";

/// Path probed by the web tier's liveness check
pub const HEALTH_PATH: &str = "/health";

const LIVENESS_INITIAL_DELAY_SECS: i32 = 3;
const LIVENESS_PERIOD_SECS: i32 = 3;

fn object_meta(role: Role, instance: &Instance) -> ObjectMeta {
    ObjectMeta {
        name: Some(role.object_name(&instance.name)),
        namespace: Some(instance.namespace.clone()),
        labels: Some(instance.labels(role)),
        owner_references: Some(vec![instance.owner.clone()]),
        ..Default::default()
    }
}

fn selector_labels(role: Role, instance: &Instance) -> BTreeMap<String, String> {
    BTreeMap::from([("app".to_string(), role.object_name(&instance.name))])
}

fn web_liveness_probe() -> Probe {
    Probe {
        http_get: Some(HTTPGetAction {
            path: Some(HEALTH_PATH.to_string()),
            port: IntOrString::Int(WEB_PORT),
            ..Default::default()
        }),
        initial_delay_seconds: Some(LIVENESS_INITIAL_DELAY_SECS),
        period_seconds: Some(LIVENESS_PERIOD_SECS),
        ..Default::default()
    }
}

fn container(role: Role, instance: &Instance) -> Container {
    let (ports, liveness_probe) = match role {
        Role::Web => (
            Some(vec![ContainerPort {
                name: Some(WEB_PORT_NAME.to_string()),
                container_port: WEB_PORT,
                protocol: Some("TCP".to_string()),
                ..Default::default()
            }]),
            Some(web_liveness_probe()),
        ),
        _ => (None, None),
    };

    Container {
        name: role.object_name(&instance.name),
        image: Some(instance.spec.sentry_image.clone()),
        image_pull_policy: Some("Always".to_string()),
        args: Some(role.args()),
        env: Some(container_env(role, &instance.spec)),
        ports,
        liveness_probe,
        ..Default::default()
    }
}

fn pod_template(role: Role, instance: &Instance, restart_policy: &str) -> PodTemplateSpec {
    PodTemplateSpec {
        metadata: Some(ObjectMeta {
            labels: Some(instance.labels(role)),
            ..Default::default()
        }),
        spec: Some(PodSpec {
            containers: vec![container(role, instance)],
            restart_policy: Some(restart_policy.to_string()),
            ..Default::default()
        }),
    }
}

/// Build the one-shot Job for a task role
///
/// No `ttlSecondsAfterFinished`: the finished Job is the record that the
/// task ran, and deleting it would cause the task to run again.
pub fn build_job(role: Role, instance: &Instance) -> Job {
    Job {
        metadata: object_meta(role, instance),
        spec: Some(JobSpec {
            template: pod_template(role, instance, "OnFailure"),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Build the Deployment for a long-running role
///
/// The desired spec is hashed into [`SPEC_HASH_ANNOTATION`] so the reconciler
/// can tell whether the live object was produced from the same spec.
pub fn build_deployment(role: Role, instance: &Instance) -> Result<Deployment> {
    let spec = DeploymentSpec {
        replicas: Some(instance.replicas(role)),
        selector: LabelSelector {
            match_labels: Some(selector_labels(role, instance)),
            ..Default::default()
        },
        template: pod_template(role, instance, "Always"),
        ..Default::default()
    };

    let hash = deterministic_hash(&serde_json::to_string(&spec)?);
    let mut metadata = object_meta(role, instance);
    metadata.annotations = Some(BTreeMap::from([(SPEC_HASH_ANNOTATION.to_string(), hash)]));

    Ok(Deployment {
        metadata,
        spec: Some(spec),
        ..Default::default()
    })
}

/// Whether the live Deployment still has every field the operator manages
///
/// Only fields set by [`build_deployment`] are compared. Values the API
/// server fills in (probe thresholds, the `HTTP` scheme, strategy) are
/// ignored so a server-defaulted object still matches.
pub fn deployment_matches(live: &Deployment, desired: &Deployment) -> bool {
    let (Some(live), Some(desired)) = (live.spec.as_ref(), desired.spec.as_ref()) else {
        return false;
    };

    live.replicas == desired.replicas
        && live.selector.match_labels == desired.selector.match_labels
        && pod_template_matches(&live.template, &desired.template)
}

fn pod_template_matches(live: &PodTemplateSpec, desired: &PodTemplateSpec) -> bool {
    let labels = |t: &PodTemplateSpec| t.metadata.as_ref().and_then(|m| m.labels.clone());
    let (Some(live_pod), Some(desired_pod)) = (live.spec.as_ref(), desired.spec.as_ref()) else {
        return false;
    };

    labels(live) == labels(desired)
        && live_pod.restart_policy == desired_pod.restart_policy
        && live_pod.containers.len() == desired_pod.containers.len()
        && live_pod
            .containers
            .iter()
            .zip(&desired_pod.containers)
            .all(|(l, d)| container_matches(l, d))
}

fn container_matches(live: &Container, desired: &Container) -> bool {
    let ports = |c: &Container| {
        c.ports
            .iter()
            .flatten()
            .map(|p| {
                (
                    p.name.clone(),
                    p.container_port,
                    p.protocol.clone().unwrap_or_else(|| "TCP".to_string()),
                )
            })
            .collect::<Vec<_>>()
    };
    let probe = |c: &Container| {
        c.liveness_probe.as_ref().map(|p| {
            (
                p.http_get.as_ref().map(|h| (h.path.clone(), h.port.clone())),
                p.initial_delay_seconds,
                p.period_seconds,
            )
        })
    };

    live.name == desired.name
        && live.image == desired.image
        && live.image_pull_policy == desired.image_pull_policy
        && live.args == desired.args
        && live.env == desired.env
        && ports(live) == ports(desired)
        && probe(live) == probe(desired)
}

/// Build the Service fronting the web tier
pub fn build_service(instance: &Instance) -> Service {
    Service {
        metadata: object_meta(Role::Exposure, instance),
        spec: Some(ServiceSpec {
            selector: Some(selector_labels(Role::Web, instance)),
            ports: Some(vec![ServicePort {
                name: Some(WEB_PORT_NAME.to_string()),
                port: WEB_PORT,
                target_port: Some(IntOrString::Int(WEB_PORT)),
                protocol: Some("TCP".to_string()),
                ..Default::default()
            }]),
            ..Default::default()
        }),
        ..Default::default()
    }
}
