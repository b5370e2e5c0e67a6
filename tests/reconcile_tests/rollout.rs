//! Fresh install stories
//!
//! A new Sentry resource should produce its schema migration first, then the
//! superuser, then the long-running processes and the web Service.

use kube::ResourceExt;

use sentry_operator::controller::reconcile_key;
use sentry_operator::controller::Outcome;

use super::{context, key, seeded_store, JobBehavior};

/// Story: The first pass over a new Sentry creates all six objects, with the
/// migration Job strictly before the bootstrap Job and both Jobs before any
/// Deployment or the Service.
#[tokio::test(start_paused = true)]
async fn story_fresh_install_creates_objects_in_order() {
    let store = seeded_store(JobBehavior::Complete, "sentry", "observability");
    let ctx = context(store.clone());

    let outcome = reconcile_key(&key("sentry", "observability"), &ctx)
        .await
        .expect("first pass should succeed");

    assert_eq!(outcome, Outcome::Progressing);
    assert!(outcome.requeue());
    assert_eq!(
        store.created_names(),
        vec![
            "Job/sentry-upgrader",
            "Job/sentry-createuser",
            "Deployment/sentry-web-ui",
            "Deployment/sentry-worker",
            "Deployment/sentry-cron",
            "Service/sentry-web-ui",
        ]
    );
}

/// Story: Every created object is owned by the Sentry that produced it, so
/// deleting the Sentry garbage-collects the installation.
#[tokio::test(start_paused = true)]
async fn story_every_object_is_owned_by_its_sentry() {
    let store = seeded_store(JobBehavior::Complete, "sentry", "observability");
    let ctx = context(store.clone());

    reconcile_key(&key("sentry", "observability"), &ctx)
        .await
        .expect("first pass should succeed");

    let mut owners = Vec::new();
    for job in ["sentry-upgrader", "sentry-createuser"] {
        owners.push(store.job("observability", job).unwrap().owner_references().to_vec());
    }
    for deployment in ["sentry-web-ui", "sentry-worker", "sentry-cron"] {
        owners.push(
            store
                .deployment("observability", deployment)
                .unwrap()
                .owner_references()
                .to_vec(),
        );
    }
    owners.push(
        store
            .service("observability", "sentry-web-ui")
            .unwrap()
            .owner_references()
            .to_vec(),
    );

    for refs in owners {
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].kind, "Sentry");
        assert_eq!(refs[0].name, "sentry");
        assert_eq!(refs[0].uid, "uid-observability-sentry");
        assert_eq!(refs[0].controller, Some(true));
    }
}

/// Story: Replica counts fall back to their defaults when the resource
/// leaves them unset. Cron always runs a single replica.
#[tokio::test(start_paused = true)]
async fn story_unset_replicas_use_defaults() {
    let store = seeded_store(JobBehavior::Complete, "sentry", "observability");
    let ctx = context(store.clone());

    reconcile_key(&key("sentry", "observability"), &ctx)
        .await
        .expect("first pass should succeed");

    let replicas = |name: &str| {
        store
            .deployment("observability", name)
            .and_then(|d| d.spec)
            .and_then(|s| s.replicas)
    };
    assert_eq!(replicas("sentry-web-ui"), Some(2));
    assert_eq!(replicas("sentry-worker"), Some(3));
    assert_eq!(replicas("sentry-cron"), Some(1));
}

/// Story: The web Service selects the web pods and exposes port 9000.
#[tokio::test(start_paused = true)]
async fn story_service_fronts_the_web_tier() {
    let store = seeded_store(JobBehavior::Complete, "sentry", "observability");
    let ctx = context(store.clone());

    reconcile_key(&key("sentry", "observability"), &ctx)
        .await
        .expect("first pass should succeed");

    let service = store.service("observability", "sentry-web-ui").unwrap();
    assert_eq!(service.name_any(), "sentry-web-ui");
    let spec = service.spec.unwrap();
    assert_eq!(
        spec.selector.unwrap().get("app").map(String::as_str),
        Some("sentry-web-ui")
    );
    let ports = spec.ports.unwrap();
    assert_eq!(ports.len(), 1);
    assert_eq!(ports[0].port, 9000);
}
