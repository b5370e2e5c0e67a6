//! Integration tests for CRD operations
//!
//! These tests tell the story of how users create and read Sentry resources
//! through the Kubernetes API.

use kube::api::{Api, PostParams};
use kube::ResourceExt;

use sentry_operator::crd::Sentry;

use super::helpers::{ensure_test_cluster, fresh_namespace, sample_sentry};

/// Story: A user creates a Sentry with only the required fields and reads it
/// back unchanged. Defaults are applied by the operator at reconcile time,
/// never written into the stored resource.
#[tokio::test]
#[ignore = "requires kind cluster - run with: cargo test --test kind -- --ignored"]
async fn story_user_creates_minimal_sentry() {
    let client = ensure_test_cluster()
        .await
        .expect("failed to setup cluster");
    let namespace = "sentry-crd-minimal";
    fresh_namespace(&client, namespace)
        .await
        .expect("failed to create namespace");
    let api: Api<Sentry> = Api::namespaced(client.clone(), namespace);

    let created = api
        .create(&PostParams::default(), &sample_sentry("sentry", "sentry-credentials"))
        .await
        .expect("failed to create sentry");
    assert_eq!(created.name_any(), "sentry");

    let fetched = api.get("sentry").await.expect("failed to get sentry");
    assert_eq!(fetched.spec.sentry_secret, "sentry-credentials");
    assert_eq!(fetched.spec.postgres_db, "sentry");
    assert!(fetched.spec.sentry_image.is_empty());
    assert_eq!(fetched.spec.sentry_workers, 0);
    assert!(fetched.status.is_none());
}

/// Story: A user pins the image and scales the web tier; the explicit values
/// survive the round trip through the API server.
#[tokio::test]
#[ignore = "requires kind cluster - run with: cargo test --test kind -- --ignored"]
async fn story_user_overrides_image_and_replicas() {
    let client = ensure_test_cluster()
        .await
        .expect("failed to setup cluster");
    let namespace = "sentry-crd-overrides";
    fresh_namespace(&client, namespace)
        .await
        .expect("failed to create namespace");
    let api: Api<Sentry> = Api::namespaced(client.clone(), namespace);

    let mut sentry = sample_sentry("sentry", "sentry-credentials");
    sentry.spec.sentry_image = "docker.io/sentry:9.1".to_string();
    sentry.spec.sentry_web_replicas = 4;
    api.create(&PostParams::default(), &sentry)
        .await
        .expect("failed to create sentry");

    let fetched = api.get("sentry").await.expect("failed to get sentry");
    assert_eq!(fetched.spec.sentry_image, "docker.io/sentry:9.1");
    assert_eq!(fetched.spec.sentry_web_replicas, 4);
    let defaulted = fetched.spec.with_defaults();
    assert_eq!(defaulted.sentry_workers, 3);
}
