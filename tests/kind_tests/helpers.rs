//! Test helpers for the kind integration tests

use std::process::Command;
use std::time::Duration;

use k8s_openapi::api::core::v1::{Namespace, Secret};
use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::api::{Api, DeleteParams, Patch, PatchParams, PostParams};
use kube::config::KubeConfigOptions;
use kube::runtime::wait::{await_condition, conditions};
use kube::{Client, Config, CustomResourceExt};
use tokio::sync::OnceCell;
use tokio::time::sleep;

use sentry_operator::crd::{Sentry, SentrySpec};

/// Name of the kind cluster used for integration tests
pub const TEST_CLUSTER_NAME: &str = "sentry-operator-test";

const FIELD_MANAGER: &str = "sentry-operator-tests";

static CLUSTER_READY: OnceCell<Result<(), String>> = OnceCell::const_new();

/// Create the kind cluster unless `kind get clusters` already lists it
fn create_kind_cluster() -> Result<(), String> {
    let run = |args: &[&str]| {
        Command::new("kind")
            .args(args)
            .output()
            .map_err(|e| format!("failed to run kind: {e}"))
    };

    let existing = run(&["get", "clusters"])?;
    if String::from_utf8_lossy(&existing.stdout)
        .lines()
        .any(|line| line.trim() == TEST_CLUSTER_NAME)
    {
        return Ok(());
    }

    let created = run(&["create", "cluster", "--name", TEST_CLUSTER_NAME, "--wait", "60s"])?;
    if !created.status.success() {
        return Err(format!(
            "failed to create kind cluster: {}",
            String::from_utf8_lossy(&created.stderr)
        ));
    }
    Ok(())
}

/// Server-side apply the Sentry CRD and wait until it is established
async fn apply_crd(client: &Client) -> Result<(), String> {
    let crd = Sentry::crd();
    let name = crd.metadata.name.clone().unwrap_or_default();
    let crds: Api<CustomResourceDefinition> = Api::all(client.clone());

    crds.patch(
        &name,
        &PatchParams::apply(FIELD_MANAGER).force(),
        &Patch::Apply(&crd),
    )
    .await
    .map_err(|e| format!("failed to apply CRD: {e}"))?;

    tokio::time::timeout(
        Duration::from_secs(30),
        await_condition(crds, &name, conditions::is_crd_established()),
    )
    .await
    .map_err(|_| "CRD was not established within 30s".to_string())?
    .map_err(|e| format!("failed to watch CRD: {e}"))?;
    Ok(())
}

async fn test_client() -> Result<Client, String> {
    let config = Config::from_kubeconfig(&KubeConfigOptions {
        context: Some(format!("kind-{TEST_CLUSTER_NAME}")),
        ..Default::default()
    })
    .await
    .map_err(|e| format!("failed to load kubeconfig: {e}"))?;

    Client::try_from(config).map_err(|e| format!("failed to create client: {e}"))
}

/// Ensure the kind cluster exists and has the Sentry CRD
///
/// Setup runs once per test binary; every call returns a fresh client.
pub async fn ensure_test_cluster() -> Result<Client, String> {
    CLUSTER_READY
        .get_or_init(|| async {
            create_kind_cluster()?;
            apply_crd(&test_client().await?).await
        })
        .await
        .clone()?;

    test_client().await
}

// =============================================================================
// Resource Helpers
// =============================================================================

/// Create a fresh namespace, deleting any leftover from a previous run
pub async fn fresh_namespace(client: &Client, name: &str) -> Result<(), kube::Error> {
    let namespaces: Api<Namespace> = Api::all(client.clone());
    if namespaces.get_opt(name).await?.is_some() {
        namespaces.delete(name, &DeleteParams::default()).await?;
        while namespaces.get_opt(name).await?.is_some() {
            sleep(Duration::from_secs(1)).await;
        }
    }

    let namespace = Namespace {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            ..Default::default()
        },
        ..Default::default()
    };
    namespaces.create(&PostParams::default(), &namespace).await?;
    Ok(())
}

/// Create the credentials Secret with the given keys
pub async fn create_secret(
    client: &Client,
    namespace: &str,
    name: &str,
    keys: &[&str],
) -> Result<(), kube::Error> {
    let secret = Secret {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            ..Default::default()
        },
        string_data: Some(
            keys.iter()
                .map(|k| (k.to_string(), "test-value".to_string()))
                .collect(),
        ),
        ..Default::default()
    };
    Api::<Secret>::namespaced(client.clone(), namespace)
        .create(&PostParams::default(), &secret)
        .await?;
    Ok(())
}

/// A Sentry with only the required fields set
pub fn sample_sentry(name: &str, secret: &str) -> Sentry {
    Sentry::new(
        name,
        SentrySpec {
            sentry_secret: secret.to_string(),
            postgres_host: "postgres.db.svc".to_string(),
            postgres_db: "sentry".to_string(),
            postgres_user: "sentry".to_string(),
            redis_host: "redis.cache.svc".to_string(),
            ..Default::default()
        },
    )
}
