//! Precondition checks run before any object is touched

use k8s_openapi::api::core::v1::Secret;
use tracing::debug;

use super::client::SentryKubeClient;
use crate::crd::SentrySpec;
use crate::{Error, Result};

/// Keys from `spec.required_secret_keys()` that `secret` does not hold
///
/// Both `data` and `stringData` count; order follows the spec's key order.
pub fn missing_keys(secret: &Secret, spec: &SentrySpec) -> Vec<String> {
    let present = |key: &str| {
        secret.data.as_ref().is_some_and(|d| d.contains_key(key))
            || secret
                .string_data
                .as_ref()
                .is_some_and(|d| d.contains_key(key))
    };

    spec.required_secret_keys()
        .into_iter()
        .filter(|key| !present(key))
        .map(str::to_string)
        .collect()
}

/// Check that the credentials secret exists and holds every required key
///
/// Reports all missing keys at once. Read-only.
pub async fn validate_secret(
    kube: &dyn SentryKubeClient,
    namespace: &str,
    spec: &SentrySpec,
) -> Result<()> {
    let secret_name = &spec.sentry_secret;
    debug!(secret = %secret_name, "loading credentials secret");

    if secret_name.is_empty() {
        return Err(Error::missing_secret(secret_name, namespace));
    }

    let secret = kube
        .get_secret(secret_name, namespace)
        .await?
        .ok_or_else(|| Error::missing_secret(secret_name, namespace))?;

    let missing = missing_keys(&secret, spec);
    if missing.is_empty() {
        Ok(())
    } else {
        Err(Error::missing_keys(secret_name, namespace, missing))
    }
}
