//! Container environment for Sentry processes
//!
//! Every Sentry container gets the same base environment describing where
//! Postgres and Redis live. Credentials are never inlined: they are wired
//! as `secretKeyRef`s into the Secret named by the spec.

use k8s_openapi::api::core::v1::{EnvVar, EnvVarSource, SecretKeySelector};

use super::Role;
use crate::crd::SentrySpec;

/// Port the web tier listens on
pub const WEB_PORT: i32 = 9000;

/// Plain name/value variable
fn literal(name: &str, value: impl Into<String>) -> EnvVar {
    EnvVar {
        name: name.to_string(),
        value: Some(value.into()),
        value_from: None,
    }
}

/// Variable sourced from a key in the credentials secret
fn from_secret(name: &str, secret: &str, key: &str) -> EnvVar {
    EnvVar {
        name: name.to_string(),
        value: None,
        value_from: Some(EnvVarSource {
            secret_key_ref: Some(SecretKeySelector {
                name: secret.to_string(),
                key: key.to_string(),
                optional: None,
            }),
            ..Default::default()
        }),
    }
}

/// Environment shared by every Sentry process
pub fn base_env(spec: &SentrySpec) -> Vec<EnvVar> {
    vec![
        literal("SENTRY_ENVIRONMENT", &spec.sentry_environment),
        from_secret(
            "SENTRY_SECRET_KEY",
            &spec.sentry_secret,
            &spec.sentry_secret_key_key,
        ),
        literal("SENTRY_POSTGRES_HOST", &spec.postgres_host),
        literal("SENTRY_POSTGRES_PORT", spec.postgres_port.to_string()),
        literal("SENTRY_DB_NAME", &spec.postgres_db),
        literal("SENTRY_DB_USER", &spec.postgres_user),
        from_secret(
            "SENTRY_DB_PASSWORD",
            &spec.sentry_secret,
            &spec.postgres_password_key,
        ),
        literal("SENTRY_REDIS_HOST", &spec.redis_host),
        literal("SENTRY_REDIS_PORT", spec.redis_port.to_string()),
        literal("SENTRY_REDIS_DB", &spec.redis_db),
        literal("C_FORCE_ROOT", "true"),
    ]
}

/// Variables a role adds on top of [`base_env`]
pub fn role_env(role: Role, spec: &SentrySpec) -> Vec<EnvVar> {
    match role {
        Role::Web => vec![
            literal("SENTRY_WEB_PORT", WEB_PORT.to_string()),
            literal("SENTRY_WEB_HOST", "0.0.0.0"),
        ],
        Role::Bootstrap => vec![
            from_secret(
                "SENTRY_SU_EMAIL",
                &spec.sentry_secret,
                &spec.sentry_super_user_email_key,
            ),
            from_secret(
                "SENTRY_SU_PASSWORD",
                &spec.sentry_secret,
                &spec.sentry_super_user_password_key,
            ),
        ],
        Role::Migration | Role::Worker | Role::Cron | Role::Exposure => Vec::new(),
    }
}

/// Full environment for a role's container
pub fn container_env(role: Role, spec: &SentrySpec) -> Vec<EnvVar> {
    let mut env = base_env(spec);
    env.extend(role_env(role, spec));
    env
}
