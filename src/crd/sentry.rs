//! Sentry Custom Resource Definition
//!
//! A Sentry resource describes one Sentry installation in a namespace: the
//! image to run, replica counts for the web and worker tiers, where Postgres
//! and Redis live, and which Secret holds the credentials. Empty strings and
//! zero numbers mean "unset" and are filled in by [`SentrySpec::with_defaults`].

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::types::SentryPhase;

/// Default container image
pub const DEFAULT_IMAGE: &str = "docker.io/sentry:latest";
/// Default value of `SENTRY_ENVIRONMENT`
pub const DEFAULT_ENVIRONMENT: &str = "production";
/// Default web tier replica count
pub const DEFAULT_WEB_REPLICAS: i32 = 2;
/// Default worker tier replica count
pub const DEFAULT_WORKERS: i32 = 3;
/// Default Postgres port
pub const DEFAULT_POSTGRES_PORT: i32 = 5432;
/// Default Redis port
pub const DEFAULT_REDIS_PORT: i32 = 6379;
/// Default Redis database index
pub const DEFAULT_REDIS_DB: &str = "0";
/// Default secret key holding the Sentry crypto secret
pub const DEFAULT_SECRET_KEY_KEY: &str = "SENTRY_SECRET_KEY";
/// Default secret key holding the Postgres password
pub const DEFAULT_POSTGRES_PASSWORD_KEY: &str = "SENTRY_DB_PASSWORD";
/// Default secret key holding the superuser email
pub const DEFAULT_SUPERUSER_EMAIL_KEY: &str = "SENTRY_SU_EMAIL";
/// Default secret key holding the superuser password
pub const DEFAULT_SUPERUSER_PASSWORD_KEY: &str = "SENTRY_SU_PASSWORD";

/// Specification for a Sentry installation
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "sentry.io",
    version = "v1alpha1",
    kind = "Sentry",
    plural = "sentries",
    shortname = "sn",
    status = "SentryStatus",
    namespaced,
    printcolumn = r#"{"name":"Phase","type":"string","jsonPath":".status.phase"}"#,
    printcolumn = r#"{"name":"Image","type":"string","jsonPath":".spec.sentryImage"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct SentrySpec {
    /// Container image for every Sentry process
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub sentry_image: String,

    /// Number of web UI replicas
    #[serde(default, skip_serializing_if = "is_zero")]
    pub sentry_web_replicas: i32,

    /// Number of background worker replicas
    #[serde(default, skip_serializing_if = "is_zero")]
    pub sentry_workers: i32,

    /// Value of SENTRY_ENVIRONMENT
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub sentry_environment: String,

    /// Name of the Secret holding the credentials below
    #[serde(default)]
    pub sentry_secret: String,

    /// Secret key holding the Sentry crypto secret key
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub sentry_secret_key_key: String,

    /// Secret key holding the Postgres password
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub postgres_password_key: String,

    /// Secret key holding the superuser email
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub sentry_super_user_email_key: String,

    /// Secret key holding the superuser password
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub sentry_super_user_password_key: String,

    /// Postgres host
    #[serde(default)]
    pub postgres_host: String,

    /// Postgres port
    #[serde(default, skip_serializing_if = "is_zero")]
    pub postgres_port: i32,

    /// Postgres database name
    #[serde(default, rename = "postgresDB")]
    pub postgres_db: String,

    /// Postgres user
    #[serde(default)]
    pub postgres_user: String,

    /// Redis host
    #[serde(default)]
    pub redis_host: String,

    /// Redis port
    #[serde(default, skip_serializing_if = "is_zero")]
    pub redis_port: i32,

    /// Redis database index
    #[serde(default, rename = "redisDB", skip_serializing_if = "String::is_empty")]
    pub redis_db: String,
}

fn is_zero(n: &i32) -> bool {
    *n == 0
}

fn or_default(value: String, default: &str) -> String {
    if value.is_empty() {
        default.to_string()
    } else {
        value
    }
}

fn or_default_int(value: i32, default: i32) -> i32 {
    if value == 0 {
        default
    } else {
        value
    }
}

impl SentrySpec {
    /// Fill every unset field with its default
    ///
    /// Pure and idempotent: applying it to an already-defaulted spec returns
    /// an equal spec.
    pub fn with_defaults(self) -> Self {
        Self {
            sentry_image: or_default(self.sentry_image, DEFAULT_IMAGE),
            sentry_web_replicas: or_default_int(self.sentry_web_replicas, DEFAULT_WEB_REPLICAS),
            sentry_workers: or_default_int(self.sentry_workers, DEFAULT_WORKERS),
            sentry_environment: or_default(self.sentry_environment, DEFAULT_ENVIRONMENT),
            sentry_secret_key_key: or_default(self.sentry_secret_key_key, DEFAULT_SECRET_KEY_KEY),
            postgres_password_key: or_default(
                self.postgres_password_key,
                DEFAULT_POSTGRES_PASSWORD_KEY,
            ),
            sentry_super_user_email_key: or_default(
                self.sentry_super_user_email_key,
                DEFAULT_SUPERUSER_EMAIL_KEY,
            ),
            sentry_super_user_password_key: or_default(
                self.sentry_super_user_password_key,
                DEFAULT_SUPERUSER_PASSWORD_KEY,
            ),
            postgres_port: or_default_int(self.postgres_port, DEFAULT_POSTGRES_PORT),
            redis_port: or_default_int(self.redis_port, DEFAULT_REDIS_PORT),
            redis_db: or_default(self.redis_db, DEFAULT_REDIS_DB),
            ..self
        }
    }

    /// Secret keys the installation needs, in the order they are checked
    pub fn required_secret_keys(&self) -> [&str; 4] {
        [
            &self.sentry_secret_key_key,
            &self.postgres_password_key,
            &self.sentry_super_user_email_key,
            &self.sentry_super_user_password_key,
        ]
    }
}

/// Status for a Sentry
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SentryStatus {
    /// Current rollout phase
    #[serde(default)]
    pub phase: SentryPhase,

    /// Human-readable message about current state
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Generation of the spec the status was computed from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
}

impl SentryStatus {
    /// Create a new status with the given phase
    pub fn with_phase(phase: SentryPhase) -> Self {
        Self {
            phase,
            ..Default::default()
        }
    }

    /// Set the message and return self for chaining
    pub fn message(mut self, msg: impl Into<String>) -> Self {
        self.message = Some(msg.into());
        self
    }

    /// Set the observed generation and return self for chaining
    pub fn observed_generation(mut self, generation: Option<i64>) -> Self {
        self.observed_generation = generation;
        self
    }
}
