//! Custom Resource Definitions for the Sentry operator

mod sentry;
mod types;

pub use sentry::{
    Sentry, SentrySpec, SentryStatus, DEFAULT_ENVIRONMENT, DEFAULT_IMAGE,
    DEFAULT_POSTGRES_PASSWORD_KEY, DEFAULT_POSTGRES_PORT, DEFAULT_REDIS_DB, DEFAULT_REDIS_PORT,
    DEFAULT_SECRET_KEY_KEY, DEFAULT_SUPERUSER_EMAIL_KEY, DEFAULT_SUPERUSER_PASSWORD_KEY,
    DEFAULT_WEB_REPLICAS, DEFAULT_WORKERS,
};
pub use types::SentryPhase;
