//! Supporting types for the Sentry CRD

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Sentry rollout phase
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[non_exhaustive]
pub enum SentryPhase {
    /// Not yet reconciled
    #[default]
    Pending,
    /// Objects were created or updated on the last pass; convergence continues
    Progressing,
    /// Every managed object exists and matches the spec
    Ready,
    /// The last pass failed; see the status message
    Failed,
}

impl std::fmt::Display for SentryPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "Pending"),
            Self::Progressing => write!(f, "Progressing"),
            Self::Ready => write!(f, "Ready"),
            Self::Failed => write!(f, "Failed"),
        }
    }
}
