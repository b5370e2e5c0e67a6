//! Error types for the Sentry operator

use std::time::Duration;

use thiserror::Error;

/// Main error type for Sentry operator operations
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Kubernetes API error, propagated unchanged
    #[error("kubernetes error: {0}")]
    Kube(#[from] kube::Error),

    /// The credentials secret referenced by the Sentry spec does not exist
    #[error("the provided secret '{secret}' was not found in namespace '{namespace}'")]
    MissingSecret {
        /// Secret name from the spec
        secret: String,
        /// Namespace that was searched
        namespace: String,
    },

    /// The credentials secret exists but lacks one or more required keys
    #[error(
        "secret '{secret}' in namespace '{namespace}' is missing keys: {}",
        keys.join(", ")
    )]
    MissingKeys {
        /// Secret name from the spec
        secret: String,
        /// Namespace of the secret
        namespace: String,
        /// Every required key that was absent, in check order
        keys: Vec<String>,
    },

    /// A one-shot Job did not complete before the deadline
    #[error("job '{task}' in namespace '{namespace}' did not complete within {timeout:?}")]
    TaskTimeout {
        /// Job name
        task: String,
        /// Job namespace
        namespace: String,
        /// Deadline that elapsed
        timeout: Duration,
    },

    /// A one-shot Job vanished while being awaited
    #[error("job '{task}' in namespace '{namespace}' disappeared while awaiting completion")]
    TaskNotFound {
        /// Job name
        task: String,
        /// Job namespace
        namespace: String,
    },

    /// A one-shot Job reported a terminal failure condition
    #[error("job '{task}' in namespace '{namespace}' failed: {message}")]
    TaskFailed {
        /// Job name
        task: String,
        /// Job namespace
        namespace: String,
        /// Message from the Job's Failed condition
        message: String,
    },

    /// Waiting on a Job was interrupted by shutdown
    #[error("wait for job '{task}' was cancelled")]
    Cancelled {
        /// Job name
        task: String,
    },

    /// A replace was rejected because the object changed underneath us
    #[error("conflict updating {kind} '{name}' in namespace '{namespace}'")]
    Conflict {
        /// Object kind
        kind: String,
        /// Object name
        name: String,
        /// Object namespace
        namespace: String,
    },

    /// The Sentry object has no namespace
    #[error("sentry '{name}' has no namespace")]
    MissingNamespace {
        /// Sentry name
        name: String,
    },

    /// No owner reference could be built for the Sentry object (missing uid)
    #[error("sentry '{name}' has no uid to use as an owner reference")]
    MissingOwnerReference {
        /// Sentry name
        name: String,
    },

    /// Serialization/deserialization error
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl Error {
    /// Create a missing-secret validation error
    pub fn missing_secret(secret: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self::MissingSecret {
            secret: secret.into(),
            namespace: namespace.into(),
        }
    }

    /// Create a missing-keys validation error
    pub fn missing_keys(
        secret: impl Into<String>,
        namespace: impl Into<String>,
        keys: Vec<String>,
    ) -> Self {
        Self::MissingKeys {
            secret: secret.into(),
            namespace: namespace.into(),
            keys,
        }
    }

    /// Create a task timeout error
    pub fn task_timeout(
        task: impl Into<String>,
        namespace: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self::TaskTimeout {
            task: task.into(),
            namespace: namespace.into(),
            timeout,
        }
    }

    /// Create a task-not-found error
    pub fn task_not_found(task: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self::TaskNotFound {
            task: task.into(),
            namespace: namespace.into(),
        }
    }

    /// Create a task-failed error
    pub fn task_failed(
        task: impl Into<String>,
        namespace: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::TaskFailed {
            task: task.into(),
            namespace: namespace.into(),
            message: message.into(),
        }
    }

    /// Create a cancellation error
    pub fn cancelled(task: impl Into<String>) -> Self {
        Self::Cancelled { task: task.into() }
    }

    /// Create an update conflict error
    pub fn conflict(
        kind: impl Into<String>,
        name: impl Into<String>,
        namespace: impl Into<String>,
    ) -> Self {
        Self::Conflict {
            kind: kind.into(),
            name: name.into(),
            namespace: namespace.into(),
        }
    }

    /// Create a serialization error with the given message
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization(msg.into())
    }

    /// Returns true for precondition failures that need the user to fix the secret
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::MissingSecret { .. } | Self::MissingKeys { .. })
    }

    /// Returns true if a later pass may succeed without any user action
    ///
    /// Validation and Job failures need someone to change the Secret or
    /// inspect the failed Job, so they are retried on a slower schedule.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Kube(_)
            | Self::TaskTimeout { .. }
            | Self::TaskNotFound { .. }
            | Self::Cancelled { .. }
            | Self::Conflict { .. } => true,
            Self::MissingSecret { .. }
            | Self::MissingKeys { .. }
            | Self::TaskFailed { .. }
            | Self::MissingNamespace { .. }
            | Self::MissingOwnerReference { .. }
            | Self::Serialization(_) => false,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::serialization(e.to_string())
    }
}
