//! Error types for kube-privateer.
//!
//! Fatal errors (`ConfigError`, provisioning and readiness failures) abort a
//! session and surface as a single [`SessionError`]. Per-command and
//! per-probe failures never become errors at this level: they are recorded
//! as text inside the report instead.

use std::time::Duration;

use crate::workload::WorkloadPhase;

/// Configuration errors. Raised before any workload is attempted.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Failed to load kubeconfig: {0}")]
    Kubeconfig(String),

    #[error("Failed to create cluster client: {0}")]
    Client(String),
}

/// Failure reported by the orchestration API.
///
/// The message is kept verbatim so the operator sees exactly what the API
/// server said (RBAC denial, quota, admission rejection, ...).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{message}")]
    Api { code: u16, message: String },

    #[error("{0}")]
    Transport(String),

    /// Exec channel failed after it was established.
    #[error("{0}")]
    Stream(String),
}

impl ApiError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

impl From<kube::Error> for ApiError {
    fn from(err: kube::Error) -> Self {
        match err {
            kube::Error::Api(response) => match response.code {
                403 => Self::Forbidden(response.message),
                404 => Self::NotFound(response.message),
                code => Self::Api {
                    code,
                    message: response.message,
                },
            },
            other => Self::Transport(other.to_string()),
        }
    }
}

/// Session-level failure. When one of these is returned no report is produced.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("create workload: {0}")]
    Provision(ApiError),

    #[error("workload {name} finished with phase {phase} before it was ready")]
    Readiness { name: String, phase: WorkloadPhase },

    #[error("timed out after {waited:?} waiting for workload {name} to run")]
    Timeout { name: String, waited: Duration },

    #[error("session cancelled")]
    Cancelled,
}
