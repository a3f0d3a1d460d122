//! Probe workload: the short-lived pod commands are streamed into.
//!
//! ```text
//! ┌──────────────────────────────────────────────────┐
//! │                 Workload layer                    │
//! │                                                   │
//! │  WorkloadSpec::build(image, mode)   (pure)        │
//! │          │                                        │
//! │          ▼                                        │
//! │  LifecycleManager                                 │
//! │    provision()   -> WorkloadGuard                 │
//! │    await_ready() -> polls phase until Running     │
//! │    teardown()    -> best-effort delete, once      │
//! │          │                                        │
//! │          ▼                                        │
//! │  WorkloadApi (trait)                              │
//! │    KubeWorkloadApi: pods create/get/delete/exec   │
//! └──────────────────────────────────────────────────┘
//! ```

pub mod api;
pub mod lifecycle;
pub mod pods;
pub mod spec;

pub use api::{ExecOutput, WorkloadApi};
pub use lifecycle::{LifecycleManager, WorkloadGuard};
pub use pods::KubeWorkloadApi;
pub use spec::{HostMount, IsolationMode, WorkloadSpec};

/// Name of the single container in every probe workload; the exec target.
pub const CONTAINER_NAME: &str = "tester";

/// Opaque identity of a provisioned workload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkloadHandle {
    pub name: String,
    pub namespace: String,
    pub container: String,
}

impl WorkloadHandle {
    pub fn new(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            container: CONTAINER_NAME.to_string(),
        }
    }
}

impl std::fmt::Display for WorkloadHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Pod phase as reported by the API server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkloadPhase {
    Pending,
    Running,
    Succeeded,
    Failed,
    Unknown,
}

impl WorkloadPhase {
    /// Map the API's phase string. Missing or unrecognized phases are `Unknown`.
    pub fn from_api(phase: Option<&str>) -> Self {
        match phase {
            Some("Pending") => Self::Pending,
            Some("Running") => Self::Running,
            Some("Succeeded") => Self::Succeeded,
            Some("Failed") => Self::Failed,
            _ => Self::Unknown,
        }
    }

    /// Phases a pod with `restartPolicy: Never` cannot leave.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}

impl std::fmt::Display for WorkloadPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "Pending"),
            Self::Running => write!(f, "Running"),
            Self::Succeeded => write!(f, "Succeeded"),
            Self::Failed => write!(f, "Failed"),
            Self::Unknown => write!(f, "Unknown"),
        }
    }
}
