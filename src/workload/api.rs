//! Seam between the orchestrator and the cluster's pods API.

use async_trait::async_trait;

use crate::error::ApiError;
use crate::workload::{WorkloadHandle, WorkloadPhase, WorkloadSpec};

/// Captured result of one remote exec.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecOutput {
    pub stdout: String,
    pub stderr: String,
    /// Exit code when the remote process exited non-zero.
    pub exit_code: Option<i32>,
    /// Set when the stream broke after the channel was established. Whatever
    /// output arrived before the break is still in `stdout`/`stderr`.
    pub failure: Option<String>,
}

/// Pod operations used by one probe session.
#[async_trait]
pub trait WorkloadApi: Send + Sync {
    /// Submit the workload described by `spec` under the handle's name.
    async fn create(&self, handle: &WorkloadHandle, spec: &WorkloadSpec) -> Result<(), ApiError>;

    /// Read the current phase.
    async fn phase(&self, handle: &WorkloadHandle) -> Result<WorkloadPhase, ApiError>;

    /// Delete the workload. Deleting one that is already gone is not an error.
    async fn delete(&self, handle: &WorkloadHandle) -> Result<(), ApiError>;

    /// Run `command` in the handle's container with stdin and TTY disabled.
    ///
    /// `Err` means the exec channel could not be established.
    async fn exec(&self, handle: &WorkloadHandle, command: &[String])
    -> Result<ExecOutput, ApiError>;
}
