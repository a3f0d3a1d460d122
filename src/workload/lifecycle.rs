//! Workload lifecycle: create, wait for Running, delete.
//!
//! A provisioned workload is represented by a [`WorkloadGuard`]. The guard
//! must be consumed with [`WorkloadGuard::release`], which deletes the pod.
//! If the guard is dropped instead (panic, caller dropped the session
//! future) the delete is spawned onto the runtime, so every provisioned pod
//! is deleted exactly once.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{Instant, MissedTickBehavior};

use crate::config::MAX_POLL_INTERVAL;
use crate::error::SessionError;
use crate::workload::spec::generate_name;
use crate::workload::{WorkloadApi, WorkloadHandle, WorkloadPhase, WorkloadSpec};

/// Default interval between readiness polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Owns the probe workload for the length of one session.
pub struct LifecycleManager {
    api: Arc<dyn WorkloadApi>,
    poll_interval: Duration,
}

impl LifecycleManager {
    /// `poll_interval` is clamped to `1ms..=MAX_POLL_INTERVAL`.
    pub fn new(api: Arc<dyn WorkloadApi>, poll_interval: Duration) -> Self {
        Self {
            api,
            poll_interval: poll_interval.clamp(Duration::from_millis(1), MAX_POLL_INTERVAL),
        }
    }

    /// Submit the workload and hand back the guard that owns it.
    ///
    /// An API rejection fails with `SessionError::Provision` and leaves
    /// nothing to clean up. If the deadline expires while the create call is
    /// in flight the pod may or may not exist, so a delete is issued anyway.
    pub async fn provision(
        &self,
        spec: &WorkloadSpec,
        namespace: &str,
        deadline: Instant,
    ) -> Result<WorkloadGuard, SessionError> {
        let name = spec.name.clone().unwrap_or_else(generate_name);
        let handle = WorkloadHandle::new(name, namespace);

        // Armed before the request goes out: dropping this future mid-create
        // still schedules the delete.
        let guard = WorkloadGuard::new(Arc::clone(&self.api), handle);
        let started = Instant::now();

        let created = tokio::time::timeout_at(deadline, self.api.create(guard.handle(), spec)).await;
        match created {
            Ok(Ok(())) => {
                tracing::info!(
                    workload = %guard.handle(),
                    privileged = spec.privileged,
                    image = %spec.image,
                    "Created probe workload"
                );
                Ok(guard)
            }
            Ok(Err(e)) => {
                tracing::error!(workload = %guard.handle(), error = %e, "Workload creation rejected");
                guard.disarm();
                Err(SessionError::Provision(e))
            }
            Err(_) => {
                let name = guard.handle().name.clone();
                guard.release().await;
                Err(SessionError::Timeout {
                    name,
                    waited: started.elapsed(),
                })
            }
        }
    }

    /// Poll the workload phase until it is Running.
    ///
    /// Read errors are transient: they are logged and retried on the next
    /// tick. Only the deadline bounds the loop.
    pub async fn await_ready(
        &self,
        handle: &WorkloadHandle,
        deadline: Instant,
    ) -> Result<(), SessionError> {
        let started = Instant::now();
        match tokio::time::timeout_at(deadline, self.poll_until_running(handle)).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(workload = %handle, "Workload did not reach Running before the deadline");
                Err(SessionError::Timeout {
                    name: handle.name.clone(),
                    waited: started.elapsed(),
                })
            }
        }
    }

    async fn poll_until_running(&self, handle: &WorkloadHandle) -> Result<(), SessionError> {
        let mut ticker =
            tokio::time::interval_at(Instant::now() + self.poll_interval, self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            match self.api.phase(handle).await {
                Ok(WorkloadPhase::Running) => {
                    tracing::info!(workload = %handle, "Workload is running");
                    return Ok(());
                }
                Ok(phase) if phase.is_terminal() => {
                    return Err(SessionError::Readiness {
                        name: handle.name.clone(),
                        phase,
                    });
                }
                Ok(phase) => {
                    tracing::debug!(workload = %handle, %phase, "Waiting for workload");
                }
                Err(e) => {
                    tracing::debug!(workload = %handle, error = %e, "Phase read failed, retrying");
                }
            }
        }
    }
}

/// Best-effort delete. Failures are logged, never returned.
async fn teardown(api: &dyn WorkloadApi, handle: &WorkloadHandle) {
    match api.delete(handle).await {
        Ok(()) => tracing::info!(workload = %handle, "Deleted probe workload"),
        Err(e) => {
            tracing::warn!(workload = %handle, error = %e, "Failed to delete probe workload (may require manual cleanup)")
        }
    }
}

/// Scoped ownership of a provisioned workload.
pub struct WorkloadGuard {
    api: Arc<dyn WorkloadApi>,
    handle: WorkloadHandle,
    armed: bool,
}

impl WorkloadGuard {
    fn new(api: Arc<dyn WorkloadApi>, handle: WorkloadHandle) -> Self {
        Self {
            api,
            handle,
            armed: true,
        }
    }

    pub fn handle(&self) -> &WorkloadHandle {
        &self.handle
    }

    /// Delete the workload and wait for the API to answer.
    pub async fn release(mut self) {
        self.armed = false;
        teardown(self.api.as_ref(), &self.handle).await;
    }

    /// Forget the workload without deleting it (nothing was created).
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for WorkloadGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        self.armed = false;

        let api = Arc::clone(&self.api);
        let handle = self.handle.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(async move { teardown(api.as_ref(), &handle).await });
            }
            Err(_) => {
                tracing::warn!(workload = %handle, "No runtime available to delete probe workload");
            }
        }
    }
}
