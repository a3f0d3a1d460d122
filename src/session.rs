//! Probe session runner.
//!
//! One session = one workload, one deadline, one report:
//!
//! ```text
//! WorkloadSpec::build ─▶ provision ─▶ await_ready ─▶ CommandExecutor::run
//!                            │                              │
//!                            │         (any exit path)      ▼
//!                            └──────────▶ release ◀──── results so far
//!                                            │
//!                                            ▼
//!                              PermissionReporter (rbac/recon)
//!                                            │
//!                                            ▼
//!                                   Report { results }
//! ```

use std::path::Path;
use std::sync::Arc;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::config::{Env, KubeConfigSource, SessionConfig};
use crate::error::{ConfigError, SessionError};
use crate::exec::{CommandExecutor, ExecOutcome};
use crate::permissions::{ClusterIntrospection, KubeIntrospection, PermissionReporter};
use crate::probes::ProbePlan;
use crate::report::{Report, ResultAggregator};
use crate::stepper::Stepper;
use crate::workload::{
    KubeWorkloadApi, LifecycleManager, WorkloadApi, WorkloadHandle, WorkloadSpec,
};

/// Runs probe sessions against one cluster.
///
/// Holds the cluster clients read-only; each `run` owns its own workload
/// and report, so a runner can be shared between sessions.
pub struct SessionRunner {
    workloads: Arc<dyn WorkloadApi>,
    introspection: Arc<dyn ClusterIntrospection>,
}

impl SessionRunner {
    pub fn new(
        workloads: Arc<dyn WorkloadApi>,
        introspection: Arc<dyn ClusterIntrospection>,
    ) -> Self {
        Self {
            workloads,
            introspection,
        }
    }

    /// Connect using the resolved kubeconfig. No workload is attempted when
    /// this fails.
    pub async fn connect(kubeconfig: Option<&Path>) -> Result<Self, SessionError> {
        let source = KubeConfigSource::resolve(kubeconfig, &Env::process())?;
        tracing::info!(source = %source, "Loading cluster credentials");
        let client = source.connect().await?;
        Ok(Self::new(
            Arc::new(KubeWorkloadApi::new(client.clone())),
            Arc::new(KubeIntrospection::new(client)),
        ))
    }

    /// Provision, probe, tear down, report.
    ///
    /// Provisioning and readiness failures abort with no report. Command
    /// failures and a mid-sequence deadline do not: the report holds every
    /// record collected. The workload is deleted exactly once on every path
    /// once it has been created.
    pub async fn run(
        &self,
        config: &SessionConfig,
        plan: &ProbePlan,
        stepper: &mut Stepper,
        cancel: CancellationToken,
    ) -> Result<Report, SessionError> {
        config.validate()?;
        let deadline = Instant::now()
            .checked_add(config.timeout)
            .ok_or_else(|| ConfigError::InvalidValue {
                key: "timeout".to_string(),
                message: "deadline out of range".to_string(),
            })?;
        let lifecycle = LifecycleManager::new(Arc::clone(&self.workloads), config.poll_interval);
        let spec = WorkloadSpec::build(&config.image, config.isolation);

        tracing::info!(
            namespace = %config.namespace,
            image = %config.image,
            isolation = %config.isolation,
            commands = plan.commands.len(),
            timeout = ?config.timeout,
            "Starting probe session"
        );

        // Dropping a provision in flight leaves the guard's Drop to delete the pod.
        let guard = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(SessionError::Cancelled),
            provisioned = lifecycle.provision(&spec, &config.namespace, deadline) => provisioned?,
        };

        let mut results = ResultAggregator::new();
        let probed = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(SessionError::Cancelled),
            probed = self.probe_workload(
                &lifecycle,
                guard.handle(),
                plan,
                deadline,
                stepper,
                &mut results,
            ) => probed,
        };
        guard.release().await;
        probed?;

        if plan.permission_report {
            let reporter = PermissionReporter::new(self.introspection.as_ref());
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(SessionError::Cancelled),
                _ = reporter.report(&config.namespace, deadline, stepper, &mut results) => {}
            }
        }

        let report = results.finalize();
        tracing::info!(
            records = report.results.len(),
            errors = report.error_count(),
            "Probe session finished"
        );
        Ok(report)
    }

    async fn probe_workload(
        &self,
        lifecycle: &LifecycleManager,
        handle: &WorkloadHandle,
        plan: &ProbePlan,
        deadline: Instant,
        stepper: &mut Stepper,
        results: &mut ResultAggregator,
    ) -> Result<(), SessionError> {
        lifecycle.await_ready(handle, deadline).await?;

        let outcome = CommandExecutor::new(self.workloads.as_ref())
            .run(handle, &plan.commands, deadline, stepper, results)
            .await;
        if let ExecOutcome::DeadlineExceeded { attempted } = outcome {
            tracing::warn!(
                workload = %handle,
                attempted,
                total = plan.commands.len(),
                "Session deadline expired mid-sequence, report is partial"
            );
        }
        Ok(())
    }
}
