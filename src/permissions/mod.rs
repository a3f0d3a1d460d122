//! Permission reporter.
//!
//! Read-only introspection of what the calling credential can do and see.
//! Each call becomes one report record in a fixed order; a failing call is
//! recorded with its error and the remaining calls still run.
//!
//! ```text
//! 1. kubectl auth can-i --list                     SelfSubjectRulesReview
//! 2. kubectl get rolebindings --all-namespaces     roleRef per binding
//! 3. kubectl get clusterrolebindings               roleRef per binding
//! 4. kubectl get secrets --all-namespaces -o wide  metadata only, no values
//! ```

mod cluster;

use async_trait::async_trait;
use tokio::time::Instant;

use crate::error::ApiError;
use crate::exec::DEADLINE_EXCEEDED;
use crate::report::{CommandResult, ResultAggregator};
use crate::stepper::Stepper;

pub use cluster::KubeIntrospection;

/// `Kind/Name` of the role a binding grants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingRef {
    pub kind: String,
    pub name: String,
}

/// Secret metadata. Values are never read into the report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretSummary {
    pub namespace: String,
    pub name: String,
    pub type_: String,
    pub keys: usize,
}

/// Cluster introspection calls made with the session's credential.
#[async_trait]
pub trait ClusterIntrospection: Send + Sync {
    /// Rules the caller holds in `namespace`, as JSON.
    async fn self_rules(&self, namespace: &str) -> Result<serde_json::Value, ApiError>;

    async fn role_bindings(&self) -> Result<Vec<BindingRef>, ApiError>;

    async fn cluster_role_bindings(&self) -> Result<Vec<BindingRef>, ApiError>;

    async fn secrets(&self) -> Result<Vec<SecretSummary>, ApiError>;
}

pub struct PermissionReporter<'a> {
    api: &'a dyn ClusterIntrospection,
}

impl<'a> PermissionReporter<'a> {
    pub fn new(api: &'a dyn ClusterIntrospection) -> Self {
        Self { api }
    }

    /// Run every probe in order, appending one record each.
    pub async fn report(
        &self,
        namespace: &str,
        deadline: Instant,
        stepper: &mut Stepper,
        results: &mut ResultAggregator,
    ) {
        let cmd = probe_cmd(&["kubectl", "auth", "can-i", "--list", "-n", namespace]);
        let outcome = bounded(deadline, self.api.self_rules(namespace)).await;
        let record = match outcome {
            Ok(rules) => match serde_json::to_string_pretty(&rules) {
                Ok(text) => CommandResult::success(&cmd, text),
                Err(e) => CommandResult::failed(&cmd, e.to_string()),
            },
            Err(e) => CommandResult::failed(&cmd, e),
        };
        self.record(record, stepper, results).await;

        let cmd = probe_cmd(&["kubectl", "get", "rolebindings", "--all-namespaces"]);
        let record = match bounded(deadline, self.api.role_bindings()).await {
            Ok(bindings) => CommandResult::success(&cmd, format_bindings(&bindings)),
            Err(e) => CommandResult::failed(&cmd, e),
        };
        self.record(record, stepper, results).await;

        let cmd = probe_cmd(&["kubectl", "get", "clusterrolebindings"]);
        let record = match bounded(deadline, self.api.cluster_role_bindings()).await {
            Ok(bindings) => CommandResult::success(&cmd, format_bindings(&bindings)),
            Err(e) => CommandResult::failed(&cmd, e),
        };
        self.record(record, stepper, results).await;

        let cmd = probe_cmd(&["kubectl", "get", "secrets", "--all-namespaces", "-o", "wide"]);
        let record = match bounded(deadline, self.api.secrets()).await {
            Ok(secrets) => CommandResult::success(&cmd, format_secrets(&secrets)),
            Err(e) => CommandResult::failed(&cmd, e),
        };
        self.record(record, stepper, results).await;
    }

    async fn record(
        &self,
        record: CommandResult,
        stepper: &mut Stepper,
        results: &mut ResultAggregator,
    ) {
        if let Some(ref error) = record.error {
            tracing::debug!(probe = ?record.cmd, %error, "Permission probe failed");
        }
        let label = record.cmd.join(" ");
        results.append(record);
        stepper.gate(&label, results.last()).await;
    }
}

/// Bound a probe call by the session deadline, flattening both failure
/// kinds into the text that goes into the report.
async fn bounded<T>(
    deadline: Instant,
    call: impl std::future::Future<Output = Result<T, ApiError>>,
) -> Result<T, String> {
    if Instant::now() >= deadline {
        return Err(DEADLINE_EXCEEDED.to_string());
    }
    match tokio::time::timeout_at(deadline, call).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(e.to_string()),
        Err(_) => Err(DEADLINE_EXCEEDED.to_string()),
    }
}

fn probe_cmd(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|s| s.to_string()).collect()
}

fn format_bindings(bindings: &[BindingRef]) -> String {
    bindings
        .iter()
        .map(|b| format!("{}/{}", b.kind, b.name))
        .collect::<Vec<_>>()
        .join("\n")
}

fn format_secrets(secrets: &[SecretSummary]) -> String {
    secrets
        .iter()
        .map(|s| {
            format!(
                "NAMESPACE:{}\nNAME:{}\nTYPE:{}\nKEYS:{}\n",
                s.namespace, s.name, s.type_, s.keys
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}
