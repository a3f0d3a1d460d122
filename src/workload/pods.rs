//! `WorkloadApi` backed by the Kubernetes pods API.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Pod;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Status;
use kube::api::{Api, AttachParams, DeleteParams, PostParams};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::ApiError;
use crate::workload::{ExecOutput, WorkloadApi, WorkloadHandle, WorkloadPhase, WorkloadSpec};

/// Pods API client shared read-only by every stage of a session.
#[derive(Clone)]
pub struct KubeWorkloadApi {
    client: kube::Client,
}

impl KubeWorkloadApi {
    pub fn new(client: kube::Client) -> Self {
        Self { client }
    }

    fn pods(&self, namespace: &str) -> Api<Pod> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

#[async_trait]
impl WorkloadApi for KubeWorkloadApi {
    async fn create(&self, handle: &WorkloadHandle, spec: &WorkloadSpec) -> Result<(), ApiError> {
        let pod = spec.to_pod(&handle.name);
        self.pods(&handle.namespace)
            .create(&PostParams::default(), &pod)
            .await?;
        Ok(())
    }

    async fn phase(&self, handle: &WorkloadHandle) -> Result<WorkloadPhase, ApiError> {
        let pod = self.pods(&handle.namespace).get(&handle.name).await?;
        Ok(WorkloadPhase::from_api(
            pod.status.as_ref().and_then(|s| s.phase.as_deref()),
        ))
    }

    async fn delete(&self, handle: &WorkloadHandle) -> Result<(), ApiError> {
        let result = self
            .pods(&handle.namespace)
            .delete(&handle.name, &DeleteParams::default())
            .await;
        deleted(result)
    }

    async fn exec(
        &self,
        handle: &WorkloadHandle,
        command: &[String],
    ) -> Result<ExecOutput, ApiError> {
        let params = AttachParams::default()
            .container(handle.container.clone())
            .stdin(false)
            .stdout(true)
            .stderr(true)
            .tty(false);

        let mut process = self
            .pods(&handle.namespace)
            .exec(&handle.name, command.to_vec(), &params)
            .await?;

        let stdout = process.stdout();
        let stderr = process.stderr();
        let status = process.take_status();

        // Both streams must be drained together or a chatty stderr can stall stdout.
        let ((stdout, stdout_err), (stderr, stderr_err)) =
            tokio::join!(drain(stdout), drain(stderr));
        let status = match status {
            Some(status) => status.await,
            None => None,
        };

        let mut output = ExecOutput {
            stdout: String::from_utf8_lossy(&stdout).into_owned(),
            stderr: String::from_utf8_lossy(&stderr).into_owned(),
            exit_code: None,
            failure: stdout_err.or(stderr_err).map(|e| e.to_string()),
        };

        match interpret_status(status) {
            Ok(code) => output.exit_code = code,
            Err(message) => {
                output.failure.get_or_insert(message);
            }
        }

        if let Err(e) = process.join().await {
            output.failure.get_or_insert(e.to_string());
        }

        Ok(output)
    }
}

/// A pod that is already gone counts as deleted.
fn deleted<T>(result: Result<T, kube::Error>) -> Result<(), ApiError> {
    match result.map_err(ApiError::from) {
        Ok(_) => Ok(()),
        Err(err) if err.is_not_found() => Ok(()),
        Err(err) => Err(err),
    }
}

/// Read a stream to the end, keeping whatever arrived before an error.
async fn drain<R: AsyncRead + Unpin>(reader: Option<R>) -> (Vec<u8>, Option<std::io::Error>) {
    let mut buf = Vec::new();
    let Some(mut reader) = reader else {
        return (buf, None);
    };
    match reader.read_to_end(&mut buf).await {
        Ok(_) => (buf, None),
        Err(e) => (buf, Some(e)),
    }
}

/// Split the exec status into "process exited with code N" (not a failure)
/// and "the exec itself failed" (returned as `Err` with the server's message).
fn interpret_status(status: Option<Status>) -> Result<Option<i32>, String> {
    let Some(status) = status else {
        return Ok(None);
    };
    if status.status.as_deref() == Some("Success") {
        return Ok(None);
    }
    if status.reason.as_deref() == Some("NonZeroExitCode") {
        let code = status
            .details
            .and_then(|d| d.causes)
            .unwrap_or_default()
            .into_iter()
            .find(|c| c.reason.as_deref() == Some("ExitCode"))
            .and_then(|c| c.message)
            .and_then(|m| m.trim().parse().ok());
        return Ok(code);
    }
    Err(status
        .message
        .unwrap_or_else(|| "exec failed without a status message".to_string()))
}

#[cfg(test)]
mod tests {
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::{StatusCause, StatusDetails};

    use super::*;

    fn exit_status(code: &str) -> Status {
        Status {
            status: Some("Failure".to_string()),
            reason: Some("NonZeroExitCode".to_string()),
            message: Some(format!("command terminated with non-zero exit code: {code}")),
            details: Some(StatusDetails {
                causes: Some(vec![StatusCause {
                    reason: Some("ExitCode".to_string()),
                    message: Some(code.to_string()),
                    field: None,
                }]),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_success_status() {
        let status = Status {
            status: Some("Success".to_string()),
            ..Default::default()
        };
        assert_eq!(interpret_status(Some(status)), Ok(None));
        assert_eq!(interpret_status(None), Ok(None));
    }

    #[test]
    fn test_non_zero_exit_is_not_a_failure() {
        assert_eq!(interpret_status(Some(exit_status("2"))), Ok(Some(2)));
    }

    #[test]
    fn test_exec_failure_keeps_server_message() {
        let status = Status {
            status: Some("Failure".to_string()),
            reason: Some("InternalError".to_string()),
            message: Some("exec: \"badcmd\": executable file not found in $PATH".to_string()),
            ..Default::default()
        };
        assert_eq!(
            interpret_status(Some(status)),
            Err("exec: \"badcmd\": executable file not found in $PATH".to_string())
        );
    }

    fn api_error(code: u16, reason: &str) -> kube::Error {
        kube::Error::Api(kube::error::ErrorResponse {
            status: "Failure".to_string(),
            message: format!("pods \"probe\" {reason}"),
            reason: reason.to_string(),
            code,
        })
    }

    #[test]
    fn test_delete_of_missing_pod_is_success() {
        assert_eq!(deleted::<()>(Ok(())), Ok(()));
        assert_eq!(deleted::<()>(Err(api_error(404, "NotFound"))), Ok(()));
    }

    #[test]
    fn test_delete_failures_are_reported() {
        assert!(matches!(
            deleted::<()>(Err(api_error(403, "Forbidden"))),
            Err(ApiError::Forbidden(_))
        ));
        assert!(matches!(
            deleted::<()>(Err(api_error(500, "InternalError"))),
            Err(ApiError::Api { code: 500, .. })
        ));
    }

    #[tokio::test]
    async fn test_drain_reads_everything() {
        let (bytes, err) = drain(Some(&b"uid=0(root)\n"[..])).await;
        assert_eq!(bytes, b"uid=0(root)\n");
        assert!(err.is_none());

        let (bytes, err) = drain::<&[u8]>(None).await;
        assert!(bytes.is_empty());
        assert!(err.is_none());
    }
}
