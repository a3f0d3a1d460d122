//! Declarative description of the probe workload.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::{
    Capabilities, Container, HostPathVolumeSource, Pod, PodSpec, SecurityContext, Volume,
    VolumeMount,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

use crate::workload::CONTAINER_NAME;

/// Host path mounted into privileged workloads.
pub const HOST_ROOT: &str = "/";
/// Where the host root lands inside the container.
pub const HOST_ROOT_MOUNT: &str = "/hostroot";
/// Capabilities added in privileged mode: admin, net admin and ptrace.
pub const ESCAPE_CAPABILITIES: [&str; 3] = ["SYS_ADMIN", "NET_ADMIN", "SYS_PTRACE"];

const HOST_VOLUME_NAME: &str = "host-root";
const LABEL_APP: &str = "kube-privateer";

/// Isolation profile of the probe workload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IsolationMode {
    /// Whatever the namespace's defaults allow; no host access requested.
    #[default]
    Restricted,
    /// Privileged container sharing the host PID namespace with `/` mounted.
    Privileged,
}

impl From<bool> for IsolationMode {
    fn from(privileged: bool) -> Self {
        if privileged {
            Self::Privileged
        } else {
            Self::Restricted
        }
    }
}

impl std::fmt::Display for IsolationMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Restricted => write!(f, "restricted"),
            Self::Privileged => write!(f, "privileged"),
        }
    }
}

/// Host directory exposed to the workload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostMount {
    pub host_path: String,
    pub mount_path: String,
    pub read_only: bool,
}

/// Everything needed to create the probe pod.
///
/// Built only through [`WorkloadSpec::build`], which guarantees that a
/// restricted spec never carries capabilities, a host mount, or host PID
/// sharing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkloadSpec {
    /// Explicit pod name. `None` means one is generated at provisioning time.
    pub name: Option<String>,
    pub image: String,
    pub privileged: bool,
    pub host_pid: bool,
    pub host_mount: Option<HostMount>,
    pub capabilities: Vec<String>,
    pub command: Vec<String>,
    pub labels: BTreeMap<String, String>,
}

impl WorkloadSpec {
    pub fn build(image: &str, mode: IsolationMode) -> Self {
        let privileged = mode == IsolationMode::Privileged;

        let (host_mount, capabilities) = if privileged {
            (
                Some(HostMount {
                    host_path: HOST_ROOT.to_string(),
                    mount_path: HOST_ROOT_MOUNT.to_string(),
                    read_only: false,
                }),
                ESCAPE_CAPABILITIES.iter().map(|c| c.to_string()).collect(),
            )
        } else {
            (None, Vec::new())
        };

        Self {
            name: None,
            image: image.to_string(),
            privileged,
            host_pid: privileged,
            host_mount,
            capabilities,
            // Keep the container alive for the whole session regardless of
            // what the image's entrypoint would do.
            command: vec!["/bin/sleep".to_string(), "3600".to_string()],
            labels: [("app".to_string(), LABEL_APP.to_string())]
                .into_iter()
                .collect(),
        }
    }

    /// Use a fixed pod name instead of a generated one.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Render the spec as a pod manifest named `name`.
    pub fn to_pod(&self, name: &str) -> Pod {
        let (volumes, volume_mounts) = match &self.host_mount {
            Some(mount) => (
                vec![Volume {
                    name: HOST_VOLUME_NAME.to_string(),
                    host_path: Some(HostPathVolumeSource {
                        path: mount.host_path.clone(),
                        type_: Some("Directory".to_string()),
                    }),
                    ..Default::default()
                }],
                vec![VolumeMount {
                    name: HOST_VOLUME_NAME.to_string(),
                    mount_path: mount.mount_path.clone(),
                    read_only: Some(mount.read_only),
                    ..Default::default()
                }],
            ),
            None => (Vec::new(), Vec::new()),
        };

        let capabilities = if self.capabilities.is_empty() {
            None
        } else {
            Some(Capabilities {
                add: Some(self.capabilities.clone()),
                drop: None,
            })
        };

        Pod {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                labels: Some(self.labels.clone()),
                ..Default::default()
            },
            spec: Some(PodSpec {
                host_pid: Some(self.host_pid),
                restart_policy: Some("Never".to_string()),
                containers: vec![Container {
                    name: CONTAINER_NAME.to_string(),
                    image: Some(self.image.clone()),
                    command: Some(self.command.clone()),
                    security_context: Some(SecurityContext {
                        privileged: Some(self.privileged),
                        capabilities,
                        ..Default::default()
                    }),
                    volume_mounts: Some(volume_mounts),
                    ..Default::default()
                }],
                volumes: Some(volumes),
                ..Default::default()
            }),
            ..Default::default()
        }
    }
}

/// Generate a pod name from the wall clock plus a short random suffix so
/// sessions started in the same second do not collide.
pub fn generate_name() -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!(
        "{}-{}-{}",
        LABEL_APP,
        chrono::Local::now().format("%H%M%S"),
        &suffix[..6]
    )
}
