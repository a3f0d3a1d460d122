//! Cluster credentials: kubeconfig discovery and client construction.

use std::path::{Path, PathBuf};

use kube::config::{KubeConfigOptions, Kubeconfig};

use crate::config::helpers::Env;
use crate::error::ConfigError;

/// Where the cluster credentials come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KubeConfigSource {
    File(PathBuf),
    /// Service-account credentials of the pod this process runs in.
    InCluster,
}

impl KubeConfigSource {
    /// Resolve the credential source.
    ///
    /// Priority: explicit path > `KUBECONFIG` > `~/.kube/config` (if it
    /// exists) > in-cluster.
    pub fn resolve(explicit: Option<&Path>, env: &Env) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Ok(Self::File(path.to_path_buf()));
        }
        if let Some(path) = env.optional("KUBECONFIG")? {
            return Ok(Self::File(PathBuf::from(path)));
        }
        if let Some(home) = dirs::home_dir() {
            let default = home.join(".kube").join("config");
            if default.is_file() {
                return Ok(Self::File(default));
            }
        }
        Ok(Self::InCluster)
    }

    /// Build an authenticated client. Any failure here is fatal to the session.
    pub async fn connect(&self) -> Result<kube::Client, ConfigError> {
        let config = match self {
            Self::File(path) => {
                let kubeconfig = Kubeconfig::read_from(path).map_err(|e| {
                    ConfigError::Kubeconfig(format!("read {}: {}", path.display(), e))
                })?;
                kube::Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
                    .await
                    .map_err(|e| {
                        ConfigError::Kubeconfig(format!("build from {}: {}", path.display(), e))
                    })?
            }
            Self::InCluster => kube::Config::incluster()
                .map_err(|e| ConfigError::Kubeconfig(format!("in-cluster config: {e}")))?,
        };

        tracing::debug!(cluster_url = %config.cluster_url, "Resolved cluster configuration");
        kube::Client::try_from(config).map_err(|e| ConfigError::Client(e.to_string()))
    }
}

impl std::fmt::Display for KubeConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::File(path) => write!(f, "{}", path.display()),
            Self::InCluster => write!(f, "in-cluster"),
        }
    }
}
