//! Configuration for kube-privateer.
//!
//! Settings are loaded with priority: CLI flag > env var > default.
//! `./.env` is loaded via dotenvy before resolution and never overwrites
//! variables that are already set. The resolved [`SessionConfig`] is
//! immutable and passed explicitly into the session runner.

pub(crate) mod helpers;
mod kubeconfig;

use std::time::Duration;

pub use self::helpers::Env;
pub use self::kubeconfig::KubeConfigSource;

use crate::error::ConfigError;
use crate::workload::IsolationMode;

pub const DEFAULT_NAMESPACE: &str = "default";
pub const DEFAULT_IMAGE: &str = "nicolaka/netshoot:latest";
pub const DEFAULT_TIMEOUT_SECS: u64 = 180;
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 500;

/// Upper bound on the session deadline. Larger values overflow `Instant`.
pub const MAX_TIMEOUT: Duration = Duration::from_secs(24 * 60 * 60);
/// Upper bound on the readiness poll interval.
pub const MAX_POLL_INTERVAL: Duration = Duration::from_secs(60);

/// Everything one probe session needs besides the command list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Namespace the probe workload is created in.
    pub namespace: String,
    /// Image for the probe workload.
    pub image: String,
    /// Deadline for the whole session, from workload submission to the
    /// last command.
    pub timeout: Duration,
    /// Interval between readiness polls.
    pub poll_interval: Duration,
    pub isolation: IsolationMode,
    /// Pause for operator input after every command and probe.
    pub stepping: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            image: DEFAULT_IMAGE.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            isolation: IsolationMode::Restricted,
            stepping: false,
        }
    }
}

impl SessionConfig {
    /// Load from the process environment (after `./.env`).
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::resolve(&Env::process())
    }

    pub fn resolve(env: &Env) -> Result<Self, ConfigError> {
        let timeout_secs = env.parse("PRIVATEER_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS)?;
        let poll_ms = env.parse("PRIVATEER_POLL_INTERVAL_MS", DEFAULT_POLL_INTERVAL_MS)?;

        let config = Self {
            namespace: env.string("PRIVATEER_NAMESPACE", DEFAULT_NAMESPACE)?,
            image: env.string("PRIVATEER_IMAGE", DEFAULT_IMAGE)?,
            timeout: Duration::from_secs(timeout_secs),
            poll_interval: Duration::from_millis(poll_ms),
            isolation: IsolationMode::from(env.bool("PRIVATEER_PRIVILEGED", false)?),
            stepping: env.bool("PRIVATEER_STEP", false)?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would make a session meaningless.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout.is_zero() {
            return Err(ConfigError::InvalidValue {
                key: "timeout".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }
        if self.timeout > MAX_TIMEOUT {
            return Err(ConfigError::InvalidValue {
                key: "timeout".to_string(),
                message: format!("must be at most {}s", MAX_TIMEOUT.as_secs()),
            });
        }
        if self.poll_interval.is_zero() {
            return Err(ConfigError::InvalidValue {
                key: "poll_interval".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }
        if self.poll_interval > MAX_POLL_INTERVAL {
            return Err(ConfigError::InvalidValue {
                key: "poll_interval".to_string(),
                message: format!("must be at most {}s", MAX_POLL_INTERVAL.as_secs()),
            });
        }
        if self.namespace.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "namespace".to_string(),
                message: "must not be empty".to_string(),
            });
        }
        Ok(())
    }
}
