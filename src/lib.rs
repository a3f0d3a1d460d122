//! kube-privateer: probe-workload orchestrator for Kubernetes
//! container-escape and RBAC reconnaissance testing.
//!
//! A session provisions a short-lived pod with the requested isolation
//! profile, waits for it to run, streams a scripted list of commands into
//! it one at a time, optionally appends a report of what the calling
//! credential can see, and always deletes the pod.

pub mod config;
pub mod error;
pub mod exec;
pub mod permissions;
pub mod probes;
pub mod report;
pub mod session;
pub mod stepper;
pub mod workload;

pub use config::SessionConfig;
pub use error::{ApiError, ConfigError, SessionError};
pub use probes::{ProbeKind, ProbePlan};
pub use report::{CommandResult, Report};
pub use session::SessionRunner;
pub use stepper::Stepper;
