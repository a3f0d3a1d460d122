//! Session report: one record per executed command or permission probe.

use serde::{Deserialize, Serialize};

use crate::workload::ExecOutput;

/// Outcome of one command or probe.
///
/// `error` is set only when the command could not be run or its channel
/// broke. A command that ran and exited non-zero is not an error; its
/// stderr and `exit_code` say what happened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandResult {
    pub cmd: Vec<String>,
    pub stdout: String,
    pub stderr: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
}

impl CommandResult {
    pub fn from_exec(cmd: &[String], output: ExecOutput) -> Self {
        Self {
            cmd: cmd.to_vec(),
            stdout: output.stdout,
            stderr: output.stderr,
            error: output.failure,
            exit_code: output.exit_code,
        }
    }

    pub fn success(cmd: &[String], stdout: impl Into<String>) -> Self {
        Self {
            cmd: cmd.to_vec(),
            stdout: stdout.into(),
            stderr: String::new(),
            error: None,
            exit_code: None,
        }
    }

    pub fn failed(cmd: &[String], error: impl Into<String>) -> Self {
        Self {
            cmd: cmd.to_vec(),
            stdout: String::new(),
            stderr: String::new(),
            error: Some(error.into()),
            exit_code: None,
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Append-only collector for a session's records.
#[derive(Debug, Default)]
pub struct ResultAggregator {
    results: Vec<CommandResult>,
}

impl ResultAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, result: CommandResult) {
        self.results.push(result);
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn last(&self) -> Option<&CommandResult> {
        self.results.last()
    }

    pub fn finalize(self) -> Report {
        Report {
            results: self.results,
        }
    }
}

/// Final artifact printed to stdout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    pub results: Vec<CommandResult>,
}

impl Report {
    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn error_count(&self) -> usize {
        self.results.iter().filter(|r| r.is_error()).count()
    }
}
