//! Command stream executor.
//!
//! Runs the command list inside a ready workload one command at a time.
//! A failing command never stops the sequence: many probes are expected to
//! fail and the failure is the finding. Only the session deadline stops it.

use tokio::time::Instant;

use crate::report::{CommandResult, ResultAggregator};
use crate::stepper::Stepper;
use crate::workload::{WorkloadApi, WorkloadHandle};

/// Error recorded for the command that was in flight when the deadline hit.
pub const DEADLINE_EXCEEDED: &str = "session deadline exceeded";

/// How the command loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecOutcome {
    /// Every command produced a record.
    Completed,
    /// The deadline expired. `attempted` commands have records; the rest
    /// were never started.
    DeadlineExceeded { attempted: usize },
}

pub struct CommandExecutor<'a> {
    api: &'a dyn WorkloadApi,
}

impl<'a> CommandExecutor<'a> {
    pub fn new(api: &'a dyn WorkloadApi) -> Self {
        Self { api }
    }

    /// Execute `commands` in order, appending one record per command.
    pub async fn run(
        &self,
        handle: &WorkloadHandle,
        commands: &[Vec<String>],
        deadline: Instant,
        stepper: &mut Stepper,
        results: &mut ResultAggregator,
    ) -> ExecOutcome {
        for (index, command) in commands.iter().enumerate() {
            // Stepping can outlast the deadline; never start a command late.
            if Instant::now() >= deadline {
                tracing::warn!(
                    workload = %handle,
                    remaining = commands.len() - index,
                    "Deadline reached, skipping remaining commands"
                );
                return ExecOutcome::DeadlineExceeded { attempted: index };
            }

            tracing::debug!(workload = %handle, ?command, "Executing command");
            let result = match tokio::time::timeout_at(deadline, self.api.exec(handle, command))
                .await
            {
                Ok(Ok(output)) => CommandResult::from_exec(command, output),
                Ok(Err(e)) => {
                    tracing::debug!(?command, error = %e, "Exec channel failed");
                    CommandResult::failed(command, e.to_string())
                }
                Err(_) => {
                    tracing::warn!(workload = %handle, ?command, "Deadline hit while command was running");
                    results.append(CommandResult::failed(command, DEADLINE_EXCEEDED));
                    return ExecOutcome::DeadlineExceeded {
                        attempted: index + 1,
                    };
                }
            };

            results.append(result);
            stepper
                .gate(&format!("Command {command:?}"), results.last())
                .await;
        }

        ExecOutcome::Completed
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::error::ApiError;
    use crate::workload::{ExecOutput, WorkloadPhase, WorkloadSpec};

    /// Answers exec calls by the command's first word.
    #[derive(Default)]
    struct ScriptedExec {
        failures: HashMap<String, ApiError>,
        slow: Option<(String, Duration)>,
        seen: Mutex<Vec<Vec<String>>>,
    }

    #[async_trait]
    impl WorkloadApi for ScriptedExec {
        async fn create(&self, _: &WorkloadHandle, _: &WorkloadSpec) -> Result<(), ApiError> {
            Ok(())
        }

        async fn phase(&self, _: &WorkloadHandle) -> Result<WorkloadPhase, ApiError> {
            Ok(WorkloadPhase::Running)
        }

        async fn delete(&self, _: &WorkloadHandle) -> Result<(), ApiError> {
            Ok(())
        }

        async fn exec(
            &self,
            _: &WorkloadHandle,
            command: &[String],
        ) -> Result<ExecOutput, ApiError> {
            self.seen.lock().unwrap().push(command.to_vec());
            if let Some((ref name, delay)) = self.slow
                && command[0] == *name
            {
                tokio::time::sleep(delay).await;
            }
            if let Some(err) = self.failures.get(&command[0]) {
                return Err(err.clone());
            }
            Ok(ExecOutput {
                stdout: format!("{} ok\n", command[0]),
                ..Default::default()
            })
        }
    }

    fn commands(names: &[&str]) -> Vec<Vec<String>> {
        names.iter().map(|n| vec![n.to_string()]).collect()
    }

    fn handle() -> WorkloadHandle {
        WorkloadHandle::new("probe", "default")
    }

    #[tokio::test(start_paused = true)]
    async fn test_failures_do_not_stop_the_sequence() {
        let api = ScriptedExec {
            failures: [
                ("b".to_string(), ApiError::Stream("exec failed: not found".into())),
                ("d".to_string(), ApiError::Forbidden("exec denied".into())),
            ]
            .into_iter()
            .collect(),
            ..Default::default()
        };
        let mut results = ResultAggregator::new();
        let outcome = CommandExecutor::new(&api)
            .run(
                &handle(),
                &commands(&["a", "b", "c", "d", "e"]),
                Instant::now() + Duration::from_secs(60),
                &mut Stepper::disabled(),
                &mut results,
            )
            .await;

        assert_eq!(outcome, ExecOutcome::Completed);
        let report = results.finalize();
        assert_eq!(report.results.len(), 5);
        let order: Vec<_> = report.results.iter().map(|r| r.cmd[0].as_str()).collect();
        assert_eq!(order, ["a", "b", "c", "d", "e"]);

        assert_eq!(report.results[1].error.as_deref(), Some("exec failed: not found"));
        assert_eq!(report.results[1].stdout, "");
        assert_eq!(report.results[2].stdout, "c ok\n");
        assert!(report.results[2].error.is_none());
        assert_eq!(report.results[3].error.as_deref(), Some("exec denied"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_cancels_in_flight_command() {
        let api = ScriptedExec {
            slow: Some(("b".to_string(), Duration::from_secs(30))),
            ..Default::default()
        };
        let mut results = ResultAggregator::new();
        let outcome = CommandExecutor::new(&api)
            .run(
                &handle(),
                &commands(&["a", "b", "c"]),
                Instant::now() + Duration::from_secs(5),
                &mut Stepper::disabled(),
                &mut results,
            )
            .await;

        assert_eq!(outcome, ExecOutcome::DeadlineExceeded { attempted: 2 });
        let report = results.finalize();
        assert_eq!(report.results.len(), 2);
        assert_eq!(report.results[0].stdout, "a ok\n");
        assert_eq!(report.results[1].error.as_deref(), Some(DEADLINE_EXCEEDED));
        // "c" was never started.
        assert_eq!(api.seen.lock().unwrap().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_deadline_starts_nothing() {
        let api = ScriptedExec::default();
        let mut results = ResultAggregator::new();
        let outcome = CommandExecutor::new(&api)
            .run(
                &handle(),
                &commands(&["a"]),
                Instant::now(),
                &mut Stepper::disabled(),
                &mut results,
            )
            .await;

        assert_eq!(outcome, ExecOutcome::DeadlineExceeded { attempted: 0 });
        assert!(results.is_empty());
        assert!(api.seen.lock().unwrap().is_empty());
    }
}
