//! Operator-paced stepping.
//!
//! When enabled, the session stops after every command and every permission
//! probe, shows what just happened, and waits for one line of input. This
//! wait is not bounded by the session deadline: running with stepping
//! enabled and nobody at the keyboard will hang.

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};

use crate::report::CommandResult;

pub struct Stepper {
    enabled: bool,
    input: Box<dyn AsyncBufRead + Unpin + Send>,
    output: Box<dyn AsyncWrite + Unpin + Send>,
}

impl Stepper {
    /// A gate that never blocks.
    pub fn disabled() -> Self {
        Self::with_io(false, tokio::io::empty(), tokio::io::sink())
    }

    /// Prompt on stderr and read acknowledgements from stdin. Stdout stays
    /// reserved for the report.
    pub fn stdio(enabled: bool) -> Self {
        if !enabled {
            return Self::disabled();
        }
        Self::with_io(true, BufReader::new(tokio::io::stdin()), tokio::io::stderr())
    }

    pub fn with_io(
        enabled: bool,
        input: impl AsyncBufRead + Unpin + Send + 'static,
        output: impl AsyncWrite + Unpin + Send + 'static,
    ) -> Self {
        Self {
            enabled,
            input: Box::new(input),
            output: Box::new(output),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Show `label` and the latest result, then wait for one input line.
    ///
    /// End of input or a read error resumes the session rather than
    /// stalling it.
    pub async fn gate(&mut self, label: &str, latest: Option<&CommandResult>) {
        if !self.enabled {
            return;
        }

        let mut prompt = format!("\n[step] {label} was executed\n");
        if let Some(result) = latest {
            prompt.push_str(&result.stdout);
            prompt.push_str(&result.stderr);
            if let Some(ref error) = result.error {
                prompt.push_str(&format!("error: {error}\n"));
            }
        }
        prompt.push_str("Press Enter to continue...\n");

        if let Err(e) = self.write_prompt(&prompt).await {
            tracing::debug!(error = %e, "Failed to write step prompt");
        }

        let mut line = String::new();
        match self.input.read_line(&mut line).await {
            Ok(0) => tracing::debug!("Step input closed, continuing"),
            Ok(_) => {}
            Err(e) => tracing::warn!(error = %e, "Failed to read step input, continuing"),
        }
    }

    async fn write_prompt(&mut self, prompt: &str) -> std::io::Result<()> {
        self.output.write_all(prompt.as_bytes()).await?;
        self.output.flush().await
    }
}
