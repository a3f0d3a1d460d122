//! kube-privateer - Main entry point.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use kube_privateer::{ProbeKind, SessionConfig, SessionRunner, Stepper, workload::IsolationMode};

#[derive(Parser, Debug)]
#[command(name = "kube-privateer")]
#[command(about = "Container-escape and RBAC reconnaissance probes for Kubernetes")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the escape probes (identity, capabilities, host mounts, runtime sockets)
    Escape(SessionArgs),
    /// Run the RBAC probes, then report bindings, self rules and secret metadata
    Rbac(SessionArgs),
    /// Run the RBAC probes plus cluster service discovery, then the permission report
    Recon(SessionArgs),
}

impl Command {
    fn split(self) -> (ProbeKind, SessionArgs) {
        match self {
            Self::Escape(args) => (ProbeKind::Escape, args),
            Self::Rbac(args) => (ProbeKind::Rbac, args),
            Self::Recon(args) => (ProbeKind::Recon, args),
        }
    }
}

#[derive(Args, Debug)]
struct SessionArgs {
    /// Path to kubeconfig file (default KUBECONFIG or $HOME/.kube/config)
    #[arg(long)]
    kubeconfig: Option<PathBuf>,

    /// Namespace for the probe pod
    #[arg(short, long)]
    namespace: Option<String>,

    /// Image for the probe pod
    #[arg(short, long)]
    image: Option<String>,

    /// Overall timeout for the session (e.g. "90s", "3m")
    #[arg(short, long, value_parser = humantime::parse_duration)]
    timeout: Option<Duration>,

    /// Interval between readiness polls (e.g. "500ms")
    #[arg(long, value_parser = humantime::parse_duration)]
    poll_interval: Option<Duration>,

    /// Wait for Enter after each command so the sequence can be stepped through
    #[arg(short = 's', long)]
    stopper: bool,

    /// Create a privileged pod: privileged=true, hostPID=true, host / mounted at
    /// /hostroot, caps SYS_ADMIN, NET_ADMIN, SYS_PTRACE
    #[arg(long)]
    privileged: bool,
}

impl SessionArgs {
    fn apply(&self, mut config: SessionConfig) -> anyhow::Result<SessionConfig> {
        if let Some(ref namespace) = self.namespace {
            config.namespace = namespace.clone();
        }
        if let Some(ref image) = self.image {
            config.image = image.clone();
        }
        if let Some(timeout) = self.timeout {
            config.timeout = timeout;
        }
        if let Some(interval) = self.poll_interval {
            config.poll_interval = interval;
        }
        if self.privileged {
            config.isolation = IsolationMode::Privileged;
        }
        config.stepping |= self.stopper;
        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr; stdout carries only the JSON report.
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("kube_privateer=info"));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .init();

    let (probe, args) = cli.command.split();
    let config = args.apply(SessionConfig::from_env()?)?;

    let runner = SessionRunner::connect(args.kubeconfig.as_deref()).await?;

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupted, tearing down probe workload");
                cancel.cancel();
            }
        });
    }

    let mut stepper = Stepper::stdio(config.stepping);
    tracing::info!(probe = %probe, "Running probe session");

    let report = runner
        .run(&config, &probe.plan(), &mut stepper, cancel)
        .await?;

    println!("{}", report.to_json_pretty()?);
    Ok(())
}
