//! Sentry Operator - runs Sentry installations described by Sentry resources

use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use futures::StreamExt;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::batch::v1::Job;
use k8s_openapi::api::core::v1::Service;
use kube::runtime::watcher::Config as WatcherConfig;
use kube::runtime::Controller;
use kube::{Api, Client, CustomResourceExt};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use sentry_operator::controller::{error_policy, reconcile, Context, PollConfig, ReconcileConfig};
use sentry_operator::crd::Sentry;

/// Sentry operator - deploys Sentry from Sentry custom resources
#[derive(Parser, Debug)]
#[command(name = "sentry-operator", version, about, long_about = None)]
struct Cli {
    /// Generate CRD manifests and exit
    #[arg(long)]
    crd: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run as controller (default mode)
    Controller(ControllerArgs),
}

#[derive(Args, Debug)]
struct ControllerArgs {
    /// Only watch Sentry resources in this namespace (default: all namespaces)
    #[arg(long, env = "SENTRY_OPERATOR_NAMESPACE")]
    namespace: Option<String>,

    /// Seconds between Job status checks
    #[arg(
        long,
        env = "SENTRY_OPERATOR_POLL_INTERVAL_SECS",
        default_value = "5",
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    poll_interval_secs: u64,

    /// Seconds to wait for a migration or bootstrap Job to complete
    #[arg(
        long,
        env = "SENTRY_OPERATOR_JOB_TIMEOUT_SECS",
        default_value = "600",
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    job_timeout_secs: u64,

    /// Seconds before re-running a pass that created or updated objects
    #[arg(
        long,
        env = "SENTRY_OPERATOR_REQUEUE_SECS",
        default_value = "5",
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    requeue_secs: u64,
}

impl ControllerArgs {
    /// Controller arguments from environment and defaults only
    fn parse_defaults() -> Self {
        #[derive(Parser)]
        struct Wrapper {
            #[command(flatten)]
            args: ControllerArgs,
        }
        Wrapper::parse_from(["sentry-operator"]).args
    }

    fn reconcile_config(&self) -> ReconcileConfig {
        ReconcileConfig {
            poll: PollConfig {
                interval: Duration::from_secs(self.poll_interval_secs),
                timeout: Duration::from_secs(self.job_timeout_secs),
            },
            requeue_interval: Duration::from_secs(self.requeue_secs),
            ..Default::default()
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    if cli.crd {
        // Generate CRD YAML
        let crd = serde_yaml::to_string(&Sentry::crd())
            .map_err(|e| anyhow::anyhow!("Failed to serialize CRD: {}", e))?;
        println!("{crd}");
        return Ok(());
    }

    match cli.command {
        Some(Commands::Controller(args)) => run_controller(args).await,
        None => run_controller(ControllerArgs::parse_defaults()).await,
    }
}

/// Cancel `token` on SIGINT or SIGTERM
fn cancel_on_shutdown(token: CancellationToken) {
    tokio::spawn(async move {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            match signal(SignalKind::terminate()) {
                Ok(mut term) => {
                    tokio::select! {
                        _ = tokio::signal::ctrl_c() => {}
                        _ = term.recv() => {}
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to install SIGTERM handler");
                    let _ = tokio::signal::ctrl_c().await;
                }
            }
        }
        #[cfg(not(unix))]
        {
            let _ = tokio::signal::ctrl_c().await;
        }
        tracing::info!("Shutdown signal received, cancelling in-flight job waits");
        token.cancel();
    });
}

/// Run the Sentry controller until shutdown
async fn run_controller(args: ControllerArgs) -> anyhow::Result<()> {
    let client = Client::try_default()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create Kubernetes client: {}", e))?;

    let config = args.reconcile_config();
    let cancel = CancellationToken::new();
    cancel_on_shutdown(cancel.clone());

    let ctx = Arc::new(Context::from_client(client.clone(), config, cancel));

    let (sentries, jobs, deployments, services) = match args.namespace.as_deref() {
        Some(ns) => (
            Api::<Sentry>::namespaced(client.clone(), ns),
            Api::<Job>::namespaced(client.clone(), ns),
            Api::<Deployment>::namespaced(client.clone(), ns),
            Api::<Service>::namespaced(client, ns),
        ),
        None => (
            Api::<Sentry>::all(client.clone()),
            Api::<Job>::all(client.clone()),
            Api::<Deployment>::all(client.clone()),
            Api::<Service>::all(client),
        ),
    };

    tracing::info!(
        namespace = args.namespace.as_deref().unwrap_or("<all>"),
        poll_interval = ?config.poll.interval,
        job_timeout = ?config.poll.timeout,
        "Starting Sentry controller"
    );

    Controller::new(sentries, WatcherConfig::default())
        .owns(jobs, WatcherConfig::default())
        .owns(deployments, WatcherConfig::default())
        .owns(services, WatcherConfig::default())
        .shutdown_on_signal()
        .run(reconcile, error_policy, ctx)
        .for_each(|result| async move {
            match result {
                Ok(action) => {
                    tracing::debug!(?action, "Sentry reconciliation completed");
                }
                Err(e) => {
                    tracing::error!(error = ?e, "Sentry reconciliation error");
                }
            }
        })
        .await;

    tracing::info!("Sentry controller stopped");
    Ok(())
}
