use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use serde_json::Value;
use tracing::{error, info, warn};

use esteira_core::{Delay, EsteiraConfig, Job, MemoryBackend, Result, WorkQueue};

#[derive(Parser)]
#[command(name = "esteira", about = "Esteira work-queue worker")]
struct Cli {
    /// Queue to operate on (defaults to the configured default queue)
    #[arg(long, global = true)]
    queue: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the consume loop against the in-process backend emulator
    Consume {
        /// Subscription to consume as (defaults to the configured subscriber)
        subscription: Option<String>,

        /// Seconds to sleep when no job is due
        #[arg(long)]
        sleep: Option<u64>,

        /// Attempts after which a repeatedly failing job is dropped
        #[arg(long)]
        max_attempts: Option<u32>,

        /// Seed this many sample jobs before consuming
        #[arg(long, default_value = "0")]
        seed: u32,
    },
}

fn load_config() -> EsteiraConfig {
    let paths = ["esteira.toml", "/etc/esteira/esteira.toml"];

    for path in &paths {
        if Path::new(path).exists() {
            match std::fs::read_to_string(path) {
                Ok(contents) => match toml::from_str(&contents) {
                    Ok(config) => {
                        info!(path, "loaded configuration");
                        return config;
                    }
                    Err(e) => {
                        eprintln!("error parsing {path}: {e}");
                        std::process::exit(1);
                    }
                },
                Err(e) => {
                    eprintln!("error reading {path}: {e}");
                    std::process::exit(1);
                }
            }
        }
    }

    info!("no config file found, using defaults");
    EsteiraConfig::default()
}

#[tokio::main]
async fn main() -> Result<()> {
    esteira_core::telemetry::init_tracing();

    let cli = Cli::parse();
    let mut config = load_config();

    match cli.command {
        Commands::Consume {
            subscription,
            sleep,
            max_attempts,
            seed,
        } => {
            if let Some(subscription) = subscription {
                config.connection.subscriber = subscription;
            }
            let backend = Arc::new(MemoryBackend::new());
            let queue = WorkQueue::new(backend, config.connection.clone());

            let sleep = sleep.unwrap_or(config.worker.sleep_seconds);
            let max_attempts = max_attempts.unwrap_or(config.worker.max_attempts);

            for n in 0..seed {
                let id = queue
                    .push("SampleJob", Value::from(n), cli.queue.as_deref())
                    .await?;
                info!(job_id = %id, "seeded sample job");
            }

            tokio::select! {
                result = consume_loop(&queue, cli.queue.as_deref(), sleep, max_attempts) => result?,
                _ = shutdown_signal() => {}
            }
        }
    }

    Ok(())
}

/// Poll for due jobs forever. An empty pop sleeps for the configured
/// interval; a pop error is logged and treated the same so a transient
/// backend failure does not kill the worker.
async fn consume_loop(
    queue: &WorkQueue,
    name: Option<&str>,
    sleep_seconds: u64,
    max_attempts: u32,
) -> Result<()> {
    info!(
        queue = %queue.queue_name(name),
        sleep_seconds, max_attempts, "consuming"
    );

    loop {
        match queue.pop(name).await {
            Ok(Some(job)) => dispatch(job, max_attempts).await?,
            Ok(None) => tokio::time::sleep(Duration::from_secs(sleep_seconds)).await,
            Err(e) => {
                error!(error = %e, "pop failed");
                tokio::time::sleep(Duration::from_secs(sleep_seconds)).await;
            }
        }
    }
}

async fn dispatch(mut job: Job, max_attempts: u32) -> Result<()> {
    if job.attempts() >= max_attempts {
        warn!(
            job_id = %job.job_id(),
            name = %job.name(),
            attempts = job.attempts(),
            "dropping job after too many attempts"
        );
        return job.delete().await;
    }

    match process(&job) {
        Ok(()) => job.delete().await,
        Err(e) => {
            let backoff = Delay::Seconds(2u64.saturating_pow(job.attempts().min(6)));
            warn!(
                job_id = %job.job_id(),
                name = %job.name(),
                attempts = job.attempts(),
                error = %e,
                "job failed, releasing with backoff"
            );
            job.release(backoff).await
        }
    }
}

/// Placeholder handler: real deployments map `job.name()` to application
/// handlers here.
fn process(job: &Job) -> Result<()> {
    info!(
        job_id = %job.job_id(),
        name = %job.name(),
        attempts = job.attempts(),
        data = %job.envelope().data,
        "processing job"
    );
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = ctrl_c => {},
            _ = sigterm.recv() => {},
        }
    }

    #[cfg(not(unix))]
    {
        ctrl_c.await.expect("failed to install CTRL+C handler");
    }

    info!("received shutdown signal");
}
