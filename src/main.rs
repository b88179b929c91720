//! mailhook binary: loads configuration, starts the poll schedule, and runs
//! until Ctrl-C or SIGTERM.
//!
//! ```bash
//! # config.yaml in the working directory, or:
//! export MAILHOOK_CONFIG=/etc/mailhook.yaml
//! # Set log level (trace, debug, info, warn, error)
//! export RUST_LOG=mailhook=debug
//!
//! mailhook
//! ```

use anyhow::Context;
use mailhook::{CheckPipeline, ImapStore, PollConfig, Scheduler, WebhookNotifier};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("mailhook=info")),
        )
        .with_target(true)
        .init();

    let config = Arc::new(PollConfig::load().context("error loading config")?);

    if config.allow_list.is_empty() {
        tracing::warn!("No allowed domains configured; every message will be ignored");
    }
    tracing::info!(
        imap_host = %config.host,
        mailbox = %config.mailbox,
        interval_secs = config.interval.as_secs(),
        lookback_secs = config.lookback().as_secs(),
        allowed_domains = config.allow_list.len(),
        "Configuration loaded"
    );

    let pipeline = Arc::new(CheckPipeline::new(
        &config,
        ImapStore::new(Arc::clone(&config)),
        WebhookNotifier::new(&config),
    ));

    let scheduler = Scheduler::start(config.interval, move || {
        let pipeline = Arc::clone(&pipeline);
        async move { pipeline.run_cycle().await }
    })
    .context("error starting scheduler")?;

    tracing::info!("Bot started. Press Ctrl+C to exit.");

    wait_for_shutdown().await?;

    tracing::info!("Shutdown requested, waiting for the current cycle");
    scheduler.shutdown().await;

    Ok(())
}

#[cfg(unix)]
async fn wait_for_shutdown() -> anyhow::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = signal(SignalKind::terminate()).context("installing SIGTERM handler")?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => result.context("listening for Ctrl-C")?,
        _ = terminate.recv() => {}
    }
    Ok(())
}

#[cfg(not(unix))]
async fn wait_for_shutdown() -> anyhow::Result<()> {
    tokio::signal::ctrl_c()
        .await
        .context("listening for Ctrl-C")
}
