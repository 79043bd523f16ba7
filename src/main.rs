//! Cache Anything demo
//!
//! Starts a cache engine from environment configuration, memoizes a slow
//! computation and runs until interrupted.

use std::time::{Duration, Instant};

use anyhow::Context;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cache_anything::{cache_anything_async, CacheEngine, Config};

/// Main entry point for the demo.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Start the cache engine and its background loops
/// 4. Memoize a slow computation twice, logging miss and hit timings
/// 5. Wait for SIGINT/SIGTERM and stop the background loops
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cache_anything=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    info!(
        "Configuration loaded: max_size_bytes={}, daily_flush_time={}, sweep_interval={}s",
        config.max_size_bytes, config.daily_flush_time, config.sweep_interval
    );

    let engine = CacheEngine::start(&config).context("failed to start cache engine")?;
    let store = engine.store();

    for attempt in 1..=2 {
        let started = Instant::now();
        let report: Vec<u64> =
            cache_anything_async(&store, "demo-report", Some(Duration::from_secs(60)), || async {
                tokio::time::sleep(Duration::from_millis(500)).await;
                Ok::<_, anyhow::Error>((1..=10).map(|n| n * n).collect())
            })
            .await?;
        info!(
            attempt,
            elapsed_ms = started.elapsed().as_millis() as u64,
            items = report.len(),
            "Report ready"
        );
    }
    info!(stats = ?store.stats(), "Cache statistics");

    shutdown_signal().await;
    engine.shutdown().await;

    info!("Shutdown complete");
    Ok(())
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }
}
