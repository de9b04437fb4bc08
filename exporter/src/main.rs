// exporter/src/main.rs

//! btcd exporter binary.
//!
//! This binary exposes a btcd node's health to Prometheus:
//!
//! - `GET /`        static landing page
//! - `GET /metrics` one collect-on-scrape cycle in text format
//!
//! Configuration comes from flags or `BTCD_EXPORTER_*` environment
//! variables. Any configuration problem ends the process before the
//! listener is bound.

mod config;
mod routes;
mod state;

use std::sync::Arc;

use axum::{Router, routing::get};
use clap::Parser;
use tokio::signal;

use btcd_collector::config::CERT_PATH_VAR;
use btcd_collector::{BtcdCollector, BtcdRpcClient, MetricsRegistry, TlsConfig};
use config::{Args, ServerConfig};
use routes::{landing, metrics};
use state::{AppState, SharedState};

const DEFAULT_LOG_FILTER: &str = "btcd_exporter=info,btcd_collector=info";

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .init();

    // Missing or malformed options exit here with a usage error.
    let args = Args::parse();

    if let Err(e) = run(args) {
        tracing::error!("fatal error: {e}");
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<(), String> {
    // ---------------------------
    // Configuration
    // ---------------------------

    let (exporter_cfg, server_cfg) = args
        .resolve(&|var: &str| std::env::var(var).ok())
        .map_err(|e| e.to_string())?;

    if let TlsConfig::Certificate {
        path,
        defaulted: true,
    } = &exporter_cfg.rpc.tls
    {
        tracing::info!(
            "{CERT_PATH_VAR} not set, using default path: {}",
            path.display()
        );
    }

    let cert = exporter_cfg
        .rpc
        .read_certificate()
        .map_err(|e| e.to_string())?;

    // ---------------------------
    // Upstream client + collector
    // ---------------------------

    // Built outside the async runtime: the blocking client owns its own.
    let client = BtcdRpcClient::new(&exporter_cfg.rpc, cert.as_deref())
        .map_err(|e| format!("failed to create btcd RPC client: {e}"))?;
    tracing::info!(url = client.url(), "btcd RPC client ready");

    let collector = BtcdCollector::new(client, exporter_cfg.collector)
        .map_err(|e| format!("failed to build collector: {e}"))?;

    let metrics = Arc::new(
        MetricsRegistry::with_collector(collector)
            .map_err(|e| format!("failed to register collector: {e}"))?,
    );

    // ---------------------------
    // HTTP server
    // ---------------------------

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| format!("failed to build tokio runtime: {e}"))?;

    let app_state: SharedState = Arc::new(AppState {
        metrics: metrics.clone(),
    });

    runtime.block_on(serve(server_cfg, app_state))
}

fn router(state: SharedState) -> Router {
    Router::new()
        .route("/", get(landing::landing))
        .route("/metrics", get(metrics::metrics))
        .with_state(state)
}

async fn serve(cfg: ServerConfig, state: SharedState) -> Result<(), String> {
    let listener = tokio::net::TcpListener::bind(cfg.listen_addr)
        .await
        .map_err(|e| format!("failed to bind {}: {e}", cfg.listen_addr))?;

    tracing::info!("starting server on http://{}", cfg.listen_addr);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| format!("HTTP server error: {e}"))?;

    Ok(())
}

/// Waits for Ctrl-C and returns, used for graceful shutdown.
async fn shutdown_signal() {
    let _ = signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}
