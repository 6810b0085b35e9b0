mod config;
mod handlers;
mod metrics;
mod server;
#[cfg(test)]
mod tests;

use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio_stream::wrappers::TcpListenerStream;
use tonic::transport::Server;
use tracing_subscriber::EnvFilter;

use config::ServerConfig;
use flock_assets_memory::MemoryAssetStore;
use flock_proto::flock_service_server::FlockServiceServer;
use flock_store_sqlite::SqliteStore;
use server::FlockServer;

// ────────────────────────────────────── CLI Types ──────────────────────────────────────

#[derive(Parser)]
#[command(name = "flock-server")]
#[command(about = "Flock consensus server for administration and serving")]
struct Cli {
    /// Database URL (sqlite://path/to/db.db)
    #[arg(long, global = true, env = "DATABASE_URL")]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the gRPC server
    Serve {
        /// Server address
        #[arg(long, default_value = "0.0.0.0:50051")]
        addr: String,

        /// Health check HTTP server address
        #[arg(long, default_value = "0.0.0.0:8080")]
        health_addr: String,

        /// Path to TLS certificate file (PEM format)
        #[arg(long, env = "FLOCK_TLS_CERT")]
        tls_cert: Option<String>,

        /// Path to TLS private key file (PEM format)
        #[arg(long, env = "FLOCK_TLS_KEY")]
        tls_key: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Serve {
            addr,
            health_addr,
            tls_cert,
            tls_key,
        } => cmd_serve(cli.database_url, &addr, &health_addr, tls_cert, tls_key).await,
    }
}

// ────────────────────────────────────── Serve ──────────────────────────────────────

#[derive(Clone)]
struct HealthState {
    ready: tokio::sync::watch::Receiver<bool>,
    metrics: metrics_exporter_prometheus::PrometheusHandle,
}

async fn health_handler() -> &'static str {
    "ok"
}

async fn readiness_handler(
    axum::extract::State(state): axum::extract::State<HealthState>,
) -> (axum::http::StatusCode, &'static str) {
    if *state.ready.borrow() {
        (axum::http::StatusCode::OK, "ready")
    } else {
        (axum::http::StatusCode::SERVICE_UNAVAILABLE, "not ready")
    }
}

async fn metrics_handler(
    axum::extract::State(state): axum::extract::State<HealthState>,
) -> String {
    state.metrics.render()
}

async fn shutdown_signal(readiness_tx: tokio::sync::watch::Sender<bool>) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        return;
    }
    tracing::info!("Shutdown signal received");
    // Mark not-ready so load balancers drain before we stop accepting
    let _ = readiness_tx.send(false);
}

async fn cmd_serve(
    database_url: Option<String>,
    addr: &str,
    health_addr: &str,
    tls_cert: Option<String>,
    tls_key: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    use axum::{routing::get, Router};

    let addr: std::net::SocketAddr = addr.parse()?;
    let health_addr: std::net::SocketAddr = health_addr.parse()?;

    // Validate TLS configuration: both cert and key must be provided together
    match (&tls_cert, &tls_key) {
        (Some(_), None) => {
            return Err("TLS certificate provided without key. Both --tls-cert and --tls-key are required for TLS.".into());
        }
        (None, Some(_)) => {
            return Err("TLS key provided without certificate. Both --tls-cert and --tls-key are required for TLS.".into());
        }
        _ => {}
    }

    let db_url = database_url.unwrap_or_else(|| "sqlite://flock.db?mode=rwc".to_string());
    let store = Arc::new(SqliteStore::open(&db_url).await?);

    let config = ServerConfig::from_env()?;
    let assets = Arc::new(MemoryAssetStore::new(&config.asset_base_url));
    let server = FlockServer::new(store, assets, config);

    let metrics_handle = metrics::init_metrics();

    // gRPC health service (implements the gRPC health checking protocol)
    let (health_reporter, health_service) = tonic_health::server::health_reporter();
    health_reporter
        .set_serving::<FlockServiceServer<FlockServer>>()
        .await;

    // HTTP endpoints for Kubernetes probes and Prometheus scraping
    let (readiness_tx, readiness_rx) = tokio::sync::watch::channel(false);
    let health_state = HealthState {
        ready: readiness_rx,
        metrics: metrics_handle,
    };
    let health_router = Router::new()
        .route("/healthz", get(health_handler))
        .route("/readyz", get(readiness_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(health_state);

    // Bind listeners to get actual addresses
    let grpc_listener = tokio::net::TcpListener::bind(addr).await?;
    let grpc_actual_addr = grpc_listener.local_addr()?;

    let health_listener = tokio::net::TcpListener::bind(health_addr).await?;
    let health_actual_addr = health_listener.local_addr()?;

    tracing::info!("FlockServer listening on {}", grpc_actual_addr);
    tracing::info!("Health checks listening on {}", health_actual_addr);

    // Build gRPC server with optional TLS
    let mut grpc_builder = if let (Some(cert_path), Some(key_path)) = (tls_cert, tls_key) {
        let cert = std::fs::read_to_string(&cert_path)?;
        let key = std::fs::read_to_string(&key_path)?;
        let identity = tonic::transport::Identity::from_pem(cert, key);
        let tls_config = tonic::transport::ServerTlsConfig::new().identity(identity);
        Server::builder().tls_config(tls_config)?
    } else {
        Server::builder()
    };

    // Signal readiness after TLS config is successfully built
    let _ = readiness_tx.send(true);

    // Broadcast channel so both servers shut down together
    let (shutdown_tx, _) = tokio::sync::broadcast::channel::<()>(1);
    let shutdown_tx_clone = shutdown_tx.clone();
    tokio::spawn(async move {
        shutdown_signal(readiness_tx).await;
        let _ = shutdown_tx_clone.send(());
    });

    let mut shutdown_rx_http = shutdown_tx.subscribe();
    let health_server =
        axum::serve(health_listener, health_router).with_graceful_shutdown(async move {
            let _ = shutdown_rx_http.recv().await;
        });

    let mut shutdown_rx_grpc = shutdown_tx.subscribe();
    let grpc_server = grpc_builder
        .add_service(health_service)
        .add_service(FlockServiceServer::new(server))
        .serve_with_incoming_shutdown(TcpListenerStream::new(grpc_listener), async move {
            let _ = shutdown_rx_grpc.recv().await;
        });

    tokio::try_join!(
        async { grpc_server.await.map_err(Box::<dyn std::error::Error>::from) },
        async { health_server.await.map_err(Box::<dyn std::error::Error>::from) },
    )?;

    Ok(())
}
