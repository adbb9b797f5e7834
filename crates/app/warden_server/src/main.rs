//! Warden server binary.
//!
//! Loads `.env`, connects to PostgreSQL, runs migrations and serves the
//! authentication API until interrupted.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use sqlx::postgres::PgPoolOptions;
use tracing::{info, warn};
use warden_api::AppState;
use warden_api::config::ApiConfig;
use warden_core::auth::queries::PgCredentialStore;

/// Interval of the expired refresh-token purge.
const PURGE_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// CLI arguments for the server.
#[derive(Parser, Debug)]
#[command(name = "warden_server", about = "Warden credential and session server")]
struct Args {
    /// Port to listen on. Overrides the port of `BIND_ADDR`.
    #[arg(long)]
    port: Option<u16>,

    /// PostgreSQL connection URL.
    #[arg(
        long,
        env = "DATABASE_URL",
        default_value = "postgres://localhost:5432/warden",
        hide_env_values = true
    )]
    database_url: String,

    /// Maximum number of database connections in the pool.
    #[arg(long, default_value_t = 10)]
    max_connections: u32,
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}

fn spawn_purge_task(state: &AppState) -> tokio::task::JoinHandle<()> {
    let session = Arc::clone(&state.session);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(PURGE_INTERVAL);
        loop {
            interval.tick().await;
            match session.tokens().purge_expired().await {
                Ok(0) => {}
                Ok(purged) => info!(purged, "purged expired refresh tokens"),
                Err(e) => warn!(error = %e, "refresh token purge failed"),
            }
        }
    })
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new("info,warden_api=debug,warden_core=debug")
            }),
        )
        .init();

    let args = Args::parse();
    let mut config = ApiConfig::from_env()?;
    if let Some(port) = args.port {
        let mut addr: SocketAddr = config.bind_addr.parse()?;
        addr.set_port(port);
        config.bind_addr = addr.to_string();
    }

    info!(
        max_connections = args.max_connections,
        trust_proxy = config.trust_proxy,
        federated = config.google.is_some(),
        "starting warden_server"
    );

    let pool = PgPoolOptions::new()
        .max_connections(args.max_connections)
        .acquire_timeout(Duration::from_secs(30))
        .connect(&args.database_url)
        .await?;

    info!("running database migrations");
    warden_api::migrate(&pool).await?;

    let store = Arc::new(PgCredentialStore::new(pool));
    let state = AppState::new(store, config.clone())?;

    state.guard.spawn_cleanup_task();
    if let Some(provider) = &state.federated {
        provider.pending().spawn_cleanup_task();
    }
    spawn_purge_task(&state);

    let app = warden_api::router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!(addr = %listener.local_addr()?, "REST API listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    Ok(())
}
