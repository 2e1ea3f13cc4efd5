//! Inc - Token Counter Service
//!
//! Opens the configured store, bootstraps its schema and serves the HTTP
//! API until Ctrl-C.

use std::sync::Arc;

use clap::Parser;
use inc::api::{self, AppState};
use inc::constants::HTTP_BIND_ADDRESS_DEFAULT;
use inc::metrics::{self, MetricsCollector, NullMetrics};
use inc::store::{self, CounterStore};
use inc::{ServiceConfig, APP_NAME, APP_VERSION};

// =============================================================================
// CLI
// =============================================================================

/// Inc - token-based counter service
#[derive(Parser, Debug)]
#[command(name = APP_NAME)]
#[command(about = "Token-based counter service")]
#[command(version)]
struct Cli {
    /// HTTP API bind address
    #[arg(short, long, default_value = HTTP_BIND_ADDRESS_DEFAULT)]
    bind: String,

    /// Store connection string (memory://, postgres://..., redis://...)
    ///
    /// Falls back to DB_URL, PG_DB_URL, REDIS_DB_URL.
    #[arg(long)]
    db_url: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // Initialize logging
    let filter = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| filter.into()),
        )
        .init();

    tracing::info!("inc v{}", APP_VERSION);

    let config = ServiceConfig::resolve(&cli.bind, cli.db_url)?;

    let backend = store::open(&config.backend_url).await?;
    backend.create_schema().await?;
    tracing::info!(backend = %backend.kind(), "store ready");

    let collector: Arc<dyn MetricsCollector> = match metrics::collector(&config.metrics) {
        Ok(collector) => collector,
        Err(e) => {
            tracing::warn!(error = %e, "metrics disabled");
            Arc::new(NullMetrics)
        }
    };

    let state = AppState::new(backend.clone(), collector);
    let app = api::router(state);

    tracing::info!("Starting HTTP server on {}", config.bind);
    let listener = tokio::net::TcpListener::bind(config.bind).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    backend.close().await?;
    tracing::info!("Server stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Received Ctrl+C, initiating shutdown...");
}
