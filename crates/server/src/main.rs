use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use curator_core::{
    enrichment::Capabilities, load_config, pipeline::RetryPolicy, validate_config, HistoryStore,
    HttpReachabilityChecker, ItemStore, PipelineRunner, RemoteCapabilityClient,
    RunHistoryRecorder, SanitizedConfig, SqliteHistoryStore, SqliteItemStore,
};

use curator_server::{api::create_router, state::AppState};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Determine config path
    let config_path = std::env::var("CURATOR_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    // Load configuration
    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    // Validate configuration
    validate_config(&config).context("Configuration validation failed")?;

    info!("Configuration loaded successfully");
    info!("Database path: {:?}", config.database.path);
    info!(
        "Batch limits: concurrency {}, session cap {}",
        config.batch.concurrency_limit, config.batch.session_cap
    );

    // Item store and run history share one SQLite file
    let item_store = Arc::new(
        SqliteItemStore::new(&config.database.path).context("Failed to create item store")?,
    );
    info!("Item store initialized");

    let history_store: Arc<dyn HistoryStore> = Arc::new(
        SqliteHistoryStore::new(&config.database.path)
            .context("Failed to create history store")?,
    );
    info!("Run history store initialized");

    // External capabilities
    let reachability = Arc::new(
        HttpReachabilityChecker::new(&config.capabilities)
            .context("Failed to create reachability checker")?,
    );
    let remote = Arc::new(
        RemoteCapabilityClient::new(&config.capabilities)
            .context("Failed to create capability client")?,
    );
    info!(
        "Using enrichment service at {}",
        SanitizedConfig::from(&config).capabilities.endpoint_host
    );

    let capabilities = Capabilities {
        reachability,
        discovery: remote.clone(),
        content: remote.clone(),
        pricing: remote.clone(),
        narrative: remote,
        persister: item_store.clone(),
        names: item_store.clone(),
    };

    let runner = PipelineRunner::new(capabilities)
        .with_history(RunHistoryRecorder::new(Arc::clone(&history_store)))
        .with_retry(RetryPolicy::from(&config.retry));

    // Create app state
    let state = Arc::new(AppState::new(
        config.clone(),
        item_store as Arc<dyn ItemStore>,
        history_store,
        Arc::new(runner),
    ));

    // Create router
    let app = create_router(state);

    // Start server
    let addr = SocketAddr::new(config.server.host, config.server.port);
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shut down");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
