use sr_retrieval::{
    api::{build_router, AppState},
    config::Config,
    engine::{PassthroughAnalyzer, RetrievalEngine},
    feedback::create_feedback_store,
    scheduler::MergeScheduler,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::load().unwrap_or_else(|e| {
        eprintln!("Failed to load configuration: {}", e);
        eprintln!("Using default configuration");
        Config::default()
    });

    // Initialize tracing
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "sr_retrieval=info,tower_http=info".into());
    if config.observability.json_logs {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    tracing::info!("Starting SR retrieval engine v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Data directory: {:?}", config.storage.data_dir);

    std::fs::create_dir_all(&config.storage.data_dir)?;

    // Initialize feedback store
    let feedback_store = create_feedback_store(&config.storage)?;
    tracing::info!("✅ Feedback store initialized");

    // Initialize the retrieval engine (loads persisted index + staging)
    let engine = Arc::new(RetrievalEngine::new(
        &config,
        feedback_store,
        Arc::new(PassthroughAnalyzer),
    )?);
    let status = engine.status().await;
    tracing::info!(
        indexed_records = status.indexed_records,
        pending_staged = status.pending_staged,
        "✅ Retrieval engine initialized"
    );

    // Start the learning-merge scheduler
    let mut scheduler = MergeScheduler::new(config.learning.clone()).await?;
    if config.learning.enabled {
        scheduler.register_merge_job(engine.clone()).await?;
        scheduler.start().await?;
        tracing::info!(
            schedule = %config.learning.merge_schedule,
            "✅ Learning merge scheduler started"
        );
    } else {
        tracing::info!("⚠️  Learning merge scheduler disabled in configuration");
    }

    // Build and serve the HTTP API
    let state = AppState::new(engine);
    let router = build_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.http_port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("✅ HTTP API listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Shutting down");
    scheduler.shutdown().await?;

    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("Shutdown signal received");
}
