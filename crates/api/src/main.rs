use std::sync::Arc;

use shorts_api::{
    build_router,
    state::{AppState, default_collaborators},
};
use shorts_config::Settings;
use shorts_services::{Orchestrator, ensure_bucket};
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file (silently ignore if missing)
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            "shorts_api=debug,shorts_services=debug,shorts_timeline=info,tower_http=debug".into()
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load config
    let settings = Settings::load()?;
    info!("Starting shorts API on {}:{}", settings.app.host, settings.app.port);
    info!(
        endpoint = %settings.s3.endpoint,
        bucket = %settings.s3.bucket,
        images = settings.pipeline.image_count,
        subtitle_mode = ?settings.pipeline.subtitle_mode,
        "Pipeline config"
    );

    let collaborators = default_collaborators(&settings);

    // Storage must be reachable before accepting jobs
    ensure_bucket(
        collaborators.storage.as_ref(),
        &settings.s3.bucket,
        &CancellationToken::new(),
    )
    .await?;
    info!(bucket = %settings.s3.bucket, "Storage ready");

    let app_state = AppState::new(settings.clone(), collaborators);
    let orchestrator = Arc::clone(&app_state.orchestrator);

    // Build router
    let app = build_router(app_state);

    // Start server
    let addr = format!("{}:{}", settings.app.host, settings.app.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(orchestrator))
        .await?;

    Ok(())
}

async fn shutdown_signal(orchestrator: Arc<Orchestrator>) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
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
    orchestrator.shutdown();
}
