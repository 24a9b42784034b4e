use axum::{response::Json, routing::get, Router};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tracing::{info, warn};

mod api;
mod assets;
mod config;
mod error;
mod jobs;
mod media;
mod progress;
mod render;

use config::DaemonConfig;
use media::FfmpegTool;

const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

#[derive(Serialize)]
struct HealthResponse {
    ok: bool,
    version: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        ok: true,
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = DaemonConfig::from_env()?;

    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .init();

    std::fs::create_dir_all(&config.cache_dir)?;
    std::fs::create_dir_all(&config.output_dir)?;

    let tool = FfmpegTool::new(&config.ffmpeg, &config.ffprobe);
    if let Err(err) = tool.check() {
        warn!(error = %err, "media tools unavailable, renders will fail until they are installed");
    }

    let renderer = render::Renderer::new(Arc::new(tool), &config.cache_dir, config.debug);
    let job_manager = Arc::new(jobs::JobManager::with_retention(config.job_retention));
    let config = Arc::new(config);
    let state = api::AppState {
        jobs: job_manager.clone(),
        renderer: Arc::new(renderer),
        config: config.clone(),
    };

    // Build the router with CORS support
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
        .allow_credentials(false);

    let app = Router::new()
        .route("/health", get(health))
        .nest("/api", api::router(state))
        .nest_service("/outputs", ServeDir::new(&config.output_dir))
        .layer(cors);

    info!("Starting render daemon on {}", config.bind);
    let listener = tokio::net::TcpListener::bind(config.bind).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let cancelled = job_manager.cancel_all();
    if cancelled > 0 {
        info!(jobs = cancelled, "cancelled running renders");
    }
    if !job_manager.drain(SHUTDOWN_GRACE).await {
        warn!("renders still tearing down at exit");
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}
