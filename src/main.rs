mod pipeline;
mod web;

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

use pipeline::{Pipeline, PipelineConfig};
use web::AppState;

/// Intermediates older than this are swept at startup.
const STALE_FILE_SECS: u64 = 2 * 60 * 60;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "auto_video=info,tower_http=info".to_string()),
        )
        .init();

    if let Err(e) = run().await {
        eprintln!("server error: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = PipelineConfig::from_env();

    tokio::fs::create_dir_all(&config.work_dir).await?;
    web::cleanup_stale_files(&config.work_dir, STALE_FILE_SECS).await;

    info!(
        work_dir = %config.work_dir.display(),
        ytdlp = %config.ytdlp_bin,
        ffmpeg = %config.ffmpeg_bin,
        "pipeline configured"
    );

    let state = AppState {
        pipeline: Arc::new(Pipeline::new(config)),
    };

    let app = Router::new()
        .route("/", get(web::form_page))
        .route("/video", post(web::submit_video))
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    let addr = resolve_bind_addr();
    let listener = TcpListener::bind(&addr).await?;
    info!("listening on http://{}", addr);

    axum::serve(listener, app).await?;
    Ok(())
}

fn resolve_bind_addr() -> String {
    if let Ok(configured) = std::env::var("AUTO_VIDEO_ADDR") {
        let trimmed = configured.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    if let Some(port) = std::env::var("PORT")
        .ok()
        .and_then(|value| value.trim().parse::<u16>().ok())
    {
        return format!("0.0.0.0:{}", port);
    }

    "127.0.0.1:8000".to_string()
}
