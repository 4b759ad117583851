//! Axum API server binary.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use vblur_api::{create_router, metrics, ApiConfig, AppState};
use vblur_jobs::JobsConfig;
use vblur_media::command::{check_ffmpeg, check_ffprobe};
use vblur_media::FfmpegCodec;
use vblur_ocr_client::{OcrClient, OcrConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Colored output for dev, JSON for production
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::from_default_env().add_directive("vblur=info".parse()?);

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }

    info!("Starting vblur-api");

    let config = ApiConfig::from_env();
    let jobs_config = JobsConfig::from_env();
    info!(
        "API config: host={}, port={}, max_upload={}MB, auth={}",
        config.host,
        config.port,
        config.max_upload_mb(),
        config.api_key.is_some()
    );

    for check in [check_ffmpeg(), check_ffprobe()] {
        if let Err(e) = check {
            warn!("{}; jobs will fail until it is installed", e);
        }
    }

    let mut ocr_config = OcrConfig::from_env();
    if let Some(url) = &config.ocr_service_url {
        ocr_config = ocr_config.with_base_url(url.clone());
    }
    info!("OCR service: {}", ocr_config.base_url);
    let detector = OcrClient::new(ocr_config).context("Failed to create OCR client")?;

    let codec = FfmpegCodec::new().with_transcode_timeout(jobs_config.transcode_timeout.as_secs());

    let state = AppState::new(config.clone(), jobs_config, Arc::new(codec), Arc::new(detector));
    state
        .jobs
        .artifacts()
        .ensure_dirs()
        .await
        .context("Failed to create storage directories")?;

    let metrics_handle = if config.metrics_enabled {
        match metrics::init_metrics() {
            Ok(handle) => {
                info!("Prometheus metrics enabled at /metrics");
                Some(handle)
            }
            Err(e) => {
                warn!("Failed to install Prometheus recorder: {}", e);
                None
            }
        }
    } else {
        None
    };

    let sweeper = state.jobs.spawn_retention_sweeper();

    let app = create_router(state, metrics_handle);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .context("Invalid bind address")?;

    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    sweeper.abort();
    info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Received shutdown signal");
}
