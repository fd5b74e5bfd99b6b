//! hfrisk: heart-failure risk prediction service
//!
//! Main entry point for the web server.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use hfrisk::adapters::sanitize::SanitizingMakeWriter;
use hfrisk::config::ServeConfig;
use hfrisk::PredictionService;

fn main() -> Result<()> {
    // Initialize logging.
    // - HFRISK_LOG_MODE=stdout (default): container-friendly
    // - HFRISK_LOG_MODE=file: append to HFRISK_LOG_FILE
    let log_mode = std::env::var("HFRISK_LOG_MODE").unwrap_or_else(|_| "stdout".to_string());

    let (writer, _guard) = if log_mode == "file" {
        let log_file = std::env::var("HFRISK_LOG_FILE").unwrap_or_else(|_| "hfrisk.log".to_string());

        if let Some(parent) = std::path::Path::new(&log_file).parent() {
            // Best-effort: open() below reports the real failure.
            let _ = std::fs::create_dir_all(parent);
        }

        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .with_context(|| format!("Failed to open log file {log_file}"))?;
        tracing_appender::non_blocking(file)
    } else {
        tracing_appender::non_blocking(std::io::stdout())
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(SanitizingMakeWriter::new(writer)))
        .init();

    tracing::info!("Starting hfrisk...");

    let config = ServeConfig::from_env()?;
    let service = PredictionService::from_artifacts(&config.artifacts_dir)
        .with_context(|| format!("Failed to load artifacts from {:?}", config.artifacts_dir))?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;
    runtime.block_on(hfrisk::web::serve(&config, Arc::new(service)))?;

    tracing::info!("hfrisk shutdown complete.");
    Ok(())
}
