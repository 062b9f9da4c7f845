// Initialization utilities for server mode
//
// Storage backend and logging/tracing setup

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;
use ursrv_config::{LogFormat, RuntimeConfig, StorageBackend};
use ursrv_core::Clock;
use ursrv_store::ReportStore;

/// Open the configured blob backend and wrap it in a report store.
pub fn init_store(config: &RuntimeConfig, clock: Arc<dyn Clock>) -> Result<ReportStore> {
    match config.storage.backend {
        StorageBackend::Fs => {
            if let Some(fs) = &config.storage.fs {
                info!("Using filesystem storage at: {}", fs.path);
            }
        }
        StorageBackend::S3 => {
            if let Some(s3) = &config.storage.s3 {
                info!(
                    "Using S3 storage: bucket={}, region={}, prefix={}",
                    s3.bucket,
                    s3.region,
                    s3.prefix.as_deref().unwrap_or("")
                );
            }
        }
    }

    let blobs = ursrv_store::open_blob_store(&config.storage)
        .context("Failed to initialize storage backend")?;
    Ok(ReportStore::with_clock(blobs, clock))
}

/// Initialize tracing/logging from RuntimeConfig
pub fn init_tracing(config: &RuntimeConfig) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let Some(server) = config.server.as_ref() else {
        eprintln!("ERROR: server config required for tracing initialization");
        return;
    };

    let env_filter =
        EnvFilter::try_new(&server.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(env_filter);

    // Ignore the error if a subscriber is already installed (idempotent)
    let _ = match server.log_format {
        LogFormat::Json => {
            tracing::subscriber::set_global_default(registry.with(fmt::layer().json()))
        }
        LogFormat::Text => tracing::subscriber::set_global_default(registry.with(fmt::layer())),
    };
}
