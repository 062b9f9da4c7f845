// Configuration validation
//
// Validates that required fields are present and values are sensible

use super::*;
use anyhow::{bail, Result};
use tracing::warn;

pub fn validate_config(config: &RuntimeConfig) -> Result<()> {
    validate_request_config(&config.request)?;
    validate_cache_config(&config.cache)?;
    validate_storage_config(&config.storage)?;

    if let Some(ref server) = config.server {
        validate_server_config(server)?;
    }

    Ok(())
}

fn validate_request_config(config: &RequestConfig) -> Result<()> {
    if config.max_payload_bytes == 0 {
        bail!("request.max_payload_bytes must be greater than 0");
    }

    if config.max_payload_bytes > 1024 * 1024 {
        warn!(
            max_payload_bytes = config.max_payload_bytes,
            "request.max_payload_bytes is very large for a usage report"
        );
    }

    Ok(())
}

fn validate_cache_config(config: &CacheConfig) -> Result<()> {
    if config.ttl_secs == 0 {
        bail!("cache.ttl_secs must be greater than 0");
    }

    if config.refresh_interval_secs == 0 {
        bail!("cache.refresh_interval_secs must be greater than 0");
    }

    // The background tick must land before readers start paying for refreshes.
    if config.refresh_interval_secs >= config.ttl_secs {
        bail!(
            "cache.refresh_interval_secs ({}) must be shorter than cache.ttl_secs ({})",
            config.refresh_interval_secs,
            config.ttl_secs
        );
    }

    Ok(())
}

fn validate_storage_config(config: &StorageConfig) -> Result<()> {
    match config.backend {
        StorageBackend::Fs => {
            let fs = config
                .fs
                .as_ref()
                .ok_or_else(|| anyhow::anyhow!("fs storage backend requires 'fs' configuration"))?;

            if fs.path.is_empty() {
                bail!(
                    "Filesystem path is required\n\n\
                    How to fix:\n\
                      • Environment: export {}STORAGE_PATH=/var/lib/ursrv\n\
                      • TOML: [storage.fs]\n              path = \"/var/lib/ursrv\"\n",
                    ENV_PREFIX
                );
            }
        }
        StorageBackend::S3 => {
            let s3 = config
                .s3
                .as_ref()
                .ok_or_else(|| anyhow::anyhow!("s3 storage backend requires 's3' configuration"))?;

            if s3.bucket.is_empty() {
                bail!(
                    "S3 bucket name is required\n\n\
                    How to fix:\n\
                      • Environment: export {}S3_BUCKET=my-bucket\n\
                      • TOML: [storage.s3]\n              bucket = \"my-bucket\"\n",
                    ENV_PREFIX
                );
            }

            if s3.region.is_empty() {
                bail!(
                    "S3 region is required\n\n\
                    How to fix:\n\
                      • Environment: export {}S3_REGION=us-west-2\n\
                      • TOML: [storage.s3]\n              region = \"us-west-2\"\n",
                    ENV_PREFIX
                );
            }

            if s3.access_key_id.is_some() != s3.secret_access_key.is_some() {
                bail!("S3 access_key_id and secret_access_key must be set together");
            }
        }
    }

    Ok(())
}

fn validate_server_config(config: &ServerConfig) -> Result<()> {
    if config.listen_addr.is_empty() {
        bail!("server.listen_addr must not be empty");
    }

    // Basic validation that it looks like an address
    if !config.listen_addr.contains(':') {
        bail!("server.listen_addr must be in format 'host:port'");
    }

    Ok(())
}
