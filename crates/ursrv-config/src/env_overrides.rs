use super::{FsConfig, LogFormat, RuntimeConfig, S3Config, ServerConfig, StorageBackend};
use anyhow::{anyhow, Context, Result};

pub const ENV_PREFIX: &str = "URSRV_";

/// Abstraction over environment-variable lookups so tests can supply their
/// own source of overrides.
pub trait EnvSource {
    fn get(&self, key: &str) -> Option<String>;

    /// Get an environment variable WITHOUT the URSRV_ prefix
    /// Used for AWS standard variables (AWS_ACCESS_KEY_ID, etc.)
    fn get_raw(&self, key: &str) -> Option<String>;
}

/// Apply environment-variable overrides (highest priority) to the runtime config.
pub fn apply_env_overrides<E: EnvSource>(config: &mut RuntimeConfig, env: &E) -> Result<()> {
    // Server configuration (listen addr, log level/format, debug)
    if let Some(addr) = env.get("LISTEN_ADDR") {
        ensure_server(config).listen_addr = addr;
    }
    if let Some(level) = env.get("LOG_LEVEL") {
        ensure_server(config).log_level = level;
    }
    if let Some(format) = env.get("LOG_FORMAT") {
        let parsed = match format.to_lowercase().as_str() {
            "json" => LogFormat::Json,
            _ => LogFormat::Text,
        };
        ensure_server(config).log_format = parsed;
    }
    if let Some(val) = get_env_bool(env, "DEBUG")? {
        ensure_server(config).debug = val;
    }

    // Request configuration
    if let Some(val) = get_env_usize(env, "MAX_PAYLOAD_BYTES")? {
        config.request.max_payload_bytes = val;
    }

    // Cache configuration
    if let Some(val) = get_env_u64(env, "CACHE_TTL_SECS")? {
        config.cache.ttl_secs = val;
    }
    if let Some(val) = get_env_u64(env, "CACHE_REFRESH_INTERVAL_SECS")? {
        config.cache.refresh_interval_secs = val;
    }

    // Storage backend
    if let Some(backend) = env.get("STORAGE_BACKEND") {
        config.storage.backend = backend
            .parse::<StorageBackend>()
            .context("Invalid URSRV_STORAGE_BACKEND value")?;
    }

    // Filesystem storage
    if let Some(path) = env.get("STORAGE_PATH") {
        config.storage.fs.get_or_insert_with(FsConfig::default).path = path;
    }

    // S3 storage
    if let Some(bucket) = env.get("S3_BUCKET") {
        ensure_s3(config).bucket = bucket;
    }
    if let Some(region) = env.get("S3_REGION") {
        ensure_s3(config).region = region;
    }
    if let Some(endpoint) = env.get("S3_ENDPOINT") {
        ensure_s3(config).endpoint = Some(endpoint);
    }
    if let Some(prefix) = env.get("S3_PREFIX") {
        ensure_s3(config).prefix = normalize_prefix(prefix);
    }

    // AWS standard credentials (without URSRV_ prefix for compatibility)
    if let Some(access_key_id) = env.get_raw("AWS_ACCESS_KEY_ID") {
        ensure_s3(config).access_key_id = Some(access_key_id);
    }
    if let Some(secret_access_key) = env.get_raw("AWS_SECRET_ACCESS_KEY") {
        ensure_s3(config).secret_access_key = Some(secret_access_key);
    }
    if let Some(endpoint) = env.get_raw("AWS_ENDPOINT_URL") {
        let s3 = ensure_s3(config);
        if s3.endpoint.is_none() {
            s3.endpoint = Some(endpoint);
        }
    }

    Ok(())
}

fn ensure_s3(config: &mut RuntimeConfig) -> &mut S3Config {
    config.storage.s3.get_or_insert_with(S3Config::default)
}

fn ensure_server(config: &mut RuntimeConfig) -> &mut ServerConfig {
    config.server.get_or_insert_with(ServerConfig::default)
}

fn get_env_usize<E: EnvSource>(env: &E, key: &str) -> Result<Option<usize>> {
    match env.get(key) {
        Some(val) => {
            let parsed = val
                .parse::<usize>()
                .map_err(|e| anyhow!("Failed to parse {}{}: {}", ENV_PREFIX, key, e))?;
            Ok(Some(parsed))
        }
        None => Ok(None),
    }
}

fn get_env_u64<E: EnvSource>(env: &E, key: &str) -> Result<Option<u64>> {
    match env.get(key) {
        Some(val) => {
            let parsed = val
                .parse::<u64>()
                .map_err(|e| anyhow!("Failed to parse {}{}: {}", ENV_PREFIX, key, e))?;
            Ok(Some(parsed))
        }
        None => Ok(None),
    }
}

fn get_env_bool<E: EnvSource>(env: &E, key: &str) -> Result<Option<bool>> {
    match env.get(key) {
        Some(val) => {
            let parsed = val.parse::<bool>().map_err(|e| {
                anyhow!(
                    "Failed to parse {}{} (expected bool): {}",
                    ENV_PREFIX,
                    key,
                    e
                )
            })?;
            Ok(Some(parsed))
        }
        None => Ok(None),
    }
}

fn normalize_prefix(prefix: String) -> Option<String> {
    if prefix.is_empty() {
        None
    } else if prefix.ends_with('/') {
        Some(prefix)
    } else {
        Some(format!("{}/", prefix))
    }
}
