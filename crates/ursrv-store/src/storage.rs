//! Storage backend construction from runtime configuration.

use crate::blob::{BlobStore, OpendalBlobStore};
use crate::error::{Result, StoreError};
use opendal::{services, Operator};
use std::sync::Arc;
use ursrv_config::{S3Config, StorageBackend, StorageConfig};

/// Build the blob store selected by `config.backend`.
pub fn open_blob_store(config: &StorageConfig) -> Result<Arc<dyn BlobStore>> {
    let store = match config.backend {
        StorageBackend::Fs => {
            let fs = config.fs.as_ref().ok_or_else(|| {
                StoreError::invalid_config("fs config required for filesystem backend")
            })?;
            fs_store(&fs.path)?
        }
        StorageBackend::S3 => {
            let s3 = config
                .s3
                .as_ref()
                .ok_or_else(|| StoreError::invalid_config("s3 config required for S3 backend"))?;
            s3_store(s3)?
        }
    };

    tracing::debug!(backend = %config.backend, "Storage operator initialized");
    Ok(Arc::new(store))
}

/// Local filesystem store rooted at `root`.
pub fn fs_store(root: &str) -> Result<OpendalBlobStore> {
    let builder = services::Fs::default().root(root);
    let operator = Operator::new(builder)
        .map_err(|e| {
            StoreError::invalid_config(format!("Failed to create filesystem operator: {}", e))
        })?
        .finish();
    Ok(OpendalBlobStore::new(operator))
}

/// S3 (or S3-compatible) object store.
pub fn s3_store(s3: &S3Config) -> Result<OpendalBlobStore> {
    let mut builder = services::S3::default()
        .bucket(&s3.bucket)
        .region(&s3.region);

    if let Some(endpoint) = &s3.endpoint {
        builder = builder.endpoint(endpoint);
    }
    if let Some(key) = &s3.access_key_id {
        builder = builder.access_key_id(key);
    }
    if let Some(secret) = &s3.secret_access_key {
        builder = builder.secret_access_key(secret);
    }
    if let Some(prefix) = &s3.prefix {
        builder = builder.root(prefix);
    }

    let operator = Operator::new(builder)
        .map_err(|e| StoreError::invalid_config(format!("Failed to create S3 operator: {}", e)))?
        .finish();
    Ok(OpendalBlobStore::new(operator))
}
