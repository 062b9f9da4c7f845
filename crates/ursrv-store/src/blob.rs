//! Prefix-addressable blob storage.
//!
//! The blob layer knows nothing about reports: keys form one flat namespace
//! and values are opaque bytes. Interpretation belongs to
//! [`ReportStore`](crate::ReportStore).

use crate::error::{Result, StoreError};
use async_trait::async_trait;
use futures::TryStreamExt;
use opendal::{Buffer, EntryMode, Operator};
use std::future::Future;
use tracing::{debug, warn};

/// Visitor invoked once per matching blob; return `false` to stop early.
pub type BlobVisitor<'a> = dyn FnMut(&str, Vec<u8>) -> bool + Send + 'a;

/// Key/value byte store with prefix iteration.
///
/// Listings carry no ordering, atomicity or snapshot guarantee; callers must
/// tolerate eventually-consistent results.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store or overwrite the blob at `key`.
    async fn put(&self, key: &str, data: Vec<u8>) -> Result<()>;

    /// Fetch the blob at `key`, failing with [`StoreError::NotFound`] if absent.
    async fn get(&self, key: &str) -> Result<Vec<u8>>;

    /// Remove the blob at `key`. Deleting an absent key succeeds.
    async fn delete(&self, key: &str) -> Result<()>;

    /// Visit every blob whose key starts with `prefix` until `visit` returns false.
    async fn iterate(&self, prefix: &str, visit: &mut BlobVisitor<'_>) -> Result<()>;
}

/// [`BlobStore`] over any OpenDAL operator (filesystem, S3, memory).
#[derive(Clone)]
pub struct OpendalBlobStore {
    operator: Operator,
}

impl OpendalBlobStore {
    pub fn new(operator: Operator) -> Self {
        Self { operator }
    }

    /// Stream the backend's prefix listing, fetching each blob through `read`
    /// only when the visitor is about to see it.
    async fn visit_prefix<R, Fut>(
        &self,
        prefix: &str,
        visit: &mut BlobVisitor<'_>,
        mut read: R,
    ) -> Result<()>
    where
        R: FnMut(String) -> Fut + Send,
        Fut: Future<Output = opendal::Result<Buffer>> + Send,
    {
        let list_err = |e: opendal::Error| StoreError::StoreUnavailable {
            operation: "list",
            key: prefix.to_string(),
            source: e,
        };

        let mut lister = self.operator.lister(prefix).await.map_err(list_err)?;

        while let Some(entry) = lister.try_next().await.map_err(list_err)? {
            // Backends that emulate prefix listing may hand back siblings.
            if entry.metadata().mode() != EntryMode::FILE || !entry.path().starts_with(prefix) {
                continue;
            }

            let data = match read(entry.path().to_string()).await {
                Ok(buffer) => buffer.to_vec(),
                Err(e) => {
                    // A blob deleted between list and read is not worth a warning.
                    if e.kind() == opendal::ErrorKind::NotFound {
                        debug!(key = entry.path(), "blob vanished during iteration");
                    } else {
                        warn!(key = entry.path(), error = %e, "skipping unreadable blob");
                    }
                    continue;
                }
            };

            if !visit(entry.path(), data) {
                break;
            }
        }

        Ok(())
    }
}

#[async_trait]
impl BlobStore for OpendalBlobStore {
    async fn put(&self, key: &str, data: Vec<u8>) -> Result<()> {
        self.operator
            .write(key, data)
            .await
            .map_err(|e| StoreError::backend("write", key, e))?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        let buffer = self
            .operator
            .read(key)
            .await
            .map_err(|e| StoreError::backend("read", key, e))?;
        Ok(buffer.to_vec())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        match self.operator.delete(key).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == opendal::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::backend("delete", key, e)),
        }
    }

    async fn iterate(&self, prefix: &str, visit: &mut BlobVisitor<'_>) -> Result<()> {
        self.visit_prefix(prefix, visit, |path| {
            let operator = self.operator.clone();
            async move { operator.read(&path).await }
        })
        .await
    }
}
