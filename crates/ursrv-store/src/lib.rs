//! Persistence for the usage reporting server.
//!
//! - [`BlobStore`]: flat key/value byte storage with prefix iteration,
//!   backed by OpenDAL (local filesystem or S3)
//! - [`ReportStore`]: usage reports and daily aggregates encoded as JSON on
//!   top of a blob store, with per-day deduplication

pub mod blob;
pub mod error;
pub mod keys;
pub mod report_store;
pub mod storage;

pub use blob::{BlobStore, BlobVisitor, OpendalBlobStore};
pub use error::{ErrorCode, Result, StoreError};
pub use report_store::{IngestOutcome, ReportStore};
pub use storage::{fs_store, open_blob_store, s3_store};
