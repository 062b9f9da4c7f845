//! Error types for the report store crate

use thiserror::Error;
use ursrv_core::ValidationError;

/// Error codes for programmatic handling and log fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// S001: Blob does not exist
    S001NotFound,
    /// S002: Usage report already stored for this client today
    S002DuplicateReport,
    /// S003: Yesterday's aggregate has not been produced yet
    S003NoAggregateFound,
    /// S004: Backend I/O failed
    S004StoreUnavailable,
    /// S005: Stored blob could not be decoded
    S005MalformedRecord,
    /// S006: Record could not be encoded
    S006Encode,
    /// S007: Submitted report failed validation
    S007InvalidReport,
    /// S008: Backend configuration missing or invalid
    S008InvalidConfig,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::S001NotFound => "S001",
            Self::S002DuplicateReport => "S002",
            Self::S003NoAggregateFound => "S003",
            Self::S004StoreUnavailable => "S004",
            Self::S005MalformedRecord => "S005",
            Self::S006Encode => "S006",
            Self::S007InvalidReport => "S007",
            Self::S008InvalidConfig => "S008",
        }
    }
}

/// Errors raised by blob backends and the report store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("[S001] blob not found: {key}")]
    NotFound { key: String },

    /// Same-day resubmission. Expected; callers treat it as a quiet success.
    #[error("[S002] usage report already stored at {key}")]
    DuplicateReport { key: String },

    #[error("[S003] no aggregated report for {date}")]
    NoAggregateFound { date: String },

    #[error("[S004] storage backend failed to {operation} '{key}': {source}")]
    StoreUnavailable {
        operation: &'static str,
        key: String,
        #[source]
        source: opendal::Error,
    },

    #[error("[S005] malformed record at {key}: {source}")]
    MalformedRecord {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("[S006] failed to encode record for {key}: {source}")]
    Encode {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("[S007] invalid usage report: {0}")]
    InvalidReport(#[from] ValidationError),

    #[error("[S008] invalid storage configuration: {message}")]
    InvalidConfig { message: String },
}

impl StoreError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::NotFound { .. } => ErrorCode::S001NotFound,
            Self::DuplicateReport { .. } => ErrorCode::S002DuplicateReport,
            Self::NoAggregateFound { .. } => ErrorCode::S003NoAggregateFound,
            Self::StoreUnavailable { .. } => ErrorCode::S004StoreUnavailable,
            Self::MalformedRecord { .. } => ErrorCode::S005MalformedRecord,
            Self::Encode { .. } => ErrorCode::S006Encode,
            Self::InvalidReport(_) => ErrorCode::S007InvalidReport,
            Self::InvalidConfig { .. } => ErrorCode::S008InvalidConfig,
        }
    }

    /// Wrap a backend error, folding opendal's not-found into [`StoreError::NotFound`].
    pub(crate) fn backend(operation: &'static str, key: &str, source: opendal::Error) -> Self {
        if source.kind() == opendal::ErrorKind::NotFound {
            Self::NotFound {
                key: key.to_string(),
            }
        } else {
            Self::StoreUnavailable {
                operation,
                key: key.to_string(),
                source,
            }
        }
    }

    pub(crate) fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }
}

/// Result type for store operations
pub type Result<T> = std::result::Result<T, StoreError>;
