//! Usage report submitted by a single client once per day.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Characters that would let a unique ID escape the flat storage key namespace.
const FORBIDDEN_ID_CHARS: &[char] = &['/', '\\', '~'];

/// One client's daily submission.
///
/// Only the fields the server itself interprets are typed; everything else
/// the client sent is kept verbatim in `fields` and written back on encode.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageReport {
    #[serde(rename = "uniqueID", default)]
    pub unique_id: String,

    #[serde(rename = "urVersion", default)]
    pub ur_version: u32,

    #[serde(default)]
    pub version: String,

    #[serde(rename = "longVersion", default, skip_serializing_if = "String::is_empty")]
    pub long_version: String,

    #[serde(default)]
    pub platform: String,

    /// Submission day (`YYYY-MM-DD`), stamped by the server on receipt.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub date: String,

    /// Submitter address, resolved by the server from the connection.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub address: String,

    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

/// Structural problems with a submitted report.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("missing required field '{0}'")]
    MissingField(&'static str),

    #[error("unique ID '{0}' contains a reserved character")]
    InvalidUniqueId(String),
}

impl UsageReport {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.unique_id.is_empty() {
            return Err(ValidationError::MissingField("uniqueID"));
        }
        if self.version.is_empty() {
            return Err(ValidationError::MissingField("version"));
        }
        if self.platform.is_empty() {
            return Err(ValidationError::MissingField("platform"));
        }
        if self.unique_id.contains(FORBIDDEN_ID_CHARS) {
            return Err(ValidationError::InvalidUniqueId(self.unique_id.clone()));
        }
        Ok(())
    }
}
