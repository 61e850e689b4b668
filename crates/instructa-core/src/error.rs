//! Error types for Instructa

use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("failed to load config {path}: {reason}")]
    ConfigLoad { path: String, reason: String },

    #[error("llm call failed: {0}")]
    Call(String),

    #[error("unexpected llm response: {0}")]
    Parse(String),

    #[error("invalid record on line {line}: {reason}")]
    InvalidRecord { line: usize, reason: String },

    #[error("processing {id} failed: {reason}")]
    PerItem { id: String, reason: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn config_load(path: &Path, reason: impl Into<String>) -> Self {
        Self::ConfigLoad {
            path: path.display().to_string(),
            reason: reason.into(),
        }
    }

    pub fn parse(reason: impl Into<String>) -> Self {
        Self::Parse(reason.into())
    }

    pub fn invalid_record(line: usize, reason: impl Into<String>) -> Self {
        Self::InvalidRecord {
            line,
            reason: reason.into(),
        }
    }

    pub fn per_item(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::PerItem {
            id: id.into(),
            reason: reason.into(),
        }
    }
}
