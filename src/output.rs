//! Batch result records and the JSON output sink

use crate::dataset::DatasetRecord;
use chrono::{DateTime, Utc};
use instructa_core::{Instruction, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// Prefix of `output` for a record that could not be processed.
pub const PROCESSING_FAILED_PREFIX: &str = "processing failed: ";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingInfo {
    pub timestamp: DateTime<Utc>,
    /// Instructions active when the record finished.
    pub instructions: Vec<Instruction>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputRecord {
    #[serde(flatten)]
    pub record: DatasetRecord,
    pub output: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processing_info: Option<ProcessingInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<bool>,
}

impl OutputRecord {
    pub fn completed(
        record: DatasetRecord,
        output: String,
        instructions: Vec<Instruction>,
    ) -> Self {
        let info = ProcessingInfo {
            timestamp: Utc::now(),
            instructions,
        };
        Self {
            record,
            output,
            processing_info: Some(info),
            error: None,
        }
    }

    pub fn failed(record: DatasetRecord, reason: impl std::fmt::Display) -> Self {
        Self {
            record,
            output: format!("{PROCESSING_FAILED_PREFIX}{reason}"),
            processing_info: None,
            error: Some(true),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.unwrap_or(false)
    }
}

/// Write all records as one pretty-printed JSON array.
pub fn write_results(path: &Path, results: &[OutputRecord]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(results)?;
    std::fs::write(path, json)?;
    info!("Results saved to {}", path.display());
    Ok(())
}
