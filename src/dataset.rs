//! JSON-lines dataset ingestion
//!
//! One record per non-blank line. A line that is not a JSON object, or has
//! no string `input`, is skipped with a warning and counted in the report.

use instructa_core::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::Path;
use tracing::{info, warn};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordMetadata {
    pub subset: String,
    pub questions: Vec<Value>,
    pub labels: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetRecord {
    pub id: String,
    pub input: String,
    pub category: String,
    pub instruction: String,
    pub metadata: RecordMetadata,
}

/// Raw line shape. Only `input` is required.
#[derive(Deserialize)]
struct RawRecord {
    id: Option<Value>,
    input: String,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    instruction: Option<String>,
    #[serde(default)]
    subset: Option<String>,
    #[serde(default)]
    decomposed_questions: Option<Vec<Value>>,
    #[serde(default)]
    question_label: Option<Vec<Value>>,
}

#[derive(Debug, Default)]
pub struct LoadReport {
    pub records: Vec<DatasetRecord>,
    /// Line numbers (1-based) that were skipped.
    pub skipped: Vec<usize>,
}

fn fallback_id(line: &str) -> String {
    let mut hasher = DefaultHasher::new();
    line.hash(&mut hasher);
    format!("unknown_{:x}", hasher.finish())
}

/// Parse one line. `line_no` only labels the error.
pub fn parse_record(line: &str, line_no: usize) -> Result<DatasetRecord> {
    let raw: RawRecord =
        serde_json::from_str(line).map_err(|e| Error::invalid_record(line_no, e.to_string()))?;

    let id = match raw.id {
        Some(Value::String(s)) => s,
        Some(Value::Null) | None => fallback_id(line),
        Some(other) => other.to_string(),
    };
    Ok(DatasetRecord {
        id,
        input: raw.input,
        category: raw.category.unwrap_or_default(),
        instruction: raw.instruction.unwrap_or_default(),
        metadata: RecordMetadata {
            subset: raw.subset.unwrap_or_default(),
            questions: raw.decomposed_questions.unwrap_or_default(),
            labels: raw.question_label.unwrap_or_default(),
        },
    })
}

pub fn parse_jsonl(content: &str) -> LoadReport {
    let mut report = LoadReport::default();
    for (idx, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match parse_record(line, idx + 1) {
            Ok(record) => report.records.push(record),
            Err(e) => {
                warn!("Skipping dataset line: {}", e);
                report.skipped.push(idx + 1);
            }
        }
    }
    report
}

/// Read a dataset file. Only an unreadable file is an error.
pub fn load_jsonl(path: &Path) -> Result<LoadReport> {
    let content = std::fs::read_to_string(path)?;
    let report = parse_jsonl(&content);
    info!(
        "Loaded {} record(s) from {} ({} skipped)",
        report.records.len(),
        path.display(),
        report.skipped.len()
    );
    Ok(report)
}
