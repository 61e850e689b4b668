//! Instructa - Instruction-following chat orchestration over an
//! OpenAI-compatible API
//!
//! The conversation core lives in `instructa-agent`; this crate adds
//! dataset ingestion, batch runs, the JSON output sink and the console.

pub mod batch;
pub mod console;
pub mod dataset;
pub mod output;

pub use batch::{process_record, BatchProcessor};
pub use console::{run_console, ConsoleCommand};
pub use dataset::{load_jsonl, parse_jsonl, parse_record, DatasetRecord, LoadReport, RecordMetadata};
pub use output::{write_results, OutputRecord, ProcessingInfo, PROCESSING_FAILED_PREFIX};
