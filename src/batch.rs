//! Dataset batch processing
//!
//! Every record gets its own `ChatSession`, so no conversation state leaks
//! between records. Up to `concurrency` records run at once; results come
//! back in input order and there is exactly one result per record.

use crate::dataset::DatasetRecord;
use crate::output::OutputRecord;
use futures::stream::{self, StreamExt};
use instructa_agent::ChatSession;
use instructa_core::{ChatConfig, Error, Result, SessionKey};
use instructa_llm::LlmProvider;
use std::sync::Arc;
use tracing::{info, warn};

pub struct BatchProcessor {
    provider: Arc<dyn LlmProvider>,
    config: Arc<ChatConfig>,
    concurrency: usize,
}

impl BatchProcessor {
    pub fn new(provider: Arc<dyn LlmProvider>, config: &ChatConfig) -> Self {
        Self {
            provider,
            concurrency: config.batch.concurrency.max(1),
            config: Arc::new(config.clone()),
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub async fn process(&self, records: Vec<DatasetRecord>) -> Vec<OutputRecord> {
        let total = records.len();
        info!("Processing {} record(s), {} at a time", total, self.concurrency);

        let tasks = records.into_iter().map(|record| {
            let provider = self.provider.clone();
            let config = self.config.clone();
            async move {
                let fallback = record.clone();
                let handle =
                    tokio::spawn(async move { process_record(provider, &config, record).await });
                match handle.await {
                    Ok(Ok(out)) => out,
                    Ok(Err(e)) => {
                        warn!("{}", e);
                        OutputRecord::failed(fallback, e)
                    }
                    Err(join_err) => {
                        let e = Error::Internal(format!("task for {}: {}", fallback.id, join_err));
                        warn!("{}", e);
                        OutputRecord::failed(fallback, e)
                    }
                }
            }
        });

        let mut done = 0usize;
        stream::iter(tasks)
            .buffered(self.concurrency)
            .inspect(|_| {
                done += 1;
                info!("processed {}/{}", done, total);
            })
            .collect()
            .await
    }
}

/// Run one record through a fresh session: the record's instruction first
/// (when present), then its input.
pub async fn process_record(
    provider: Arc<dyn LlmProvider>,
    config: &ChatConfig,
    record: DatasetRecord,
) -> Result<OutputRecord> {
    if record.input.trim().is_empty() {
        return Err(Error::per_item(&record.id, "input is empty"));
    }

    let key = SessionKey::new(format!("batch-{}", record.id));
    let mut session = ChatSession::with_key(key, provider, config);
    if !record.instruction.trim().is_empty() {
        session.respond(&record.instruction).await;
    }
    let outcome = session.respond(&record.input).await;
    let instructions = session.active_instructions();
    Ok(OutputRecord::completed(record, outcome.reply, instructions))
}
