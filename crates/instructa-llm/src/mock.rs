//! MockProvider - deterministic LLM responses for tests and dry runs
//!
//! Answers from a fixed sequence, a constant, or a responder closure that
//! sees each request, and records every request it receives.

use crate::provider::{LlmError, LlmProvider, LlmResult};
use crate::types::LlmRequest;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

/// What the mock does for one call
#[derive(Clone, Debug)]
pub enum MockBehavior {
    /// Return this completion text
    Text(String),
    /// Fail the call with `LlmError::RequestFailed`
    Error(String),
}

impl MockBehavior {
    pub fn text(s: impl Into<String>) -> Self {
        Self::Text(s.into())
    }

    pub fn error(s: impl Into<String>) -> Self {
        Self::Error(s.into())
    }
}

type Responder = Box<dyn Fn(&LlmRequest) -> MockBehavior + Send + Sync>;

pub struct MockProvider {
    behaviors: Mutex<VecDeque<MockBehavior>>,
    default_behavior: MockBehavior,
    responder: Option<Responder>,
    requests: Mutex<Vec<LlmRequest>>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MockProvider {
    /// Create a mock that always returns the same behavior
    pub fn constant(behavior: MockBehavior) -> Self {
        Self {
            behaviors: Mutex::new(VecDeque::new()),
            default_behavior: behavior,
            responder: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Create a mock with a sequence of behaviors (consumed in order)
    pub fn sequence(behaviors: Vec<MockBehavior>) -> Self {
        Self {
            behaviors: Mutex::new(behaviors.into()),
            default_behavior: MockBehavior::Text("(mock: sequence exhausted)".into()),
            responder: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Create a mock that decides per request
    pub fn from_fn(f: impl Fn(&LlmRequest) -> MockBehavior + Send + Sync + 'static) -> Self {
        Self {
            behaviors: Mutex::new(VecDeque::new()),
            default_behavior: MockBehavior::Text(String::new()),
            responder: Some(Box::new(f)),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Number of calls made so far
    pub fn call_count(&self) -> usize {
        lock(&self.requests).len()
    }

    /// Every request received, oldest first
    pub fn requests(&self) -> Vec<LlmRequest> {
        lock(&self.requests).clone()
    }

    /// Number of calls addressed to `model`
    pub fn calls_for_model(&self, model: &str) -> usize {
        lock(&self.requests).iter().filter(|r| r.model == model).count()
    }

    fn next_behavior(&self, request: &LlmRequest) -> MockBehavior {
        if let Some(responder) = &self.responder {
            return responder(request);
        }
        lock(&self.behaviors)
            .pop_front()
            .unwrap_or_else(|| self.default_behavior.clone())
    }
}

#[async_trait::async_trait]
impl LlmProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn complete(&self, request: LlmRequest) -> LlmResult<String> {
        let behavior = self.next_behavior(&request);
        lock(&self.requests).push(request);
        match behavior {
            MockBehavior::Text(text) => Ok(text),
            MockBehavior::Error(message) => Err(LlmError::RequestFailed(message)),
        }
    }
}
