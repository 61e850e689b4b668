//! Outbound call limiting shared by concurrently running sessions.
//!
//! A semaphore caps how many calls are in flight; a start-time gate keeps a
//! minimum spacing between consecutive call starts.

use crate::provider::{LlmProvider, LlmResult};
use crate::types::LlmRequest;
use std::time::Duration;
use tokio::sync::{Mutex, Semaphore};
use tokio::time::Instant;
use tracing::trace;

pub struct RateLimitedProvider<P> {
    inner: P,
    permits: Semaphore,
    min_interval: Duration,
    next_start: Mutex<Option<Instant>>,
}

impl<P: LlmProvider> RateLimitedProvider<P> {
    /// `max_in_flight` is clamped to at least one.
    pub fn new(inner: P, max_in_flight: usize, min_interval: Duration) -> Self {
        Self {
            inner,
            permits: Semaphore::new(max_in_flight.max(1)),
            min_interval,
            next_start: Mutex::new(None),
        }
    }

    pub fn inner(&self) -> &P {
        &self.inner
    }

    pub fn available_permits(&self) -> usize {
        self.permits.available_permits()
    }

    async fn wait_for_slot(&self) {
        if self.min_interval.is_zero() {
            return;
        }
        let wait_until = {
            let mut next = self.next_start.lock().await;
            let now = Instant::now();
            let start = match *next {
                Some(at) if at > now => at,
                _ => now,
            };
            *next = Some(start + self.min_interval);
            start
        };
        if wait_until > Instant::now() {
            trace!("Rate limiter delaying call until {:?}", wait_until);
            tokio::time::sleep_until(wait_until).await;
        }
    }
}

#[async_trait::async_trait]
impl<P: LlmProvider> LlmProvider for RateLimitedProvider<P> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn complete(&self, request: LlmRequest) -> LlmResult<String> {
        // The semaphore is never closed, so acquire only fails after close().
        let _permit = self.permits.acquire().await.ok();
        self.wait_for_slot().await;
        self.inner.complete(request).await
    }
}
