// Bounds how often yesterday's window is recomputed per calendar day

use std::sync::Arc;
use tracing::{info, warn};

use crate::store::DayRetryCounterStore;

pub struct RetryGate {
    counters: Arc<dyn DayRetryCounterStore>,
    task: String,
    threshold: u32,
}

impl RetryGate {
    pub fn new(counters: Arc<dyn DayRetryCounterStore>, task: impl Into<String>, threshold: u32) -> Self {
        Self {
            counters,
            task: task.into(),
            threshold,
        }
    }

    /// True while the counter for `day` is at most the threshold.
    /// An unreadable counter lets the window run; recomputing is idempotent.
    pub async fn should_run(&self, day: &str) -> bool {
        match self.counters.get(&self.task, day).await {
            Ok(count) => {
                if count > self.threshold {
                    info!(task = %self.task, day, count, "Yesterday already confirmed, skipping");
                    false
                } else {
                    true
                }
            }
            Err(e) => {
                warn!(task = %self.task, day, "Failed to read retry counter: {}", e);
                true
            }
        }
    }

    /// Record a successful confirmation run. Returns the new count.
    pub async fn confirm(&self, day: &str) -> Option<u32> {
        match self.counters.increment(&self.task, day).await {
            Ok(count) => {
                info!(task = %self.task, day, count, "Yesterday confirmation recorded");
                Some(count)
            }
            Err(e) => {
                warn!(task = %self.task, day, "Failed to increment retry counter: {}", e);
                None
            }
        }
    }
}
