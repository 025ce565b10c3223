//! Feedback on earlier replies.
//!
//! Feedback is recorded and logged only. It never touches conversation
//! history or token state, and handling it cannot fail.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use tracing::{info, warn};

use crate::bus::FeedbackEvent;

/// Recent events kept for inspection; older ones live only in the logs.
pub const DEFAULT_RECORD_CAPACITY: usize = 256;

pub struct FeedbackHandler {
    records: Mutex<VecDeque<FeedbackEvent>>,
    capacity: usize,
    total: AtomicU64,
}

impl Default for FeedbackHandler {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_RECORD_CAPACITY)
    }
}

impl FeedbackHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep at most `capacity` recent events.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            records: Mutex::new(VecDeque::with_capacity(capacity.min(DEFAULT_RECORD_CAPACITY))),
            capacity,
            total: AtomicU64::new(0),
        }
    }

    /// Log the payload verbatim and keep the event.
    pub fn handle(&self, event: FeedbackEvent) {
        let payload = serde_json::to_string(&event.value).unwrap_or_else(|_| "null".into());
        info!(
            conversation = %event.conversation_id,
            user = %event.user_id,
            reply_to = ?event.reply_to_id,
            "Your feedback is {}",
            payload
        );
        self.total.fetch_add(1, Ordering::Relaxed);

        let mut records = match self.records.lock() {
            Ok(records) => records,
            Err(poisoned) => {
                warn!("Feedback record lock poisoned, recovering");
                poisoned.into_inner()
            }
        };
        if self.capacity == 0 {
            return;
        }
        while records.len() >= self.capacity {
            records.pop_front();
        }
        records.push_back(event);
    }

    /// The most recent feedback events, oldest first.
    pub fn records(&self) -> Vec<FeedbackEvent> {
        match self.records.lock() {
            Ok(records) => records.iter().cloned().collect(),
            Err(poisoned) => poisoned.into_inner().iter().cloned().collect(),
        }
    }

    /// Number of feedback events received, including ones no longer retained.
    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }
}
