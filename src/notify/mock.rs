//! Recording dispatcher for tests.

use async_trait::async_trait;
use std::sync::Mutex;

use super::{NotificationDispatcher, Recipient};

/// Captures every dispatched notification so tests can assert on them.
#[derive(Debug, Default)]
pub struct RecordingDispatcher {
    sent: Mutex<Vec<(Recipient, String)>>,
}

impl RecordingDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything dispatched so far.
    pub fn sent(&self) -> Vec<(Recipient, String)> {
        self.sent.lock().expect("dispatcher lock poisoned").clone()
    }

    /// Messages sent to one recipient.
    pub fn sent_to(&self, recipient: Recipient) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter(|(r, _)| *r == recipient)
            .map(|(_, m)| m)
            .collect()
    }
}

#[async_trait]
impl NotificationDispatcher for RecordingDispatcher {
    async fn dispatch(&self, recipient: Recipient, message: &str) {
        self.sent
            .lock()
            .expect("dispatcher lock poisoned")
            .push((recipient, message.to_string()));
    }
}
