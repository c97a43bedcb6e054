//! User-visible notices (toasts).
//!
//! Every command reports its outcome here. The presentation layer shows
//! notices verbatim; messages are part of the console's observable behavior.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use tokio::sync::broadcast;

/// How many notices the broadcast channel buffers per subscriber.
const CHANNEL_CAPACITY: usize = 64;

/// How many recent notices are kept for polling clients.
const RECENT_CAPACITY: usize = 50;

/// Notice severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeLevel {
    Success,
    Info,
    Warning,
    Error,
}

/// A single notice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    /// Create a notice.
    #[must_use]
    pub fn new(level: NoticeLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
        }
    }
}

/// Fan-out channel for notices.
///
/// Cloning is cheap; clones publish to the same subscribers.
#[derive(Debug, Clone)]
pub struct Notifier {
    tx: broadcast::Sender<Notice>,
    recent: Arc<Mutex<VecDeque<Notice>>>,
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Notifier {
    /// Create a notifier with no subscribers.
    #[must_use]
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            tx,
            recent: Arc::new(Mutex::new(VecDeque::with_capacity(RECENT_CAPACITY))),
        }
    }

    /// Receive every notice published from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Notice> {
        self.tx.subscribe()
    }

    /// Publish a notice.
    pub fn publish(&self, notice: Notice) {
        {
            let mut recent = self.recent.lock().unwrap_or_else(PoisonError::into_inner);
            if recent.len() == RECENT_CAPACITY {
                recent.pop_front();
            }
            recent.push_back(notice.clone());
        }
        // No subscribers is fine: polling clients still see `recent`.
        let _ = self.tx.send(notice);
    }

    pub fn success(&self, message: impl Into<String>) {
        self.publish(Notice::new(NoticeLevel::Success, message));
    }

    pub fn info(&self, message: impl Into<String>) {
        self.publish(Notice::new(NoticeLevel::Info, message));
    }

    pub fn warning(&self, message: impl Into<String>) {
        self.publish(Notice::new(NoticeLevel::Warning, message));
    }

    pub fn error(&self, message: impl Into<String>) {
        self.publish(Notice::new(NoticeLevel::Error, message));
    }

    /// Take every notice published since the last drain.
    #[must_use]
    pub fn drain_recent(&self) -> Vec<Notice> {
        self.recent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect()
    }
}
