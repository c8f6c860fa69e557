//! User-facing notification side channel.
//!
//! The core reports image-load results and export milestones here. How (or
//! whether) a notice is displayed is up to the host.

use std::sync::Mutex;

use serde::{Deserialize, Serialize};

/// Severity of a notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    /// Informational.
    Info,
    /// Operation succeeded.
    Success,
    /// Operation degraded but completed.
    Warning,
    /// Operation failed.
    Error,
}

/// A transient message for the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    /// Severity.
    pub level: NoticeLevel,
    /// Message text.
    pub message: String,
}

/// Receiver for user-facing notices.
pub trait Notifier: Send + Sync {
    /// Deliver one notice.
    fn notify(&self, notice: Notice);

    /// Shorthand for an info notice.
    fn info(&self, message: &str) {
        self.notify(Notice {
            level: NoticeLevel::Info,
            message: message.to_string(),
        });
    }

    /// Shorthand for a success notice.
    fn success(&self, message: &str) {
        self.notify(Notice {
            level: NoticeLevel::Success,
            message: message.to_string(),
        });
    }

    /// Shorthand for a warning notice.
    fn warning(&self, message: &str) {
        self.notify(Notice {
            level: NoticeLevel::Warning,
            message: message.to_string(),
        });
    }

    /// Shorthand for an error notice.
    fn error(&self, message: &str) {
        self.notify(Notice {
            level: NoticeLevel::Error,
            message: message.to_string(),
        });
    }
}

/// Writes notices to the tracing log.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notice: Notice) {
        match notice.level {
            NoticeLevel::Info | NoticeLevel::Success => {
                tracing::info!(target: "sticker::notice", "{}", notice.message);
            }
            NoticeLevel::Warning => tracing::warn!(target: "sticker::notice", "{}", notice.message),
            NoticeLevel::Error => tracing::error!(target: "sticker::notice", "{}", notice.message),
        }
    }
}

/// Keeps every notice in memory.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    notices: Mutex<Vec<Notice>>,
}

impl RecordingNotifier {
    /// Create an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the notices received so far.
    #[must_use]
    pub fn notices(&self) -> Vec<Notice> {
        self.notices
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    /// Number of notices at the given level.
    #[must_use]
    pub fn count(&self, level: NoticeLevel) -> usize {
        self.notices().iter().filter(|n| n.level == level).count()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notice: Notice) {
        self.notices
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(notice);
    }
}
