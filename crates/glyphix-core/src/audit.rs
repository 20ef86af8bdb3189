//! Access audit log

use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Record of one gated access attempt
///
/// Entries are never modified once appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessAttempt {
    /// Resource the caller tried to access
    pub resource_id: String,

    /// Whether presence allowed the attempt
    pub granted: bool,

    /// Denial reason (absent when granted)
    pub reason: Option<String>,

    /// When the attempt was made
    pub timestamp: DateTime<Utc>,
}

impl AccessAttempt {
    /// Granted attempt, timestamped now
    pub fn granted(resource_id: impl Into<String>) -> Self {
        Self {
            resource_id: resource_id.into(),
            granted: true,
            reason: None,
            timestamp: Utc::now(),
        }
    }

    /// Denied attempt, timestamped now
    pub fn denied(resource_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            resource_id: resource_id.into(),
            granted: false,
            reason: Some(reason.into()),
            timestamp: Utc::now(),
        }
    }
}

/// Append-only log safe for concurrent appenders
#[derive(Debug, Default)]
pub struct AccessLog {
    entries: Mutex<Vec<AccessAttempt>>,
}

impl AccessLog {
    /// Create an empty log
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry
    pub fn record(&self, attempt: AccessAttempt) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(attempt);
    }

    /// The most recent `limit` entries, newest last
    pub fn recent(&self, limit: usize) -> Vec<AccessAttempt> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let start = entries.len().saturating_sub(limit);
        entries[start..].to_vec()
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether the log is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
