//! Bounded status history shown under the status line.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Default number of retained entries.
pub const DEFAULT_HISTORY_LIMIT: usize = 10;

/// Severity badge of a history entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryLevel {
    /// Neutral progress.
    Info,
    /// Something finished well.
    Success,
    /// Recoverable oddity.
    Warning,
    /// Failure the user should see.
    Error,
    /// Raw message trace.
    Debug,
}

impl HistoryLevel {
    /// Short badge label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Success => "ok",
            Self::Warning => "warn",
            Self::Error => "error",
            Self::Debug => "debug",
        }
    }
}

/// One line of status history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryEntry {
    /// Badge.
    pub level: HistoryLevel,
    /// Text.
    pub message: String,
    /// When the entry was appended.
    pub at: DateTime<Utc>,
}

impl HistoryEntry {
    /// Entry stamped now.
    pub fn new(level: HistoryLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            at: Utc::now(),
        }
    }
}

/// Append-only log that keeps the newest `limit` entries.
#[derive(Debug, Clone)]
pub struct StatusHistory {
    entries: VecDeque<HistoryEntry>,
    limit: usize,
}

impl StatusHistory {
    /// Empty history keeping at most `limit` entries (at least one).
    #[must_use]
    pub fn new(limit: usize) -> Self {
        let limit = limit.max(1);
        Self {
            entries: VecDeque::with_capacity(limit),
            limit,
        }
    }

    /// Append an entry, dropping the oldest beyond the limit.
    pub fn push(&mut self, entry: HistoryEntry) {
        self.entries.push_back(entry);
        while self.entries.len() > self.limit {
            self.entries.pop_front();
        }
    }

    /// Shorthand for [`Self::push`].
    pub fn record(&mut self, level: HistoryLevel, message: impl Into<String>) {
        self.push(HistoryEntry::new(level, message));
    }

    /// Entries, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }

    /// Newest entry.
    #[must_use]
    pub fn last(&self) -> Option<&HistoryEntry> {
        self.entries.back()
    }

    /// Number of retained entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Nothing recorded yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for StatusHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_LIMIT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_newest_entries() {
        let mut history = StatusHistory::new(3);
        for i in 0..5 {
            history.record(HistoryLevel::Info, format!("m{i}"));
        }
        let messages: Vec<_> = history.iter().map(|e| e.message.as_str()).collect();
        assert_eq!(messages, ["m2", "m3", "m4"]);
        assert_eq!(history.last().unwrap().message, "m4");
    }
}
