use serde::{Deserialize, Serialize};
use tsify_next::Tsify;

use crate::types::Severity;

/// Entries kept in the on-screen log.
pub const LOG_CAPACITY: usize = 8;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Tsify)]
#[tsify(into_wasm_abi, from_wasm_abi)]
pub struct Notification {
    pub text: String,
    pub severity: Severity,
}

impl Notification {
    pub fn new(text: impl Into<String>, severity: Severity) -> Self {
        Self {
            text: text.into(),
            severity,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Tsify)]
#[tsify(into_wasm_abi, from_wasm_abi)]
pub struct LogEntry {
    pub id: u64,
    pub text: String,
    pub severity: Severity,
    pub count: u32,
}

/// The player's message log: newest last, capped, with a repeat of the last
/// message bumping its count instead of adding a row.
#[derive(Debug, Clone)]
pub struct NotificationLog {
    entries: Vec<LogEntry>,
    next_id: u64,
}

impl NotificationLog {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            next_id: 1,
        }
    }

    pub fn push(&mut self, notification: &Notification) {
        let id = self.next_id;
        self.next_id += 1;

        if let Some(last) = self.entries.last_mut() {
            if last.text == notification.text {
                last.count += 1;
                // New id so the presentation re-highlights the row.
                last.id = id;
                return;
            }
        }

        self.entries.push(LogEntry {
            id,
            text: notification.text.clone(),
            severity: notification.severity,
            count: 1,
        });
        if self.entries.len() > LOG_CAPACITY {
            let excess = self.entries.len() - LOG_CAPACITY;
            self.entries.drain(..excess);
        }
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }
}

impl Default for NotificationLog {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(text: &str) -> Notification {
        Notification::new(text, Severity::Info)
    }

    #[test]
    fn test_log_keeps_last_eight() {
        let mut log = NotificationLog::new();
        for i in 0..12 {
            log.push(&info(&format!("message {i}")));
        }
        let texts: Vec<_> = log.entries().iter().map(|e| e.text.as_str()).collect();
        assert_eq!(texts.len(), LOG_CAPACITY);
        assert_eq!(texts[0], "message 4");
        assert_eq!(texts[7], "message 11");
    }

    #[test]
    fn test_consecutive_duplicates_collapse() {
        let mut log = NotificationLog::new();
        log.push(&info("Inventory is full"));
        log.push(&info("Inventory is full"));
        log.push(&info("Inventory is full"));
        assert_eq!(log.entries().len(), 1);
        assert_eq!(log.entries()[0].count, 3);

        log.push(&info("Sold"));
        log.push(&info("Inventory is full"));
        assert_eq!(log.entries().len(), 3);
        assert_eq!(log.entries()[2].count, 1);
    }
}
