//! Human-readable combat log

use serde::{Deserialize, Serialize};

use crate::core::types::SimTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogKind {
    Damage,
    Crit,
    Buff,
    Skill,
    Reload,
    System,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub time: SimTime,
    pub kind: LogKind,
    pub message: String,
}

/// Append-only log of one run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CombatLog {
    entries: Vec<LogEntry>,
    #[serde(skip)]
    enabled: bool,
}

impl CombatLog {
    pub fn new(enabled: bool) -> Self {
        Self {
            entries: Vec::new(),
            enabled,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn push(&mut self, time: SimTime, kind: LogKind, message: impl Into<String>) {
        if self.enabled {
            self.entries.push(LogEntry {
                time,
                kind,
                message: message.into(),
            });
        }
    }

    /// Entries from index `start` on
    pub fn since(&self, start: usize) -> &[LogEntry] {
        self.entries.get(start..).unwrap_or(&[])
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn count(&self, kind: LogKind) -> usize {
        self.entries.iter().filter(|e| e.kind == kind).count()
    }

    pub fn into_entries(self) -> Vec<LogEntry> {
        self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_log_records_nothing() {
        let mut log = CombatLog::new(false);
        log.push(0.0, LogKind::System, "start");
        assert!(log.is_empty());
    }

    #[test]
    fn test_since_returns_tail() {
        let mut log = CombatLog::new(true);
        log.push(0.0, LogKind::System, "start");
        log.push(1.0, LogKind::Reload, "rapi reloads");
        assert_eq!(log.since(1).len(), 1);
        assert!(log.since(5).is_empty());
        assert_eq!(log.count(LogKind::Reload), 1);
    }
}
