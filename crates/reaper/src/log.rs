//! Ordered isolation log, mirrored to `tracing`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogStatus {
    Success,
    Warning,
    Error,
}

impl fmt::Display for LogStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LogStatus::Success => "success",
            LogStatus::Warning => "warning",
            LogStatus::Error => "error",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub at: DateTime<Utc>,
    /// Pipeline step, 1 to 7.
    pub step: u8,
    /// Short machine name of what was done, e.g. `quarantine`.
    pub action: String,
    pub status: LogStatus,
    pub message: String,
    /// Project-relative files the action touched or tried to touch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub affected_files: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IsolationLog {
    entries: Vec<LogEntry>,
}

impl IsolationLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, step: u8, action: &str, status: LogStatus, message: impl Into<String>) {
        self.record(step, action, status, message.into(), None);
    }

    /// Like [`push`](Self::push), naming the files involved.
    pub fn push_affecting(
        &mut self,
        step: u8,
        action: &str,
        status: LogStatus,
        message: impl Into<String>,
        files: Vec<String>,
    ) {
        self.record(step, action, status, message.into(), Some(files));
    }

    fn record(
        &mut self,
        step: u8,
        action: &str,
        status: LogStatus,
        message: String,
        affected_files: Option<Vec<String>>,
    ) {
        match status {
            LogStatus::Success => info!(step, action, "{message}"),
            LogStatus::Warning => warn!(step, action, "{message}"),
            LogStatus::Error => error!(step, action, "{message}"),
        }
        self.entries.push(LogEntry {
            at: Utc::now(),
            step,
            action: action.to_string(),
            status,
            message,
            affected_files,
        });
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn count(&self, status: LogStatus) -> usize {
        self.entries.iter().filter(|e| e.status == status).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entries_keep_order() {
        let mut log = IsolationLog::new();
        log.push(1, "create_directories", LogStatus::Success, "dirs ready");
        log.push_affecting(
            3,
            "quarantine",
            LogStatus::Warning,
            "src/x.ts missing",
            vec!["src/x.ts".into()],
        );
        log.push(3, "quarantine", LogStatus::Success, "src/b.ts quarantined");

        let steps: Vec<u8> = log.entries().iter().map(|e| e.step).collect();
        assert_eq!(steps, vec![1, 3, 3]);
        assert_eq!(log.count(LogStatus::Warning), 1);
        assert!(log.entries().windows(2).all(|w| w[0].at <= w[1].at));
    }

    #[test]
    fn test_entry_json_shape() {
        let mut log = IsolationLog::new();
        log.push(6, "preserve", LogStatus::Success, "2 files preserved");
        log.push_affecting(
            3,
            "quarantine",
            LogStatus::Error,
            "src/b.ts: denied",
            vec!["src/b.ts".into()],
        );

        let json = serde_json::to_value(&log).unwrap();
        let entries = json["entries"].as_array().unwrap();
        assert_eq!(entries[0]["action"], "preserve");
        assert_eq!(entries[0]["status"], "success");
        assert!(entries[0].get("affected_files").is_none());
        assert_eq!(entries[1]["status"], "error");
        assert_eq!(entries[1]["affected_files"][0], "src/b.ts");

        let back: IsolationLog = serde_json::from_value(json).unwrap();
        assert_eq!(back, log);
    }
}
