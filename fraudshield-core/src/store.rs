//! Append-only log store — well-known file locations and JSONL writers.
//!
//! The store never rewrites a line in place. Writers append one
//! newline-terminated JSON object at a time; the loader tolerates a trailing
//! partial line, which is the only concurrency safeguard (and the only one
//! the format needs).

use crate::error::CoreError;
use crate::record::{DecisionRecord, NotificationRecord, ReplyRecord};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Well-known log file locations under a data directory.
///
/// The legacy CSV names (and the legacy replies JSONL alternate) exist only
/// as fallback read paths and as migration input.
#[derive(Debug, Clone)]
pub struct LogPaths {
    pub decisions_jsonl: PathBuf,
    pub decisions_csv: PathBuf,
    pub notifications_jsonl: PathBuf,
    pub notifications_jsonl_legacy: PathBuf,
    pub notifications_csv: PathBuf,
    pub replies_jsonl: PathBuf,
    pub replies_jsonl_legacy: PathBuf,
    pub replies_csv: PathBuf,
    pub audit_jsonl: PathBuf,
}

impl LogPaths {
    /// Resolve the standard file names under `data_dir`.
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        let dir = data_dir.as_ref();
        Self {
            decisions_jsonl: dir.join("fraudshield_logs.jsonl"),
            decisions_csv: dir.join("fraudshield_logs.csv"),
            notifications_jsonl: dir.join("fraudshield_notifications.jsonl"),
            notifications_jsonl_legacy: dir.join("fraudshield_logs_notifications.jsonl"),
            notifications_csv: dir.join("fraudshield_logs_notifications.csv"),
            replies_jsonl: dir.join("fraudshield_replies.jsonl"),
            replies_jsonl_legacy: dir.join("fraudshield_logs_replies.jsonl"),
            replies_csv: dir.join("fraudshield_logs_replies.csv"),
            audit_jsonl: dir.join("logs").join("audit.jsonl"),
        }
    }
}

/// Append-only writer over the well-known log files.
#[derive(Debug, Clone)]
pub struct LogStore {
    paths: LogPaths,
}

impl LogStore {
    pub fn new(paths: LogPaths) -> Self {
        Self { paths }
    }

    pub fn paths(&self) -> &LogPaths {
        &self.paths
    }

    /// Append one decision record to the decisions log.
    pub fn append_decision(&self, record: &DecisionRecord) -> Result<(), CoreError> {
        append_jsonl(&self.paths.decisions_jsonl, record)
    }

    /// Append one notification record to the notifications log.
    pub fn append_notification(&self, record: &NotificationRecord) -> Result<(), CoreError> {
        append_jsonl(&self.paths.notifications_jsonl, record)
    }

    /// Append one reply record to the replies log.
    pub fn append_reply(&self, record: &ReplyRecord) -> Result<(), CoreError> {
        append_jsonl(&self.paths.replies_jsonl, record)
    }
}

/// Serialize `record` and append it as a single newline-terminated line,
/// creating the file and parent directories on first write.
pub fn append_jsonl<T: Serialize>(path: &Path, record: &T) -> Result<(), CoreError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut line = serde_json::to_string(record)?;
    line.push('\n');
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(line.as_bytes())?;
    Ok(())
}

// ---------------------------------------------------------------------------
// AuditLog
// ---------------------------------------------------------------------------

/// One recorded operator action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    /// Who triggered the action ("cli", an operator name, ...).
    pub actor: String,
    /// What was done ("migrate", "report", ...).
    pub action: String,
    /// Free-form context for the action.
    #[serde(default)]
    pub detail: serde_json::Value,
}

/// Append-only audit trail of explicit operator actions.
///
/// Audit writes must never abort the operation being audited: failures are
/// logged and swallowed.
#[derive(Debug, Clone)]
pub struct AuditLog {
    path: PathBuf,
}

impl AuditLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Record an operator action, returning the event that was written.
    pub fn record(
        &self,
        actor: impl Into<String>,
        action: impl Into<String>,
        detail: serde_json::Value,
    ) -> AuditEvent {
        let event = AuditEvent {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            actor: actor.into(),
            action: action.into(),
            detail,
        };
        if let Err(e) = append_jsonl(&self.path, &event) {
            tracing::warn!(error = %e, path = %self.path.display(), "failed to write audit event");
        }
        event
    }

    /// The most recent `n` audit events, oldest first within the window.
    pub fn recent(&self, n: usize) -> Vec<AuditEvent> {
        let Ok(content) = std::fs::read_to_string(&self.path) else {
            return Vec::new();
        };
        let events: Vec<AuditEvent> = content
            .lines()
            .filter(|ln| !ln.trim().is_empty())
            .filter_map(|ln| serde_json::from_str(ln).ok())
            .collect();
        let skip = events.len().saturating_sub(n);
        events.into_iter().skip(skip).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_append_creates_file_and_parents() {
        let dir = TempDir::new().unwrap();
        let paths = LogPaths::new(dir.path().join("nested"));
        let store = LogStore::new(paths.clone());

        let record = DecisionRecord {
            timestamp: "2024-01-01 10:00:00".into(),
            transaction_id: Some("TX-1".into()),
            prediction: Some(1),
            probability: Some(0.9),
            shap_values: Some(vec![0.1, -0.2]),
            inputs: Some(vec![100.0, 1.0]),
        };
        store.append_decision(&record).unwrap();
        store.append_decision(&record).unwrap();

        let content = std::fs::read_to_string(&paths.decisions_jsonl).unwrap();
        assert_eq!(content.lines().count(), 2);
        assert!(content.ends_with('\n'));
    }

    #[test]
    fn test_audit_record_and_recent() {
        let dir = TempDir::new().unwrap();
        let audit = AuditLog::new(dir.path().join("logs").join("audit.jsonl"));

        for i in 0..5 {
            audit.record("cli", format!("action_{i}"), serde_json::json!({ "i": i }));
        }

        let recent = audit.recent(2);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].action, "action_3");
        assert_eq!(recent[1].action, "action_4");
    }

    #[test]
    fn test_audit_recent_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let audit = AuditLog::new(dir.path().join("absent.jsonl"));
        assert!(audit.recent(10).is_empty());
    }
}
