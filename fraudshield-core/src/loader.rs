//! Bounded-window log loading.
//!
//! JSONL is the preferred source; every line is parsed independently so a
//! malformed or mid-write trailing line never aborts the load. The legacy
//! CSV is a fallback read path, parsed with the migrator's tagged layouts.
//! A missing file is a normal zero-value state, not an error.

use crate::migrate::{is_header_row, parse_decision_row, parse_reply_row, split_csv_line};
use crate::record::{DecisionRecord, ReplyRecord};
use crate::store::LogPaths;
use serde::de::DeserializeOwned;
use std::path::Path;

/// The result of a load: the surviving records plus a diagnostic count of
/// lines that failed to parse and were dropped.
#[derive(Debug, Clone)]
pub struct LoadOutcome<T> {
    /// Records in original (chronological append) order.
    pub records: Vec<T>,
    /// Lines that could not be parsed and were silently skipped.
    pub skipped: usize,
}

impl<T> LoadOutcome<T> {
    pub fn empty() -> Self {
        Self {
            records: Vec::new(),
            skipped: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Load the most recent `limit` decision records.
pub fn load_decisions(paths: &LogPaths, limit: Option<usize>) -> LoadOutcome<DecisionRecord> {
    if paths.decisions_jsonl.exists() {
        load_jsonl(&paths.decisions_jsonl, limit)
    } else if paths.decisions_csv.exists() {
        load_legacy_csv(&paths.decisions_csv, limit, |row| parse_decision_row(row))
    } else {
        LoadOutcome::empty()
    }
}

/// Load the most recent `limit` reply records.
///
/// Prefers the current JSONL name, then the legacy JSONL name, then the
/// legacy CSV.
pub fn load_replies(paths: &LogPaths, limit: Option<usize>) -> LoadOutcome<ReplyRecord> {
    let jsonl = if paths.replies_jsonl.exists() {
        Some(&paths.replies_jsonl)
    } else if paths.replies_jsonl_legacy.exists() {
        Some(&paths.replies_jsonl_legacy)
    } else {
        None
    };
    if let Some(path) = jsonl {
        load_jsonl(path, limit)
    } else if paths.replies_csv.exists() {
        load_legacy_csv(&paths.replies_csv, limit, |row| parse_reply_row(row))
    } else {
        LoadOutcome::empty()
    }
}

/// Load a line-delimited JSON file, skipping unparseable lines.
pub fn load_jsonl<T: DeserializeOwned>(path: &Path, limit: Option<usize>) -> LoadOutcome<T> {
    let Ok(content) = std::fs::read_to_string(path) else {
        return LoadOutcome::empty();
    };
    let mut records = Vec::new();
    let mut skipped = 0usize;
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<T>(line) {
            Ok(record) => records.push(record),
            Err(_) => skipped += 1,
        }
    }
    if skipped > 0 {
        tracing::debug!(path = %path.display(), skipped, "skipped unparseable lines");
    }
    tail(records, limit, skipped)
}

fn load_legacy_csv<T, F>(path: &Path, limit: Option<usize>, parse: F) -> LoadOutcome<T>
where
    F: Fn(&[String]) -> T,
{
    let Ok(content) = std::fs::read_to_string(path) else {
        return LoadOutcome::empty();
    };
    let mut records = Vec::new();
    for (i, line) in content.lines().enumerate() {
        let row = split_csv_line(line);
        if row.iter().all(|c| c.trim().is_empty()) {
            continue;
        }
        if i == 0 && is_header_row(&row) {
            continue;
        }
        records.push(parse(&row));
    }
    tail(records, limit, 0)
}

/// Keep only the most recent `limit` records, preserving relative order.
fn tail<T>(mut records: Vec<T>, limit: Option<usize>, skipped: usize) -> LoadOutcome<T> {
    if let Some(limit) = limit {
        let excess = records.len().saturating_sub(limit);
        if excess > 0 {
            records.drain(..excess);
        }
    }
    LoadOutcome { records, skipped }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn write_decisions(dir: &TempDir, lines: &[&str]) -> LogPaths {
        let paths = LogPaths::new(dir.path());
        std::fs::write(&paths.decisions_jsonl, lines.join("\n")).unwrap();
        paths
    }

    #[test]
    fn test_missing_files_yield_empty() {
        let dir = TempDir::new().unwrap();
        let outcome = load_decisions(&LogPaths::new(dir.path()), Some(50));
        assert!(outcome.is_empty());
        assert_eq!(outcome.skipped, 0);
    }

    #[test]
    fn test_malformed_line_between_valid_lines_is_dropped() {
        let dir = TempDir::new().unwrap();
        let paths = write_decisions(
            &dir,
            &[
                r#"{"timestamp":"t1","prediction":0,"probability":0.2}"#,
                r#"{"timestamp":"t2","predic"#,
                r#"{"timestamp":"t3","prediction":1,"probability":0.9}"#,
            ],
        );
        let outcome = load_decisions(&paths, None);
        assert_eq!(outcome.len(), 2);
        assert_eq!(outcome.skipped, 1);
        assert_eq!(outcome.records[0].timestamp, "t1");
        assert_eq!(outcome.records[1].timestamp, "t3");
    }

    #[test]
    fn test_limit_selects_tail_in_order() {
        let dir = TempDir::new().unwrap();
        let lines: Vec<String> = (0..10)
            .map(|i| format!(r#"{{"timestamp":"t{i}","prediction":0}}"#))
            .collect();
        let refs: Vec<&str> = lines.iter().map(String::as_str).collect();
        let paths = write_decisions(&dir, &refs);

        let outcome = load_decisions(&paths, Some(3));
        assert_eq!(outcome.len(), 3);
        assert_eq!(outcome.records[0].timestamp, "t7");
        assert_eq!(outcome.records[2].timestamp, "t9");
    }

    #[test]
    fn test_blank_lines_ignored_without_skip_count() {
        let dir = TempDir::new().unwrap();
        let paths = write_decisions(&dir, &[r#"{"timestamp":"t1"}"#, "", "   ", ""]);
        let outcome = load_decisions(&paths, None);
        assert_eq!(outcome.len(), 1);
        assert_eq!(outcome.skipped, 0);
    }

    #[test]
    fn test_csv_fallback_when_jsonl_absent() {
        let dir = TempDir::new().unwrap();
        let paths = LogPaths::new(dir.path());
        std::fs::write(
            &paths.decisions_csv,
            "timestamp,prediction,probability,shap_values,inputs\n\
             2024-01-01 10:00:00,1,0.87,\"[0.2,-0.1]\",\"[100.0,1]\"\n\
             2024-01-01 10:01:00,0,0.05,\"[0.0,0.0]\",\"[3.0,0]\"\n",
        )
        .unwrap();

        let outcome = load_decisions(&paths, None);
        assert_eq!(outcome.len(), 2);
        assert_eq!(outcome.records[0].prediction, Some(1));
        assert_eq!(outcome.records[1].probability, Some(0.05));
    }

    #[test]
    fn test_jsonl_preferred_over_csv() {
        let dir = TempDir::new().unwrap();
        let paths = LogPaths::new(dir.path());
        std::fs::write(&paths.decisions_jsonl, r#"{"timestamp":"from-jsonl"}"#).unwrap();
        std::fs::write(&paths.decisions_csv, "from-csv,1,0.5,[],[]\n").unwrap();

        let outcome = load_decisions(&paths, None);
        assert_eq!(outcome.len(), 1);
        assert_eq!(outcome.records[0].timestamp, "from-jsonl");
    }

    #[test]
    fn test_replies_legacy_jsonl_name() {
        let dir = TempDir::new().unwrap();
        let paths = LogPaths::new(dir.path());
        std::fs::write(
            &paths.replies_jsonl_legacy,
            r#"{"timestamp":"t","contact":"+1555","reply":"YES"}"#,
        )
        .unwrap();

        let outcome = load_replies(&paths, None);
        assert_eq!(outcome.len(), 1);
        assert_eq!(outcome.records[0].reply.as_deref(), Some("YES"));
    }
}
