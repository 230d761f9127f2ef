//! Legacy CSV to line-delimited JSON migration.
//!
//! Historical tabular exports vary in column count because optional fields
//! were added over time and because free-text / list fields were not always
//! quoted. Each record kind therefore has a set of tagged legacy layouts that
//! are attempted in a fixed priority order; only when no exact layout matches
//! does the generic column-count heuristic run (overflow columns joined back
//! into the last free-text field, short rows treated as missing the optional
//! correlation id).
//!
//! Migration is an explicit operator action and the one place in the
//! pipeline where I/O failures surface as errors: silently losing the
//! rename-to-backup step would break the backup-before-overwrite guarantee.

use crate::error::CoreError;
use crate::record::{DecisionRecord, NotificationRecord, ReplyRecord};
use crate::store::LogPaths;
use regex::Regex;
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// First-row cells containing any of these mark the row as a header.
const HEADER_KEYWORDS: [&str; 6] = [
    "timestamp",
    "prediction",
    "transaction_id",
    "method",
    "contact",
    "reply",
];

/// Per-file migration results.
#[derive(Debug, Clone, Default)]
pub struct MigrationReport {
    pub decisions: usize,
    pub notifications: usize,
    pub replies: usize,
}

/// Migrate all three legacy CSV logs under the given paths.
pub fn migrate_all(paths: &LogPaths) -> Result<MigrationReport, CoreError> {
    Ok(MigrationReport {
        decisions: migrate_decisions(&paths.decisions_csv, &paths.decisions_jsonl)?,
        notifications: migrate_notifications(&paths.notifications_csv, &paths.notifications_jsonl)?,
        replies: migrate_replies(&paths.replies_csv, &paths.replies_jsonl)?,
    })
}

/// Migrate a legacy decisions CSV to line-delimited JSON.
///
/// Returns the number of records written; 0 when there is nothing to
/// migrate (no CSV and no prior backup).
pub fn migrate_decisions(csv_path: &Path, out_path: &Path) -> Result<usize, CoreError> {
    run_migration(csv_path, out_path, parse_decision_row)
}

/// Migrate a legacy notifications CSV to line-delimited JSON.
pub fn migrate_notifications(csv_path: &Path, out_path: &Path) -> Result<usize, CoreError> {
    run_migration(csv_path, out_path, parse_notification_row)
}

/// Migrate a legacy replies CSV to line-delimited JSON.
pub fn migrate_replies(csv_path: &Path, out_path: &Path) -> Result<usize, CoreError> {
    run_migration(csv_path, out_path, parse_reply_row)
}

fn run_migration<T, F>(csv_path: &Path, out_path: &Path, parse: F) -> Result<usize, CoreError>
where
    T: Serialize,
    F: Fn(&[String]) -> T,
{
    let Some(backup) = prepare_backup(csv_path)? else {
        tracing::debug!(path = %csv_path.display(), "no legacy file to migrate");
        return Ok(0);
    };

    let content = std::fs::read_to_string(&backup)?;
    if let Some(parent) = out_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut out = BufWriter::new(File::create(out_path)?);
    let mut written = 0usize;
    for (i, line) in content.lines().enumerate() {
        let row = split_csv_line(line);
        if row.iter().all(|c| c.trim().is_empty()) {
            continue;
        }
        if i == 0 && is_header_row(&row) {
            continue;
        }
        let record = parse(&row);
        let mut json = serde_json::to_string(&record)?;
        json.push('\n');
        out.write_all(json.as_bytes())?;
        written += 1;
    }
    out.flush()?;
    tracing::info!(
        from = %backup.display(),
        to = %out_path.display(),
        records = written,
        "migration complete"
    );
    Ok(written)
}

/// Ensure the legacy file is preserved as `<path>.bak` and return the backup
/// to read from.
///
/// First run renames the CSV aside; a later run finds the backup already in
/// place and must not overwrite it, but still regenerates the output from it.
/// Returns `None` when neither the CSV nor a backup exists.
fn prepare_backup(csv_path: &Path) -> Result<Option<PathBuf>, CoreError> {
    let mut bak = csv_path.as_os_str().to_owned();
    bak.push(".bak");
    let bak = PathBuf::from(bak);

    if bak.exists() {
        tracing::info!(backup = %bak.display(), "backup already exists, regenerating from it");
        return Ok(Some(bak));
    }
    if csv_path.exists() {
        std::fs::rename(csv_path, &bak).map_err(|e| {
            CoreError::migration(format!(
                "failed to back up {} to {}: {e}",
                csv_path.display(),
                bak.display()
            ))
        })?;
        tracing::info!(from = %csv_path.display(), to = %bak.display(), "backed up legacy file");
        return Ok(Some(bak));
    }
    Ok(None)
}

// ---------------------------------------------------------------------------
// Row parsing
// ---------------------------------------------------------------------------

/// Known decision-row layouts, in match priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DecisionLayout {
    /// `timestamp, transaction_id, prediction, probability, shap, inputs`
    WithTransactionId,
    /// `timestamp, prediction, probability, shap, inputs`
    Bare,
}

impl DecisionLayout {
    const PRIORITY: [DecisionLayout; 2] = [Self::WithTransactionId, Self::Bare];

    fn matches(self, row: &[String]) -> bool {
        match self {
            Self::WithTransactionId => row.len() == 6,
            Self::Bare => row.len() == 5,
        }
    }

    fn parse(self, row: &[String]) -> DecisionRecord {
        match self {
            Self::WithTransactionId => decision_from_parts(
                &row[0],
                opt_cell(&row[1]),
                &row[2],
                &row[3],
                &row[4],
                &row[5],
            ),
            Self::Bare => decision_from_parts(&row[0], None, &row[1], &row[2], &row[3], &row[4]),
        }
    }
}

pub(crate) fn parse_decision_row(row: &[String]) -> DecisionRecord {
    for layout in DecisionLayout::PRIORITY {
        if layout.matches(row) {
            return layout.parse(row);
        }
    }
    if row.len() > 6 {
        // Unquoted delimiters inside the trailing list field: rejoin the
        // overflow into `inputs`.
        return decision_from_parts(
            &row[0],
            opt_cell(&row[1]),
            &row[2],
            &row[3],
            &row[4],
            &row[5..].join(","),
        );
    }
    // Short row: only the optional correlation id can be missing, so pad and
    // read as the bare layout.
    let padded = pad(row, 5);
    decision_from_parts(
        &padded[0], None, &padded[1], &padded[2], &padded[3], &padded[4],
    )
}

fn decision_from_parts(
    timestamp: &str,
    transaction_id: Option<String>,
    prediction: &str,
    probability: &str,
    shap: &str,
    inputs: &str,
) -> DecisionRecord {
    DecisionRecord {
        timestamp: timestamp.to_string(),
        transaction_id,
        prediction: prediction.trim().parse::<i64>().ok(),
        probability: probability.trim().parse::<f64>().ok(),
        shap_values: Some(extract_numbers(shap)),
        inputs: Some(extract_numbers(inputs)),
    }
}

/// Known notification-row layouts, in match priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NotificationLayout {
    /// `timestamp, transaction_id, method, contact, message`
    WithTransactionId,
    /// `timestamp, method, contact, message`
    Bare,
}

impl NotificationLayout {
    const PRIORITY: [NotificationLayout; 2] = [Self::WithTransactionId, Self::Bare];

    fn matches(self, row: &[String]) -> bool {
        match self {
            Self::WithTransactionId => row.len() == 5,
            Self::Bare => row.len() == 4,
        }
    }

    fn parse(self, row: &[String]) -> NotificationRecord {
        match self {
            Self::WithTransactionId => NotificationRecord {
                timestamp: row[0].clone(),
                transaction_id: opt_cell(&row[1]),
                method: opt_cell(&row[2]),
                contact: opt_cell(&row[3]),
                message: opt_cell(&row[4]),
            },
            Self::Bare => NotificationRecord {
                timestamp: row[0].clone(),
                transaction_id: None,
                method: opt_cell(&row[1]),
                contact: opt_cell(&row[2]),
                message: opt_cell(&row[3]),
            },
        }
    }
}

pub(crate) fn parse_notification_row(row: &[String]) -> NotificationRecord {
    for layout in NotificationLayout::PRIORITY {
        if layout.matches(row) {
            return layout.parse(row);
        }
    }
    if row.len() > 5 {
        return NotificationRecord {
            timestamp: row[0].clone(),
            transaction_id: opt_cell(&row[1]),
            method: opt_cell(&row[2]),
            contact: opt_cell(&row[3]),
            message: opt_cell(&row[4..].join(",")),
        };
    }
    let padded = pad(row, 4);
    NotificationLayout::Bare.parse(&padded)
}

/// Known reply-row layouts, in match priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReplyLayout {
    /// `timestamp, contact, transaction_id, reply`
    WithTransactionId,
    /// `timestamp, contact, reply`
    Bare,
}

impl ReplyLayout {
    const PRIORITY: [ReplyLayout; 2] = [Self::WithTransactionId, Self::Bare];

    fn matches(self, row: &[String]) -> bool {
        match self {
            Self::WithTransactionId => row.len() == 4,
            Self::Bare => row.len() == 3,
        }
    }

    fn parse(self, row: &[String]) -> ReplyRecord {
        match self {
            Self::WithTransactionId => ReplyRecord {
                timestamp: row[0].clone(),
                contact: opt_cell(&row[1]),
                transaction_id: opt_cell(&row[2]),
                reply: opt_cell(&row[3]),
            },
            Self::Bare => ReplyRecord {
                timestamp: row[0].clone(),
                contact: opt_cell(&row[1]),
                transaction_id: None,
                reply: opt_cell(&row[2]),
            },
        }
    }
}

pub(crate) fn parse_reply_row(row: &[String]) -> ReplyRecord {
    for layout in ReplyLayout::PRIORITY {
        if layout.matches(row) {
            return layout.parse(row);
        }
    }
    if row.len() > 4 {
        return ReplyRecord {
            timestamp: row[0].clone(),
            contact: opt_cell(&row[1]),
            transaction_id: opt_cell(&row[2]),
            reply: opt_cell(&row[3..].join(",")),
        };
    }
    let padded = pad(row, 3);
    ReplyLayout::Bare.parse(&padded)
}

fn opt_cell(cell: &str) -> Option<String> {
    let trimmed = cell.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(cell.to_string())
    }
}

fn pad(row: &[String], len: usize) -> Vec<String> {
    let mut padded = row.to_vec();
    padded.resize(len, String::new());
    padded
}

// ---------------------------------------------------------------------------
// Lexical helpers
// ---------------------------------------------------------------------------

/// Extract all numeric tokens (sign, decimals, scientific notation) from a
/// stringified list.
///
/// The legacy export of array-valued attributes is not valid structured data,
/// so this scans for tokens instead of parsing.
pub fn extract_numbers(s: &str) -> Vec<f64> {
    static NUMBER: OnceLock<Regex> = OnceLock::new();
    let re = NUMBER.get_or_init(|| {
        Regex::new(r"[-+]?(?:\d*\.)?\d+(?:[eE][-+]?\d+)?").expect("numeric token regex")
    });
    re.find_iter(s)
        .filter_map(|m| m.as_str().parse::<f64>().ok())
        .collect()
}

/// A first row is a header only if one of the known column-name keywords
/// appears in a cell; otherwise even the first row is data.
pub(crate) fn is_header_row(row: &[String]) -> bool {
    row.iter().any(|cell| {
        let low = cell.trim().to_ascii_lowercase();
        HEADER_KEYWORDS.iter().any(|kw| low.contains(kw))
    })
}

/// Split one CSV line on commas, honoring double quotes with doubled-quote
/// escapes.
///
/// Well-formed legacy exports quoted their list fields; rows written without
/// quoting split apart here and fall through to the column-count heuristic.
pub(crate) fn split_csv_line(line: &str) -> Vec<String> {
    let mut cells = Vec::new();
    let mut cell = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes => {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    cell.push('"');
                } else {
                    in_quotes = false;
                }
            }
            '"' => in_quotes = true,
            ',' if !in_quotes => {
                cells.push(std::mem::take(&mut cell));
            }
            _ => cell.push(c),
        }
    }
    cells.push(cell);
    cells
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn row(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn test_extract_numbers_tokens() {
        assert_eq!(extract_numbers("[0.2, -0.1]"), vec![0.2, -0.1]);
        assert_eq!(extract_numbers("[100.0,1]"), vec![100.0, 1.0]);
        assert_eq!(extract_numbers("1e-3 and 2.5E+2"), vec![0.001, 250.0]);
        assert_eq!(extract_numbers("no numbers here"), Vec::<f64>::new());
    }

    #[test]
    fn test_split_csv_line_quotes() {
        assert_eq!(
            split_csv_line(r#"a,"[0.2, -0.1]",c"#),
            row(&["a", "[0.2, -0.1]", "c"])
        );
        assert_eq!(split_csv_line(r#""say ""hi""",b"#), row(&["say \"hi\"", "b"]));
        assert_eq!(split_csv_line("a,,c"), row(&["a", "", "c"]));
    }

    #[test]
    fn test_header_detection_first_row_only_keywords() {
        assert!(is_header_row(&row(&["timestamp", "prediction"])));
        assert!(is_header_row(&row(&["Timestamp", "Transaction_ID"])));
        assert!(!is_header_row(&row(&["2024-01-01 10:00:00", "1", "0.87"])));
    }

    #[test]
    fn test_decision_bare_layout() {
        let rec = parse_decision_row(&row(&[
            "2024-01-01 10:00:00",
            "1",
            "0.87",
            "[0.2,-0.1]",
            "[100.0,1]",
        ]));
        assert_eq!(rec.transaction_id, None);
        assert_eq!(rec.prediction, Some(1));
        assert_eq!(rec.probability, Some(0.87));
        assert_eq!(rec.shap_values, Some(vec![0.2, -0.1]));
        assert_eq!(rec.inputs, Some(vec![100.0, 1.0]));
    }

    #[test]
    fn test_decision_with_transaction_layout() {
        let rec = parse_decision_row(&row(&[
            "2024-01-01 10:00:00",
            "TX-9",
            "0",
            "0.12",
            "[0.0]",
            "[5.0]",
        ]));
        assert_eq!(rec.transaction_id.as_deref(), Some("TX-9"));
        assert_eq!(rec.prediction, Some(0));
    }

    #[test]
    fn test_decision_overflow_joins_trailing_into_inputs() {
        let rec = parse_decision_row(&row(&[
            "t", "TX-1", "1", "0.5", "[0.2,-0.1]", "[100.0", "1]",
        ]));
        assert_eq!(rec.inputs, Some(vec![100.0, 1.0]));
        assert_eq!(rec.shap_values, Some(vec![0.2, -0.1]));
    }

    #[test]
    fn test_decision_unparseable_numbers_become_none() {
        let rec = parse_decision_row(&row(&["t", "x", "y", "[1]", "[2]"]));
        assert_eq!(rec.prediction, None);
        assert_eq!(rec.probability, None);
    }

    #[test]
    fn test_decision_short_row_pads_bare_layout() {
        let rec = parse_decision_row(&row(&["t", "1", "0.4"]));
        assert_eq!(rec.transaction_id, None);
        assert_eq!(rec.prediction, Some(1));
        assert_eq!(rec.probability, Some(0.4));
        assert_eq!(rec.shap_values, Some(vec![]));
    }

    #[test]
    fn test_notification_layouts() {
        let with_tx = parse_notification_row(&row(&["t", "TX-1", "sms", "+1555", "hello"]));
        assert_eq!(with_tx.transaction_id.as_deref(), Some("TX-1"));
        let bare = parse_notification_row(&row(&["t", "sms", "+1555", "hello"]));
        assert_eq!(bare.transaction_id, None);
        assert_eq!(bare.method.as_deref(), Some("sms"));
        let overflow =
            parse_notification_row(&row(&["t", "TX-1", "sms", "+1555", "hello", "there"]));
        assert_eq!(overflow.message.as_deref(), Some("hello,there"));
    }

    #[test]
    fn test_reply_layouts() {
        let with_tx = parse_reply_row(&row(&["t", "+1555", "TX-1", "YES"]));
        assert_eq!(with_tx.transaction_id.as_deref(), Some("TX-1"));
        let bare = parse_reply_row(&row(&["t", "+1555", "NO"]));
        assert_eq!(bare.transaction_id, None);
        assert_eq!(bare.reply.as_deref(), Some("NO"));
    }

    #[test]
    fn test_migration_renames_to_backup_and_writes_jsonl() {
        let dir = TempDir::new().unwrap();
        let csv = dir.path().join("fraudshield_logs.csv");
        let out = dir.path().join("fraudshield_logs.jsonl");
        std::fs::write(
            &csv,
            "timestamp,prediction,probability,shap_values,inputs\n\
             2024-01-01 10:00:00,1,0.87,\"[0.2,-0.1]\",\"[100.0,1]\"\n",
        )
        .unwrap();

        let count = migrate_decisions(&csv, &out).unwrap();
        assert_eq!(count, 1);
        assert!(!csv.exists());
        assert!(csv.with_extension("csv.bak").exists());

        let content = std::fs::read_to_string(&out).unwrap();
        let rec: DecisionRecord = serde_json::from_str(content.lines().next().unwrap()).unwrap();
        assert_eq!(rec.prediction, Some(1));
        assert_eq!(rec.probability, Some(0.87));
        assert_eq!(rec.shap_values, Some(vec![0.2, -0.1]));
        assert_eq!(rec.inputs, Some(vec![100.0, 1.0]));
        assert_eq!(rec.transaction_id, None);
    }

    #[test]
    fn test_second_run_preserves_backup_and_regenerates() {
        let dir = TempDir::new().unwrap();
        let csv = dir.path().join("logs.csv");
        let bak = dir.path().join("logs.csv.bak");
        let out = dir.path().join("logs.jsonl");
        std::fs::write(&csv, "t,1,0.5,[0.1],[2.0]\n").unwrap();

        assert_eq!(migrate_decisions(&csv, &out).unwrap(), 1);
        let backup_content = std::fs::read_to_string(&bak).unwrap();

        // A stray regenerated CSV must not clobber the original backup.
        std::fs::write(&csv, "t2,0,0.1,[9.9],[9.9]\n").unwrap();
        std::fs::remove_file(&out).unwrap();
        assert_eq!(migrate_decisions(&csv, &out).unwrap(), 1);

        assert_eq!(std::fs::read_to_string(&bak).unwrap(), backup_content);
        let rec: DecisionRecord =
            serde_json::from_str(std::fs::read_to_string(&out).unwrap().lines().next().unwrap())
                .unwrap();
        assert_eq!(rec.timestamp, "t");
    }

    #[test]
    fn test_migration_nothing_to_do() {
        let dir = TempDir::new().unwrap();
        let count = migrate_decisions(
            &dir.path().join("absent.csv"),
            &dir.path().join("absent.jsonl"),
        )
        .unwrap();
        assert_eq!(count, 0);
        assert!(!dir.path().join("absent.jsonl").exists());
    }
}
