//! # fraudshield-core — decision-log analytics for fraud scoring
//!
//! This crate implements the decision-log aggregation and fairness-analysis
//! pipeline behind the FraudShield dashboards:
//!
//! - **Log store** ([`store`]): append-only, line-delimited JSON logs for
//!   decisions, notifications, and customer replies, plus the operator
//!   audit trail.
//! - **Format migration** ([`migrate`]): one-time batch transform of legacy
//!   CSV exports into JSONL, with rename-to-backup idempotency and
//!   column-count layout recovery.
//! - **Loading** ([`loader`]): bounded recent windows with per-line
//!   independent parsing, so a concurrent appender or a malformed line never
//!   aborts a load.
//! - **Metrics** ([`metrics`]): fraud-rate summary, probability time series,
//!   and ranked mean-absolute SHAP attribution.
//! - **Fairness** ([`fairness`]): per-group classification metrics,
//!   prediction rates, recall trends, bias gaps against a governance
//!   threshold, and a simulated mitigation pass.
//!
//! The dashboard rendering layer, the classifier itself, and notification
//! delivery are external collaborators; this crate only exchanges record
//! sequences and derived tables with them.

pub mod config;
pub mod error;
pub mod fairness;
pub mod loader;
pub mod metrics;
pub mod migrate;
pub mod record;
pub mod replies;
pub mod state;
pub mod store;

pub use config::AppConfig;
pub use error::CoreError;
pub use loader::{LoadOutcome, load_decisions, load_replies};
pub use record::{DecisionRecord, NotificationRecord, ReplyRecord};
pub use store::{AuditLog, LogPaths, LogStore};
