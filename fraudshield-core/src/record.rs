//! Log record types — decisions, notifications, and customer replies.
//!
//! All three record kinds live in append-only, line-delimited JSON files.
//! A record is written once at event time and never mutated; legacy CSV
//! exports are only ever migrated (see [`crate::migrate`]), with the
//! original file preserved as a backup.

use serde::{Deserialize, Deserializer, Serialize};

/// One logged outcome of a fraud-risk scoring event.
///
/// Field tolerance is deliberate: legacy rows may lack `transaction_id`,
/// and external writers occasionally produce malformed attribution vectors.
/// A malformed `shap_values` or `inputs` value (anything that is not a JSON
/// array) deserializes to `None` instead of rejecting the whole line, so the
/// record still counts toward totals while the SHAP aggregation skips it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionRecord {
    /// Local wall-clock time of the scoring event. Not guaranteed sortable
    /// across sources; chronological order is append order.
    pub timestamp: String,
    /// Opaque correlation id, absent in pre-migration data.
    #[serde(default)]
    pub transaction_id: Option<String>,
    /// Model output: 0 (legitimate) or 1 (fraud).
    #[serde(default)]
    pub prediction: Option<i64>,
    /// Fraud probability in [0, 1].
    #[serde(default)]
    pub probability: Option<f64>,
    /// Signed per-feature attribution values, one per model feature.
    #[serde(default, deserialize_with = "lenient_float_list")]
    pub shap_values: Option<Vec<f64>>,
    /// Feature values in the model's feature order.
    #[serde(default, deserialize_with = "lenient_float_list")]
    pub inputs: Option<Vec<f64>>,
}

/// One customer notification attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationRecord {
    pub timestamp: String,
    #[serde(default)]
    pub transaction_id: Option<String>,
    /// Delivery method (sms, email, ...).
    #[serde(default)]
    pub method: Option<String>,
    /// Destination address or phone number.
    #[serde(default)]
    pub contact: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// One customer reply (YES/NO confirmation) correlated to a notification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplyRecord {
    pub timestamp: String,
    #[serde(default)]
    pub contact: Option<String>,
    #[serde(default)]
    pub transaction_id: Option<String>,
    #[serde(default)]
    pub reply: Option<String>,
}

/// Deserialize a JSON value into `Some(Vec<f64>)` when it is an array,
/// dropping non-numeric elements, and `None` for anything else.
fn lenient_float_list<'de, D>(deserializer: D) -> Result<Option<Vec<f64>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Array(items)) => {
            Some(items.iter().filter_map(serde_json::Value::as_f64).collect())
        }
        _ => None,
    })
}
