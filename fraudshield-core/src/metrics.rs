//! Summary metrics over loaded decision records.
//!
//! Every function here is total: any record sequence, including an empty
//! one, yields a well-defined zero/empty result.

use crate::record::DecisionRecord;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Headline counters for the decisions window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionSummary {
    pub total: usize,
    pub fraud_count: i64,
    pub fraud_rate: f64,
    /// Probability of the chronologically last record, if present.
    pub last_probability: Option<f64>,
    /// Prediction (0/1) of the chronologically last record, if present.
    pub last_is_fraud: Option<i64>,
}

impl DecisionSummary {
    pub fn zero() -> Self {
        Self {
            total: 0,
            fraud_count: 0,
            fraud_rate: 0.0,
            last_probability: None,
            last_is_fraud: None,
        }
    }
}

/// One point of the probability time series; the index is the 0-based
/// position within the bounded window, which is what the chart's x-axis
/// plots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbabilityPoint {
    pub index: usize,
    pub probability: Option<f64>,
}

/// Mean absolute attribution for one feature position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureAttribution {
    pub feature_index: usize,
    pub mean_abs: f64,
}

/// Compute the headline summary over all records in the window.
///
/// An absent `prediction` contributes 0 to `fraud_count`; `fraud_rate` is
/// 0.0 for an empty window.
pub fn compute_metrics(records: &[DecisionRecord]) -> DecisionSummary {
    let Some(last) = records.last() else {
        return DecisionSummary::zero();
    };
    let total = records.len();
    let fraud_count: i64 = records.iter().filter_map(|r| r.prediction).sum();
    DecisionSummary {
        total,
        fraud_count,
        fraud_rate: fraud_count as f64 / total as f64,
        last_probability: last.probability,
        last_is_fraud: last.prediction,
    }
}

/// The probability series over the most recent `limit` records.
pub fn probability_timeseries(records: &[DecisionRecord], limit: usize) -> Vec<ProbabilityPoint> {
    let start = records.len().saturating_sub(limit);
    records[start..]
        .iter()
        .enumerate()
        .map(|(index, r)| ProbabilityPoint {
            index,
            probability: r.probability,
        })
        .collect()
}

/// Ranked mean-absolute-attribution table over the most recent `limit`
/// records.
///
/// Records whose attribution vector is malformed (`None`) are skipped
/// entirely; each feature index's mean is over however many records actually
/// supplied a value at that position. Sorted descending by mean absolute
/// value, ties stable by feature index.
pub fn shap_aggregate(records: &[DecisionRecord], limit: usize) -> Vec<FeatureAttribution> {
    let start = records.len().saturating_sub(limit);
    let mut sums: BTreeMap<usize, (f64, usize)> = BTreeMap::new();
    for record in &records[start..] {
        let Some(values) = &record.shap_values else {
            continue;
        };
        for (i, v) in values.iter().enumerate() {
            let entry = sums.entry(i).or_insert((0.0, 0));
            entry.0 += v.abs();
            entry.1 += 1;
        }
    }
    let mut table: Vec<FeatureAttribution> = sums
        .into_iter()
        .map(|(feature_index, (sum, count))| FeatureAttribution {
            feature_index,
            mean_abs: sum / count as f64,
        })
        .collect();
    table.sort_by(|a, b| {
        b.mean_abs
            .partial_cmp(&a.mean_abs)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.feature_index.cmp(&b.feature_index))
    });
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn record(prediction: Option<i64>, probability: Option<f64>) -> DecisionRecord {
        DecisionRecord {
            timestamp: "t".into(),
            transaction_id: None,
            prediction,
            probability,
            shap_values: None,
            inputs: None,
        }
    }

    fn record_with_shap(shap: Option<Vec<f64>>) -> DecisionRecord {
        DecisionRecord {
            shap_values: shap,
            ..record(Some(0), Some(0.5))
        }
    }

    #[test]
    fn test_compute_metrics_empty() {
        assert_eq!(compute_metrics(&[]), DecisionSummary::zero());
    }

    #[test]
    fn test_compute_metrics_rate_and_last() {
        let records = vec![
            record(Some(1), Some(0.9)),
            record(Some(0), Some(0.1)),
            record(None, None),
            record(Some(1), Some(0.8)),
        ];
        let summary = compute_metrics(&records);
        assert_eq!(summary.total, 4);
        assert_eq!(summary.fraud_count, 2);
        assert_eq!(summary.fraud_rate, 0.5);
        assert_eq!(summary.last_probability, Some(0.8));
        assert_eq!(summary.last_is_fraud, Some(1));
    }

    #[test]
    fn test_compute_metrics_last_fields_absent() {
        let records = vec![record(Some(1), Some(0.9)), record(None, None)];
        let summary = compute_metrics(&records);
        assert_eq!(summary.last_probability, None);
        assert_eq!(summary.last_is_fraud, None);
    }

    #[test]
    fn test_timeseries_index_resets_within_window() {
        let records: Vec<DecisionRecord> =
            (0..10).map(|i| record(Some(0), Some(i as f64 / 10.0))).collect();
        let series = probability_timeseries(&records, 3);
        assert_eq!(series.len(), 3);
        assert_eq!(series[0].index, 0);
        assert_eq!(series[0].probability, Some(0.7));
        assert_eq!(series[2].probability, Some(0.9));
    }

    #[test]
    fn test_shap_aggregate_means_and_order() {
        let records = vec![
            record_with_shap(Some(vec![0.1, -0.2])),
            record_with_shap(Some(vec![0.3, 0.0])),
        ];
        let table = shap_aggregate(&records, 400);
        assert_eq!(table.len(), 2);
        assert_eq!(table[0].feature_index, 0);
        assert!((table[0].mean_abs - 0.2).abs() < 1e-12);
        assert_eq!(table[1].feature_index, 1);
        assert!((table[1].mean_abs - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_shap_aggregate_skips_malformed_vectors() {
        let records = vec![
            record_with_shap(None),
            record_with_shap(Some(vec![0.4])),
            record_with_shap(Some(vec![0.2, 0.6])),
        ];
        let table = shap_aggregate(&records, 400);
        // Index 0 averaged over two records, index 1 over one.
        assert_eq!(table[0].feature_index, 1);
        assert!((table[0].mean_abs - 0.6).abs() < 1e-12);
        assert_eq!(table[1].feature_index, 0);
        assert!((table[1].mean_abs - 0.3).abs() < 1e-12);
    }

    #[test]
    fn test_shap_aggregate_empty() {
        assert!(shap_aggregate(&[], 400).is_empty());
    }
}
