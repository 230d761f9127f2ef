//! Demographic fairness analysis over labeled fraud decisions.
//!
//! Computes per-group classification metrics, prediction-rate and recall-gap
//! statistics against a fixed governance threshold, and a simulated
//! "mitigated" dataset variant (group upsampling plus selective
//! false-negative correction). The mitigated copy coexists with the original
//! for before/after comparison and is never fed back as the source of truth.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use rand::Rng;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Governance threshold: a metric gap beyond this flags a bias risk.
pub const BIAS_THRESHOLD: f64 = 0.10;

/// Protected attributes, in the order mitigation processes them.
///
/// The sequential order matters: Region upsampling operates on the
/// already-gender-balanced rows, so the two dimensions are not jointly
/// balanced afterwards. This mirrors the production behavior.
pub const PROTECTED_KEYS: [GroupKey; 2] = [GroupKey::Gender, GroupKey::Region];

const REGIONS: [&str; 4] = ["North", "South", "East", "West"];
const AGE_GROUPS: [&str; 5] = ["18-25", "26-35", "36-45", "46-55", "56+"];

/// A demographic grouping dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupKey {
    Gender,
    AgeGroup,
    Region,
}

impl GroupKey {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Gender => "gender",
            Self::AgeGroup => "age_group",
            Self::Region => "region",
        }
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for GroupKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "gender" => Ok(Self::Gender),
            "age_group" => Ok(Self::AgeGroup),
            "region" => Ok(Self::Region),
            other => Err(format!("unknown group key: {other}")),
        }
    }
}

/// One evaluated subject: demographics, ground truth, and model output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FairnessRecord {
    pub gender: String,
    pub age_group: String,
    pub region: String,
    pub actual_label: u8,
    pub predicted_label: u8,
    pub model_score: f64,
    pub timestamp: DateTime<Utc>,
}

impl FairnessRecord {
    pub fn group_value(&self, key: GroupKey) -> &str {
        match key {
            GroupKey::Gender => &self.gender,
            GroupKey::AgeGroup => &self.age_group,
            GroupKey::Region => &self.region,
        }
    }

    fn is_false_negative(&self) -> bool {
        self.actual_label == 1 && self.predicted_label == 0
    }
}

// ---------------------------------------------------------------------------
// Binary classification metrics
// ---------------------------------------------------------------------------

/// Confusion counts for binary labels, with metrics degrading to 0.0 where
/// undefined instead of dividing by zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BinaryCounts {
    pub tp: usize,
    pub fp: usize,
    pub fn_: usize,
    pub tn: usize,
}

impl BinaryCounts {
    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a FairnessRecord>) -> Self {
        let mut counts = Self::default();
        for r in records {
            match (r.actual_label, r.predicted_label) {
                (1, 1) => counts.tp += 1,
                (0, 1) => counts.fp += 1,
                (1, 0) => counts.fn_ += 1,
                _ => counts.tn += 1,
            }
        }
        counts
    }

    pub fn support(self) -> usize {
        self.tp + self.fp + self.fn_ + self.tn
    }

    pub fn precision(self) -> f64 {
        ratio(self.tp, self.tp + self.fp)
    }

    pub fn recall(self) -> f64 {
        ratio(self.tp, self.tp + self.fn_)
    }

    pub fn f1(self) -> f64 {
        let p = self.precision();
        let r = self.recall();
        if p + r == 0.0 { 0.0 } else { 2.0 * p * r / (p + r) }
    }

    pub fn accuracy(self) -> f64 {
        ratio(self.tp + self.tn, self.support())
    }
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 { 0.0 } else { num as f64 / den as f64 }
}

/// Classification metrics for one demographic group value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupMetricsRow {
    pub group: String,
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

/// Per-group positive-prediction rate, on the 0-100 scale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRate {
    pub group: String,
    pub predicted_positive: usize,
    pub total: usize,
    pub rate_pct: f64,
}

/// Recall for one calendar day within a group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyRecall {
    pub date: NaiveDate,
    pub recall: f64,
}

fn group_by<'a>(
    records: &'a [FairnessRecord],
    key: GroupKey,
) -> BTreeMap<&'a str, Vec<&'a FairnessRecord>> {
    let mut groups: BTreeMap<&str, Vec<&FairnessRecord>> = BTreeMap::new();
    for r in records {
        groups.entry(r.group_value(key)).or_default().push(r);
    }
    groups
}

/// Compute classification metrics per distinct group value, sorted by group.
///
/// Groups with zero support never appear (they cannot: a group exists only
/// because at least one row carries its value).
pub fn group_metrics(records: &[FairnessRecord], key: GroupKey) -> Vec<GroupMetricsRow> {
    group_by(records, key)
        .into_iter()
        .map(|(group, rows)| {
            let counts = BinaryCounts::from_records(rows.iter().copied());
            GroupMetricsRow {
                group: group.to_string(),
                accuracy: counts.accuracy(),
                precision: counts.precision(),
                recall: counts.recall(),
                f1: counts.f1(),
                support: counts.support(),
            }
        })
        .collect()
}

/// Positive-prediction counts and percentage rate per group.
pub fn prediction_rate_table(records: &[FairnessRecord], key: GroupKey) -> Vec<PredictionRate> {
    group_by(records, key)
        .into_iter()
        .map(|(group, rows)| {
            let predicted_positive = rows.iter().filter(|r| r.predicted_label == 1).count();
            let total = rows.len();
            PredictionRate {
                group: group.to_string(),
                predicted_positive,
                total,
                rate_pct: 100.0 * ratio(predicted_positive, total),
            }
        })
        .collect()
}

/// Recall per calendar date for one group, sorted by date.
///
/// Empty when the group has no rows.
pub fn daily_recall(records: &[FairnessRecord], key: GroupKey, value: &str) -> Vec<DailyRecall> {
    let mut days: BTreeMap<NaiveDate, Vec<&FairnessRecord>> = BTreeMap::new();
    for r in records.iter().filter(|r| r.group_value(key) == value) {
        days.entry(r.timestamp.date_naive()).or_default().push(r);
    }
    days.into_iter()
        .map(|(date, rows)| DailyRecall {
            date,
            recall: BinaryCounts::from_records(rows.iter().copied()).recall(),
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Mitigation simulation
// ---------------------------------------------------------------------------

/// Simulate bias mitigation: per-key upsampling to the largest group,
/// followed by selective false-negative correction for lagging groups.
///
/// Returns a new dataset; the input is never mutated. Deterministic for a
/// given RNG state.
pub fn mitigate<R: Rng>(records: &[FairnessRecord], rng: &mut R) -> Vec<FairnessRecord> {
    let mut balanced: Vec<FairnessRecord> = records.to_vec();

    // Pass 1: upsample each group with replacement up to the largest group's
    // size, one protected key at a time. Later keys operate on the output of
    // earlier keys.
    for key in PROTECTED_KEYS {
        let groups = group_by(&balanced, key);
        let Some(max_count) = groups.values().map(Vec::len).max() else {
            continue;
        };
        let mut augmented: Vec<FairnessRecord> = Vec::with_capacity(max_count * groups.len());
        for rows in groups.into_values() {
            for r in &rows {
                augmented.push((*r).clone());
            }
            for _ in rows.len()..max_count {
                let pick = rng.gen_range(0..rows.len());
                augmented.push(rows[pick].clone());
            }
        }
        balanced = augmented;
    }

    // Pass 2: for each key, flip up to 20% of false negatives to positive in
    // any group whose recall trails 95% of the key's best recall.
    for key in PROTECTED_KEYS {
        let metrics = group_metrics(&balanced, key);
        if metrics.is_empty() {
            continue;
        }
        let max_recall = metrics.iter().map(|m| m.recall).fold(f64::MIN, f64::max);
        let low_groups: Vec<String> = metrics
            .iter()
            .filter(|m| m.recall < max_recall * 0.95)
            .map(|m| m.group.clone())
            .collect();
        for group in low_groups {
            let fn_indices: Vec<usize> = balanced
                .iter()
                .enumerate()
                .filter(|(_, r)| r.group_value(key) == group && r.is_false_negative())
                .map(|(i, _)| i)
                .collect();
            let k = (fn_indices.len() as f64 * 0.2) as usize;
            if k == 0 {
                continue;
            }
            for pick in rand::seq::index::sample(rng, fn_indices.len(), k) {
                balanced[fn_indices[pick]].predicted_label = 1;
            }
        }
    }

    balanced
}

// ---------------------------------------------------------------------------
// Gap analysis
// ---------------------------------------------------------------------------

/// Which metric a bias gap compares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GapMetric {
    Precision,
    Recall,
    F1,
}

impl GapMetric {
    fn value(self, row: &GroupMetricsRow) -> f64 {
        match self {
            Self::Precision => row.precision,
            Self::Recall => row.recall,
            Self::F1 => row.f1,
        }
    }
}

impl fmt::Display for GapMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Precision => "precision",
            Self::Recall => "recall",
            Self::F1 => "f1",
        })
    }
}

impl std::str::FromStr for GapMetric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "precision" => Ok(Self::Precision),
            "recall" => Ok(Self::Recall),
            "f1" => Ok(Self::F1),
            other => Err(format!("unknown gap metric: {other}")),
        }
    }
}

/// A metric difference between two groups, checked against the governance
/// threshold.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BiasGap {
    /// metric(group_a) - metric(group_b).
    pub value: f64,
    pub exceeds_threshold: bool,
}

/// `metric(group_a) - metric(group_b)` over an already-computed metrics
/// table; `None` when either group is missing from the table.
pub fn bias_gap(
    table: &[GroupMetricsRow],
    group_a: &str,
    group_b: &str,
    metric: GapMetric,
) -> Option<BiasGap> {
    let a = table.iter().find(|m| m.group == group_a)?;
    let b = table.iter().find(|m| m.group == group_b)?;
    let value = metric.value(a) - metric.value(b);
    Some(BiasGap {
        value,
        exceeds_threshold: value.abs() > BIAS_THRESHOLD,
    })
}

/// Text findings for the recommendations panel: one finding per dimension
/// whose recall spread exceeds the threshold, then the fixed governance
/// suggestions appended unconditionally.
pub fn recommendations(
    metrics_gender: &[GroupMetricsRow],
    metrics_region: &[GroupMetricsRow],
) -> Vec<String> {
    let mut recs = Vec::new();
    if let Some(gap) = recall_spread(metrics_gender) {
        if gap > BIAS_THRESHOLD {
            recs.push(format!(
                "Recall gap across gender = {gap:.2}. Consider threshold tuning or targeted feature review."
            ));
        }
    }
    if let Some(gap) = recall_spread(metrics_region) {
        if gap > BIAS_THRESHOLD {
            recs.push(format!(
                "Recall gap across regions = {gap:.2}. Investigate regional data quality or sampling."
            ));
        }
    }
    if recs.is_empty() {
        recs.push("No major gaps detected. Continue monitoring and periodic auditing.".to_string());
    }
    recs.push("Implement periodic fairness evaluation pipeline (daily/weekly).".to_string());
    recs.push("Consider threshold calibration per demographic only if policy allows.".to_string());
    recs.push("Validate upstream data collection for underrepresented segments.".to_string());
    recs
}

fn recall_spread(metrics: &[GroupMetricsRow]) -> Option<f64> {
    if metrics.is_empty() {
        return None;
    }
    let max = metrics.iter().map(|m| m.recall).fold(f64::MIN, f64::max);
    let min = metrics.iter().map(|m| m.recall).fold(f64::MAX, f64::min);
    Some(max - min)
}

// ---------------------------------------------------------------------------
// Synthetic dataset
// ---------------------------------------------------------------------------

/// Generate a fraud-like labeled dataset with mild demographic score
/// offsets, deterministic for a given seed.
///
/// Timestamps are spaced 30 minutes apart over the trailing 30 days, so the
/// daily-recall views have real calendar structure to work with.
pub fn generate_synthetic_dataset(n: usize, seed: u64) -> Vec<FairnessRecord> {
    let mut rng = StdRng::seed_from_u64(seed);
    let base = Utc::now() - Duration::days(30);
    (0..n)
        .map(|i| {
            let gender = if rng.gen_bool(0.55) { "Male" } else { "Female" };
            let region = REGIONS[rng.gen_range(0..REGIONS.len())];
            let age_group = AGE_GROUPS[rng.gen_range(0..AGE_GROUPS.len())];
            let actual_label = u8::from(rng.gen_bool(0.35));
            let region_offset = 0.02
                * REGIONS.iter().position(|r| *r == region).unwrap_or(0) as f64;
            let gender_offset = if gender == "Female" { 0.03 } else { 0.0 };
            let model_score = (rng.r#gen::<f64>() + region_offset + gender_offset).clamp(0.0, 1.0);
            FairnessRecord {
                gender: gender.to_string(),
                age_group: age_group.to_string(),
                region: region.to_string(),
                actual_label,
                predicted_label: u8::from(model_score >= 0.5),
                model_score,
                timestamp: base + Duration::minutes(30 * i as i64),
            }
        })
        .collect()
}
