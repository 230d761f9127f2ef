//! Subcommand handlers for the FraudShield CLI.

use chrono::Utc;
use fraudshield_core::fairness::{
    self, FairnessRecord, GapMetric, GroupKey, GroupMetricsRow,
};
use fraudshield_core::loader::{self, load_decisions};
use fraudshield_core::metrics::{compute_metrics, shap_aggregate};
use fraudshield_core::state::FairnessSession;
use fraudshield_core::store::AuditLog;
use fraudshield_core::migrate::migrate_all;
use fraudshield_core::{AppConfig, DecisionRecord, LogStore};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::path::Path;

/// Migrate all legacy CSV logs under the data dir.
pub fn migrate(config: &AppConfig) -> anyhow::Result<()> {
    let paths = config.log_paths();
    let report = migrate_all(&paths)?;
    println!("Migrated decisions:     {}", report.decisions);
    println!("Migrated notifications: {}", report.notifications);
    println!("Migrated replies:       {}", report.replies);

    let audit = AuditLog::new(paths.audit_jsonl.clone());
    audit.record(
        "cli",
        "migrate",
        serde_json::json!({
            "decisions": report.decisions,
            "notifications": report.notifications,
            "replies": report.replies,
        }),
    );
    Ok(())
}

/// Show record counts and the first few records of each migrated log.
pub fn verify(config: &AppConfig) -> anyhow::Result<()> {
    let paths = config.log_paths();
    show_log("Decision Logs", &[&paths.decisions_jsonl]);
    show_log(
        "Notifications",
        &[&paths.notifications_jsonl, &paths.notifications_jsonl_legacy],
    );
    show_log("Replies", &[&paths.replies_jsonl, &paths.replies_jsonl_legacy]);
    Ok(())
}

fn show_log(name: &str, candidates: &[&Path]) {
    println!("{}", "-".repeat(60));
    let Some(path) = candidates.iter().find(|p| p.exists()) else {
        println!("{name}: no file found");
        return;
    };
    let outcome = loader::load_jsonl::<serde_json::Value>(path, None);
    println!("{name}: {} records in {}", outcome.len(), path.display());
    if outcome.skipped > 0 {
        println!("  ({} unparseable lines skipped)", outcome.skipped);
    }
    for (i, record) in outcome.records.iter().take(3).enumerate() {
        println!("  [{i}] {record}");
    }
}

/// Print the metrics summary and ranked SHAP attribution table.
pub fn report(config: &AppConfig, limit: Option<usize>) -> anyhow::Result<()> {
    let paths = config.log_paths();
    let limit = limit.unwrap_or(config.decision_limit);
    let outcome = load_decisions(&paths, Some(limit));
    if outcome.skipped > 0 {
        tracing::warn!(skipped = outcome.skipped, "dropped unparseable log lines");
    }

    let summary = compute_metrics(&outcome.records);
    println!("Decision summary (last {} records)", outcome.len());
    println!("{}", serde_json::to_string_pretty(&summary)?);

    let table = shap_aggregate(&outcome.records, config.shap_limit);
    if table.is_empty() {
        println!("\nNo SHAP attributions recorded yet.");
    } else {
        println!("\nMean |SHAP| by feature index:");
        for row in &table {
            println!("  feature {:>2}  {:.4}", row.feature_index, row.mean_abs);
        }
    }
    Ok(())
}

/// Append synthetic scored decisions, then print refreshed metrics.
///
/// Mirrors the scoring workflow's log shape with a deterministic heuristic
/// in place of the trained classifier.
pub fn simulate(config: &AppConfig, n: usize, seed: Option<u64>) -> anyhow::Result<()> {
    let seed = seed.unwrap_or(config.seed);
    let paths = config.log_paths();
    let store = LogStore::new(paths.clone());
    let mut rng = StdRng::seed_from_u64(seed);

    for i in 0..n {
        let record = synthetic_decision(&mut rng, seed, i);
        store.append_decision(&record)?;
    }

    let audit = AuditLog::new(paths.audit_jsonl.clone());
    audit.record("cli", "simulate", serde_json::json!({ "n": n, "seed": seed }));

    let outcome = load_decisions(&paths, Some(config.decision_limit));
    let summary = compute_metrics(&outcome.records);
    println!("Appended {n} simulated decisions.");
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

/// Score one synthetic transaction with the rule-based heuristic.
fn synthetic_decision(rng: &mut StdRng, seed: u64, i: usize) -> DecisionRecord {
    // Irwin-Hall approximation of a standard normal.
    let z: f64 = (0..12).map(|_| rng.r#gen::<f64>()).sum::<f64>() - 6.0;
    let amount = (7.0 + 1.4 * z).exp();
    let location_change = f64::from(rng.gen_bool(0.5));
    let time_diff: f64 = -10.0 * (rng.r#gen::<f64>().ln() + rng.r#gen::<f64>().ln());
    let device_change = f64::from(rng.gen_bool(0.5));

    // Signed contributions around a low base rate, standing in for the
    // model's attribution vector.
    let amount_contrib = if amount > 1500.0 { 0.35 } else { -0.08 };
    let location_contrib = if location_change == 1.0 { 0.22 } else { -0.05 };
    let time_contrib = if time_diff < 5.0 { 0.18 } else { -0.04 };
    let device_contrib = if device_change == 1.0 { 0.06 } else { -0.02 };
    let noise = 0.04 * (rng.r#gen::<f64>() - 0.5);
    let probability = (0.1 + amount_contrib + location_contrib + time_contrib + device_contrib
        + noise)
        .clamp(0.0, 1.0);

    DecisionRecord {
        timestamp: Utc::now().format("%Y-%m-%d %H:%M:%S").to_string(),
        transaction_id: Some(format!("SIM-{seed}-{i}")),
        prediction: Some(i64::from(probability >= 0.5)),
        probability: Some(probability),
        shap_values: Some(vec![
            amount_contrib,
            location_contrib,
            time_contrib,
            device_contrib,
        ]),
        inputs: Some(vec![amount, location_change, time_diff, device_change]),
    }
}

pub struct FairnessArgs {
    pub rows: Option<usize>,
    pub seed: Option<u64>,
    pub mitigated: bool,
    pub dimension: GroupKey,
    pub group_a: String,
    pub group_b: String,
    pub metric: GapMetric,
}

/// Run the fairness audit: group metrics, prediction rates, the requested
/// bias gap, and the recommendations panel.
pub fn fairness(config: &AppConfig, args: FairnessArgs) -> anyhow::Result<()> {
    let rows = args.rows.unwrap_or(config.synthetic_rows);
    let seed = args.seed.unwrap_or(config.seed);
    let mut rng = StdRng::seed_from_u64(seed);

    let mut session = FairnessSession::new(fairness::generate_synthetic_dataset(rows, seed));
    session.set_use_mitigated(args.mitigated);
    let dataset: Vec<FairnessRecord> = session.active(&mut rng).to_vec();
    println!(
        "Dataset: {} rows ({})",
        dataset.len(),
        if args.mitigated { "after mitigation" } else { "before mitigation" }
    );

    let by_gender = fairness::group_metrics(&dataset, GroupKey::Gender);
    let by_region = fairness::group_metrics(&dataset, GroupKey::Region);
    print_metrics_table("Metrics by gender", &by_gender);
    print_metrics_table("Metrics by region", &by_region);

    println!("\nPrediction rate by {}:", args.dimension);
    for rate in fairness::prediction_rate_table(&dataset, args.dimension) {
        println!(
            "  {:<10} {:>5}/{:<5} {:>6.1}%",
            rate.group, rate.predicted_positive, rate.total, rate.rate_pct
        );
    }

    let trend_a = fairness::daily_recall(&dataset, args.dimension, &args.group_a);
    let trend_b = fairness::daily_recall(&dataset, args.dimension, &args.group_b);
    if !trend_a.is_empty() && !trend_b.is_empty() {
        println!(
            "\nDaily recall gap ({} - {}) over {} days:",
            args.group_a,
            args.group_b,
            trend_a.len().min(trend_b.len())
        );
        let by_date: std::collections::BTreeMap<_, _> =
            trend_b.iter().map(|d| (d.date, d.recall)).collect();
        for day in &trend_a {
            if let Some(recall_b) = by_date.get(&day.date) {
                println!("  {}  {:+.3}", day.date, day.recall - recall_b);
            }
        }
    }

    let table = fairness::group_metrics(&dataset, args.dimension);
    match fairness::bias_gap(&table, &args.group_a, &args.group_b, args.metric) {
        Some(gap) => {
            println!(
                "\n{} gap ({} - {}): {:+.3}",
                args.metric, args.group_a, args.group_b, gap.value
            );
            if gap.exceeds_threshold {
                println!(
                    "  exceeds threshold {:.2} - potential bias risk",
                    fairness::BIAS_THRESHOLD
                );
            } else {
                println!("  within acceptable threshold {:.2}", fairness::BIAS_THRESHOLD);
            }
        }
        None => println!(
            "\nGroups {} / {} not found under {}",
            args.group_a, args.group_b, args.dimension
        ),
    }

    println!("\nRecommendations:");
    for rec in fairness::recommendations(&by_gender, &by_region) {
        println!("  - {rec}");
    }
    Ok(())
}

fn print_metrics_table(title: &str, rows: &[GroupMetricsRow]) {
    println!("\n{title}:");
    println!(
        "  {:<10} {:>9} {:>10} {:>8} {:>8} {:>8}",
        "group", "accuracy", "precision", "recall", "f1", "support"
    );
    for row in rows {
        println!(
            "  {:<10} {:>9.3} {:>10.3} {:>8.3} {:>8.3} {:>8}",
            row.group, row.accuracy, row.precision, row.recall, row.f1, row.support
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_synthetic_decision_is_consistent() {
        let mut rng = StdRng::seed_from_u64(123);
        let record = synthetic_decision(&mut rng, 123, 0);
        assert_eq!(record.transaction_id.as_deref(), Some("SIM-123-0"));
        let prob = record.probability.unwrap();
        assert!((0.0..=1.0).contains(&prob));
        assert_eq!(record.prediction, Some(i64::from(prob >= 0.5)));
        assert_eq!(record.shap_values.as_ref().unwrap().len(), 4);
        assert_eq!(record.inputs.as_ref().unwrap().len(), 4);
    }

    #[test]
    fn test_simulate_then_report_round_trip() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = AppConfig {
            data_dir: dir.path().to_path_buf(),
            ..AppConfig::default()
        };
        simulate(&config, 10, Some(7)).unwrap();

        let outcome = load_decisions(&config.log_paths(), Some(50));
        assert_eq!(outcome.len(), 10);
        assert_eq!(outcome.skipped, 0);
        let summary = compute_metrics(&outcome.records);
        assert_eq!(summary.total, 10);
    }
}
