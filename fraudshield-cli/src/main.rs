//! FraudShield CLI — operator tooling for the decision-log pipeline.
//!
//! Migration, verification, metric reports, decision simulation, and
//! fairness audits over the append-only log files.

mod commands;

use clap::Parser;
use fraudshield_core::AppConfig;
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// FraudShield: decision-log analytics and fairness audits
#[derive(Parser, Debug)]
#[command(name = "fraudshield", version, about, long_about = None)]
struct Cli {
    /// Data directory holding the log files
    #[arg(short, long)]
    data_dir: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Migrate legacy CSV logs to line-delimited JSON (originals kept as .bak)
    Migrate,
    /// Show record counts and a sample of each migrated log
    Verify,
    /// Print the decision metrics summary and SHAP attribution table
    Report {
        /// Tail window of decisions to aggregate
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Append synthetic scored decisions to the log
    Simulate {
        /// Number of decisions to append
        #[arg(long, default_value_t = 25)]
        n: usize,
        /// Random seed
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Run a fairness audit over a synthetic labeled dataset
    Fairness {
        /// Dataset rows to generate
        #[arg(long)]
        rows: Option<usize>,
        /// Random seed
        #[arg(long)]
        seed: Option<u64>,
        /// Audit the mitigated dataset variant instead of the original
        #[arg(long)]
        mitigated: bool,
        /// Dimension for the bias gap comparison (gender or region)
        #[arg(long, default_value = "gender")]
        dimension: fraudshield_core::fairness::GroupKey,
        /// First group for the bias gap
        #[arg(long, default_value = "Male")]
        group_a: String,
        /// Second group for the bias gap
        #[arg(long, default_value = "Female")]
        group_b: String,
        /// Metric for the bias gap (precision, recall, f1)
        #[arg(long, default_value = "recall")]
        metric: fraudshield_core::fairness::GapMetric,
    },
}

fn main() -> anyhow::Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    // Human-readable layer for stderr (always active)
    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_filter(EnvFilter::new(filter));

    let mut config = AppConfig::load(cli.data_dir.as_deref())?;
    if let Some(data_dir) = cli.data_dir {
        config.data_dir = data_dir;
    }

    // JSON file layer for structured logging under the data dir
    let log_dir = config.data_dir.join("logs");
    let _ = std::fs::create_dir_all(&log_dir);
    let file_appender = tracing_appender::rolling::daily(&log_dir, "fraudshield.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let json_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(non_blocking)
        .with_filter(EnvFilter::new("debug"));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    match cli.command {
        Commands::Migrate => commands::migrate(&config),
        Commands::Verify => commands::verify(&config),
        Commands::Report { limit } => commands::report(&config, limit),
        Commands::Simulate { n, seed } => commands::simulate(&config, n, seed),
        Commands::Fairness {
            rows,
            seed,
            mitigated,
            dimension,
            group_a,
            group_b,
            metric,
        } => commands::fairness(
            &config,
            commands::FairnessArgs {
                rows,
                seed,
                mitigated,
                dimension,
                group_a,
                group_b,
                metric,
            },
        ),
    }
}
