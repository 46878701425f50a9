use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use chrono::Utc;
use clap::Parser;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use nfl_separation::engine::{EngineConfig, FeatureEngine, RunReport, SeparationSummary};
use nfl_separation::output::write_features_csv;
use nfl_separation::supplementary::{load_supplementary_csv, merge_supplementary};
use nfl_separation::tracking::{TrackingTable, load_tracking_dir, load_tracking_parquet};

#[derive(Parser)]
#[command(name = "compute_features")]
#[command(about = "Derive receiver separation features from tracking data", long_about = None)]
struct Cli {
    /// Directory holding the weekly tracking CSVs
    #[arg(long, default_value = "train")]
    input_dir: PathBuf,

    /// File-name prefix of the tracking CSVs
    #[arg(long, default_value = "input_2023_w")]
    prefix: String,

    /// Read a single Parquet tracking file instead of the CSV directory
    #[arg(long)]
    parquet: Option<PathBuf>,

    /// Supplementary play table (down, distance, coverage, pass result)
    #[arg(long)]
    supplementary: Option<PathBuf>,

    /// Enriched output table
    #[arg(long, default_value = "train/input_with_separation.csv")]
    out: PathBuf,

    /// Optional JSON run summary
    #[arg(long)]
    summary: Option<PathBuf>,

    /// Worker threads; overrides FEATURE_PARALLELISM
    #[arg(long)]
    threads: Option<usize>,
}

#[derive(Debug, Serialize)]
struct RunSummary {
    generated_at: String,
    output: String,
    report: RunReport,
    separation: Option<SeparationSummary>,
}

fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    let mut table: TrackingTable = match &cli.parquet {
        Some(path) => load_tracking_parquet(path)?,
        None => load_tracking_dir(&cli.input_dir, &cli.prefix)?,
    };
    if table.is_empty() {
        return Err(anyhow!("tracking input has no rows"));
    }

    if let Some(path) = &cli.supplementary {
        let plays = load_supplementary_csv(path)?;
        let matched = merge_supplementary(&mut table, &plays);
        tracing::info!(
            plays = plays.len(),
            matched_rows = matched,
            "merged supplementary play context"
        );
    }

    let mut config = EngineConfig::from_env();
    if let Some(threads) = cli.threads {
        config.parallelism = threads.clamp(1, 64);
    }
    let output = FeatureEngine::new(config).run(table)?;

    write_features_csv(&cli.out, &output.rows)?;
    let separation = SeparationSummary::from_rows(&output.rows);

    let report = &output.report;
    println!("Separation features");
    println!("Output: {}", cli.out.display());
    println!(
        "rows={} plays={} receiver_rows={} with_separation={} issues={}",
        report.rows,
        report.plays,
        report.receiver_rows,
        report.receiver_rows_with_separation,
        report.issues.len()
    );
    if let Some(s) = &separation {
        println!(
            "separation (yards) n={} mean={:.2} median={:.2} min={:.2} max={:.2} std={:.2}",
            s.count, s.mean, s.median, s.min, s.max, s.std
        );
    }

    if let Some(path) = &cli.summary {
        let summary = RunSummary {
            generated_at: Utc::now().to_rfc3339(),
            output: cli.out.display().to_string(),
            report: output.report.clone(),
            separation,
        };
        let json = serde_json::to_string_pretty(&summary).context("serialize run summary")?;
        fs::write(path, json).with_context(|| format!("write {}", path.display()))?;
    }

    Ok(())
}
