use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use nfl_separation::engine::{EngineConfig, FeatureEngine};
use nfl_separation::estimator::{LogisticEstimator, ProbabilityEstimator, score_rows};
use nfl_separation::model_input::FeatureSet;
use nfl_separation::output::write_probabilities_csv;
use nfl_separation::supplementary::{load_supplementary_csv, merge_supplementary};
use nfl_separation::tracking::load_tracking_csv;

#[derive(Parser)]
#[command(name = "score_plays")]
#[command(about = "Attach target and catch probabilities to receiver frames", long_about = None)]
struct Cli {
    /// Tracking or enriched table; features are re-derived from its base columns
    #[arg(long, default_value = "train/input_with_separation.csv")]
    features: PathBuf,

    /// Supplementary play table
    #[arg(long)]
    supplementary: Option<PathBuf>,

    /// Target-receiver model artifact (JSON)
    #[arg(long, default_value = "models/target_prediction_model.json")]
    target_model: PathBuf,

    /// Catch-probability model artifact (JSON)
    #[arg(long, default_value = "models/catch_probability_model.json")]
    catch_model: PathBuf,

    /// Output probabilities table
    #[arg(long, default_value = "train/predictions.csv")]
    out: PathBuf,
}

fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    let target = LogisticEstimator::load(&cli.target_model)?;
    let catch = LogisticEstimator::load(&cli.catch_model)?;
    tracing::info!(
        target_features = target.feature_names().len(),
        catch_features = catch.feature_names().len(),
        "loaded models"
    );
    if target.feature_set() != FeatureSet::Target || catch.feature_set() != FeatureSet::Catch {
        tracing::warn!("model feature sets are not (target, catch); scoring as given");
    }

    let mut table = load_tracking_csv(&cli.features)?;
    if let Some(path) = &cli.supplementary {
        let plays = load_supplementary_csv(path)?;
        merge_supplementary(&mut table, &plays);
    }

    let output = FeatureEngine::new(EngineConfig::from_env()).run(table)?;
    let probs = score_rows(&output.rows, &target, &catch);
    write_probabilities_csv(&cli.out, &probs)?;

    let receivers: Vec<_> = probs
        .iter()
        .zip(&output.rows)
        .filter(|(_, row)| row.role.is_receiver())
        .map(|(p, _)| *p)
        .collect();
    println!("Scored {} rows ({} receiver rows)", probs.len(), receivers.len());
    if !receivers.is_empty() {
        let n = receivers.len() as f64;
        let mean_target = receivers.iter().map(|p| p.target_probability).sum::<f64>() / n;
        let mean_catch = receivers.iter().map(|p| p.catch_probability).sum::<f64>() / n;
        println!("mean target probability={mean_target:.4} mean catch probability={mean_catch:.4}");
    }
    println!("Output: {}", cli.out.display());

    Ok(())
}
