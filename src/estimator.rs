use std::collections::HashMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::assemble::FeatureRow;
use crate::encoding::EncoderSet;
use crate::model_input::{FeatureSet, RowKey, prepare_matrix};

/// A pre-trained model mapping an ordered feature vector to a probability.
pub trait ProbabilityEstimator: Send + Sync {
    fn feature_set(&self) -> FeatureSet;

    fn feature_names(&self) -> &[String];

    fn encoders(&self) -> &EncoderSet;

    /// Probability in [0, 1].
    fn predict(&self, features: &[f64]) -> f64;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticArtifact {
    pub feature_set: FeatureSet,
    pub feature_names: Vec<String>,
    #[serde(default)]
    pub feature_means: Vec<f64>,
    #[serde(default)]
    pub feature_stds: Vec<f64>,
    pub coeffs: Vec<f64>,
    #[serde(default)]
    pub intercept: f64,
    #[serde(default)]
    pub encoders: EncoderSet,
    #[serde(default)]
    pub generated_at: Option<String>,
}

/// Standardized logistic regression over a fixed feature order.
#[derive(Debug, Clone)]
pub struct LogisticEstimator {
    artifact: LogisticArtifact,
}

impl LogisticEstimator {
    /// Rejects artifacts whose feature order is not the set's current order.
    pub fn from_artifact(artifact: LogisticArtifact) -> Result<Self> {
        let expected = artifact.feature_set.columns();
        if artifact.feature_names != expected {
            return Err(anyhow!(
                "{:?} model feature order does not match ({} stored, {} expected)",
                artifact.feature_set,
                artifact.feature_names.len(),
                expected.len()
            ));
        }
        let n = expected.len();
        if artifact.coeffs.len() != n {
            return Err(anyhow!(
                "model has {} coefficients for {n} features",
                artifact.coeffs.len()
            ));
        }
        for (name, len) in [
            ("feature_means", artifact.feature_means.len()),
            ("feature_stds", artifact.feature_stds.len()),
        ] {
            if len != 0 && len != n {
                return Err(anyhow!("model has {len} {name} for {n} features"));
            }
        }
        Ok(Self { artifact })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
        let artifact: LogisticArtifact = serde_json::from_str(&raw)
            .with_context(|| format!("parse model artifact {}", path.display()))?;
        Self::from_artifact(artifact).with_context(|| format!("validate {}", path.display()))
    }

    pub fn artifact(&self) -> &LogisticArtifact {
        &self.artifact
    }
}

impl ProbabilityEstimator for LogisticEstimator {
    fn feature_set(&self) -> FeatureSet {
        self.artifact.feature_set
    }

    fn feature_names(&self) -> &[String] {
        &self.artifact.feature_names
    }

    fn encoders(&self) -> &EncoderSet {
        &self.artifact.encoders
    }

    fn predict(&self, features: &[f64]) -> f64 {
        let a = &self.artifact;
        let mut z = a.intercept;
        for (i, (x, w)) in features.iter().zip(&a.coeffs).enumerate() {
            let mean = a.feature_means.get(i).copied().unwrap_or(0.0);
            let std = a.feature_stds.get(i).copied().unwrap_or(1.0);
            let std = if std.abs() < 1e-9 { 1.0 } else { std };
            z += w * ((x - mean) / std);
        }
        sigmoid(z).clamp(0.0, 1.0)
    }
}

fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RowProbabilities {
    pub key: RowKey,
    pub target_probability: f64,
    pub catch_probability: f64,
}

/// Scores every row in order. Receivers get both model outputs; every other
/// row reports 0.0 for both.
pub fn score_rows(
    rows: &[FeatureRow],
    target: &dyn ProbabilityEstimator,
    catch: &dyn ProbabilityEstimator,
) -> Vec<RowProbabilities> {
    let target_probs = predict_receivers(rows, target);
    let catch_probs = predict_receivers(rows, catch);

    rows.iter()
        .map(|row| {
            let key = RowKey::of(row);
            RowProbabilities {
                key,
                target_probability: target_probs.get(&key).copied().unwrap_or(0.0),
                catch_probability: catch_probs.get(&key).copied().unwrap_or(0.0),
            }
        })
        .collect()
}

fn predict_receivers(
    rows: &[FeatureRow],
    estimator: &dyn ProbabilityEstimator,
) -> HashMap<RowKey, f64> {
    let matrix = prepare_matrix(rows, estimator.feature_set(), estimator.encoders());
    matrix
        .keys
        .iter()
        .zip(&matrix.values)
        .map(|(key, features)| (*key, estimator.predict(features)))
        .collect()
}
