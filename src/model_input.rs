use serde::{Deserialize, Serialize};

use crate::assemble::FeatureRow;
use crate::encoding::{CATEGORICAL_COLUMNS, EncoderSet};

/// Columns known before the ball is released.
pub const REALTIME_FEATURES: [&str; 24] = [
    "nearest_defender_distance",
    "separation_x",
    "separation_y",
    "separation_angle",
    "second_nearest_defender_distance",
    "receiver_speed",
    "receiver_acceleration",
    "nearest_defender_speed",
    "nearest_defender_acceleration",
    "speed_differential",
    "acceleration_differential",
    "x",
    "y",
    "absolute_yardline_number",
    "frame_id",
    "is_red_zone",
    "down",
    "yards_to_go",
    "relative_separation",
    "separation_change",
    "separation_rolling_mean",
    "speed_rolling_mean",
    "dir",
    "o",
];

/// Columns that look past the current frame; catch model only.
pub const FUTURE_FEATURES: [&str; 3] = [
    "distance_to_ball_land",
    "frames_until_throw",
    "frame_progress",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureSet {
    /// Which receiver gets the ball.
    Target,
    /// Whether the targeted receiver catches it.
    Catch,
}

impl FeatureSet {
    /// Column order handed to estimators. Changing it breaks every stored artifact.
    pub fn columns(self) -> Vec<String> {
        let mut out: Vec<String> = REALTIME_FEATURES.iter().map(|c| c.to_string()).collect();
        if self == FeatureSet::Catch {
            out.extend(FUTURE_FEATURES.iter().map(|c| c.to_string()));
        }
        out.extend(CATEGORICAL_COLUMNS.iter().map(|c| encoded_name(c)));
        out
    }
}

pub fn encoded_name(column: &str) -> String {
    format!("{column}_encoded")
}

/// Receiver identity for one matrix row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RowKey {
    pub game_id: i64,
    pub play_id: i64,
    pub nfl_id: i64,
    pub frame_id: u32,
}

impl RowKey {
    pub fn of(row: &FeatureRow) -> Self {
        let t = &row.tracking;
        Self {
            game_id: t.game_id,
            play_id: t.play_id,
            nfl_id: t.nfl_id,
            frame_id: t.frame_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    pub columns: Vec<String>,
    pub keys: Vec<RowKey>,
    pub values: Vec<Vec<f64>>,
}

impl FeatureMatrix {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn column(&self, name: &str) -> Option<Vec<f64>> {
        let idx = self.columns.iter().position(|c| c == name)?;
        Some(self.values.iter().map(|row| row[idx]).collect())
    }
}

/// Receiver rows as a dense matrix in `set` column order. Missing numeric
/// values are filled with the column median over this batch, or 0.0 when the
/// column has no values at all. Encoded categoricals are never missing.
pub fn prepare_matrix(rows: &[FeatureRow], set: FeatureSet, encoders: &EncoderSet) -> FeatureMatrix {
    let columns = set.columns();
    let receivers: Vec<&FeatureRow> = rows.iter().filter(|r| r.role.is_receiver()).collect();

    let mut raw: Vec<Vec<Option<f64>>> = receivers
        .iter()
        .map(|row| {
            columns
                .iter()
                .map(|col| match col.strip_suffix("_encoded") {
                    Some(base) if CATEGORICAL_COLUMNS.contains(&base) => {
                        Some(encoders.encode(base, row))
                    }
                    _ => row.value(col),
                })
                .collect()
        })
        .collect();

    for col in 0..columns.len() {
        let mut present: Vec<f64> = raw.iter().filter_map(|r| r[col]).collect();
        if present.len() == raw.len() {
            continue;
        }
        let fill = median(&mut present).unwrap_or(0.0);
        for r in raw.iter_mut() {
            if r[col].is_none() {
                r[col] = Some(fill);
            }
        }
    }

    FeatureMatrix {
        columns,
        keys: receivers.iter().map(|r| RowKey::of(r)).collect(),
        values: raw
            .into_iter()
            .map(|r| r.into_iter().map(|v| v.unwrap_or(0.0)).collect())
            .collect(),
    }
}

pub fn median(values: &mut [f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(|a, b| a.total_cmp(b));
    let n = values.len();
    Some(if n % 2 == 1 {
        values[n / 2]
    } else {
        (values[n / 2 - 1] + values[n / 2]) / 2.0
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainingLabel {
    pub key: RowKey,
    pub is_targeted: bool,
    /// Only defined for targeted receivers.
    pub catch_outcome: Option<bool>,
}

/// Labels for every receiver row, in the same order `prepare_matrix` emits.
pub fn training_labels(rows: &[FeatureRow]) -> Vec<TrainingLabel> {
    rows.iter()
        .filter(|r| r.role.is_receiver())
        .map(|r| {
            let is_targeted = r.tracking.player_to_predict == Some(true);
            let catch_outcome = is_targeted.then(|| r.tracking.pass_result.as_deref() == Some("C"));
            TrainingLabel {
                key: RowKey::of(r),
                is_targeted,
                catch_outcome,
            }
        })
        .collect()
}
