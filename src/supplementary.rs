use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::partition::PlayKey;
use crate::tracking::TrackingTable;

/// Play-level columns from the supplementary play table.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SupplementaryPlay {
    pub game_id: i64,
    pub play_id: i64,
    #[serde(default)]
    pub pass_result: Option<String>,
    #[serde(default)]
    pub team_coverage_type: Option<String>,
    #[serde(default)]
    pub offense_formation: Option<String>,
    #[serde(default)]
    pub down: Option<f64>,
    #[serde(default)]
    pub yards_to_go: Option<f64>,
    #[serde(default)]
    pub yardline_number: Option<f64>,
}

impl SupplementaryPlay {
    pub fn key(&self) -> PlayKey {
        PlayKey {
            game_id: self.game_id,
            play_id: self.play_id,
        }
    }
}

pub fn load_supplementary_csv(path: &Path) -> Result<HashMap<PlayKey, SupplementaryPlay>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("open supplementary csv {}", path.display()))?;

    let mut out = HashMap::new();
    for (idx, record) in reader.deserialize::<SupplementaryPlay>().enumerate() {
        let play = record.with_context(|| format!("{} line {}", path.display(), idx + 2))?;
        out.insert(play.key(), play);
    }
    tracing::debug!(plays = out.len(), "loaded supplementary plays");
    Ok(out)
}

/// Left join on (game_id, play_id). Present supplementary values overwrite the
/// row's; absent ones leave it alone. Returns how many rows found a play.
pub fn merge_supplementary(
    table: &mut TrackingTable,
    plays: &HashMap<PlayKey, SupplementaryPlay>,
) -> usize {
    let mut matched = 0usize;
    for row in &mut table.rows {
        let key = PlayKey {
            game_id: row.game_id,
            play_id: row.play_id,
        };
        let Some(play) = plays.get(&key) else {
            continue;
        };
        matched += 1;
        overwrite(&mut row.pass_result, &play.pass_result);
        overwrite(&mut row.team_coverage_type, &play.team_coverage_type);
        overwrite(&mut row.offense_formation, &play.offense_formation);
        overwrite(&mut row.down, &play.down);
        overwrite(&mut row.yards_to_go, &play.yards_to_go);
        overwrite(&mut row.yardline_number, &play.yardline_number);
    }

    for column in [
        "pass_result",
        "team_coverage_type",
        "offense_formation",
        "down",
        "yards_to_go",
        "yardline_number",
    ] {
        if !table.columns.iter().any(|c| c == column) {
            table.columns.push(column.to_string());
        }
    }
    matched
}

fn overwrite<T: Clone>(slot: &mut Option<T>, value: &Option<T>) {
    if let Some(v) = value {
        *slot = Some(v.clone());
    }
}
