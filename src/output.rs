use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

use crate::assemble::{DERIVED_COLUMNS, FeatureRow};
use crate::estimator::RowProbabilities;
use crate::tracking::{OPTIONAL_COLUMNS, REQUIRED_COLUMNS, TrackingRow};

pub fn feature_header() -> Vec<&'static str> {
    REQUIRED_COLUMNS
        .iter()
        .chain(OPTIONAL_COLUMNS.iter())
        .chain(DERIVED_COLUMNS.iter())
        .copied()
        .collect()
}

/// Writes the enriched table. Written to a sibling temp file first and renamed
/// into place, so readers never see a partial table.
pub fn write_features_csv(path: &Path, rows: &[FeatureRow]) -> Result<()> {
    write_atomically(path, |writer| {
        writer.write_record(feature_header())?;
        for row in rows {
            writer.write_record(feature_record(row))?;
        }
        Ok(())
    })
}

pub fn write_probabilities_csv(path: &Path, rows: &[RowProbabilities]) -> Result<()> {
    write_atomically(path, |writer| {
        writer.write_record([
            "game_id",
            "play_id",
            "nfl_id",
            "frame_id",
            "target_probability",
            "catch_probability",
        ])?;
        for p in rows {
            writer.write_record([
                p.key.game_id.to_string(),
                p.key.play_id.to_string(),
                p.key.nfl_id.to_string(),
                p.key.frame_id.to_string(),
                p.target_probability.to_string(),
                p.catch_probability.to_string(),
            ])?;
        }
        Ok(())
    })
}

pub fn feature_record(row: &FeatureRow) -> Vec<String> {
    let mut out = base_record(&row.tracking);
    let f = &row.features;
    out.extend([
        num(f.nearest_defender_distance),
        f.nearest_defender_id.map(|v| v.to_string()).unwrap_or_default(),
        num(f.nearest_defender_x),
        num(f.nearest_defender_y),
        num(f.separation_x),
        num(f.separation_y),
        num(f.separation_angle),
        num(f.second_nearest_defender_distance),
        num(f.receiver_speed),
        num(f.receiver_acceleration),
        num(f.nearest_defender_speed),
        num(f.nearest_defender_acceleration),
        num(f.separation_change),
        num(f.separation_rolling_mean),
        num(f.speed_rolling_mean),
        f.frames_until_throw.map(|v| v.to_string()).unwrap_or_default(),
        num(f.frame_progress),
        num(f.distance_to_ball_land),
        num(f.speed_differential),
        num(f.acceleration_differential),
        f.is_red_zone
            .map(|v| if v { "1" } else { "0" }.to_string())
            .unwrap_or_default(),
        num(f.relative_separation),
    ]);
    out
}

fn base_record(t: &TrackingRow) -> Vec<String> {
    vec![
        t.game_id.to_string(),
        t.play_id.to_string(),
        t.nfl_id.to_string(),
        t.frame_id.to_string(),
        measure(t.x),
        measure(t.y),
        measure(t.s),
        measure(t.a),
        num(t.dir),
        num(t.o),
        t.player_side.clone(),
        t.player_position.clone(),
        t.player_role.clone(),
        measure(t.ball_land_x),
        measure(t.ball_land_y),
        measure(t.absolute_yardline_number),
        t.play_direction.clone(),
        t.player_name.clone().unwrap_or_default(),
        t.player_to_predict
            .map(|v| if v { "True" } else { "False" }.to_string())
            .unwrap_or_default(),
        t.num_frames_output.map(|v| v.to_string()).unwrap_or_default(),
        num(t.down),
        num(t.yards_to_go),
        num(t.yardline_number),
        t.pass_result.clone().unwrap_or_default(),
        t.team_coverage_type.clone().unwrap_or_default(),
        t.offense_formation.clone().unwrap_or_default(),
    ]
}

pub(crate) fn write_atomically(
    path: &Path,
    body: impl FnOnce(&mut csv::Writer<fs::File>) -> csv::Result<()>,
) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
    }
    let tmp = path.with_extension("csv.tmp");
    let mut writer =
        csv::Writer::from_path(&tmp).with_context(|| format!("create {}", tmp.display()))?;
    body(&mut writer).with_context(|| format!("write {}", tmp.display()))?;
    writer
        .flush()
        .with_context(|| format!("flush {}", tmp.display()))?;
    drop(writer);
    fs::rename(&tmp, path).with_context(|| format!("swap {}", path.display()))?;
    Ok(())
}

fn measure(v: f64) -> String {
    num(v.is_finite().then_some(v))
}

// Display for f64 is the shortest string that parses back to the same value.
fn num(v: Option<f64>) -> String {
    v.map(|v| v.to_string()).unwrap_or_default()
}
