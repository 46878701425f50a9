use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use parquet::file::reader::{FileReader, SerializedFileReader};
use parquet::record::{Row, RowAccessor};
use serde::{Deserialize, Deserializer};

use crate::error::EngineError;

pub const REQUIRED_COLUMNS: [&str; 17] = [
    "game_id",
    "play_id",
    "nfl_id",
    "frame_id",
    "x",
    "y",
    "s",
    "a",
    "dir",
    "o",
    "player_side",
    "player_position",
    "player_role",
    "ball_land_x",
    "ball_land_y",
    "absolute_yardline_number",
    "play_direction",
];

pub const OPTIONAL_COLUMNS: [&str; 9] = [
    "player_name",
    "player_to_predict",
    "num_frames_output",
    "down",
    "yards_to_go",
    "yardline_number",
    "pass_result",
    "team_coverage_type",
    "offense_formation",
];

/// One player at one 0.1s frame of one play. Missing measurements load as
/// NaN and come out of the engine as null features.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TrackingRow {
    pub game_id: i64,
    pub play_id: i64,
    pub nfl_id: i64,
    pub frame_id: u32,
    #[serde(deserialize_with = "lenient_measure")]
    pub x: f64,
    #[serde(deserialize_with = "lenient_measure")]
    pub y: f64,
    #[serde(deserialize_with = "lenient_measure")]
    pub s: f64,
    #[serde(deserialize_with = "lenient_measure")]
    pub a: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub dir: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub o: Option<f64>,
    pub player_side: String,
    pub player_position: String,
    pub player_role: String,
    #[serde(deserialize_with = "lenient_measure")]
    pub ball_land_x: f64,
    #[serde(deserialize_with = "lenient_measure")]
    pub ball_land_y: f64,
    #[serde(deserialize_with = "lenient_measure")]
    pub absolute_yardline_number: f64,
    pub play_direction: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub player_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_flag")]
    pub player_to_predict: Option<bool>,
    #[serde(default, deserialize_with = "lenient_count")]
    pub num_frames_output: Option<u32>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub down: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub yards_to_go: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub yardline_number: Option<f64>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub pass_result: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub team_coverage_type: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub offense_formation: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct TrackingTable {
    pub columns: Vec<String>,
    pub rows: Vec<TrackingRow>,
}

impl TrackingTable {
    /// Builds a table whose column set is the full known schema.
    pub fn from_rows(rows: Vec<TrackingRow>) -> Self {
        let columns = REQUIRED_COLUMNS
            .iter()
            .chain(OPTIONAL_COLUMNS.iter())
            .map(|c| c.to_string())
            .collect();
        Self { columns, rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Appends another table. The resulting column set is the intersection, so a
    /// file lacking a required column keeps the combined table failing validation.
    pub fn append(&mut self, other: TrackingTable) {
        if self.columns.is_empty() && self.rows.is_empty() {
            *self = other;
            return;
        }
        self.columns.retain(|c| other.columns.contains(c));
        self.rows.extend(other.rows);
    }
}

pub fn validate_schema<S: AsRef<str>>(columns: &[S]) -> Result<(), EngineError> {
    let missing: Vec<String> = REQUIRED_COLUMNS
        .iter()
        .filter(|req| !columns.iter().any(|c| c.as_ref().trim() == **req))
        .map(|req| req.to_string())
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(EngineError::SchemaMismatch { missing })
    }
}

pub fn load_tracking_csv(path: &Path) -> Result<TrackingTable> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .with_context(|| format!("open tracking csv {}", path.display()))?;

    let columns: Vec<String> = reader
        .headers()
        .with_context(|| format!("read headers of {}", path.display()))?
        .iter()
        .map(|h| h.to_string())
        .collect();
    validate_schema(&columns)?;

    let mut rows = Vec::new();
    for (idx, record) in reader.deserialize::<TrackingRow>().enumerate() {
        // +2: one for the header line, one for 1-based numbering.
        let row = record.with_context(|| format!("{} line {}", path.display(), idx + 2))?;
        rows.push(row);
    }

    tracing::debug!(path = %path.display(), rows = rows.len(), "loaded tracking csv");
    Ok(TrackingTable { columns, rows })
}

/// Loads every `<prefix>*.csv` file in `dir`, in file-name order.
pub fn load_tracking_dir(dir: &Path, prefix: &str) -> Result<TrackingTable> {
    let files = matching_files(dir, prefix, "csv")?;
    if files.is_empty() {
        return Err(anyhow!(
            "no {prefix}*.csv files found in {}",
            dir.display()
        ));
    }

    let mut table = TrackingTable::default();
    for (idx, file) in files.iter().enumerate() {
        tracing::info!(
            file = %file.display(),
            "loading tracking file {}/{}",
            idx + 1,
            files.len()
        );
        table.append(load_tracking_csv(file)?);
    }
    Ok(table)
}

pub fn load_tracking_parquet(path: &Path) -> Result<TrackingTable> {
    let file = fs::File::open(path).with_context(|| format!("open {}", path.display()))?;
    let reader = SerializedFileReader::new(file).context("open parquet reader tracking")?;

    let columns: Vec<String> = reader
        .metadata()
        .file_metadata()
        .schema_descr()
        .columns()
        .iter()
        .map(|c| c.name().to_string())
        .collect();
    validate_schema(&columns)?;
    let index: HashMap<&str, usize> = columns
        .iter()
        .enumerate()
        .map(|(i, name)| (name.as_str(), i))
        .collect();

    let iter = reader.get_row_iter(None).context("iterate tracking rows")?;
    let mut rows = Vec::new();
    for (n, row) in iter.enumerate() {
        let row = row.with_context(|| format!("read parquet row {n}"))?;
        rows.push(row_from_parquet(&row, &index).with_context(|| format!("parquet row {n}"))?);
    }

    Ok(TrackingTable { columns, rows })
}

fn row_from_parquet(row: &Row, index: &HashMap<&str, usize>) -> Result<TrackingRow> {
    let num = |name: &str| {
        pq_num(row, index.get(name).copied()).ok_or_else(|| anyhow!("column {name} is null"))
    };
    let text = |name: &str| {
        pq_str(row, index.get(name).copied()).ok_or_else(|| anyhow!("column {name} is null"))
    };
    let opt_num = |name: &str| pq_num(row, index.get(name).copied());
    let measure = |name: &str| opt_num(name).unwrap_or(f64::NAN);
    let opt_text = |name: &str| pq_str(row, index.get(name).copied());

    let frame_id = num("frame_id")?;
    if frame_id < 0.0 {
        return Err(anyhow!("negative frame_id {frame_id}"));
    }

    Ok(TrackingRow {
        game_id: num("game_id")? as i64,
        play_id: num("play_id")? as i64,
        nfl_id: num("nfl_id")? as i64,
        frame_id: frame_id as u32,
        x: measure("x"),
        y: measure("y"),
        s: measure("s"),
        a: measure("a"),
        dir: opt_num("dir"),
        o: opt_num("o"),
        player_side: text("player_side")?,
        player_position: text("player_position")?,
        player_role: text("player_role")?,
        ball_land_x: measure("ball_land_x"),
        ball_land_y: measure("ball_land_y"),
        absolute_yardline_number: measure("absolute_yardline_number"),
        play_direction: text("play_direction")?,
        player_name: opt_text("player_name"),
        player_to_predict: index
            .get("player_to_predict")
            .and_then(|idx| row.get_bool(*idx).ok())
            .or_else(|| opt_text("player_to_predict").and_then(|s| parse_flag(&s))),
        num_frames_output: opt_num("num_frames_output")
            .filter(|v| *v >= 0.0)
            .map(|v| v as u32),
        down: opt_num("down"),
        yards_to_go: opt_num("yards_to_go"),
        yardline_number: opt_num("yardline_number"),
        pass_result: opt_text("pass_result"),
        team_coverage_type: opt_text("team_coverage_type"),
        offense_formation: opt_text("offense_formation"),
    })
}

fn pq_num(row: &Row, idx: Option<usize>) -> Option<f64> {
    let idx = idx?;
    if let Ok(v) = row.get_double(idx) {
        return Some(v);
    }
    if let Ok(v) = row.get_float(idx) {
        return Some(v as f64);
    }
    if let Ok(v) = row.get_long(idx) {
        return Some(v as f64);
    }
    if let Ok(v) = row.get_int(idx) {
        return Some(v as f64);
    }
    None
}

fn pq_str(row: &Row, idx: Option<usize>) -> Option<String> {
    let idx = idx?;
    let raw = row.get_string(idx).ok()?;
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

pub(crate) fn matching_files(dir: &Path, prefix: &str, ext: &str) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(dir).with_context(|| format!("read dir {}", dir.display()))?;
    let mut files = Vec::new();
    for entry in entries {
        let path = entry.with_context(|| format!("list {}", dir.display()))?.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if name.starts_with(prefix) && path.extension().is_some_and(|e| e == ext) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

pub(crate) fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "1.0" | "t" | "yes" => Some(true),
        "false" | "0" | "0.0" | "f" | "no" => Some(false),
        _ => None,
    }
}

fn is_null_token(raw: &str) -> bool {
    matches!(raw, "" | "nan" | "NaN" | "NA" | "null" | "None")
}

fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    let Some(raw) = raw else {
        return Ok(None);
    };
    let trimmed = raw.trim();
    if is_null_token(trimmed) {
        return Ok(None);
    }
    trimmed
        .parse::<f64>()
        .map(Some)
        .map_err(|_| serde::de::Error::custom(format!("invalid number: {trimmed:?}")))
}

fn lenient_measure<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient_f64(deserializer)?.unwrap_or(f64::NAN))
}

// Integer columns holding nulls are often exported as floats ("21.0").
fn lenient_count<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = lenient_f64(deserializer)?;
    Ok(value.filter(|v| *v >= 0.0).map(|v| v as u32))
}

fn lenient_flag<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.as_deref().and_then(parse_flag))
}

fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw
        .map(|s| s.trim().to_string())
        .filter(|s| !is_null_token(s)))
}
