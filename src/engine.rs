use std::env;
use std::time::Instant;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::assemble::{FeatureRow, assemble_play};
use crate::error::EngineError;
use crate::nearest::resolve_play;
use crate::partition::{PlayArena, PlayIssue, partition};
use crate::roles::Role;
use crate::temporal::{DEFAULT_ROLLING_WINDOW, derive_play};
use crate::tracking::{TrackingTable, validate_schema};

const DEFAULT_PARALLELISM: usize = 6;
const PROGRESS_EVERY: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineConfig {
    pub parallelism: usize,
    pub rolling_window: usize,
    pub red_zone_yardline: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            parallelism: DEFAULT_PARALLELISM,
            rolling_window: DEFAULT_ROLLING_WINDOW,
            red_zone_yardline: 20.0,
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let parallelism = env::var("FEATURE_PARALLELISM")
            .ok()
            .and_then(|val| val.parse::<usize>().ok())
            .unwrap_or(defaults.parallelism)
            .clamp(1, 64);
        let rolling_window = env::var("FEATURE_ROLLING_WINDOW")
            .ok()
            .and_then(|val| val.parse::<usize>().ok())
            .unwrap_or(defaults.rolling_window)
            .max(1);
        Self {
            parallelism,
            rolling_window,
            ..defaults
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunReport {
    pub plays: usize,
    pub rows: usize,
    pub receiver_rows: usize,
    pub receiver_rows_with_separation: usize,
    pub issues: Vec<PlayIssue>,
}

#[derive(Debug, Clone)]
pub struct EngineOutput {
    /// Sorted by (game_id, play_id, frame_id, nfl_id).
    pub rows: Vec<FeatureRow>,
    pub report: RunReport,
}

struct PlayOutcome {
    rows: Vec<FeatureRow>,
    issues: Vec<PlayIssue>,
}

#[derive(Debug, Clone, Copy)]
pub struct FeatureEngine {
    config: EngineConfig,
}

impl Default for FeatureEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl FeatureEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> EngineConfig {
        self.config
    }

    /// Validates the schema, partitions by play, derives every play in
    /// parallel, then concatenates and sorts canonically.
    pub fn run(&self, table: TrackingTable) -> Result<EngineOutput, EngineError> {
        validate_schema(&table.columns)?;

        let started = Instant::now();
        let total_rows = table.rows.len();
        let arenas = partition(table.rows);
        let plays = arenas.len();
        info!(rows = total_rows, plays, "computing separation features");

        let pool = build_pool(self.config.parallelism);
        let outcomes: Vec<PlayOutcome> = with_pool(&pool, || {
            arenas
                .into_par_iter()
                .enumerate()
                .map(|(idx, arena)| {
                    if (idx + 1) % PROGRESS_EVERY == 0 {
                        debug!("processed {}/{} plays", idx + 1, plays);
                    }
                    self.process_play(arena)
                })
                .collect()
        });

        let mut report = RunReport {
            plays,
            rows: total_rows,
            ..Default::default()
        };
        let mut rows = Vec::with_capacity(total_rows);
        for outcome in outcomes {
            report.issues.extend(outcome.issues);
            rows.extend(outcome.rows);
        }
        rows.sort_by_key(|r| r.sort_key());

        for row in rows.iter().filter(|r| r.role.is_receiver()) {
            report.receiver_rows += 1;
            if row.features.nearest_defender_distance.is_some() {
                report.receiver_rows_with_separation += 1;
            }
        }

        info!(
            rows = rows.len(),
            plays,
            receiver_rows = report.receiver_rows,
            issues = report.issues.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "separation features complete"
        );
        Ok(EngineOutput { rows, report })
    }

    /// Derives one play in isolation. Nothing here can fail; bad rows only
    /// null out their own features.
    fn process_play(&self, arena: PlayArena) -> PlayOutcome {
        let mut issues = arena.issues();

        let roles: Vec<Role> = arena.rows.iter().map(Role::of).collect();
        let separation = resolve_play(&arena, &roles);
        issues.extend(separation.skipped.into_iter().map(|kind| arena.issue(kind)));
        for issue in &issues {
            warn!(
                game_id = issue.game_id,
                play_id = issue.play_id,
                issue = ?issue.kind,
                "malformed play, continuing with available order"
            );
        }

        let temporal = derive_play(
            &arena,
            &roles,
            &separation.records,
            self.config.rolling_window,
        );
        let rows = assemble_play(
            arena,
            &roles,
            &separation.records,
            &temporal,
            self.config.red_zone_yardline,
        );

        PlayOutcome { rows, issues }
    }
}

fn build_pool(threads: usize) -> Option<rayon::ThreadPool> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads.max(1))
        .build()
        .ok()
}

fn with_pool<T>(pool: &Option<rayon::ThreadPool>, action: impl FnOnce() -> T + Send) -> T
where
    T: Send,
{
    if let Some(pool) = pool.as_ref() {
        pool.install(action)
    } else {
        action()
    }
}

/// Distribution of `nearest_defender_distance` over receiver rows that have one.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeparationSummary {
    pub count: usize,
    pub mean: f64,
    pub median: f64,
    pub min: f64,
    pub max: f64,
    pub std: f64,
}

impl SeparationSummary {
    pub fn from_rows(rows: &[FeatureRow]) -> Option<Self> {
        let mut values: Vec<f64> = rows
            .iter()
            .filter(|r| r.role.is_receiver())
            .filter_map(|r| r.features.nearest_defender_distance)
            .collect();
        if values.is_empty() {
            return None;
        }
        values.sort_by(|a, b| a.total_cmp(b));

        let n = values.len();
        let mean = values.iter().sum::<f64>() / n as f64;
        let median = if n % 2 == 1 {
            values[n / 2]
        } else {
            (values[n / 2 - 1] + values[n / 2]) / 2.0
        };
        let std = if n > 1 {
            let ss: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
            (ss / (n - 1) as f64).sqrt()
        } else {
            0.0
        };

        Some(Self {
            count: n,
            mean,
            median,
            min: values[0],
            max: values[n - 1],
            std,
        })
    }
}
