use std::collections::BTreeMap;

use crate::nearest::SeparationRecord;
use crate::partition::PlayArena;
use crate::roles::Role;

pub const DEFAULT_ROLLING_WINDOW: usize = 3;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TemporalFeatureRecord {
    pub separation_change: Option<f64>,
    pub separation_rolling_mean: Option<f64>,
    pub speed_rolling_mean: Option<f64>,
}

/// First difference along the series. The first element, and any element whose
/// value or predecessor is missing, is `None`.
pub fn diff(values: &[Option<f64>]) -> Vec<Option<f64>> {
    let mut out = Vec::with_capacity(values.len());
    let mut prev: Option<Option<f64>> = None;
    for v in values {
        let change = match (prev, v) {
            (Some(Some(p)), Some(c)) => Some(c - p),
            _ => None,
        };
        out.push(change);
        prev = Some(*v);
    }
    out
}

/// Trailing mean over the last `window` positions, skipping missing values and
/// requiring at least one present value.
pub fn rolling_mean(values: &[Option<f64>], window: usize) -> Vec<Option<f64>> {
    let window = window.max(1);
    (0..values.len())
        .map(|i| {
            let start = (i + 1).saturating_sub(window);
            let mut sum = 0.0_f64;
            let mut n = 0usize;
            for v in values[start..=i].iter().flatten() {
                sum += v;
                n += 1;
            }
            if n > 0 { Some(sum / n as f64) } else { None }
        })
        .collect()
}

/// Temporal features for every receiver row of the play, index-aligned with
/// `arena.rows`. Each player's window only ever sees that player's own frames
/// in this play.
pub fn derive_play(
    arena: &PlayArena,
    roles: &[Role],
    separation: &[Option<SeparationRecord>],
    window: usize,
) -> Vec<Option<TemporalFeatureRecord>> {
    let mut out = vec![None; arena.rows.len()];

    // Arena rows are frame-ordered, so each group's indices are too.
    let mut groups: BTreeMap<i64, Vec<usize>> = BTreeMap::new();
    for (idx, (row, role)) in arena.rows.iter().zip(roles).enumerate() {
        if role.is_receiver() {
            groups.entry(row.nfl_id).or_default().push(idx);
        }
    }

    for indices in groups.values() {
        let distances: Vec<Option<f64>> = indices
            .iter()
            .map(|i| separation[*i].map(|s| s.nearest.distance))
            .collect();
        let speeds: Vec<Option<f64>> = indices
            .iter()
            .map(|i| separation[*i].map(|s| s.receiver_speed).filter(|v| v.is_finite()))
            .collect();

        let changes = diff(&distances);
        let sep_means = rolling_mean(&distances, window);
        let speed_means = rolling_mean(&speeds, window);

        for (k, idx) in indices.iter().enumerate() {
            out[*idx] = Some(TemporalFeatureRecord {
                separation_change: changes[k],
                separation_rolling_mean: sep_means[k],
                speed_rolling_mean: speed_means[k],
            });
        }
    }

    out
}
