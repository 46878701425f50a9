use std::collections::BTreeMap;

use crate::partition::{IssueKind, PlayArena};
use crate::roles::Role;
use crate::separation::{SeparationVector, euclidean};
use crate::tracking::TrackingRow;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NearestDefender {
    pub nfl_id: i64,
    pub x: f64,
    pub y: f64,
    pub distance: f64,
    pub speed: f64,
    pub acceleration: f64,
}

/// Separation of one receiver at one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeparationRecord {
    pub nearest: NearestDefender,
    pub second_nearest_distance: Option<f64>,
    pub vector: SeparationVector,
    pub receiver_speed: f64,
    pub receiver_acceleration: f64,
}

/// Ranked defenders for one receiver. Indices refer to the defender slice the
/// frame was resolved against.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameMatch {
    pub nearest: usize,
    pub nearest_distance: f64,
    pub second: Option<(usize, f64)>,
}

/// Row-major receiver x defender distances for one frame.
struct DistanceMatrix {
    cols: usize,
    cells: Vec<f64>,
}

impl DistanceMatrix {
    fn new(receivers: &[(f64, f64)], defenders: &[(f64, f64)]) -> Self {
        let mut cells = Vec::with_capacity(receivers.len() * defenders.len());
        for r in receivers {
            for d in defenders {
                cells.push(euclidean(*r, *d));
            }
        }
        Self {
            cols: defenders.len(),
            cells,
        }
    }

    fn row(&self, receiver: usize) -> &[f64] {
        &self.cells[receiver * self.cols..(receiver + 1) * self.cols]
    }

    /// Defender indices by ascending distance. The sort is stable, so equal
    /// distances keep defender order.
    fn ranked(&self, receiver: usize) -> Vec<usize> {
        let row = self.row(receiver);
        let mut order: Vec<usize> = (0..self.cols).collect();
        order.sort_by(|a, b| row[*a].total_cmp(&row[*b]));
        order
    }
}

/// Nearest and second-nearest defender for every receiver in one frame.
/// Empty when either side is empty.
pub fn resolve_frame(receivers: &[(f64, f64)], defenders: &[(f64, f64)]) -> Vec<FrameMatch> {
    if receivers.is_empty() || defenders.is_empty() {
        return Vec::new();
    }
    let matrix = DistanceMatrix::new(receivers, defenders);
    (0..receivers.len())
        .map(|i| {
            let order = matrix.ranked(i);
            let row = matrix.row(i);
            FrameMatch {
                nearest: order[0],
                nearest_distance: row[order[0]],
                second: order.get(1).map(|j| (*j, row[*j])),
            }
        })
        .collect()
}

/// Separation for every receiver row of one play, index-aligned with
/// `arena.rows`.
#[derive(Debug, Clone, Default)]
pub struct PlaySeparation {
    pub records: Vec<Option<SeparationRecord>>,
    /// Rows left out of their frame's matching because x or y is not finite.
    pub skipped: Vec<IssueKind>,
}

/// Resolves separation for every receiver row of the play. Non-receiver rows
/// and receiver rows at a frame without defenders stay `None`. A receiver
/// with a non-finite position gets no separation at that frame; a defender
/// with one is not a candidate at that frame.
pub fn resolve_play(arena: &PlayArena, roles: &[Role]) -> PlaySeparation {
    let rows = &arena.rows;
    let mut out = PlaySeparation {
        records: vec![None; rows.len()],
        skipped: Vec::new(),
    };

    let mut frames: BTreeMap<u32, (Vec<usize>, Vec<usize>)> = BTreeMap::new();
    for (idx, (row, role)) in rows.iter().zip(roles).enumerate() {
        if *role == Role::Other {
            continue;
        }
        if !row.x.is_finite() || !row.y.is_finite() {
            out.skipped.push(IssueKind::NonFiniteCoordinates {
                nfl_id: row.nfl_id,
                frame_id: row.frame_id,
            });
            continue;
        }
        let entry = frames.entry(row.frame_id).or_default();
        if role.is_receiver() {
            entry.0.push(idx);
        } else {
            entry.1.push(idx);
        }
    }

    for (receiver_idx, defender_idx) in frames.values() {
        let receivers: Vec<(f64, f64)> = receiver_idx.iter().map(|i| position(&rows[*i])).collect();
        let defenders: Vec<(f64, f64)> = defender_idx.iter().map(|i| position(&rows[*i])).collect();

        for (slot, m) in resolve_frame(&receivers, &defenders).into_iter().enumerate() {
            let receiver = &rows[receiver_idx[slot]];
            let defender = &rows[defender_idx[m.nearest]];
            out.records[receiver_idx[slot]] = Some(SeparationRecord {
                nearest: NearestDefender {
                    nfl_id: defender.nfl_id,
                    x: defender.x,
                    y: defender.y,
                    distance: m.nearest_distance,
                    speed: defender.s,
                    acceleration: defender.a,
                },
                second_nearest_distance: m.second.map(|(_, d)| d),
                vector: SeparationVector::between(position(receiver), position(defender)),
                receiver_speed: receiver.s,
                receiver_acceleration: receiver.a,
            });
        }
    }

    out
}

fn position(row: &TrackingRow) -> (f64, f64) {
    (row.x, row.y)
}
