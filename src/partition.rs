use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::roles::Role;
use crate::tracking::TrackingRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PlayKey {
    pub game_id: i64,
    pub play_id: i64,
}

impl PlayKey {
    pub fn of(row: &TrackingRow) -> Self {
        Self {
            game_id: row.game_id,
            play_id: row.play_id,
        }
    }
}

/// Play-level context. Taken from the first row of the play; these columns are
/// constant across a play in the tracking export.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayContext {
    pub ball_land_x: f64,
    pub ball_land_y: f64,
    pub absolute_yardline_number: f64,
    pub play_direction: String,
    pub down: Option<f64>,
    pub yards_to_go: Option<f64>,
    pub yardline_number: Option<f64>,
}

impl PlayContext {
    pub fn from_row(row: &TrackingRow) -> Self {
        Self {
            ball_land_x: row.ball_land_x,
            ball_land_y: row.ball_land_y,
            absolute_yardline_number: row.absolute_yardline_number,
            play_direction: row.play_direction.clone(),
            down: row.down,
            yards_to_go: row.yards_to_go,
            yardline_number: row.yardline_number,
        }
    }

    pub fn is_red_zone(&self, threshold: f64) -> bool {
        self.yardline_number.is_some_and(|y| y <= threshold)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IssueKind {
    DuplicateFrame { nfl_id: i64, frame_id: u32 },
    /// The player's frames arrived out of order and were re-sorted.
    NonMonotonicFrames { nfl_id: i64 },
    InconsistentRole { nfl_id: i64 },
    NonFiniteCoordinates { nfl_id: i64, frame_id: u32 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayIssue {
    pub game_id: i64,
    pub play_id: i64,
    #[serde(flatten)]
    pub kind: IssueKind,
}

/// All rows of one play, ordered by (frame_id, nfl_id). Owned exclusively by
/// whoever processes the play.
#[derive(Debug, Clone)]
pub struct PlayArena {
    pub key: PlayKey,
    pub rows: Vec<TrackingRow>,
    /// Players whose input rows went backwards in frame_id before sorting.
    pub out_of_order: BTreeSet<i64>,
}

impl PlayArena {
    pub fn throw_frame(&self) -> Option<u32> {
        throw_frame(&self.rows)
    }

    pub fn context(&self) -> Option<PlayContext> {
        self.rows.first().map(PlayContext::from_row)
    }

    /// Duplicate or out-of-order frames per player and players whose role
    /// changes mid-play. All are reported and then processed best-effort.
    pub fn issues(&self) -> Vec<PlayIssue> {
        let mut out = Vec::new();
        let mut roles: HashMap<i64, Role> = HashMap::new();
        let mut flagged_roles: HashSet<i64> = HashSet::new();
        let mut duplicates: HashSet<(i64, u32)> = HashSet::new();

        for pair in self.rows.windows(2) {
            let (prev, cur) = (&pair[0], &pair[1]);
            if prev.nfl_id == cur.nfl_id
                && prev.frame_id == cur.frame_id
                && duplicates.insert((cur.nfl_id, cur.frame_id))
            {
                out.push(self.issue(IssueKind::DuplicateFrame {
                    nfl_id: cur.nfl_id,
                    frame_id: cur.frame_id,
                }));
            }
        }

        for nfl_id in &self.out_of_order {
            out.push(self.issue(IssueKind::NonMonotonicFrames { nfl_id: *nfl_id }));
        }

        for row in &self.rows {
            let role = Role::of(row);
            let first = *roles.entry(row.nfl_id).or_insert(role);
            if first != role && flagged_roles.insert(row.nfl_id) {
                out.push(self.issue(IssueKind::InconsistentRole { nfl_id: row.nfl_id }));
            }
        }

        out
    }

    pub(crate) fn issue(&self, kind: IssueKind) -> PlayIssue {
        PlayIssue {
            game_id: self.key.game_id,
            play_id: self.key.play_id,
            kind,
        }
    }
}

/// Splits the table into independent per-play arenas, ordered by play key.
/// Row order inside an arena is a stable sort by (frame_id, nfl_id), so the
/// input interleaving of plays never leaks into per-play results.
pub fn partition(rows: Vec<TrackingRow>) -> Vec<PlayArena> {
    let mut plays: BTreeMap<PlayKey, Vec<TrackingRow>> = BTreeMap::new();
    for row in rows {
        plays.entry(PlayKey::of(&row)).or_default().push(row);
    }

    plays
        .into_iter()
        .map(|(key, mut rows)| {
            let out_of_order = backwards_players(&rows);
            rows.sort_by(|a, b| a.frame_id.cmp(&b.frame_id).then(a.nfl_id.cmp(&b.nfl_id)));
            PlayArena {
                key,
                rows,
                out_of_order,
            }
        })
        .collect()
}

fn backwards_players(rows: &[TrackingRow]) -> BTreeSet<i64> {
    let mut last: HashMap<i64, u32> = HashMap::new();
    let mut out = BTreeSet::new();
    for row in rows {
        if let Some(prev) = last.insert(row.nfl_id, row.frame_id)
            && row.frame_id < prev
        {
            out.insert(row.nfl_id);
        }
    }
    out
}

/// The last recorded frame of the play across every role.
pub fn throw_frame(rows: &[TrackingRow]) -> Option<u32> {
    rows.iter().map(|r| r.frame_id).max()
}

pub fn frames_until_throw(throw_frame: u32, frame_id: u32) -> i64 {
    i64::from(throw_frame) - i64::from(frame_id)
}

pub fn frame_progress(throw_frame: u32, frame_id: u32) -> Option<f64> {
    if throw_frame == 0 {
        return None;
    }
    Some(f64::from(frame_id) / f64::from(throw_frame))
}
