use crate::nearest::SeparationRecord;
use crate::partition::{PlayArena, PlayContext, frame_progress, frames_until_throw};
use crate::roles::Role;
use crate::separation::euclidean;
use crate::temporal::TemporalFeatureRecord;
use crate::tracking::TrackingRow;

/// Derived columns in output order.
pub const DERIVED_COLUMNS: [&str; 22] = [
    "nearest_defender_distance",
    "nearest_defender_id",
    "nearest_defender_x",
    "nearest_defender_y",
    "separation_x",
    "separation_y",
    "separation_angle",
    "second_nearest_defender_distance",
    "receiver_speed",
    "receiver_acceleration",
    "nearest_defender_speed",
    "nearest_defender_acceleration",
    "separation_change",
    "separation_rolling_mean",
    "speed_rolling_mean",
    "frames_until_throw",
    "frame_progress",
    "distance_to_ball_land",
    "speed_differential",
    "acceleration_differential",
    "is_red_zone",
    "relative_separation",
];

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DerivedFeatures {
    pub nearest_defender_distance: Option<f64>,
    pub nearest_defender_id: Option<i64>,
    pub nearest_defender_x: Option<f64>,
    pub nearest_defender_y: Option<f64>,
    pub separation_x: Option<f64>,
    pub separation_y: Option<f64>,
    pub separation_angle: Option<f64>,
    pub second_nearest_defender_distance: Option<f64>,
    pub receiver_speed: Option<f64>,
    pub receiver_acceleration: Option<f64>,
    pub nearest_defender_speed: Option<f64>,
    pub nearest_defender_acceleration: Option<f64>,
    pub separation_change: Option<f64>,
    pub separation_rolling_mean: Option<f64>,
    pub speed_rolling_mean: Option<f64>,
    pub frames_until_throw: Option<i64>,
    pub frame_progress: Option<f64>,
    pub distance_to_ball_land: Option<f64>,
    pub speed_differential: Option<f64>,
    pub acceleration_differential: Option<f64>,
    pub is_red_zone: Option<bool>,
    pub relative_separation: Option<f64>,
}

impl DerivedFeatures {
    /// Derived value by output column name; `is_red_zone` reads as 0/1.
    pub fn get(&self, column: &str) -> Option<f64> {
        match column {
            "nearest_defender_distance" => self.nearest_defender_distance,
            "nearest_defender_id" => self.nearest_defender_id.map(|v| v as f64),
            "nearest_defender_x" => self.nearest_defender_x,
            "nearest_defender_y" => self.nearest_defender_y,
            "separation_x" => self.separation_x,
            "separation_y" => self.separation_y,
            "separation_angle" => self.separation_angle,
            "second_nearest_defender_distance" => self.second_nearest_defender_distance,
            "receiver_speed" => self.receiver_speed,
            "receiver_acceleration" => self.receiver_acceleration,
            "nearest_defender_speed" => self.nearest_defender_speed,
            "nearest_defender_acceleration" => self.nearest_defender_acceleration,
            "separation_change" => self.separation_change,
            "separation_rolling_mean" => self.separation_rolling_mean,
            "speed_rolling_mean" => self.speed_rolling_mean,
            "frames_until_throw" => self.frames_until_throw.map(|v| v as f64),
            "frame_progress" => self.frame_progress,
            "distance_to_ball_land" => self.distance_to_ball_land,
            "speed_differential" => self.speed_differential,
            "acceleration_differential" => self.acceleration_differential,
            "is_red_zone" => self.is_red_zone.map(|v| if v { 1.0 } else { 0.0 }),
            "relative_separation" => self.relative_separation,
            _ => None,
        }
    }
}

/// One output row: the untouched input row plus its derived features.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRow {
    pub tracking: TrackingRow,
    pub role: Role,
    pub features: DerivedFeatures,
}

impl FeatureRow {
    /// Numeric value of a base or derived column.
    pub fn value(&self, column: &str) -> Option<f64> {
        let t = &self.tracking;
        let value = match column {
            "game_id" => Some(t.game_id as f64),
            "play_id" => Some(t.play_id as f64),
            "nfl_id" => Some(t.nfl_id as f64),
            "frame_id" => Some(f64::from(t.frame_id)),
            "x" => Some(t.x),
            "y" => Some(t.y),
            "s" => Some(t.s),
            "a" => Some(t.a),
            "dir" => t.dir,
            "o" => t.o,
            "ball_land_x" => Some(t.ball_land_x),
            "ball_land_y" => Some(t.ball_land_y),
            "absolute_yardline_number" => Some(t.absolute_yardline_number),
            "down" => t.down,
            "yards_to_go" => t.yards_to_go,
            "yardline_number" => t.yardline_number,
            other => self.features.get(other),
        };
        value.filter(|v| v.is_finite())
    }

    /// Text value of a categorical column.
    pub fn category(&self, column: &str) -> Option<&str> {
        let t = &self.tracking;
        let value = match column {
            "player_position" => Some(t.player_position.as_str()),
            "player_side" => Some(t.player_side.as_str()),
            "player_role" => Some(t.player_role.as_str()),
            "play_direction" => Some(t.play_direction.as_str()),
            "team_coverage_type" => t.team_coverage_type.as_deref(),
            "offense_formation" => t.offense_formation.as_deref(),
            "pass_result" => t.pass_result.as_deref(),
            _ => None,
        };
        value.filter(|s| !s.is_empty())
    }

    pub fn sort_key(&self) -> (i64, i64, u32, i64) {
        let t = &self.tracking;
        (t.game_id, t.play_id, t.frame_id, t.nfl_id)
    }
}

pub fn receiver_features(
    row: &TrackingRow,
    context: &PlayContext,
    throw_frame: Option<u32>,
    separation: Option<&SeparationRecord>,
    temporal: Option<&TemporalFeatureRecord>,
    red_zone_yardline: f64,
) -> DerivedFeatures {
    let mut f = DerivedFeatures {
        frames_until_throw: throw_frame.map(|t| frames_until_throw(t, row.frame_id)),
        frame_progress: throw_frame.and_then(|t| frame_progress(t, row.frame_id)),
        distance_to_ball_land: finite(euclidean(
            (row.x, row.y),
            (context.ball_land_x, context.ball_land_y),
        )),
        is_red_zone: Some(context.is_red_zone(red_zone_yardline)),
        ..Default::default()
    };

    if let Some(sep) = separation {
        f.nearest_defender_distance = Some(sep.nearest.distance);
        f.nearest_defender_id = Some(sep.nearest.nfl_id);
        f.nearest_defender_x = Some(sep.nearest.x);
        f.nearest_defender_y = Some(sep.nearest.y);
        f.separation_x = Some(sep.vector.dx);
        f.separation_y = Some(sep.vector.dy);
        f.separation_angle = Some(sep.vector.angle);
        f.second_nearest_defender_distance = sep.second_nearest_distance;
        f.receiver_speed = finite(sep.receiver_speed);
        f.receiver_acceleration = finite(sep.receiver_acceleration);
        f.nearest_defender_speed = finite(sep.nearest.speed);
        f.nearest_defender_acceleration = finite(sep.nearest.acceleration);
        f.speed_differential = finite(sep.receiver_speed - sep.nearest.speed);
        f.acceleration_differential = finite(sep.receiver_acceleration - sep.nearest.acceleration);

        let denom = context.absolute_yardline_number + 1.0;
        if denom != 0.0 {
            f.relative_separation = finite(sep.nearest.distance / denom);
        }
    }

    if let Some(t) = temporal {
        f.separation_change = t.separation_change;
        f.separation_rolling_mean = t.separation_rolling_mean;
        f.speed_rolling_mean = t.speed_rolling_mean;
    }

    f
}

/// Merges a play's derived records back onto its rows, one output row per
/// input row. Consumes the arena.
pub fn assemble_play(
    arena: PlayArena,
    roles: &[Role],
    separation: &[Option<SeparationRecord>],
    temporal: &[Option<TemporalFeatureRecord>],
    red_zone_yardline: f64,
) -> Vec<FeatureRow> {
    let context = arena.context();
    let throw_frame = arena.throw_frame();

    arena
        .rows
        .into_iter()
        .enumerate()
        .map(|(idx, row)| {
            let role = roles[idx];
            let features = match (&context, role) {
                (Some(ctx), Role::Receiver) => receiver_features(
                    &row,
                    ctx,
                    throw_frame,
                    separation[idx].as_ref(),
                    temporal[idx].as_ref(),
                    red_zone_yardline,
                ),
                _ => DerivedFeatures::default(),
            };
            FeatureRow {
                tracking: row,
                role,
                features,
            }
        })
        .collect()
}

// Missing kinematics arrive as NaN and leave as nulls.
fn finite(v: f64) -> Option<f64> {
    v.is_finite().then_some(v)
}
