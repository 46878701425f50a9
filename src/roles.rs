use serde::{Deserialize, Serialize};

use crate::tracking::TrackingRow;

pub const RECEIVER_POSITIONS: [&str; 3] = ["WR", "TE", "RB"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Receiver,
    Defender,
    Other,
}

impl Role {
    pub fn of(row: &TrackingRow) -> Self {
        classify(&row.player_side, &row.player_position)
    }

    pub fn is_receiver(self) -> bool {
        self == Role::Receiver
    }
}

pub fn classify(side: &str, position: &str) -> Role {
    let side = side.trim();
    if side.eq_ignore_ascii_case("offense") {
        let position = position.trim();
        if RECEIVER_POSITIONS
            .iter()
            .any(|p| p.eq_ignore_ascii_case(position))
        {
            return Role::Receiver;
        }
        return Role::Other;
    }
    if side.eq_ignore_ascii_case("defense") {
        return Role::Defender;
    }
    Role::Other
}
