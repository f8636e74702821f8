//! Enumeration types shared across the workspace.

use serde::{Deserialize, Serialize};

use crate::event::PlayMode;

// ---------------------------------------------------------------------------
// Side
// ---------------------------------------------------------------------------

/// The half of the field a team defends at kick-off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    /// Defends the goal at negative x.
    Left,
    /// Defends the goal at positive x.
    Right,
}

impl Side {
    /// Parse the single-letter side tag used by the server (`l` / `r`).
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "l" | "L" => Some(Self::Left),
            "r" | "R" => Some(Self::Right),
            _ => None,
        }
    }

    /// The opposing side.
    pub const fn opposite(self) -> Self {
        match self {
            Self::Left => Self::Right,
            Self::Right => Self::Left,
        }
    }

    /// Multiplier that mirrors x coordinates for this side (`1` or `-1`).
    pub const fn mirror(self) -> f64 {
        match self {
            Self::Left => 1.0,
            Self::Right => -1.0,
        }
    }
}

// ---------------------------------------------------------------------------
// Game phase
// ---------------------------------------------------------------------------

/// The coarse game phase the decision policy dispatches on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GamePhase {
    /// Before (or at) a kick-off.
    #[default]
    Kickoff,
    /// A restart awarded to our team (free kick, kick-in, corner, goal kick).
    DeadBallOurs,
    /// A restart awarded to the opponents.
    DeadBallTheirs,
    /// Normal running play.
    OpenPlay,
}

impl GamePhase {
    /// Derive the phase from a referee play mode as seen by `own_side`.
    ///
    /// Returns `None` for play modes that do not change the phase (time-over,
    /// drop balls, unknown modes), in which case the caller keeps the current
    /// phase. Restarts for an unknown side count as theirs.
    pub fn from_play_mode(mode: &PlayMode, own_side: Option<Side>) -> Option<Self> {
        match mode {
            PlayMode::BeforeKickOff | PlayMode::KickOff(_) | PlayMode::Goal(_) => {
                Some(Self::Kickoff)
            }
            PlayMode::PlayOn => Some(Self::OpenPlay),
            PlayMode::Restart(side) => {
                if own_side == Some(*side) {
                    Some(Self::DeadBallOurs)
                } else {
                    Some(Self::DeadBallTheirs)
                }
            }
            PlayMode::Other(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn side_tags_and_mirroring() {
        assert_eq!(Side::from_tag("l"), Some(Side::Left));
        assert_eq!(Side::from_tag("r"), Some(Side::Right));
        assert_eq!(Side::from_tag("x"), None);
        assert_eq!(Side::Left.opposite(), Side::Right);
        assert!(Side::Right.mirror() < 0.0);
    }

    #[test]
    fn restarts_split_by_owning_side() {
        let ours = GamePhase::from_play_mode(&PlayMode::Restart(Side::Left), Some(Side::Left));
        let theirs = GamePhase::from_play_mode(&PlayMode::Restart(Side::Right), Some(Side::Left));
        assert_eq!(ours, Some(GamePhase::DeadBallOurs));
        assert_eq!(theirs, Some(GamePhase::DeadBallTheirs));
    }

    #[test]
    fn goals_return_to_kickoff() {
        let phase = GamePhase::from_play_mode(&PlayMode::Goal(Side::Right), Some(Side::Left));
        assert_eq!(phase, Some(GamePhase::Kickoff));
        assert_eq!(
            GamePhase::from_play_mode(&PlayMode::PlayOn, None),
            Some(GamePhase::OpenPlay)
        );
        assert_eq!(
            GamePhase::from_play_mode(&PlayMode::Other(String::from("time_over")), None),
            None
        );
    }
}
