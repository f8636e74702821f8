//! Decoded inbound events.
//!
//! The message decoder turns each raw server payload into exactly one
//! [`Event`]. The world state is the only consumer that mutates anything in
//! response; the inbound pump additionally watches for
//! [`Event::CycleBoundary`] to schedule the per-cycle flush.

use serde::{Deserialize, Serialize};

use crate::enums::Side;
use crate::geometry::Pose;

/// One decoded server message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    /// A message that changes the perceived world.
    WorldUpdate(WorldUpdate),
    /// The server is ready to accept this cycle's commands.
    CycleBoundary {
        /// Server cycle number.
        time: u32,
    },
    /// A well-formed message the agent does not act on.
    Unrecognized {
        /// The message head (e.g. `server_param`).
        head: String,
    },
}

impl Event {
    /// Whether this event marks the start of a command-acceptance window.
    pub const fn is_cycle_boundary(&self) -> bool {
        matches!(self, Self::CycleBoundary { .. })
    }
}

/// The world-changing messages the agent understands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WorldUpdate {
    /// Reply to the handshake: our side and uniform number.
    Joined {
        /// Side we were assigned.
        side: Side,
        /// Uniform number we were assigned.
        uniform_number: u8,
        /// Play mode at the time we joined.
        play_mode: PlayMode,
    },
    /// The referee announced a new play mode.
    Referee {
        /// Server cycle number.
        time: u32,
        /// The announced play mode.
        play_mode: PlayMode,
    },
    /// A visual snapshot.
    Sight(Sight),
}

/// Referee play modes, reduced to what the phase policy distinguishes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlayMode {
    /// Waiting for the first kick-off.
    BeforeKickOff,
    /// Kick-off for the given side.
    KickOff(Side),
    /// Normal play.
    PlayOn,
    /// Free kick, kick-in, corner kick, goal kick, or indirect free kick
    /// awarded to the given side.
    Restart(Side),
    /// A goal scored by the given side.
    Goal(Side),
    /// Anything else, kept verbatim.
    Other(String),
}

/// Everything the agent extracted from one `see` message.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Sight {
    /// Server cycle number.
    pub time: u32,
    /// The ball, if it was in view with a distance reading.
    pub ball: Option<BallSighting>,
    /// Opponents in view with a distance reading.
    pub enemies: Vec<EnemySighting>,
    /// Own pose, if enough landmarks were in view to localise.
    pub pose: Option<Pose>,
}

/// Ball position relative to the agent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BallSighting {
    /// Distance in metres.
    pub distance: f64,
    /// Direction in degrees relative to the facing direction.
    pub direction: f64,
}

/// An opponent relative to the agent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnemySighting {
    /// Distance in metres.
    pub distance: f64,
    /// Direction in degrees relative to the facing direction.
    pub angle: f64,
}
