//! Shared value types for the Kickline soccer agent.
//!
//! Everything that crosses a crate boundary lives here: the commands the
//! agent sends, the decoded events the server produces, and the small amount
//! of field geometry the decision policy needs.
//!
//! # Modules
//!
//! - [`command`] -- Outbound commands and their server literals
//! - [`enums`] -- Team side and game phase
//! - [`event`] -- Decoded inbound events (world updates, cycle boundaries)
//! - [`geometry`] -- Points, poses, and angle normalisation

pub mod command;
pub mod enums;
pub mod event;
pub mod geometry;

// Re-export all public types at crate root for convenience.
pub use command::{Command, MAX_KICK_POWER};
pub use enums::{GamePhase, Side};
pub use event::{BallSighting, EnemySighting, Event, PlayMode, Sight, WorldUpdate};
pub use geometry::{Point, Pose, normalize_degrees};
