//! Outbound commands.
//!
//! A [`Command`] is an immutable, typed action. The decision policy produces
//! them, the outbound batcher queues them, and [`Command::render`] turns each
//! one into the parenthesised literal the server expects.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Server-side maximum kick power. Policy kick power is a fraction of this.
pub const MAX_KICK_POWER: f64 = 100.0;

/// A single command sent to the simulation server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Command {
    /// Handshake: join `team` speaking protocol `version`.
    Init {
        /// Team name to register under.
        team: String,
        /// Protocol version.
        version: u32,
    },
    /// Teleport to an absolute position (only legal before kick-off).
    Move {
        /// Target x coordinate.
        x: f64,
        /// Target y coordinate.
        y: f64,
    },
    /// Accelerate along the body direction.
    Dash {
        /// Dash power.
        power: f64,
    },
    /// Rotate the body by `moment` degrees.
    Turn {
        /// Relative turn in degrees.
        moment: f64,
    },
    /// Rotate the neck by `angle` degrees relative to the body.
    TurnNeck {
        /// Relative neck angle in degrees.
        angle: f64,
    },
    /// Kick the ball.
    Kick {
        /// Fraction of [`MAX_KICK_POWER`] (1.0 is a full-power kick).
        power: f64,
        /// Direction relative to the body, in degrees.
        direction: f64,
    },
    /// Leave the match.
    Bye,
}

impl Command {
    /// Render the command as the literal the server parses.
    ///
    /// Numbers are rounded to two decimals and printed without trailing
    /// zeros, so `Dash { power: 65.0 }` becomes `(dash 65)`.
    pub fn render(&self) -> String {
        match self {
            Self::Init { team, version } => format!("(init {team} (version {version}))"),
            Self::Move { x, y } => format!("(move {} {})", num(*x), num(*y)),
            Self::Dash { power } => format!("(dash {})", num(*power)),
            Self::Turn { moment } => format!("(turn {})", num(*moment)),
            Self::TurnNeck { angle } => format!("(turn_neck {})", num(*angle)),
            Self::Kick { power, direction } => format!(
                "(kick {} {})",
                num(power * MAX_KICK_POWER),
                num(*direction)
            ),
            Self::Bye => String::from("(bye)"),
        }
    }

    /// Short lowercase label used in structured logs.
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Init { .. } => "init",
            Self::Move { .. } => "move",
            Self::Dash { .. } => "dash",
            Self::Turn { .. } => "turn",
            Self::TurnNeck { .. } => "turn_neck",
            Self::Kick { .. } => "kick",
            Self::Bye => "bye",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

/// Round to two decimals; `-0` prints as `0`.
fn num(value: f64) -> String {
    let rounded = (value * 100.0).round() / 100.0;
    if rounded == 0.0 {
        String::from("0")
    } else {
        format!("{rounded}")
    }
}
