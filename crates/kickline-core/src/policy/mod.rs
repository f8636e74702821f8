//! Decision policy: world snapshot in, commands out.
//!
//! A [`Policy`] is a pure strategy object selected when the session starts
//! playing. It never touches the network or the shared world; the decision
//! engine hands it an owned [`WorldSnapshot`] plus the per-session
//! [`PolicyState`] and enqueues whatever it returns. A step that fails is
//! replaced by [`Policy::fallback`], and the engine reports which of the two
//! happened as a [`StepOutcome`].
//!
//! # Modules
//!
//! - [`formation`] -- Kick-off formation table and side mirroring
//! - [`rules`] -- The phase-dispatching [`RulePolicy`](rules::RulePolicy)

pub mod formation;
pub mod rules;

use kickline_types::Command;
use serde::Deserialize;

use crate::world::WorldSnapshot;

/// Turn, in degrees, used to sweep the field when the policy cannot act.
pub const SCAN_TURN: f64 = 30.0;

/// Errors a policy step can raise. None of them is fatal: the engine logs the
/// error and issues the fallback instead.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PolicyError {
    /// The step needs the agent's absolute pose and none is known yet.
    #[error("own pose unknown")]
    MissingPose,

    /// The server has not yet assigned a uniform number and side.
    #[error("uniform number or side not assigned")]
    UnknownUniform,

    /// An intermediate angle was NaN or infinite.
    #[error("non-finite {quantity}")]
    NonFiniteAngle {
        /// Which angle went bad (e.g. `kick angle`).
        quantity: &'static str,
    },
}

/// What happened during one policy step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// The policy produced this many commands.
    Acted(usize),
    /// The policy failed and the fallback was issued instead.
    Fallback(PolicyError),
}

impl StepOutcome {
    /// Whether the fallback was used.
    pub const fn is_fallback(&self) -> bool {
        matches!(self, Self::Fallback(_))
    }
}

/// Per-session decision state, reset every time the session starts playing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PolicyState {
    /// Whether the kick-off formation move has been issued this session.
    pub formation_taken: bool,
}

/// Player role. Roles are data: they select thresholds and branches inside
/// one policy rather than separate policy types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Plays the ball wherever it is.
    Attacker,
    /// Retreats toward the own goal when too far from it.
    Defender,
    /// Like a defender, with its own home radius.
    Goalie,
}

impl Role {
    /// Returns the string representation used in structured logs.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Attacker => "attacker",
            Self::Defender => "defender",
            Self::Goalie => "goalie",
        }
    }
}

/// A decision strategy.
pub trait Policy: Send + Sync {
    /// Decide this step's commands from `world`, updating `state`.
    ///
    /// # Errors
    ///
    /// Returns a [`PolicyError`] when the snapshot lacks something the chosen
    /// branch needs. The caller substitutes [`fallback`](Policy::fallback).
    fn step(
        &self,
        world: &WorldSnapshot,
        state: &mut PolicyState,
    ) -> Result<Vec<Command>, PolicyError>;

    /// The safe default issued when a step fails: a small scanning turn.
    fn fallback(&self) -> Vec<Command> {
        vec![Command::Turn { moment: SCAN_TURN }]
    }
}

/// Run one step, substituting the fallback on error.
pub fn decide<P>(
    policy: &P,
    world: &WorldSnapshot,
    state: &mut PolicyState,
) -> (StepOutcome, Vec<Command>)
where
    P: Policy + ?Sized,
{
    match policy.step(world, state) {
        Ok(commands) => (StepOutcome::Acted(commands.len()), commands),
        Err(err) => (StepOutcome::Fallback(err), policy.fallback()),
    }
}
