//! Shared world state.
//!
//! [`WorldState`] holds the facts the decision policy reads: ball, own pose,
//! visible enemies, game phase, and whether the ball is kickable. The inbound
//! pump is its only writer, through [`WorldState::apply`]. The decision engine
//! never holds a guard across a policy step; it copies a [`WorldSnapshot`]
//! under the read lock and works on that, so a step can never observe a
//! partially applied update.

use std::sync::Arc;

use kickline_types::{
    BallSighting, EnemySighting, Event, GamePhase, Pose, Side, Sight, WorldUpdate,
};
use tokio::sync::RwLock;

/// World state shared between the inbound pump (writer) and the decision
/// engine (reader).
pub type SharedWorld = Arc<RwLock<WorldState>>;

/// The agent's current picture of the match.
#[derive(Debug, Clone)]
pub struct WorldState {
    ball: Option<BallSighting>,
    pose: Option<Pose>,
    enemies: Vec<EnemySighting>,
    phase: GamePhase,
    kickable: bool,
    side: Option<Side>,
    uniform_number: Option<u8>,
    cycle: u32,
    updates: u64,
    kickable_margin: f64,
}

impl WorldState {
    /// Create an empty world. `kickable_margin` is the ball distance at or
    /// below which the ball counts as kickable.
    pub const fn new(kickable_margin: f64) -> Self {
        Self {
            ball: None,
            pose: None,
            enemies: Vec::new(),
            phase: GamePhase::Kickoff,
            kickable: false,
            side: None,
            uniform_number: None,
            cycle: 0,
            updates: 0,
            kickable_margin,
        }
    }

    /// Wrap a new world in the shared lock.
    pub fn shared(kickable_margin: f64) -> SharedWorld {
        Arc::new(RwLock::new(Self::new(kickable_margin)))
    }

    /// Apply one decoded event. This is the only mutation entry point.
    pub fn apply(&mut self, event: &Event) {
        match event {
            Event::WorldUpdate(update) => {
                self.apply_update(update);
                self.updates = self.updates.saturating_add(1);
            }
            Event::CycleBoundary { time } => self.cycle = *time,
            Event::Unrecognized { .. } => {}
        }
    }

    fn apply_update(&mut self, update: &WorldUpdate) {
        match update {
            WorldUpdate::Joined {
                side,
                uniform_number,
                play_mode,
            } => {
                self.side = Some(*side);
                self.uniform_number = Some(*uniform_number);
                if let Some(phase) = GamePhase::from_play_mode(play_mode, self.side) {
                    self.phase = phase;
                }
            }
            WorldUpdate::Referee { time, play_mode } => {
                self.cycle = *time;
                if let Some(phase) = GamePhase::from_play_mode(play_mode, self.side) {
                    self.phase = phase;
                }
            }
            WorldUpdate::Sight(sight) => self.apply_sight(sight),
        }
    }

    fn apply_sight(&mut self, sight: &Sight) {
        self.cycle = sight.time;
        self.ball = sight.ball;
        self.kickable = sight
            .ball
            .is_some_and(|b| b.distance <= self.kickable_margin);
        self.enemies.clone_from(&sight.enemies);
        // Localisation needs two flags in view; keep the last fix otherwise.
        if let Some(pose) = sight.pose {
            self.pose = Some(pose);
        }
    }

    /// Copy out a consistent snapshot.
    pub fn snapshot(&self) -> WorldSnapshot {
        WorldSnapshot {
            ball: self.ball,
            pose: self.pose,
            enemies: self.enemies.clone(),
            phase: self.phase,
            kickable: self.kickable,
            side: self.side,
            uniform_number: self.uniform_number,
            cycle: self.cycle,
            updates: self.updates,
        }
    }

    /// Side and uniform number, once the server has assigned them.
    pub const fn identity(&self) -> Option<(Side, u8)> {
        match (self.side, self.uniform_number) {
            (Some(side), Some(number)) => Some((side, number)),
            _ => None,
        }
    }

    /// Current game phase.
    pub const fn phase(&self) -> GamePhase {
        self.phase
    }

    /// Number of world updates applied so far.
    pub const fn updates(&self) -> u64 {
        self.updates
    }
}

/// An owned, point-in-time copy of [`WorldState`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorldSnapshot {
    /// Ball sighting from the latest visual, if the ball was in view.
    pub ball: Option<BallSighting>,
    /// Last known own pose.
    pub pose: Option<Pose>,
    /// Enemies in the latest visual.
    pub enemies: Vec<EnemySighting>,
    /// Current game phase.
    pub phase: GamePhase,
    /// Whether the ball is within the kickable margin.
    pub kickable: bool,
    /// Our side, once assigned.
    pub side: Option<Side>,
    /// Our uniform number, once assigned.
    pub uniform_number: Option<u8>,
    /// Latest server cycle seen.
    pub cycle: u32,
    /// Number of world updates applied when the snapshot was taken.
    pub updates: u64,
}

#[cfg(test)]
mod tests {
    use kickline_types::{PlayMode, Point};

    use super::*;

    fn sight(time: u32, ball: Option<BallSighting>, pose: Option<Pose>) -> Event {
        Event::WorldUpdate(WorldUpdate::Sight(Sight {
            time,
            ball,
            enemies: vec![EnemySighting {
                distance: 12.0,
                angle: -20.0,
            }],
            pose,
        }))
    }

    #[test]
    fn join_sets_identity_and_phase() {
        let mut world = WorldState::new(0.7);
        assert_eq!(world.identity(), None);
        world.apply(&Event::WorldUpdate(WorldUpdate::Joined {
            side: Side::Right,
            uniform_number: 9,
            play_mode: PlayMode::BeforeKickOff,
        }));
        assert_eq!(world.identity(), Some((Side::Right, 9)));
        assert_eq!(world.phase(), GamePhase::Kickoff);
        assert_eq!(world.updates(), 1);
    }

    #[test]
    fn referee_restarts_are_relative_to_own_side() {
        let mut world = WorldState::new(0.7);
        world.apply(&Event::WorldUpdate(WorldUpdate::Joined {
            side: Side::Left,
            uniform_number: 2,
            play_mode: PlayMode::BeforeKickOff,
        }));
        world.apply(&Event::WorldUpdate(WorldUpdate::Referee {
            time: 40,
            play_mode: PlayMode::Restart(Side::Left),
        }));
        assert_eq!(world.phase(), GamePhase::DeadBallOurs);
        world.apply(&Event::WorldUpdate(WorldUpdate::Referee {
            time: 55,
            play_mode: PlayMode::Restart(Side::Right),
        }));
        assert_eq!(world.phase(), GamePhase::DeadBallTheirs);
        world.apply(&Event::WorldUpdate(WorldUpdate::Referee {
            time: 60,
            play_mode: PlayMode::Other(String::from("drop_ball")),
        }));
        assert_eq!(world.phase(), GamePhase::DeadBallTheirs);
        assert_eq!(world.snapshot().cycle, 60);
    }

    #[test]
    fn sight_updates_ball_and_kickable_flag() {
        let mut world = WorldState::new(0.7);
        world.apply(&sight(
            3,
            Some(BallSighting {
                distance: 0.5,
                direction: 10.0,
            }),
            None,
        ));
        let snap = world.snapshot();
        assert!(snap.kickable);
        assert_eq!(snap.enemies.len(), 1);

        world.apply(&sight(4, None, None));
        let snap = world.snapshot();
        assert!(!snap.kickable);
        assert_eq!(snap.ball, None);
    }

    #[test]
    fn pose_survives_sights_without_localisation() {
        let mut world = WorldState::new(0.7);
        let pose = Pose::new(Point::new(-20.0, 5.0), 45.0);
        world.apply(&sight(1, None, Some(pose)));
        world.apply(&sight(2, None, None));
        assert_eq!(world.snapshot().pose, Some(pose));
    }

    #[test]
    fn cycle_boundaries_do_not_count_as_updates() {
        let mut world = WorldState::new(0.7);
        world.apply(&Event::CycleBoundary { time: 17 });
        world.apply(&Event::Unrecognized {
            head: String::from("server_param"),
        });
        let snap = world.snapshot();
        assert_eq!(snap.cycle, 17);
        assert_eq!(snap.updates, 0);
    }
}
