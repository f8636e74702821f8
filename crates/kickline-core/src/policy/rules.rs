//! Rule-based soccer policy.
//!
//! [`RulePolicy`] issues the formation move once per session and then
//! dispatches on the game phase:
//!
//! - **Kick-off**: only the designated taker plays the ball.
//! - **Dead ball, ours**: restart takers walk to a spot behind the ball,
//!   line up with the goal, and shoot.
//! - **Dead ball, theirs**: everyone waits.
//! - **Open play**: find the ball, chase it, and shoot at a blend of the goal
//!   direction and the visible enemies. Defenders and goalies first retreat
//!   when they stray too far from their own goal.

use std::sync::Arc;

use kickline_types::{Command, EnemySighting, GamePhase, Point, Pose, Side};

use crate::config::PolicyConfig;
use crate::policy::formation::formation_point;
use crate::policy::{Policy, PolicyError, PolicyState, Role, SCAN_TURN};
use crate::turn_table::{EnemyTable, TurnLookupTable};
use crate::world::WorldSnapshot;

// ---------------------------------------------------------------------------
// Thresholds
// ---------------------------------------------------------------------------

/// Ball directions within this many degrees of straight ahead count as in
/// front of the player.
const FORWARD_CONE: f64 = 7.0;

/// Maximum body misalignment with the goal before a restart kick.
const BODY_ALIGNMENT: f64 = 7.0;

/// Dash power when approaching the ball at kick-off.
const KICKOFF_DASH: f64 = 50.0;

/// Dash power when walking to a restart kick spot.
const RESTART_DASH: f64 = 65.0;

/// Dash power when a defender or goalie retreats home.
const RETREAT_DASH: f64 = 70.0;

/// Dash power when chasing the ball in open play.
const CHASE_DASH: f64 = 65.0;

/// Full kick power, as a fraction of the server maximum.
const FULL_POWER: f64 = 1.0;

/// Weight of the goal direction in the kick blend.
const GOAL_WEIGHT: f64 = 0.8;

/// Weight of the enemy term in the kick blend.
const ENEMY_WEIGHT: f64 = 0.2;

/// Distance of either goal from the centre spot along x.
const GOAL_X: f64 = 55.0;

// ---------------------------------------------------------------------------
// Field helpers
// ---------------------------------------------------------------------------

/// The goal `side` attacks.
pub fn enemy_goal(side: Side) -> Point {
    Point::new(GOAL_X * side.mirror(), 0.0)
}

/// The goal `side` defends.
pub fn own_goal(side: Side) -> Point {
    enemy_goal(side.opposite())
}

/// Point `offset` metres behind `ball` on the line from `goal` through it.
pub fn kick_spot(goal: Point, ball: Point, offset: f64) -> Point {
    ball.offset(goal.bearing_to(ball), offset)
}

fn in_forward_cone(direction: f64) -> bool {
    (-FORWARD_CONE..=FORWARD_CONE).contains(&direction)
}

fn full_kick(direction: f64) -> Command {
    Command::Kick {
        power: FULL_POWER,
        direction,
    }
}

/// Blend the goal direction with the visible enemies into a kick angle:
/// `0.8 * lookup(goal_angle) + 0.2 * sum(lookup_e(angle_i) / distance_i)`.
///
/// `lookup_e` is the table selected by `enemy_table`. Enemies at a
/// non-positive distance carry no usable weight and are skipped.
pub fn blended_kick_angle(
    table: &TurnLookupTable,
    enemy_table: EnemyTable,
    goal_angle: f64,
    enemies: &[EnemySighting],
) -> Result<f64, PolicyError> {
    let goal_term = table
        .query(goal_angle)
        .ok_or(PolicyError::NonFiniteAngle {
            quantity: "goal angle",
        })?;

    let mut enemy_term = 0.0;
    for enemy in enemies.iter().filter(|e| e.distance > 0.0) {
        let response = table
            .query_with(enemy_table, enemy.angle)
            .ok_or(PolicyError::NonFiniteAngle {
                quantity: "enemy angle",
            })?;
        enemy_term += response / enemy.distance;
    }

    let angle = GOAL_WEIGHT.mul_add(goal_term, ENEMY_WEIGHT * enemy_term);
    if angle.is_finite() {
        Ok(angle)
    } else {
        Err(PolicyError::NonFiniteAngle {
            quantity: "kick angle",
        })
    }
}

// ---------------------------------------------------------------------------
// RulePolicy
// ---------------------------------------------------------------------------

/// The phase-dispatching rule policy.
#[derive(Debug, Clone)]
pub struct RulePolicy {
    table: Arc<TurnLookupTable>,
    enemy_table: EnemyTable,
    config: PolicyConfig,
}

impl RulePolicy {
    /// Create a policy reading turn responses from `table`.
    pub const fn new(
        table: Arc<TurnLookupTable>,
        enemy_table: EnemyTable,
        config: PolicyConfig,
    ) -> Self {
        Self {
            table,
            enemy_table,
            config,
        }
    }

    /// Role assigned to `uniform_number`.
    pub fn role(&self, uniform_number: u8) -> Role {
        self.config.roles.role_for(uniform_number)
    }

    fn kickoff(
        &self,
        world: &WorldSnapshot,
        side: Side,
        number: u8,
    ) -> Result<Vec<Command>, PolicyError> {
        if number != self.config.kickoff_taker {
            return Ok(Vec::new());
        }

        let mut commands = Vec::with_capacity(2);
        if world.kickable {
            let pose = world.pose.ok_or(PolicyError::MissingPose)?;
            commands.push(full_kick(pose.angle_to(enemy_goal(side))));
        } else if world.ball.is_some_and(|b| in_forward_cone(b.direction)) {
            commands.push(Command::Dash {
                power: KICKOFF_DASH,
            });
        } else {
            let pose = world.pose.ok_or(PolicyError::MissingPose)?;
            commands.push(Command::Turn {
                moment: pose.angle_to(Point::ORIGIN),
            });
        }

        if let Some(ball) = world.ball {
            commands.push(Command::TurnNeck {
                angle: ball.direction,
            });
        }
        Ok(commands)
    }

    fn dead_ball_ours(&self, world: &WorldSnapshot, side: Side, number: u8) -> Vec<Command> {
        let taker = self.config.restart_takers.contains(&number);
        let (Some(ball), Some(pose)) = (world.ball, world.pose) else {
            return if taker || world.ball.is_none() {
                vec![Command::Turn { moment: SCAN_TURN }]
            } else {
                Vec::new()
            };
        };
        if !taker {
            return Vec::new();
        }

        let goal = enemy_goal(side);
        let ball_at = pose.point_at(ball.direction, ball.distance);
        let spot = kick_spot(goal, ball_at, self.config.kick_spot_offset);
        if pose.distance_to(spot) > self.config.kickable_margin / 2.0 {
            let to_spot = pose.angle_to(spot);
            return if in_forward_cone(to_spot) {
                vec![Command::Dash {
                    power: RESTART_DASH,
                }]
            } else {
                vec![Command::Turn { moment: to_spot }]
            };
        }

        let to_goal = pose.angle_to(goal);
        if to_goal.abs() > BODY_ALIGNMENT {
            vec![Command::Turn { moment: to_goal }]
        } else {
            vec![full_kick(to_goal)]
        }
    }

    fn open_play(
        &self,
        world: &WorldSnapshot,
        side: Side,
        role: Role,
    ) -> Result<Vec<Command>, PolicyError> {
        let Some(ball) = world.ball else {
            return Ok(vec![Command::Turn { moment: SCAN_TURN }]);
        };

        if let Some(radius) = self.config.roles.home_radius(role) {
            let pose = world.pose.ok_or(PolicyError::MissingPose)?;
            let home = own_goal(side);
            if pose.distance_to(home) > radius {
                return Ok(vec![
                    Command::Turn {
                        moment: pose.angle_to(home),
                    },
                    Command::Dash {
                        power: RETREAT_DASH,
                    },
                ]);
            }
        }

        if world.kickable {
            let pose = world.pose.ok_or(PolicyError::MissingPose)?;
            return self.shoot(&pose, side, &world.enemies).map(|kick| vec![kick]);
        }

        if in_forward_cone(ball.direction) {
            return Ok(vec![Command::Dash { power: CHASE_DASH }]);
        }

        let moment = self
            .table
            .query(ball.direction)
            .ok_or(PolicyError::NonFiniteAngle {
                quantity: "ball direction",
            })?;
        Ok(vec![Command::Turn { moment }])
    }

    fn shoot(
        &self,
        pose: &Pose,
        side: Side,
        enemies: &[EnemySighting],
    ) -> Result<Command, PolicyError> {
        let goal = enemy_goal(side);
        let angle =
            blended_kick_angle(&self.table, self.enemy_table, pose.angle_to(goal), enemies)?;
        let target = pose.point_at(angle, pose.distance_to(goal));
        Ok(full_kick(pose.angle_to(target)))
    }
}

impl Policy for RulePolicy {
    fn step(
        &self,
        world: &WorldSnapshot,
        state: &mut PolicyState,
    ) -> Result<Vec<Command>, PolicyError> {
        let (side, number) = world
            .side
            .zip(world.uniform_number)
            .ok_or(PolicyError::UnknownUniform)?;

        if !state.formation_taken {
            state.formation_taken = true;
            return Ok(formation_point(number, side)
                .map(|p| Command::Move { x: p.x, y: p.y })
                .into_iter()
                .collect());
        }

        match world.phase {
            GamePhase::Kickoff => self.kickoff(world, side, number),
            GamePhase::DeadBallOurs => Ok(self.dead_ball_ours(world, side, number)),
            GamePhase::DeadBallTheirs => Ok(Vec::new()),
            GamePhase::OpenPlay => self.open_play(world, side, self.role(number)),
        }
    }
}
