//! Agents and the per-tick sense, decide, move, collide, reward, learn cycle.

use std::f32::consts::TAU;

use learninator_core::{
    crosses_any_wall, geometry, AgentId, AgentSnapshot, Brain, BrainKind, EntityKind, Motion,
    Occupant, Vec2, Wall,
};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{
    eye::{Eye, SenseTarget},
    reward::{self, RewardConfig},
};

/// How action indices translate into motion.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementModel {
    /// Axis-aligned velocity nudges with multiplicative damping.
    Velocity,
    /// Two wheels turning at independent rates.
    #[default]
    DifferentialDrive,
}

/// Agent construction options; missing or invalid values fall back to defaults.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Number of eyes fanned across the front half circle.
    pub num_eyes: usize,
    /// Number of sensed-type slots per eye block (wall, food, poison, agent).
    pub num_types: usize,
    /// Body radius.
    pub radius: f32,
    /// Eye range.
    pub range: f32,
    /// Include the wall clearance term in the reward.
    pub proximity: bool,
    /// Reject moves that cross a wall.
    pub collision: bool,
    /// Run the brain on a worker thread.
    pub worker: bool,
    /// Decision-making variant.
    pub brain_type: BrainKind,
    /// Action-to-motion mapping.
    pub movement: MovementModel,
    /// Wheel rate scale for the differential drive.
    pub speed: f32,
    /// Velocity change per action for the velocity model.
    pub acceleration: f32,
    /// Multiplicative velocity damping per tick for the velocity model.
    pub damping: f32,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            num_eyes: 9,
            num_types: 3,
            radius: 10.0,
            range: 85.0,
            proximity: true,
            collision: true,
            worker: false,
            brain_type: BrainKind::Qlearn,
            movement: MovementModel::DifferentialDrive,
            speed: 1.0,
            acceleration: 0.1,
            damping: 0.95,
        }
    }
}

impl AgentConfig {
    /// Replaces non-finite or out-of-range values with their defaults.
    #[must_use]
    pub fn sanitized(mut self) -> Self {
        let defaults = Self::default();
        sanitize(&mut self.radius, defaults.radius, "agent.radius", |v| v > 0.0);
        sanitize(&mut self.range, defaults.range, "agent.range", |v| v > 0.0);
        sanitize(&mut self.speed, defaults.speed, "agent.speed", |v| v >= 0.0);
        sanitize(
            &mut self.acceleration,
            defaults.acceleration,
            "agent.acceleration",
            |v| v >= 0.0,
        );
        sanitize(&mut self.damping, defaults.damping, "agent.damping", |v| {
            (0.0..=1.0).contains(&v)
        });
        self
    }

    /// Length of a single eye's block in the state vector.
    #[must_use]
    pub const fn block_len(&self) -> usize {
        self.num_types + 2
    }

    /// Length of the state vector handed to the brain.
    #[must_use]
    pub const fn state_len(&self) -> usize {
        self.num_eyes * self.block_len() + 2
    }

    /// Number of actions a brain driving this agent chooses from.
    #[must_use]
    pub fn action_count(&self) -> usize {
        self.actions().len()
    }

    /// Actions available under the configured movement model.
    #[must_use]
    pub fn actions(&self) -> Vec<Action> {
        match self.movement {
            MovementModel::Velocity => vec![
                Action::Accelerate(Vec2::X),
                Action::Accelerate(Vec2::NEG_X),
                Action::Accelerate(Vec2::Y),
                Action::Accelerate(Vec2::NEG_Y),
                Action::Hover,
            ],
            MovementModel::DifferentialDrive => vec![
                Action::Wheels {
                    left: 1.0,
                    right: 1.0,
                },
                Action::Wheels {
                    left: 0.8,
                    right: 1.0,
                },
                Action::Wheels {
                    left: 1.0,
                    right: 0.8,
                },
                Action::Wheels {
                    left: 0.5,
                    right: 0.0,
                },
                Action::Wheels {
                    left: 0.0,
                    right: 0.5,
                },
            ],
        }
    }
}

fn sanitize(value: &mut f32, fallback: f32, field: &'static str, valid: impl Fn(f32) -> bool) {
    if !value.is_finite() || !valid(*value) {
        warn!(field, value = *value, fallback, "invalid agent option, using default");
        *value = fallback;
    }
}

/// Motion command selected by a brain.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Action {
    /// Adds the unit direction, scaled by the acceleration, to the velocity.
    Accelerate(Vec2),
    /// Keeps drifting on the damped velocity.
    Hover,
    /// Turns the two wheels by the given rates.
    Wheels {
        /// Rate of the left wheel.
        left: f32,
        /// Rate of the right wheel.
        right: f32,
    },
}

impl Action {
    fn is_straight(&self, previous: Option<Action>) -> bool {
        match self {
            Self::Wheels { left, right } => left == right && *left > 0.0,
            Self::Accelerate(_) => previous == Some(*self),
            Self::Hover => false,
        }
    }
}

/// Learning agent that senses, moves and collects rewards.
#[derive(Debug)]
pub struct Agent {
    id: AgentId,
    config: AgentConfig,
    motion: Motion,
    angle: f32,
    eyes: Vec<Eye>,
    actions: Vec<Action>,
    previous_action: Option<Action>,
    moved_straight: bool,
    digestion_signal: f32,
    last_reward: f32,
    state: Vec<f32>,
    brain: Box<dyn Brain>,
}

impl Agent {
    /// Creates an agent resting at `position`, facing `angle`.
    #[must_use]
    pub fn new(
        id: AgentId,
        config: AgentConfig,
        position: Vec2,
        angle: f32,
        brain: Box<dyn Brain>,
    ) -> Self {
        let config = config.sanitized();
        let eyes = Eye::fan(config.num_eyes, config.range);
        let actions = config.actions();
        let state = vec![0.0; config.state_len()];
        Self {
            id,
            motion: Motion::at(position),
            angle,
            eyes,
            actions,
            previous_action: None,
            moved_straight: false,
            digestion_signal: 0.0,
            last_reward: 0.0,
            state,
            config,
            brain,
        }
    }

    /// Identifier of the agent.
    #[must_use]
    pub const fn id(&self) -> AgentId {
        self.id
    }

    /// Sanitized configuration.
    #[must_use]
    pub const fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Current position and velocity.
    #[must_use]
    pub const fn motion(&self) -> Motion {
        self.motion
    }

    /// Heading in radians, in `[0, 2π)` for the differential drive.
    #[must_use]
    pub const fn angle(&self) -> f32 {
        self.angle
    }

    /// Body radius.
    #[must_use]
    pub const fn radius(&self) -> f32 {
        self.config.radius
    }

    /// Eyes in fan order.
    #[must_use]
    pub fn eyes(&self) -> &[Eye] {
        &self.eyes
    }

    /// Pending reward from eaten items.
    #[must_use]
    pub const fn digestion_signal(&self) -> f32 {
        self.digestion_signal
    }

    /// Reward learned during the last tick.
    #[must_use]
    pub const fn last_reward(&self) -> f32 {
        self.last_reward
    }

    /// Most recent state vector handed to the brain.
    #[must_use]
    pub fn state(&self) -> &[f32] {
        &self.state
    }

    /// How this agent appears to other agents' eyes.
    #[must_use]
    pub fn as_target(&self) -> SenseTarget {
        SenseTarget {
            source: Occupant::Agent(self.id),
            kind: EntityKind::Agent,
            position: self.motion.position(),
            radius: self.config.radius,
            velocity: self.motion.velocity(),
        }
    }

    /// SENSE: refreshes every eye from the current world state.
    pub fn sense(&mut self, walls: &[Wall], targets: &[SenseTarget]) {
        let origin = self.motion.position();
        let observer = Occupant::Agent(self.id);
        for eye in &mut self.eyes {
            eye.sense(origin, self.angle, walls, targets, observer);
        }
    }

    /// Builds the state vector from the latest eye readings.
    ///
    /// Each eye contributes `num_types` presence slots, all 1.0 except the slot
    /// of the sensed type which holds the normalised distance, followed by the
    /// sensed velocity. The agent's own velocity closes the vector.
    pub fn encode_state(&mut self) -> &[f32] {
        let block = self.config.block_len();
        let types = self.config.num_types;
        self.state.clear();
        for eye in &self.eyes {
            let start = self.state.len();
            self.state.extend(std::iter::repeat(1.0).take(types));
            if let Some(kind) = eye.sensed() {
                if kind.code() < types {
                    self.state[start + kind.code()] = eye.sensed_proximity() / eye.max_range();
                }
            }
            let velocity = eye.sensed_velocity();
            self.state.push(velocity.x);
            self.state.push(velocity.y);
            debug_assert_eq!(self.state.len() - start, block);
        }
        let own = self.motion.velocity();
        self.state.push(own.x);
        self.state.push(own.y);
        &self.state
    }

    /// DECIDE: asks the brain for an action index.
    pub fn decide(&mut self) -> usize {
        let _ = self.encode_state();
        self.brain.act(&self.state)
    }

    /// ACT and COLLIDE: applies the action and resolves collisions.
    ///
    /// Returns `true` when a wall rejected the move.
    pub fn act(&mut self, action_index: usize, bounds: Vec2, walls: &[Wall]) -> bool {
        let Some(action) = self.actions.get(action_index).copied() else {
            self.moved_straight = false;
            return false;
        };
        self.moved_straight = action.is_straight(self.previous_action);
        self.previous_action = Some(action);

        let (tentative, angle) = self.kinematics(action);
        let (resolved, blocked) =
            resolve_motion(self.motion, tentative, walls, bounds, self.config.collision);
        self.motion = resolved;
        if !blocked {
            self.angle = angle;
        }
        blocked
    }

    fn kinematics(&self, action: Action) -> (Motion, f32) {
        match action {
            Action::Accelerate(direction) => {
                let velocity = self.motion.velocity() + direction * self.config.acceleration;
                let moved = self
                    .motion
                    .with_velocity(velocity)
                    .damped(self.config.damping)
                    .integrated();
                (moved, self.angle)
            }
            Action::Hover => {
                let moved = self.motion.damped(self.config.damping).integrated();
                (moved, self.angle)
            }
            Action::Wheels { left, right } => {
                let (position, angle) = drive(
                    self.motion.position(),
                    self.angle,
                    self.config.radius,
                    left * self.config.speed,
                    right * self.config.speed,
                );
                let velocity = position - self.motion.position();
                (Motion::new(position, velocity), angle)
            }
        }
    }

    /// Credits eaten items to the pending digestion signal.
    pub fn digest(&mut self, amount: f32) {
        self.digestion_signal += amount;
    }

    /// REWARD: folds clearance, straight-line bonus and digestion into one value.
    ///
    /// The digestion signal is consumed, so a second call without an
    /// intervening move only repeats the shaping terms.
    pub fn fold_reward(&mut self, config: &RewardConfig) -> f32 {
        let digestion = std::mem::take(&mut self.digestion_signal);
        let reward = reward::shaped(
            config,
            &self.eyes,
            self.config.proximity,
            self.moved_straight,
            digestion,
        );
        self.last_reward = reward;
        reward
    }

    /// LEARN: hands the reward to the brain.
    pub fn learn(&mut self, reward: f32) {
        self.brain.learn(reward);
    }

    /// Read-only view for renderers.
    #[must_use]
    pub fn snapshot(&self) -> AgentSnapshot {
        AgentSnapshot {
            id: self.id,
            motion: self.motion,
            angle: self.angle,
            radius: self.config.radius,
            eyes: self.eyes.iter().map(Eye::snapshot).collect(),
            last_reward: self.last_reward,
            brain: self.brain.kind(),
        }
    }
}

/// Differential-drive step: each wheel pivots the body around the other wheel.
///
/// Returns the new position and heading; the heading stays in `[0, 2π)`.
#[must_use]
pub fn drive(position: Vec2, angle: f32, radius: f32, rot1: f32, rot2: f32) -> (Vec2, f32) {
    let offset = geometry::rotate(Vec2::new(0.0, radius / 2.0), angle);
    let wheel1 = position + offset;
    let wheel2 = position - offset;

    let about_wheel2 = geometry::rotate(position - wheel2, -rot1);
    let about_wheel1 = geometry::rotate(position - wheel1, rot2);
    let moved = (wheel2 + about_wheel2) * 0.5 + (wheel1 + about_wheel1) * 0.5;

    let heading = (angle - rot1 + rot2).rem_euclid(TAU);
    (moved, heading)
}

/// Rejects moves that cross a wall, then clamps the result to the world.
///
/// A rejected move keeps the pre-move position and stops the body. Returns the
/// resolved motion and whether the move was rejected.
#[must_use]
pub fn resolve_motion(
    from: Motion,
    to: Motion,
    walls: &[Wall],
    bounds: Vec2,
    collision: bool,
) -> (Motion, bool) {
    let finite = to.position().is_finite() && to.velocity().is_finite();
    let blocked =
        !finite || (collision && crosses_any_wall(walls, from.position(), to.position()));
    let resolved = if blocked {
        from.with_velocity(Vec2::ZERO)
    } else {
        to
    };
    let clamped = resolved
        .position()
        .clamp(Vec2::ZERO, bounds.max(Vec2::ZERO));
    (resolved.with_position(clamped), blocked)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Fixed(usize);

    impl Brain for Fixed {
        fn kind(&self) -> BrainKind {
            BrainKind::Qlearn
        }

        fn act(&mut self, _state: &[f32]) -> usize {
            self.0
        }

        fn learn(&mut self, _reward: f32) {}
    }

    fn agent(config: AgentConfig, position: Vec2) -> Agent {
        Agent::new(AgentId::new(0), config, position, 0.0, Box::new(Fixed(0)))
    }

    #[test]
    fn open_world_clamps_to_bounds() {
        let (motion, blocked) = resolve_motion(
            Motion::at(Vec2::new(20.0, 300.0)),
            Motion::new(Vec2::new(-50.0, 300.0), Vec2::new(-70.0, 0.0)),
            &[],
            Vec2::new(600.0, 600.0),
            false,
        );
        assert!(!blocked);
        assert_eq!(motion.position(), Vec2::new(0.0, 300.0));
    }

    #[test]
    fn maze_rule_reverts_before_clamping() {
        let boundary = [Wall::new(Vec2::new(0.0, 0.0), Vec2::new(0.0, 600.0))];
        let (motion, blocked) = resolve_motion(
            Motion::at(Vec2::new(20.0, 300.0)),
            Motion::at(Vec2::new(-50.0, 300.0)),
            &boundary,
            Vec2::new(600.0, 600.0),
            true,
        );
        assert!(blocked);
        assert_eq!(motion.position(), Vec2::new(20.0, 300.0));
    }

    #[test]
    fn crossing_a_wall_reverts_the_move() {
        let wall = [Wall::new(Vec2::new(0.0, 50.0), Vec2::new(100.0, 50.0))];
        let (motion, blocked) = resolve_motion(
            Motion::at(Vec2::new(10.0, 10.0)),
            Motion::new(Vec2::new(10.0, 100.0), Vec2::new(0.0, 90.0)),
            &wall,
            Vec2::new(600.0, 600.0),
            true,
        );
        assert!(blocked);
        assert_eq!(motion.position(), Vec2::new(10.0, 10.0));
        assert_eq!(motion.velocity(), Vec2::ZERO);
    }

    #[test]
    fn non_finite_moves_are_rejected() {
        let (motion, blocked) = resolve_motion(
            Motion::at(Vec2::new(5.0, 5.0)),
            Motion::at(Vec2::new(f32::NAN, 5.0)),
            &[],
            Vec2::new(10.0, 10.0),
            false,
        );
        assert!(blocked);
        assert_eq!(motion.position(), Vec2::new(5.0, 5.0));
    }

    #[test]
    fn equal_wheels_drive_forward() {
        let (position, angle) = drive(Vec2::new(100.0, 100.0), 0.0, 10.0, 0.5, 0.5);
        assert!(position.x > 100.0);
        assert!((position.y - 100.0).abs() < 1e-4);
        assert!(angle.abs() < 1e-6);
    }

    #[test]
    fn unequal_wheels_turn() {
        let (_, angle) = drive(Vec2::new(100.0, 100.0), 0.0, 10.0, 0.0, 0.5);
        assert!((angle - 0.5).abs() < 1e-6);
        let (_, wrapped) = drive(Vec2::new(100.0, 100.0), 0.1, 10.0, 0.5, 0.0);
        assert!((wrapped - (TAU - 0.4)).abs() < 1e-5);
    }

    #[test]
    fn state_vector_layout() {
        let config = AgentConfig {
            num_eyes: 2,
            ..AgentConfig::default()
        };
        let mut agent = agent(config, Vec2::new(50.0, 50.0));
        let wall = Wall::new(Vec2::new(60.0, 0.0), Vec2::new(60.0, 100.0));
        agent.angle = 0.0;
        agent.eyes = vec![Eye::new(0.0, 85.0), Eye::new(std::f32::consts::PI, 85.0)];
        agent.sense(&[wall], &[]);
        let state = agent.encode_state().to_vec();
        assert_eq!(state.len(), 2 * 5 + 2);
        assert!((state[0] - 10.0 / 85.0).abs() < 1e-5);
        assert_eq!(&state[1..5], &[1.0, 1.0, 0.0, 0.0]);
        assert_eq!(&state[5..10], &[1.0, 1.0, 1.0, 0.0, 0.0]);
        assert_eq!(&state[10..], &[0.0, 0.0]);
    }

    #[test]
    fn eyeless_agent_still_ticks() {
        let config = AgentConfig {
            num_eyes: 0,
            ..AgentConfig::default()
        };
        let mut agent = agent(config, Vec2::new(50.0, 50.0));
        agent.sense(&[], &[]);
        let action = agent.decide();
        assert_eq!(agent.state(), &[0.0, 0.0]);
        let _ = agent.act(action, Vec2::new(100.0, 100.0), &[]);
        let _ = agent.act(99, Vec2::new(100.0, 100.0), &[]);
        assert!(agent.fold_reward(&RewardConfig::default()).is_finite());
    }

    #[test]
    fn reward_consumes_digestion_once() {
        let mut agent = agent(AgentConfig::default(), Vec2::new(50.0, 50.0));
        agent.digest(5.0);
        let config = RewardConfig::default();
        let first = agent.fold_reward(&config);
        let second = agent.fold_reward(&config);
        assert!((first - second - 5.0).abs() < 1e-5);
        assert_eq!(agent.digestion_signal(), 0.0);
    }

    #[test]
    fn velocity_model_damps_before_integrating() {
        let config = AgentConfig {
            movement: MovementModel::Velocity,
            acceleration: 1.0,
            num_eyes: 0,
            ..AgentConfig::default()
        };
        let mut agent = agent(config, Vec2::new(50.0, 50.0));
        assert!(!agent.act(0, Vec2::new(100.0, 100.0), &[]));
        assert!((agent.motion().position().x - 50.95).abs() < 1e-5);
        assert_eq!(agent.motion().position().y, 50.0);
        assert!((agent.motion().velocity().x - 0.95).abs() < 1e-6);

        assert!(!agent.act(4, Vec2::new(100.0, 100.0), &[]));
        assert!((agent.motion().velocity().x - 0.9025).abs() < 1e-6);
        assert!((agent.motion().position().x - 51.8525).abs() < 1e-4);
    }

    #[test]
    fn invalid_options_fall_back_to_defaults() {
        let config = AgentConfig {
            radius: -1.0,
            range: f32::NAN,
            damping: 3.0,
            ..AgentConfig::default()
        }
        .sanitized();
        assert_eq!(config.radius, 10.0);
        assert_eq!(config.range, 85.0);
        assert_eq!(config.damping, 0.95);
    }
}
