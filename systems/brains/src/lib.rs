#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Pluggable decision-making variants for Learninator agents.
//!
//! Every variant implements [`learninator_core::Brain`], so the agent control
//! loop never branches on which one it drives. [`Learner`] groups the in-process
//! variants behind one serializable type and [`WorkerBrain`] runs any of them on
//! a background thread.

mod genetic;
mod linear;
mod tabular;
mod worker;

use learninator_core::{Brain, BrainKind};
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

pub use genetic::GeneticBrain;
pub use linear::{LinearBrain, LinearMethod};
pub use tabular::{TabularBrain, UpdateRule};
pub use worker::{Request, Response, WorkerBrain};

/// Hyper-parameters shared by every brain variant.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrainConfig {
    /// Learning rate.
    pub alpha: f32,
    /// Discount factor.
    pub gamma: f32,
    /// Initial exploration probability.
    pub epsilon: f32,
    /// Lower bound the exploration probability decays towards.
    pub min_epsilon: f32,
    /// Multiplicative exploration decay applied after every decision.
    pub epsilon_decay: f32,
    /// Buckets per state component for the tabular variants.
    pub bins: u32,
    /// Bound applied to every temporal-difference error.
    pub td_error_clamp: f32,
    /// Transitions kept by the replay buffer.
    pub replay_capacity: usize,
    /// Transitions replayed per replay round.
    pub replay_batch: usize,
    /// Decisions between replay rounds.
    pub replay_interval: u64,
    /// Candidates per generation of the genetic variant.
    pub population: usize,
    /// Ticks each genetic candidate drives the agent before it is scored.
    pub trial_ticks: u64,
    /// Standard deviation of the Gaussian weight mutation.
    pub mutation_sigma: f32,
}

impl Default for BrainConfig {
    fn default() -> Self {
        Self {
            alpha: 0.1,
            gamma: 0.9,
            epsilon: 0.2,
            min_epsilon: 0.02,
            epsilon_decay: 0.9999,
            bins: 3,
            td_error_clamp: 1.0,
            replay_capacity: 5000,
            replay_batch: 16,
            replay_interval: 25,
            population: 8,
            trial_ticks: 300,
            mutation_sigma: 0.1,
        }
    }
}

impl BrainConfig {
    /// Replaces out-of-range values with their defaults.
    #[must_use]
    pub fn sanitized(mut self) -> Self {
        let defaults = Self::default();
        let unit = |value: f32| (0.0..=1.0).contains(&value);
        check(&mut self.alpha, defaults.alpha, "brain.alpha", |v| {
            v > 0.0 && v <= 1.0
        });
        check(&mut self.gamma, defaults.gamma, "brain.gamma", |v| {
            (0.0..1.0).contains(&v)
        });
        check(&mut self.epsilon, defaults.epsilon, "brain.epsilon", unit);
        check(&mut self.min_epsilon, defaults.min_epsilon, "brain.min_epsilon", unit);
        check(
            &mut self.epsilon_decay,
            defaults.epsilon_decay,
            "brain.epsilon_decay",
            unit,
        );
        check(
            &mut self.td_error_clamp,
            defaults.td_error_clamp,
            "brain.td_error_clamp",
            |v| v > 0.0,
        );
        check(
            &mut self.mutation_sigma,
            defaults.mutation_sigma,
            "brain.mutation_sigma",
            |v| v > 0.0,
        );
        at_least(&mut self.bins, 1, defaults.bins, "brain.bins");
        at_least(&mut self.replay_capacity, 1, defaults.replay_capacity, "brain.replay_capacity");
        at_least(&mut self.replay_batch, 1, defaults.replay_batch, "brain.replay_batch");
        at_least(&mut self.replay_interval, 1, defaults.replay_interval, "brain.replay_interval");
        at_least(&mut self.population, 2, defaults.population, "brain.population");
        at_least(&mut self.trial_ticks, 1, defaults.trial_ticks, "brain.trial_ticks");
        self
    }
}

fn check(value: &mut f32, fallback: f32, field: &'static str, valid: impl Fn(f32) -> bool) {
    if !value.is_finite() || !valid(*value) {
        warn!(field, value = *value, fallback, "invalid brain option, using default");
        *value = fallback;
    }
}

fn at_least<T>(value: &mut T, minimum: T, fallback: T, field: &'static str)
where
    T: PartialOrd + Copy + std::fmt::Display,
{
    if *value < minimum {
        warn!(field, value = %value, fallback = %fallback, "invalid brain option, using default");
        *value = fallback;
    }
}

/// Size of the decision problem a brain is built for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shape {
    /// Length of the state vector passed to `act`.
    pub state_len: usize,
    /// Number of actions `act` chooses from.
    pub action_count: usize,
    /// Length of each per-eye block at the front of the state; zero when the
    /// state has no such layout.
    #[serde(default)]
    pub sensor_block: usize,
    /// Leading slots of each eye block holding sensed-type proximities.
    #[serde(default)]
    pub sensor_slots: usize,
}

impl Shape {
    /// Creates a new problem shape over a flat state vector.
    #[must_use]
    pub const fn new(state_len: usize, action_count: usize) -> Self {
        Self {
            state_len,
            action_count,
            sensor_block: 0,
            sensor_slots: 0,
        }
    }

    /// Declares that the state starts with eye blocks of `block` values whose
    /// first `slots` entries are per-type proximities.
    #[must_use]
    pub const fn with_sensors(self, block: usize, slots: usize) -> Self {
        Self {
            sensor_block: block,
            sensor_slots: slots,
            ..self
        }
    }

    pub(crate) const fn has_sensors(&self) -> bool {
        self.sensor_block > 0 && self.sensor_slots > 0 && self.sensor_slots <= self.sensor_block
    }
}

/// Errors raised while persisting or restoring brain state.
#[derive(Debug, Error)]
pub enum BrainError {
    /// The brain state could not be encoded as JSON.
    #[error("failed to encode brain state")]
    Encode(#[source] serde_json::Error),
    /// The payload is not a valid brain state.
    #[error("failed to decode brain state")]
    Decode(#[source] serde_json::Error),
    /// The payload decoded but its tables or weights have inconsistent sizes.
    #[error("brain state holds {found} values where {expected} were expected")]
    Shape {
        /// Size implied by the recorded problem shape.
        expected: usize,
        /// Size actually stored.
        found: usize,
    },
}

/// In-process brain variants behind a single serializable type.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Learner {
    /// Q-learning or SARSA over a discretised state.
    Tabular(TabularBrain),
    /// TD or replayed updates of a linear value approximator.
    Linear(LinearBrain),
    /// Genetic search over linear policies.
    Genetic(GeneticBrain),
}

impl Learner {
    /// Creates a fresh brain of `kind` for a problem of `shape`.
    #[must_use]
    pub fn new(kind: BrainKind, config: &BrainConfig, shape: Shape, seed: u64) -> Self {
        let config = config.clone().sanitized();
        match kind {
            BrainKind::Qlearn => {
                Self::Tabular(TabularBrain::new(UpdateRule::QLearning, config, shape, seed))
            }
            BrainKind::Sarsa => Self::Tabular(TabularBrain::new(UpdateRule::Sarsa, config, shape, seed)),
            BrainKind::Td => Self::Linear(LinearBrain::new(LinearMethod::Td, config, shape, seed)),
            BrainKind::Dqn => Self::Linear(LinearBrain::new(LinearMethod::Replay, config, shape, seed)),
            BrainKind::Ga => Self::Genetic(GeneticBrain::new(config, shape, seed)),
        }
    }

    /// Serializes the learned state to JSON.
    pub fn save(&self) -> Result<String, BrainError> {
        serde_json::to_string(self).map_err(BrainError::Encode)
    }

    /// Restores a brain previously written by [`Learner::save`].
    ///
    /// Per-episode bookkeeping is not persisted; the restored brain starts a
    /// new episode.
    pub fn load(json: &str) -> Result<Self, BrainError> {
        let value = serde_json::from_str(json).map_err(BrainError::Decode)?;
        Self::from_value(value)
    }

    pub(crate) fn from_value(value: serde_json::Value) -> Result<Self, BrainError> {
        let mut learner: Self = serde_json::from_value(value).map_err(BrainError::Decode)?;
        match &mut learner {
            Self::Tabular(brain) => brain.restore()?,
            Self::Linear(brain) => brain.restore()?,
            Self::Genetic(brain) => brain.restore()?,
        }
        debug!(kind = %learner.kind(), "brain state restored");
        Ok(learner)
    }

    fn inner(&self) -> &dyn Brain {
        match self {
            Self::Tabular(brain) => brain,
            Self::Linear(brain) => brain,
            Self::Genetic(brain) => brain,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn Brain {
        match self {
            Self::Tabular(brain) => brain,
            Self::Linear(brain) => brain,
            Self::Genetic(brain) => brain,
        }
    }
}

impl Brain for Learner {
    fn kind(&self) -> BrainKind {
        self.inner().kind()
    }

    fn act(&mut self, state: &[f32]) -> usize {
        self.inner_mut().act(state)
    }

    fn learn(&mut self, reward: f32) {
        self.inner_mut().learn(reward);
    }

    fn reset_episode(&mut self) {
        self.inner_mut().reset_episode();
    }
}

/// Builds a brain of `kind`, optionally hosted on a worker thread.
#[must_use]
pub fn build(
    kind: BrainKind,
    config: &BrainConfig,
    shape: Shape,
    seed: u64,
    worker: bool,
) -> Box<dyn Brain> {
    let learner = Learner::new(kind, config, shape, seed);
    if worker {
        Box::new(WorkerBrain::spawn(learner))
    } else {
        Box::new(learner)
    }
}

/// Index of the largest value; the first one wins ties.
pub(crate) fn argmax(values: &[f32]) -> usize {
    let mut best = 0;
    for (index, value) in values.iter().enumerate() {
        if *value > values[best] {
            best = index;
        }
    }
    best
}

/// Explores with probability `epsilon`, otherwise exploits.
pub(crate) fn epsilon_greedy<R: Rng + ?Sized>(values: &[f32], epsilon: f32, rng: &mut R) -> usize {
    if values.is_empty() {
        return 0;
    }
    if rng.gen::<f32>() < epsilon {
        rng.gen_range(0..values.len())
    } else {
        argmax(values)
    }
}
