//! Tabular temporal-difference control over a discretised state.

use std::collections::BTreeMap;

use learninator_core::{Brain, BrainKind};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::{argmax, epsilon_greedy, BrainConfig, BrainError, Shape};

const KEY_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const KEY_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Bootstrapping rule used for the temporal-difference target.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateRule {
    /// Off-policy: bootstraps from the best next action.
    QLearning,
    /// On-policy: bootstraps from the next action actually taken.
    Sarsa,
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct Step {
    key: u64,
    action: usize,
}

/// Q-table brain.
///
/// Updates are delayed by one decision: the reward handed to `learn` is
/// credited once the following state and action are known.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TabularBrain {
    rule: UpdateRule,
    config: BrainConfig,
    shape: Shape,
    epsilon: f32,
    seed: u64,
    table: BTreeMap<u64, Vec<f32>>,
    #[serde(skip)]
    previous: Option<Step>,
    #[serde(skip)]
    reward: Option<f32>,
    #[serde(skip, default = "unseeded")]
    rng: ChaCha8Rng,
}

fn unseeded() -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(0)
}

impl TabularBrain {
    /// Creates an empty table.
    #[must_use]
    pub fn new(rule: UpdateRule, config: BrainConfig, shape: Shape, seed: u64) -> Self {
        Self {
            rule,
            epsilon: config.epsilon,
            config,
            shape,
            seed,
            table: BTreeMap::new(),
            previous: None,
            reward: None,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Number of distinct discretised states seen so far.
    #[must_use]
    pub fn visited_states(&self) -> usize {
        self.table.len()
    }

    /// Current exploration probability.
    #[must_use]
    pub const fn epsilon(&self) -> f32 {
        self.epsilon
    }

    /// Stored action values for `state`, if it was ever visited.
    #[must_use]
    pub fn values(&self, state: &[f32]) -> Option<&[f32]> {
        self.table
            .get(&state_key(state, self.config.bins, self.shape))
            .map(Vec::as_slice)
    }

    pub(crate) fn restore(&mut self) -> Result<(), BrainError> {
        for row in self.table.values() {
            if row.len() != self.shape.action_count {
                return Err(BrainError::Shape {
                    expected: self.shape.action_count,
                    found: row.len(),
                });
            }
        }
        self.rng = ChaCha8Rng::seed_from_u64(self.seed);
        Ok(())
    }

    fn row(&mut self, key: u64) -> &mut Vec<f32> {
        let actions = self.shape.action_count;
        self.table.entry(key).or_insert_with(|| vec![0.0; actions])
    }

    fn update(&mut self, from: Step, reward: f32, to: Step) {
        let next = match self.rule {
            UpdateRule::QLearning => {
                let row = &*self.row(to.key);
                row.get(argmax(row)).copied().unwrap_or(0.0)
            }
            UpdateRule::Sarsa => self.row(to.key).get(to.action).copied().unwrap_or(0.0),
        };
        let target = reward + self.config.gamma * next;
        let alpha = self.config.alpha;
        let clamp = self.config.td_error_clamp;
        if let Some(value) = self.row(from.key).get_mut(from.action) {
            let error = (target - *value).clamp(-clamp, clamp);
            *value += alpha * error;
        }
    }
}

impl Brain for TabularBrain {
    fn kind(&self) -> BrainKind {
        match self.rule {
            UpdateRule::QLearning => BrainKind::Qlearn,
            UpdateRule::Sarsa => BrainKind::Sarsa,
        }
    }

    fn act(&mut self, state: &[f32]) -> usize {
        if self.shape.action_count == 0 {
            return 0;
        }
        let key = state_key(state, self.config.bins, self.shape);
        let epsilon = self.epsilon;
        let values = self.row(key).clone();
        let action = epsilon_greedy(&values, epsilon, &mut self.rng);
        let step = Step { key, action };

        if let (Some(previous), Some(reward)) = (self.previous, self.reward.take()) {
            self.update(previous, reward, step);
        }
        self.previous = Some(step);
        self.epsilon = (self.epsilon * self.config.epsilon_decay).max(self.config.min_epsilon);
        action
    }

    fn learn(&mut self, reward: f32) {
        if reward.is_finite() {
            self.reward = Some(reward);
        }
    }

    fn reset_episode(&mut self) {
        self.previous = None;
        self.reward = None;
    }
}

/// Maps a state onto a table key.
///
/// With a sensor layout only the nearest sensed type of each eye and its
/// bucketed proximity enter the key; sensed and own velocities are ignored.
/// Without one every component is bucketed.
pub(crate) fn state_key(state: &[f32], bins: u32, shape: Shape) -> u64 {
    if !shape.has_sensors() {
        return discretize(state, bins);
    }
    let bins = bins.max(1);
    state
        .chunks_exact(shape.sensor_block)
        .fold(KEY_OFFSET, |key, block| {
            let nearest = block[..shape.sensor_slots]
                .iter()
                .enumerate()
                .filter(|(_, value)| value.is_finite() && **value < 1.0)
                .min_by(|a, b| a.1.total_cmp(b.1));
            let code = match nearest {
                Some((slot, proximity)) => {
                    let bucket = ((proximity.max(0.0) * bins as f32) as u64).min(u64::from(bins - 1));
                    1 + slot as u64 * u64::from(bins) + bucket
                }
                None => 0,
            };
            (key ^ code).wrapping_mul(KEY_PRIME)
        })
}

/// Maps a continuous state onto a table key by bucketing every component.
pub(crate) fn discretize(state: &[f32], bins: u32) -> u64 {
    let bins = bins.max(1);
    state.iter().fold(KEY_OFFSET, |key, value| {
        let unit = if value.is_finite() {
            (value.clamp(-1.0, 1.0) + 1.0) / 2.0
        } else {
            0.5
        };
        let bucket = ((unit * bins as f32) as u64).min(u64::from(bins - 1));
        (key ^ bucket).wrapping_mul(KEY_PRIME)
    })
}
