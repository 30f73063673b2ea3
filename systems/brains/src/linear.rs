//! Linear action-value approximation trained online or from a replay buffer.

use std::collections::VecDeque;

use learninator_core::{Brain, BrainKind};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{argmax, epsilon_greedy, BrainConfig, BrainError, Shape};

/// One weight row per action; the last weight of each row is the bias.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub(crate) struct LinearQ {
    weights: Vec<Vec<f32>>,
}

impl LinearQ {
    pub(crate) fn random<R: Rng + ?Sized>(shape: Shape, scale: f32, rng: &mut R) -> Self {
        let weights = (0..shape.action_count)
            .map(|_| {
                (0..=shape.state_len)
                    .map(|_| {
                        if scale > 0.0 {
                            rng.gen_range(-scale..=scale)
                        } else {
                            0.0
                        }
                    })
                    .collect()
            })
            .collect();
        Self { weights }
    }

    pub(crate) fn value(&self, state: &[f32], action: usize) -> f32 {
        self.weights.get(action).map_or(0.0, |row| {
            let (bias, inputs) = row.split_last().map_or((0.0, &row[..]), |(b, w)| (*b, w));
            inputs
                .iter()
                .zip(state)
                .map(|(weight, input)| weight * finite(*input))
                .sum::<f32>()
                + bias
        })
    }

    pub(crate) fn values(&self, state: &[f32]) -> Vec<f32> {
        (0..self.weights.len())
            .map(|action| self.value(state, action))
            .collect()
    }

    pub(crate) fn best(&self, state: &[f32]) -> usize {
        argmax(&self.values(state))
    }

    /// Moves `Q(state, action)` towards `target` by one clamped gradient step.
    pub(crate) fn update(&mut self, state: &[f32], action: usize, target: f32, alpha: f32, clamp: f32) {
        let error = (target - self.value(state, action)).clamp(-clamp, clamp);
        let Some(row) = self.weights.get_mut(action) else {
            return;
        };
        let Some((bias, inputs)) = row.split_last_mut() else {
            return;
        };
        for (weight, input) in inputs.iter_mut().zip(state) {
            *weight += alpha * error * finite(*input);
        }
        *bias += alpha * error;
    }

    pub(crate) fn perturb<F: FnMut() -> f32>(&mut self, mut noise: F) {
        for weight in self.weights.iter_mut().flatten() {
            *weight += noise();
        }
    }

    pub(crate) fn check(&self, shape: Shape) -> Result<(), BrainError> {
        if self.weights.len() != shape.action_count {
            return Err(BrainError::Shape {
                expected: shape.action_count,
                found: self.weights.len(),
            });
        }
        for row in &self.weights {
            if row.len() != shape.state_len + 1 {
                return Err(BrainError::Shape {
                    expected: shape.state_len + 1,
                    found: row.len(),
                });
            }
        }
        Ok(())
    }
}

fn finite(value: f32) -> f32 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

/// How a [`LinearBrain`] consumes experience.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinearMethod {
    /// One online temporal-difference step per transition.
    Td,
    /// Online steps plus periodic minibatches drawn from a replay buffer.
    Replay,
}

#[derive(Clone, Debug, PartialEq)]
struct Transition {
    state: Vec<f32>,
    action: usize,
    reward: f32,
    next: Vec<f32>,
}

/// Brain backed by a linear approximation of the action values.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LinearBrain {
    method: LinearMethod,
    config: BrainConfig,
    shape: Shape,
    epsilon: f32,
    seed: u64,
    decisions: u64,
    q: LinearQ,
    #[serde(skip)]
    previous: Option<(Vec<f32>, usize)>,
    #[serde(skip)]
    reward: Option<f32>,
    #[serde(skip)]
    replay: VecDeque<Transition>,
    #[serde(skip, default = "unseeded")]
    rng: ChaCha8Rng,
}

fn unseeded() -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(0)
}

impl LinearBrain {
    /// Creates a brain with small random weights.
    #[must_use]
    pub fn new(method: LinearMethod, config: BrainConfig, shape: Shape, seed: u64) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let q = LinearQ::random(shape, 0.01, &mut rng);
        Self {
            method,
            epsilon: config.epsilon,
            config,
            shape,
            seed,
            decisions: 0,
            q,
            previous: None,
            reward: None,
            replay: VecDeque::new(),
            rng,
        }
    }

    /// Estimated action values for `state`.
    #[must_use]
    pub fn values(&self, state: &[f32]) -> Vec<f32> {
        self.q.values(state)
    }

    /// Transitions currently held for replay.
    #[must_use]
    pub fn replay_len(&self) -> usize {
        self.replay.len()
    }

    pub(crate) fn restore(&mut self) -> Result<(), BrainError> {
        self.q.check(self.shape)?;
        self.rng = ChaCha8Rng::seed_from_u64(self.seed ^ self.decisions);
        Ok(())
    }

    fn train(&mut self, transition: &Transition) {
        let next = self
            .q
            .values(&transition.next)
            .into_iter()
            .fold(f32::NEG_INFINITY, f32::max);
        let next = if next.is_finite() { next } else { 0.0 };
        let target = transition.reward + self.config.gamma * next;
        self.q.update(
            &transition.state,
            transition.action,
            target,
            self.config.alpha,
            self.config.td_error_clamp,
        );
    }

    fn remember(&mut self, transition: Transition) {
        if self.replay.len() >= self.config.replay_capacity {
            let _ = self.replay.pop_front();
        }
        self.replay.push_back(transition);

        if self.decisions % self.config.replay_interval != 0 {
            return;
        }
        let batch: Vec<Transition> = (0..self.config.replay_batch)
            .filter_map(|_| {
                let index = self.rng.gen_range(0..self.replay.len());
                self.replay.get(index).cloned()
            })
            .collect();
        for sample in &batch {
            self.train(sample);
        }
        debug!(
            replayed = batch.len(),
            stored = self.replay.len(),
            "replayed transitions"
        );
    }
}

impl Brain for LinearBrain {
    fn kind(&self) -> BrainKind {
        match self.method {
            LinearMethod::Td => BrainKind::Td,
            LinearMethod::Replay => BrainKind::Dqn,
        }
    }

    fn act(&mut self, state: &[f32]) -> usize {
        if self.shape.action_count == 0 {
            return 0;
        }
        self.decisions = self.decisions.wrapping_add(1);
        let values = self.q.values(state);
        let action = epsilon_greedy(&values, self.epsilon, &mut self.rng);

        if let (Some((previous, previous_action)), Some(reward)) =
            (self.previous.take(), self.reward.take())
        {
            let transition = Transition {
                state: previous,
                action: previous_action,
                reward,
                next: state.to_vec(),
            };
            self.train(&transition);
            if self.method == LinearMethod::Replay {
                self.remember(transition);
            }
        }

        self.previous = Some((state.to_vec(), action));
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
