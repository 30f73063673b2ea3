//! Generational search over linear policies.

use learninator_core::{Brain, BrainKind};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{linear::LinearQ, BrainConfig, BrainError, Shape};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
struct Candidate {
    policy: LinearQ,
    fitness: f32,
}

/// Genetic brain.
///
/// Each candidate drives the agent greedily for `trial_ticks` ticks while its
/// rewards accumulate into a fitness score. Once every candidate has had its
/// trial, the fitter half survives and the rest is replaced by mutated copies
/// of the survivors.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GeneticBrain {
    config: BrainConfig,
    shape: Shape,
    seed: u64,
    generation: u64,
    current: usize,
    trial_elapsed: u64,
    population: Vec<Candidate>,
    #[serde(skip, default = "unseeded")]
    rng: ChaCha8Rng,
}

fn unseeded() -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(0)
}

impl GeneticBrain {
    /// Creates a randomly initialised population.
    #[must_use]
    pub fn new(config: BrainConfig, shape: Shape, seed: u64) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let population = (0..config.population.max(1))
            .map(|_| Candidate {
                policy: LinearQ::random(shape, 1.0, &mut rng),
                fitness: 0.0,
            })
            .collect();
        Self {
            config,
            shape,
            seed,
            generation: 0,
            current: 0,
            trial_elapsed: 0,
            population,
            rng,
        }
    }

    /// Number of completed generations.
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// Index of the candidate currently on trial.
    #[must_use]
    pub const fn current(&self) -> usize {
        self.current
    }

    /// Fitness accumulated so far by every candidate of this generation.
    #[must_use]
    pub fn fitness(&self) -> Vec<f32> {
        self.population
            .iter()
            .map(|candidate| candidate.fitness)
            .collect()
    }

    pub(crate) fn restore(&mut self) -> Result<(), BrainError> {
        if self.population.is_empty() {
            return Err(BrainError::Shape {
                expected: self.config.population,
                found: 0,
            });
        }
        for candidate in &self.population {
            candidate.policy.check(self.shape)?;
        }
        if self.current >= self.population.len() {
            self.current = 0;
        }
        self.rng = ChaCha8Rng::seed_from_u64(self.seed ^ self.generation);
        Ok(())
    }

    fn advance(&mut self) {
        self.trial_elapsed = 0;
        self.current += 1;
        if self.current >= self.population.len() {
            self.evolve();
            self.current = 0;
        }
    }

    fn evolve(&mut self) {
        self.population.sort_by(|a, b| b.fitness.total_cmp(&a.fitness));
        let best = self.population.first().map_or(0.0, |c| c.fitness);
        let survivors = (self.population.len() / 2).max(1);

        match Normal::new(0.0, self.config.mutation_sigma) {
            Ok(noise) => {
                for index in survivors..self.population.len() {
                    let mut policy = self.population[(index - survivors) % survivors]
                        .policy
                        .clone();
                    policy.perturb(|| noise.sample(&mut self.rng));
                    self.population[index].policy = policy;
                }
            }
            Err(error) => warn!(%error, "mutation disabled for this generation"),
        }

        for candidate in &mut self.population {
            candidate.fitness = 0.0;
        }
        self.generation += 1;
        debug!(generation = self.generation, best, "population evolved");
    }
}

impl Brain for GeneticBrain {
    fn kind(&self) -> BrainKind {
        BrainKind::Ga
    }

    fn act(&mut self, state: &[f32]) -> usize {
        self.population
            .get(self.current)
            .map_or(0, |candidate| candidate.policy.best(state))
    }

    fn learn(&mut self, reward: f32) {
        if !reward.is_finite() {
            return;
        }
        if let Some(candidate) = self.population.get_mut(self.current) {
            candidate.fitness += reward;
        }
        self.trial_elapsed += 1;
        if self.trial_elapsed >= self.config.trial_ticks {
            self.advance();
        }
    }

    fn reset_episode(&mut self) {
        if self.trial_elapsed > 0 {
            self.advance();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn short_trials() -> BrainConfig {
        BrainConfig {
            population: 4,
            trial_ticks: 2,
            ..BrainConfig::default()
        }
    }

    #[test]
    fn candidates_take_turns() {
        let mut brain = GeneticBrain::new(short_trials(), Shape::new(2, 3), 11);
        assert_eq!(brain.current(), 0);
        brain.learn(1.0);
        brain.learn(1.0);
        assert_eq!(brain.current(), 1);
        assert_eq!(brain.fitness()[0], 2.0);
    }

    #[test]
    fn full_round_starts_next_generation() {
        let mut brain = GeneticBrain::new(short_trials(), Shape::new(2, 3), 11);
        for trial in 0..4 {
            brain.learn(trial as f32);
            brain.learn(trial as f32);
        }
        assert_eq!(brain.generation(), 1);
        assert_eq!(brain.current(), 0);
        assert!(brain.fitness().iter().all(|fitness| *fitness == 0.0));
    }

    #[test]
    fn fittest_candidate_survives_unchanged() {
        let mut brain = GeneticBrain::new(short_trials(), Shape::new(2, 3), 11);
        let champion = brain.population[2].policy.clone();
        for trial in 0..4 {
            let reward = if trial == 2 { 10.0 } else { -1.0 };
            brain.learn(reward);
            brain.learn(reward);
        }
        assert_eq!(brain.population[0].policy, champion);
    }

    #[test]
    fn actions_stay_in_range() {
        let mut brain = GeneticBrain::new(short_trials(), Shape::new(3, 5), 2);
        for step in 0..40 {
            let state = [step as f32 * 0.1, -0.5, 1.0];
            assert!(brain.act(&state) < 5);
            brain.learn(0.1);
        }
    }
}
