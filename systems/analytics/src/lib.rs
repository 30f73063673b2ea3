#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Deterministic analytics system that tracks how well agents are learning.

use std::collections::{btree_map::Entry, BTreeMap, VecDeque};

use learninator_core::{AgentId, Event, ItemKind};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Configuration parameters required to construct the analytics system.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyticsConfig {
    /// Weight kept by the smoothed reward on every update.
    pub ema_decay: f32,
    /// Ticks between samples of the rolling reward series.
    pub sample_interval: u64,
    /// Most recent samples retained.
    pub max_samples: usize,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            ema_decay: 0.999,
            sample_interval: 100,
            max_samples: 1000,
        }
    }
}

impl AnalyticsConfig {
    /// Replaces out-of-range values with their defaults.
    #[must_use]
    pub fn sanitized(mut self) -> Self {
        let defaults = Self::default();
        if !(0.0..1.0).contains(&self.ema_decay) {
            warn!(field = "analytics.ema_decay", value = self.ema_decay, "invalid analytics option, using default");
            self.ema_decay = defaults.ema_decay;
        }
        if self.sample_interval == 0 {
            warn!(field = "analytics.sample_interval", "invalid analytics option, using default");
            self.sample_interval = defaults.sample_interval;
        }
        if self.max_samples == 0 {
            warn!(field = "analytics.max_samples", "invalid analytics option, using default");
            self.max_samples = defaults.max_samples;
        }
        self
    }
}

/// Reward statistics of a single agent.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AgentReward {
    /// Agent the figures belong to.
    pub agent: AgentId,
    /// Exponential moving average of the agent's rewards.
    pub smoothed: f32,
    /// Mean reward of each completed sampling window, oldest first.
    pub samples: Vec<f32>,
}

/// Read-only summary published by the analytics system.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsReport {
    /// Clock of the most recent tick observed.
    pub clock: u64,
    /// Reward statistics per agent, ordered by identifier.
    pub agents: Vec<AgentReward>,
    /// Food items eaten so far.
    pub food_eaten: u64,
    /// Poison items eaten so far.
    pub poison_eaten: u64,
}

#[derive(Debug, Default)]
struct RewardSeries {
    smoothed: f32,
    window_sum: f64,
    window_count: u64,
    samples: VecDeque<f32>,
}

impl RewardSeries {
    fn close_window(&mut self, max_samples: usize) -> Option<f32> {
        if self.window_count == 0 {
            return None;
        }
        let mean = (self.window_sum / self.window_count as f64) as f32;
        self.window_sum = 0.0;
        self.window_count = 0;
        while self.samples.len() >= max_samples {
            let _ = self.samples.pop_front();
        }
        self.samples.push_back(mean);
        Some(mean)
    }
}

/// Pure analytics system that folds world events into reward statistics.
#[derive(Debug)]
pub struct Analytics {
    config: AnalyticsConfig,
    clock: u64,
    series: BTreeMap<AgentId, RewardSeries>,
    window_due: bool,
    food_eaten: u64,
    poison_eaten: u64,
}

impl Default for Analytics {
    fn default() -> Self {
        Self::new(AnalyticsConfig::default())
    }
}

impl Analytics {
    /// Creates a new analytics system with empty statistics.
    #[must_use]
    pub fn new(config: AnalyticsConfig) -> Self {
        Self {
            config: config.sanitized(),
            clock: 0,
            series: BTreeMap::new(),
            window_due: false,
            food_eaten: 0,
            poison_eaten: 0,
        }
    }

    /// Consumes world events, updating the running statistics.
    ///
    /// Rewards follow the `TimeAdvanced` of their tick, so a sampling window
    /// closes once the events of its last tick have been folded in.
    pub fn handle(&mut self, events: &[Event]) {
        for event in events {
            match event {
                Event::AgentRewarded { agent, reward } => self.record(*agent, *reward),
                Event::ItemConsumed { kind, .. } => match kind {
                    ItemKind::Food => self.food_eaten += 1,
                    ItemKind::Poison => self.poison_eaten += 1,
                },
                Event::TimeAdvanced { clock } => {
                    self.close_due_windows();
                    self.clock = *clock;
                    self.window_due = clock % self.config.sample_interval == 0;
                }
                _ => {}
            }
        }
        self.close_due_windows();
    }

    /// Smoothed reward of `agent`, once it has been rewarded at least once.
    #[must_use]
    pub fn smoothed(&self, agent: AgentId) -> Option<f32> {
        self.series.get(&agent).map(|series| series.smoothed)
    }

    /// Completed window means of `agent`, oldest first.
    pub fn samples(&self, agent: AgentId) -> impl Iterator<Item = f32> + '_ {
        self.series
            .get(&agent)
            .into_iter()
            .flat_map(|series| series.samples.iter().copied())
    }

    /// Captures the current statistics.
    #[must_use]
    pub fn report(&self) -> AnalyticsReport {
        AnalyticsReport {
            clock: self.clock,
            agents: self
                .series
                .iter()
                .map(|(agent, series)| AgentReward {
                    agent: *agent,
                    smoothed: series.smoothed,
                    samples: series.samples.iter().copied().collect(),
                })
                .collect(),
            food_eaten: self.food_eaten,
            poison_eaten: self.poison_eaten,
        }
    }

    fn record(&mut self, agent: AgentId, reward: f32) {
        if !reward.is_finite() {
            return;
        }
        let decay = self.config.ema_decay;
        let series = match self.series.entry(agent) {
            Entry::Vacant(entry) => entry.insert(RewardSeries {
                smoothed: reward,
                ..RewardSeries::default()
            }),
            Entry::Occupied(entry) => {
                let series = entry.into_mut();
                series.smoothed = series.smoothed * decay + reward * (1.0 - decay);
                series
            }
        };
        series.window_sum += f64::from(reward);
        series.window_count += 1;
    }

    fn close_due_windows(&mut self) {
        if !self.window_due {
            return;
        }
        self.window_due = false;
        let max_samples = self.config.max_samples;
        for (agent, series) in &mut self.series {
            if let Some(mean) = series.close_window(max_samples) {
                debug!(clock = self.clock, agent = agent.get(), mean, "reward sample recorded");
            }
        }
    }
}
