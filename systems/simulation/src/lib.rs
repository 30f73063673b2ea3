#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Frame-driven session that wires the world to the brain, population and
//! analytics systems.
//!
//! A [`Session`] owns the authoritative [`World`]. Each frame it issues one or
//! more `Tick` commands, hands the resulting events to the pure systems and
//! applies the commands they emit before the next tick starts.

use std::f32::consts::TAU;

use learninator_core::{AgentId, AgentSnapshot, Command, Event, ItemSnapshot, Vec2, Wall};
use learninator_maze::{Maze, MazeConfig};
use learninator_system_analytics::{Analytics, AnalyticsConfig, AnalyticsReport};
use learninator_system_brains::{build, BrainConfig, Shape};
use learninator_system_population::{Population, PopulationConfig, Terrain};
use learninator_world::{self as world, query, AgentConfig, World, WorldConfig};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

const PLACEMENT_ATTEMPTS: usize = 64;

/// Everything needed to start a session.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// World dimensions and reward shaping.
    pub world: WorldConfig,
    /// Maze to carve; an open world is used when absent.
    pub maze: Option<MazeConfig>,
    /// Options shared by every agent.
    pub agent: AgentConfig,
    /// Number of agents to register.
    pub agent_count: usize,
    /// Hyper-parameters of every brain.
    pub brain: BrainConfig,
    /// Item churn options.
    pub population: PopulationConfig,
    /// Reward statistics options.
    pub analytics: AnalyticsConfig,
    /// Ticks executed per frame.
    pub ticks_per_frame: u32,
    /// Seed from which every random stream is derived.
    pub seed: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            world: WorldConfig::default(),
            maze: None,
            agent: AgentConfig::default(),
            agent_count: 1,
            brain: BrainConfig::default(),
            population: PopulationConfig::default(),
            analytics: AnalyticsConfig::default(),
            ticks_per_frame: 1,
            seed: 0,
        }
    }
}

/// Read-only state of a session after the latest tick, for visualisation.
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    /// Ticks executed so far.
    pub clock: u64,
    /// Whether ticks are being skipped.
    pub paused: bool,
    /// Every agent with its eye readings.
    pub agents: Vec<AgentSnapshot>,
    /// Every item, including those awaiting the sweep.
    pub items: Vec<ItemSnapshot>,
    /// Walls blocking movement and sight.
    pub walls: Vec<Wall>,
    /// Centres of the maze solution cells; empty unless cheats are enabled.
    pub solution: Vec<Vec2>,
    /// Smoothed and sampled rewards.
    pub rewards: AnalyticsReport,
}

/// Running simulation.
#[derive(Debug)]
pub struct Session {
    world: World,
    population: Population,
    analytics: Analytics,
    agents: Vec<AgentId>,
    ticks_per_frame: u32,
}

impl Session {
    /// Builds the world described by `config`, carving a maze when one is configured.
    #[must_use]
    pub fn new(config: SessionConfig) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
        let world = match &config.maze {
            Some(maze) => World::with_maze(config.world.clone(), Maze::generate(maze, &mut rng)),
            None => World::new(config.world.clone()),
        };
        Self::assemble(config, world, rng)
    }

    /// Builds a session around an already carved maze.
    #[must_use]
    pub fn with_maze(config: SessionConfig, maze: Maze) -> Self {
        let rng = ChaCha8Rng::seed_from_u64(config.seed);
        let world = World::with_maze(config.world.clone(), maze);
        Self::assemble(config, world, rng)
    }

    fn assemble(config: SessionConfig, mut world: World, mut rng: ChaCha8Rng) -> Self {
        let agent_config = config.agent.clone().sanitized();
        let shape = Shape::new(agent_config.state_len(), agent_config.action_count())
            .with_sensors(agent_config.block_len(), agent_config.num_types);
        let start = query::maze(&world).and_then(|maze| maze.cell_center(maze.start()));

        let mut agents = Vec::with_capacity(config.agent_count);
        for index in 0..config.agent_count {
            let position = start.unwrap_or_else(|| open_position(&world, agent_config.radius, &mut rng));
            let angle = rng.gen_range(0.0..TAU);
            let brain = build(
                agent_config.brain_type,
                &config.brain,
                shape,
                config.seed.wrapping_add(index as u64 + 1),
                agent_config.worker,
            );
            agents.push(world.add_agent(agent_config.clone(), position, angle, brain));
        }

        let mut session = Self {
            world,
            population: Population::new(PopulationConfig {
                rng_seed: config.population.rng_seed ^ config.seed,
                ..config.population
            }),
            analytics: Analytics::new(config.analytics),
            agents,
            ticks_per_frame: config.ticks_per_frame.max(1),
        };
        session.seed_items();
        info!(
            agents = session.agents.len(),
            items = query::item_view(&session.world).len(),
            maze = query::maze(&session.world).is_some(),
            "session started"
        );
        session
    }

    /// Authoritative world.
    #[must_use]
    pub const fn world(&self) -> &World {
        &self.world
    }

    /// Maze the world was built from, if any.
    #[must_use]
    pub fn maze(&self) -> Option<&Maze> {
        query::maze(&self.world)
    }

    /// Ticks executed so far.
    #[must_use]
    pub fn clock(&self) -> u64 {
        query::clock(&self.world)
    }

    /// Reward statistics gathered so far.
    #[must_use]
    pub const fn analytics(&self) -> &Analytics {
        &self.analytics
    }

    /// Agents registered at construction, in registration order.
    #[must_use]
    pub fn agents(&self) -> &[AgentId] {
        &self.agents
    }

    /// Sets the pause flag checked before every tick.
    pub fn set_paused(&mut self, paused: bool) -> Vec<Event> {
        let mut events = Vec::new();
        world::apply(&mut self.world, Command::SetPaused { paused }, &mut events);
        events
    }

    /// Runs one frame worth of ticks and returns every event they produced.
    pub fn advance_frame(&mut self) -> Vec<Event> {
        let mut events = Vec::new();
        for _ in 0..self.ticks_per_frame {
            self.step(&mut events);
        }
        events
    }

    /// Runs a single tick followed by the systems reacting to it.
    pub fn step(&mut self, out: &mut Vec<Event>) {
        let mut events = Vec::new();
        world::apply(&mut self.world, Command::Tick, &mut events);
        if events.is_empty() {
            return;
        }

        let bounds = query::bounds(&self.world);
        let walls = query::walls(&self.world).to_vec();
        let vacant = query::vacant_cell_centers(&self.world);
        let mut commands = Vec::new();
        self.population.handle(
            &events,
            &query::item_view(&self.world),
            Terrain {
                bounds,
                walls: &walls,
                vacant_cells: &vacant,
            },
            &mut commands,
        );
        for command in commands {
            world::apply(&mut self.world, command, &mut events);
        }

        self.analytics.handle(&events);
        if let Some(Event::TimeAdvanced { clock }) = events.first() {
            if clock % 1000 == 0 {
                debug!(clock, items = query::item_view(&self.world).len(), "simulation progress");
            }
        }
        out.extend(events);
    }

    /// Replaces the wall set, e.g. after the adapter edited the layout.
    pub fn configure_walls(&mut self, walls: Vec<Wall>) -> Vec<Event> {
        let mut events = Vec::new();
        world::apply(&mut self.world, Command::ConfigureWalls { walls }, &mut events);
        events
    }

    /// Captures the state a renderer needs after the latest tick.
    #[must_use]
    pub fn frame(&self) -> Frame {
        let solution = query::maze(&self.world)
            .filter(|maze| maze.grid().cheats())
            .map(|maze| {
                maze.solution()
                    .iter()
                    .filter_map(|index| maze.cell_center(*index))
                    .collect()
            })
            .unwrap_or_default();
        Frame {
            clock: query::clock(&self.world),
            paused: query::is_paused(&self.world),
            agents: query::agent_view(&self.world).into_vec(),
            items: query::item_view(&self.world).into_vec(),
            walls: query::walls(&self.world).to_vec(),
            solution,
            rewards: self.analytics.report(),
        }
    }

    fn seed_items(&mut self) {
        let bounds = query::bounds(&self.world);
        let walls = query::walls(&self.world).to_vec();
        let vacant = query::vacant_cell_centers(&self.world);
        let mut commands = Vec::new();
        self.population.seed(
            &query::item_view(&self.world),
            Terrain {
                bounds,
                walls: &walls,
                vacant_cells: &vacant,
            },
            &mut commands,
        );
        let mut events = Vec::new();
        for command in commands {
            world::apply(&mut self.world, command, &mut events);
        }
    }
}

fn open_position(world: &World, radius: f32, rng: &mut ChaCha8Rng) -> Vec2 {
    let bounds = query::bounds(world);
    let centre = bounds * 0.5;
    if bounds.x <= 2.0 * radius || bounds.y <= 2.0 * radius {
        return centre;
    }
    for _ in 0..PLACEMENT_ATTEMPTS {
        let point = Vec2::new(
            rng.gen_range(radius..bounds.x - radius),
            rng.gen_range(radius..bounds.y - radius),
        );
        if query::is_open_position(world, point, radius) {
            return point;
        }
    }
    warn!("no open position found for an agent; using the world centre");
    centre
}
