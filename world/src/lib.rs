#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Authoritative world state for the Learninator sandbox.
//!
//! The world owns walls, items and agents. Everything outside of it submits
//! [`Command`] values through [`apply`] and observes the resulting [`Event`]
//! values together with the read-only views in [`query`].

pub mod agent;
pub mod eye;
mod items;
pub mod reward;

use learninator_core::{
    crosses_any_wall, AgentId, Brain, Command, Event, ItemId, ItemKind, Occupant, Vec2, Wall,
};
use learninator_maze::Maze;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

pub use agent::{Action, Agent, AgentConfig, MovementModel};
pub use eye::{Eye, SenseTarget};
pub use reward::RewardConfig;

use items::Item;

/// Dimensions and shared constants of a world.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    /// Width of the world in world units.
    pub width: f32,
    /// Height of the world in world units.
    pub height: f32,
    /// Radius given to spawned items.
    pub item_radius: f32,
    /// Reward shaping constants applied to every agent.
    pub reward: RewardConfig,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            width: 600.0,
            height: 600.0,
            item_radius: 10.0,
            reward: RewardConfig::default(),
        }
    }
}

impl WorldConfig {
    /// Replaces non-finite or non-positive dimensions with their defaults.
    #[must_use]
    pub fn sanitized(mut self) -> Self {
        let defaults = Self::default();
        for (value, fallback, field) in [
            (&mut self.width, defaults.width, "world.width"),
            (&mut self.height, defaults.height, "world.height"),
            (&mut self.item_radius, defaults.item_radius, "world.item_radius"),
        ] {
            if !value.is_finite() || *value <= 0.0 {
                warn!(field, value = *value, fallback, "invalid world option, using default");
                *value = fallback;
            }
        }
        self
    }
}

/// Represents the authoritative Learninator world state.
#[derive(Debug)]
pub struct World {
    config: WorldConfig,
    maze: Option<Maze>,
    walls: Vec<Wall>,
    items: Vec<Item>,
    agents: Vec<Agent>,
    clock: u64,
    paused: bool,
    next_agent: u32,
    next_item: u32,
}

impl World {
    /// Creates an empty open world without walls.
    #[must_use]
    pub fn new(config: WorldConfig) -> Self {
        Self {
            config: config.sanitized(),
            maze: None,
            walls: Vec::new(),
            items: Vec::new(),
            agents: Vec::new(),
            clock: 0,
            paused: false,
            next_agent: 0,
            next_item: 0,
        }
    }

    /// Creates a world bounded by `maze`, taking its walls and dimensions.
    #[must_use]
    pub fn with_maze(config: WorldConfig, maze: Maze) -> Self {
        let config = WorldConfig {
            width: maze.grid().width(),
            height: maze.grid().height(),
            ..config
        };
        let mut world = Self::new(config);
        world.walls = maze.walls().to_vec();
        world.maze = Some(maze);
        world.reindex_population();
        world
    }

    /// Registers a new agent resting at `position`, facing `angle`.
    pub fn add_agent(
        &mut self,
        config: AgentConfig,
        position: Vec2,
        angle: f32,
        brain: Box<dyn Brain>,
    ) -> AgentId {
        let id = AgentId::new(self.next_agent);
        self.next_agent = self.next_agent.saturating_add(1);
        let position = position.clamp(Vec2::ZERO, self.bounds());
        debug!(agent = id.get(), brain = %brain.kind(), "agent registered");
        self.agents.push(Agent::new(id, config, position, angle, brain));
        self.reindex_population();
        id
    }

    fn bounds(&self) -> Vec2 {
        Vec2::new(self.config.width, self.config.height)
    }

    fn spawn_item(&mut self, kind: ItemKind, position: Vec2, out_events: &mut Vec<Event>) {
        if !position.is_finite() {
            warn!(?kind, "ignoring item spawn at non-finite position");
            return;
        }
        let id = ItemId::new(self.next_item);
        self.next_item = self.next_item.saturating_add(1);
        let position = position.clamp(Vec2::ZERO, self.bounds());
        let item = Item::new(id, kind, position, self.config.item_radius);
        if let Some(maze) = self.maze.as_mut() {
            let _ = maze.grid_mut().populate(position, Occupant::Item(id));
        }
        self.items.push(item);
        out_events.push(Event::ItemSpawned {
            item: id,
            kind,
            position,
        });
    }

    fn cull_item(&mut self, id: ItemId, out_events: &mut Vec<Event>) {
        if let Some(item) = self.items.iter_mut().find(|item| item.id() == id) {
            if item.flag() {
                out_events.push(Event::ItemCulled { item: id });
            }
        }
    }

    fn tick(&mut self, out_events: &mut Vec<Event>) {
        self.items.retain(|item| !item.is_flagged());

        self.clock = self.clock.saturating_add(1);
        out_events.push(Event::TimeAdvanced { clock: self.clock });

        for item in &mut self.items {
            item.grow_older();
        }

        let targets: Vec<SenseTarget> = self
            .items
            .iter()
            .map(Item::as_target)
            .chain(self.agents.iter().map(Agent::as_target))
            .collect();
        for agent in &mut self.agents {
            agent.sense(&self.walls, &targets);
        }

        let bounds = self.bounds();
        for agent in &mut self.agents {
            let action = agent.decide();
            if agent.act(action, bounds, &self.walls) {
                out_events.push(Event::AgentBlocked { agent: agent.id() });
            }
        }

        self.consume_items(out_events);

        for agent in &mut self.agents {
            let reward = agent.fold_reward(&self.config.reward);
            agent.learn(reward);
            out_events.push(Event::AgentRewarded {
                agent: agent.id(),
                reward,
            });
        }

        self.reindex_population();
    }

    fn consume_items(&mut self, out_events: &mut Vec<Event>) {
        let Self {
            agents,
            items,
            walls,
            config,
            ..
        } = self;
        for agent in agents.iter_mut() {
            let position = agent.motion().position();
            for item in items.iter_mut().filter(|item| !item.is_flagged()) {
                let reach = agent.radius() + item.radius();
                if position.distance(item.position()) >= reach {
                    continue;
                }
                if crosses_any_wall(walls, position, item.position()) {
                    continue;
                }
                let _ = item.flag();
                agent.digest(config.reward.digestion(item.kind()));
                debug!(
                    agent = agent.id().get(),
                    item = item.id().get(),
                    kind = ?item.kind(),
                    "item consumed"
                );
                out_events.push(Event::ItemConsumed {
                    item: item.id(),
                    agent: agent.id(),
                    kind: item.kind(),
                });
            }
        }
    }

    fn reindex_population(&mut self) {
        let Some(maze) = self.maze.as_mut() else {
            return;
        };
        let grid = maze.grid_mut();
        grid.clear_population();
        for agent in &self.agents {
            let _ = grid.populate(agent.motion().position(), Occupant::Agent(agent.id()));
        }
        for item in self.items.iter().filter(|item| !item.is_flagged()) {
            let _ = grid.populate(item.position(), Occupant::Item(item.id()));
        }
    }
}

/// Applies the provided command to the world, mutating state deterministically.
pub fn apply(world: &mut World, command: Command, out_events: &mut Vec<Event>) {
    match command {
        Command::Tick => {
            if !world.paused {
                world.tick(out_events);
            }
        }
        Command::SetPaused { paused } => {
            if world.paused != paused {
                world.paused = paused;
                out_events.push(Event::PauseChanged { paused });
            }
        }
        Command::SpawnItem { kind, position } => world.spawn_item(kind, position, out_events),
        Command::CullItem { item } => world.cull_item(item, out_events),
        Command::ConfigureWalls { walls } => {
            debug!(count = walls.len(), "walls replaced");
            world.walls = walls;
            out_events.push(Event::WallsChanged {
                count: world.walls.len(),
            });
        }
    }
}

/// Query functions that provide read-only access to the world state.
pub mod query {
    use learninator_core::{geometry, AgentId, AgentView, ItemView, Vec2, Wall};
    use learninator_maze::Maze;

    use super::{Agent, World};

    /// Width and height of the world.
    #[must_use]
    pub fn bounds(world: &World) -> Vec2 {
        world.bounds()
    }

    /// Walls currently blocking movement and sight.
    #[must_use]
    pub fn walls(world: &World) -> &[Wall] {
        &world.walls
    }

    /// Number of ticks executed so far.
    #[must_use]
    pub fn clock(world: &World) -> u64 {
        world.clock
    }

    /// Reports whether ticks are being skipped.
    #[must_use]
    pub fn is_paused(world: &World) -> bool {
        world.paused
    }

    /// Maze the world was built from, if any.
    #[must_use]
    pub fn maze(world: &World) -> Option<&Maze> {
        world.maze.as_ref()
    }

    /// Looks up a single agent.
    #[must_use]
    pub fn agent(world: &World, id: AgentId) -> Option<&Agent> {
        world.agents.iter().find(|agent| agent.id() == id)
    }

    /// Captures a read-only view of every agent.
    #[must_use]
    pub fn agent_view(world: &World) -> AgentView {
        AgentView::from_snapshots(world.agents.iter().map(Agent::snapshot).collect())
    }

    /// Captures a read-only view of every item, including those awaiting the sweep.
    #[must_use]
    pub fn item_view(world: &World) -> ItemView {
        ItemView::from_snapshots(world.items.iter().map(|item| item.snapshot()).collect())
    }

    /// Reports whether a body of `radius` centred at `point` fits inside the
    /// world without touching a wall.
    #[must_use]
    pub fn is_open_position(world: &World, point: Vec2, radius: f32) -> bool {
        let bounds = world.bounds();
        let inside = point.x >= 0.0 && point.y >= 0.0 && point.x <= bounds.x && point.y <= bounds.y;
        inside
            && world.walls.iter().all(|wall| {
                geometry::point_segment_distance(point, wall.start(), wall.end()) >= radius
            })
    }

    /// Centres of maze cells that hold neither agents nor items.
    #[must_use]
    pub fn vacant_cell_centers(world: &World) -> Vec<Vec2> {
        world
            .maze
            .as_ref()
            .map(|maze| {
                maze.grid()
                    .vacant_cells()
                    .into_iter()
                    .filter_map(|index| maze.cell_center(index))
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use learninator_core::BrainKind;

    #[derive(Debug)]
    struct Idle;

    impl Brain for Idle {
        fn kind(&self) -> BrainKind {
            BrainKind::Qlearn
        }

        fn act(&mut self, _state: &[f32]) -> usize {
            usize::MAX
        }

        fn learn(&mut self, _reward: f32) {}
    }

    #[test]
    fn paused_world_skips_ticks() {
        let mut world = World::new(WorldConfig::default());
        let mut events = Vec::new();
        apply(&mut world, Command::SetPaused { paused: true }, &mut events);
        apply(&mut world, Command::Tick, &mut events);
        assert_eq!(query::clock(&world), 0);
        assert_eq!(events, vec![Event::PauseChanged { paused: true }]);
    }

    #[test]
    fn culled_items_are_swept_on_next_tick() {
        let mut world = World::new(WorldConfig::default());
        let mut events = Vec::new();
        apply(
            &mut world,
            Command::SpawnItem {
                kind: ItemKind::Poison,
                position: Vec2::new(300.0, 300.0),
            },
            &mut events,
        );
        let item = ItemId::new(0);
        apply(&mut world, Command::CullItem { item }, &mut events);
        apply(&mut world, Command::CullItem { item }, &mut events);
        assert_eq!(
            events
                .iter()
                .filter(|event| matches!(event, Event::ItemCulled { .. }))
                .count(),
            1
        );
        assert!(query::item_view(&world).iter().all(|item| item.clean_up));
        apply(&mut world, Command::Tick, &mut events);
        assert!(query::item_view(&world).is_empty());
    }

    #[test]
    fn spawned_items_are_clamped_into_bounds() {
        let mut world = World::new(WorldConfig::default());
        let mut events = Vec::new();
        apply(
            &mut world,
            Command::SpawnItem {
                kind: ItemKind::Food,
                position: Vec2::new(-20.0, 900.0),
            },
            &mut events,
        );
        let items = query::item_view(&world).into_vec();
        assert_eq!(items[0].position, Vec2::new(0.0, 600.0));
    }

    #[test]
    fn agents_do_not_eat_through_walls() {
        let mut world = World::new(WorldConfig::default());
        let mut events = Vec::new();
        apply(
            &mut world,
            Command::ConfigureWalls {
                walls: vec![Wall::new(Vec2::new(100.0, 0.0), Vec2::new(100.0, 600.0))],
            },
            &mut events,
        );
        let agent = world.add_agent(
            AgentConfig::default(),
            Vec2::new(95.0, 300.0),
            0.0,
            Box::new(Idle),
        );
        apply(
            &mut world,
            Command::SpawnItem {
                kind: ItemKind::Food,
                position: Vec2::new(105.0, 300.0),
            },
            &mut events,
        );
        apply(&mut world, Command::Tick, &mut events);
        assert!(!events
            .iter()
            .any(|event| matches!(event, Event::ItemConsumed { .. })));
        let agent = query::agent(&world, agent).expect("agent exists");
        assert!(agent.last_reward() < 5.0);
    }

    #[test]
    fn invalid_dimensions_fall_back_to_defaults() {
        let config = WorldConfig {
            width: f32::INFINITY,
            height: -3.0,
            ..WorldConfig::default()
        }
        .sanitized();
        assert_eq!(config.width, 600.0);
        assert_eq!(config.height, 600.0);
    }
}
