#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the Learninator engine.
//!
//! This crate defines the geometry kernel and the message surface that
//! connects adapters, the authoritative world and pure systems. Adapters and
//! systems submit [`Command`] values, the world executes them through its
//! `apply` entry point and broadcasts [`Event`] values in return. Decision
//! making is delegated to implementations of the [`Brain`] capability.

pub mod geometry;

use std::fmt;

pub use glam::Vec2;
use serde::{Deserialize, Serialize};

pub use geometry::{Hit, Motion};

/// Closed set of things an eye can see or an agent can collide with.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EntityKind {
    /// Static line segment produced by the maze.
    Wall,
    /// Consumable item that rewards the agent.
    Food,
    /// Consumable item that punishes the agent.
    Poison,
    /// Another agent.
    Agent,
}

impl EntityKind {
    /// Numeric code used to index sensor blocks: wall 0, food 1, poison 2, agent 3.
    #[must_use]
    pub const fn code(self) -> usize {
        match self {
            Self::Wall => 0,
            Self::Food => 1,
            Self::Poison => 2,
            Self::Agent => 3,
        }
    }
}

/// Item flavours that the world can spawn.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ItemKind {
    /// Rewarding item ("nom").
    Food,
    /// Punishing item ("gnar").
    Poison,
}

impl ItemKind {
    /// Entity classification reported by eyes that see this item.
    #[must_use]
    pub const fn entity(self) -> EntityKind {
        match self {
            Self::Food => EntityKind::Food,
            Self::Poison => EntityKind::Poison,
        }
    }
}

/// Unique identifier assigned to an agent.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AgentId(u32);

impl AgentId {
    /// Creates a new agent identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

/// Unique identifier assigned to an item.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ItemId(u32);

impl ItemId {
    /// Creates a new item identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

/// Entity recorded in a grid cell's population index.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Occupant {
    /// An agent whose centre lies in the cell.
    Agent(AgentId),
    /// An item whose centre lies in the cell.
    Item(ItemId),
}

/// Immutable wall segment that blocks movement and sight.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Wall {
    start: Vec2,
    end: Vec2,
}

impl Wall {
    /// Creates a wall between the two endpoints.
    #[must_use]
    pub const fn new(start: Vec2, end: Vec2) -> Self {
        Self { start, end }
    }

    /// First endpoint of the segment.
    #[must_use]
    pub const fn start(&self) -> Vec2 {
        self.start
    }

    /// Second endpoint of the segment.
    #[must_use]
    pub const fn end(&self) -> Vec2 {
        self.end
    }

    /// Classification reported when an eye sees this wall.
    #[must_use]
    pub const fn kind(&self) -> EntityKind {
        EntityKind::Wall
    }

    /// Intersects the segment `from..to` with this wall.
    #[must_use]
    pub fn intersect(&self, from: Vec2, to: Vec2) -> Option<Hit> {
        geometry::line_intersect(from, to, self.start, self.end)
    }
}

/// Reports whether the segment `from..to` crosses any of the walls.
#[must_use]
pub fn crosses_any_wall(walls: &[Wall], from: Vec2, to: Vec2) -> bool {
    walls.iter().any(|wall| wall.intersect(from, to).is_some())
}

/// Variants of the pluggable decision-making capability.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BrainKind {
    /// Tabular Q-learning over a discretised state.
    #[default]
    Qlearn,
    /// Tabular on-policy SARSA over a discretised state.
    Sarsa,
    /// Temporal-difference learning with a linear value approximator.
    Td,
    /// Linear value approximator trained from an experience replay buffer.
    Dqn,
    /// Genetic search over linear policy weights.
    Ga,
}

impl fmt::Display for BrainKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Qlearn => "qlearn",
            Self::Sarsa => "sarsa",
            Self::Td => "td",
            Self::Dqn => "dqn",
            Self::Ga => "ga",
        };
        f.write_str(label)
    }
}

/// Decision-making capability an agent delegates action selection to.
///
/// The control loop treats every implementation identically: it calls
/// [`Brain::act`] once per tick with the freshly sensed state and
/// [`Brain::learn`] once per tick with the shaped reward.
pub trait Brain: fmt::Debug {
    /// Variant identifier, used for logging and persistence only.
    fn kind(&self) -> BrainKind;

    /// Chooses an action index for the provided state vector.
    fn act(&mut self, state: &[f32]) -> usize;

    /// Consumes the reward earned by the most recent action.
    fn learn(&mut self, reward: f32);

    /// Forgets any per-episode bookkeeping.
    fn reset_episode(&mut self) {}
}

/// Commands that express all permissible world mutations.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    /// Runs one simulation tick unless the world is paused.
    Tick,
    /// Sets the pause flag checked before every tick.
    SetPaused {
        /// Whether ticks should be skipped.
        paused: bool,
    },
    /// Adds a new item to the world.
    SpawnItem {
        /// Flavour of the item.
        kind: ItemKind,
        /// Centre of the new item.
        position: Vec2,
    },
    /// Flags an item for removal during the end-of-tick sweep.
    CullItem {
        /// Item to remove.
        item: ItemId,
    },
    /// Replaces the world's wall set.
    ConfigureWalls {
        /// Segments that block movement and sight.
        walls: Vec<Wall>,
    },
}

/// Events broadcast by the world after processing commands.
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    /// Indicates that the simulation clock advanced.
    TimeAdvanced {
        /// Clock value after the tick.
        clock: u64,
    },
    /// Announces that the pause flag changed.
    PauseChanged {
        /// New value of the pause flag.
        paused: bool,
    },
    /// Confirms that the wall set was replaced.
    WallsChanged {
        /// Number of walls now present.
        count: usize,
    },
    /// Reports that an agent's move was rejected by a wall.
    AgentBlocked {
        /// Agent that stayed in place.
        agent: AgentId,
    },
    /// Reports the shaped reward an agent learned from this tick.
    AgentRewarded {
        /// Agent that received the reward.
        agent: AgentId,
        /// Reward fed to the agent's brain.
        reward: f32,
    },
    /// Reports that an agent consumed an item.
    ItemConsumed {
        /// Item that was eaten.
        item: ItemId,
        /// Agent that ate it.
        agent: AgentId,
        /// Flavour of the eaten item.
        kind: ItemKind,
    },
    /// Confirms that an item was added.
    ItemSpawned {
        /// Identifier allocated to the item.
        item: ItemId,
        /// Flavour of the item.
        kind: ItemKind,
        /// Centre of the item.
        position: Vec2,
    },
    /// Confirms that an item was culled for age.
    ItemCulled {
        /// Item that was flagged for removal.
        item: ItemId,
    },
}

/// Sensor reading exposed for visualisation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EyeSnapshot {
    /// Angle of the eye relative to the agent's heading.
    pub angle: f32,
    /// Distance to the nearest hit, or the eye range when nothing was seen.
    pub proximity: f32,
    /// Classification of the nearest hit, if any.
    pub sensed: Option<EntityKind>,
}

/// Immutable representation of a single agent used for queries.
#[derive(Clone, Debug, PartialEq)]
pub struct AgentSnapshot {
    /// Unique identifier assigned to the agent.
    pub id: AgentId,
    /// Position and velocity after the last tick.
    pub motion: Motion,
    /// Heading in radians.
    pub angle: f32,
    /// Body radius.
    pub radius: f32,
    /// Readings of every eye.
    pub eyes: Vec<EyeSnapshot>,
    /// Reward learned during the last tick.
    pub last_reward: f32,
    /// Decision-making variant driving the agent.
    pub brain: BrainKind,
}

/// Read-only snapshot describing all agents.
#[derive(Clone, Debug, Default)]
pub struct AgentView {
    snapshots: Vec<AgentSnapshot>,
}

impl AgentView {
    /// Creates a new agent view from the provided snapshots.
    #[must_use]
    pub fn from_snapshots(mut snapshots: Vec<AgentSnapshot>) -> Self {
        snapshots.sort_by_key(|snapshot| snapshot.id);
        Self { snapshots }
    }

    /// Iterator over the captured agent snapshots in deterministic order.
    pub fn iter(&self) -> impl Iterator<Item = &AgentSnapshot> {
        self.snapshots.iter()
    }

    /// Consumes the view, yielding the underlying snapshots.
    #[must_use]
    pub fn into_vec(self) -> Vec<AgentSnapshot> {
        self.snapshots
    }
}

/// Immutable representation of a single item used for queries.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ItemSnapshot {
    /// Unique identifier assigned to the item.
    pub id: ItemId,
    /// Flavour of the item.
    pub kind: ItemKind,
    /// Centre of the item.
    pub position: Vec2,
    /// Radius of the item.
    pub radius: f32,
    /// Ticks since the item was spawned.
    pub age: u64,
    /// Whether the item is waiting for the end-of-tick sweep.
    pub clean_up: bool,
}

/// Read-only snapshot describing all items.
#[derive(Clone, Debug, Default)]
pub struct ItemView {
    snapshots: Vec<ItemSnapshot>,
}

impl ItemView {
    /// Creates a new item view from the provided snapshots.
    #[must_use]
    pub fn from_snapshots(mut snapshots: Vec<ItemSnapshot>) -> Self {
        snapshots.sort_by_key(|snapshot| snapshot.id);
        Self { snapshots }
    }

    /// Iterator over the captured item snapshots in deterministic order.
    pub fn iter(&self) -> impl Iterator<Item = &ItemSnapshot> {
        self.snapshots.iter()
    }

    /// Number of captured items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    /// Reports whether the view is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    /// Consumes the view, yielding the underlying snapshots.
    #[must_use]
    pub fn into_vec(self) -> Vec<ItemSnapshot> {
        self.snapshots
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{de::DeserializeOwned, Serialize};

    fn assert_round_trip<T>(value: &T)
    where
        T: Serialize + DeserializeOwned + PartialEq + std::fmt::Debug,
    {
        let bytes = bincode::serialize(value).expect("serialize");
        let restored: T = bincode::deserialize(&bytes).expect("deserialize");
        assert_eq!(&restored, value);
    }

    #[test]
    fn entity_codes_match_sensor_layout() {
        assert_eq!(EntityKind::Wall.code(), 0);
        assert_eq!(EntityKind::Food.code(), 1);
        assert_eq!(EntityKind::Poison.code(), 2);
        assert_eq!(EntityKind::Agent.code(), 3);
        assert_eq!(ItemKind::Poison.entity(), EntityKind::Poison);
    }

    #[test]
    fn wall_round_trips_through_bincode() {
        assert_round_trip(&Wall::new(Vec2::new(0.0, 1.0), Vec2::new(5.0, 1.0)));
    }

    #[test]
    fn brain_kind_round_trips_through_bincode() {
        assert_round_trip(&BrainKind::Dqn);
    }

    #[test]
    fn brain_kind_display_matches_config_names() {
        assert_eq!(BrainKind::Qlearn.to_string(), "qlearn");
        assert_eq!(BrainKind::Ga.to_string(), "ga");
    }

    #[test]
    fn crosses_any_wall_detects_blocking_segment() {
        let walls = [Wall::new(Vec2::new(0.0, 50.0), Vec2::new(100.0, 50.0))];
        assert!(crosses_any_wall(
            &walls,
            Vec2::new(10.0, 10.0),
            Vec2::new(10.0, 100.0)
        ));
        assert!(!crosses_any_wall(
            &walls,
            Vec2::new(10.0, 10.0),
            Vec2::new(10.0, 40.0)
        ));
    }

    #[test]
    fn agent_view_orders_by_identifier() {
        let snapshot = |id| AgentSnapshot {
            id: AgentId::new(id),
            motion: Motion::default(),
            angle: 0.0,
            radius: 10.0,
            eyes: Vec::new(),
            last_reward: 0.0,
            brain: BrainKind::Qlearn,
        };
        let view = AgentView::from_snapshots(vec![snapshot(3), snapshot(1)]);
        let ids: Vec<u32> = view.iter().map(|agent| agent.id.get()).collect();
        assert_eq!(ids, vec![1, 3]);
    }
}
