#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Deterministic item churn: culls old items and keeps the population topped up.

use learninator_core::{geometry, Command, Event, ItemKind, ItemView, Vec2, Wall};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

const PLACEMENT_ATTEMPTS: usize = 32;

/// Configuration parameters required to construct the population system.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PopulationConfig {
    /// Number of live items the system tries to maintain.
    pub target_count: usize,
    /// Ticks between cull checks.
    pub cull_interval: u64,
    /// Age in ticks after which an item becomes eligible for culling.
    pub cull_age: u64,
    /// Probability that an eligible item is culled at a check.
    pub cull_chance: f32,
    /// Ticks between spawn checks.
    pub spawn_interval: u64,
    /// Probability that a spawn check adds an item.
    pub spawn_chance: f32,
    /// Probability that a spawned item is food rather than poison.
    pub food_ratio: f32,
    /// Radius used when testing candidate positions against walls.
    pub item_radius: f32,
    /// Seed of the system's random number generator.
    pub rng_seed: u64,
}

impl Default for PopulationConfig {
    fn default() -> Self {
        Self {
            target_count: 30,
            cull_interval: 100,
            cull_age: 5000,
            cull_chance: 0.1,
            spawn_interval: 10,
            spawn_chance: 0.25,
            food_ratio: 0.5,
            item_radius: 10.0,
            rng_seed: 0,
        }
    }
}

impl PopulationConfig {
    /// Creates a default configuration driven by the provided seed.
    #[must_use]
    pub fn new(rng_seed: u64) -> Self {
        Self {
            rng_seed,
            ..Self::default()
        }
    }

    /// Replaces out-of-range values with their defaults.
    #[must_use]
    pub fn sanitized(mut self) -> Self {
        let defaults = Self::default();
        if self.cull_interval == 0 {
            warn!(field = "population.cull_interval", fallback = defaults.cull_interval, "invalid population option, using default");
            self.cull_interval = defaults.cull_interval;
        }
        if self.spawn_interval == 0 {
            warn!(field = "population.spawn_interval", fallback = defaults.spawn_interval, "invalid population option, using default");
            self.spawn_interval = defaults.spawn_interval;
        }
        for (field, value, fallback) in [
            ("population.cull_chance", &mut self.cull_chance, defaults.cull_chance),
            ("population.spawn_chance", &mut self.spawn_chance, defaults.spawn_chance),
            ("population.food_ratio", &mut self.food_ratio, defaults.food_ratio),
        ] {
            if !(0.0..=1.0).contains(&*value) {
                warn!(field, value = *value, fallback, "invalid population option, using default");
                *value = fallback;
            }
        }
        if !self.item_radius.is_finite() || self.item_radius <= 0.0 {
            warn!(field = "population.item_radius", value = self.item_radius, "invalid population option, using default");
            self.item_radius = defaults.item_radius;
        }
        self
    }
}

/// Where new items may be placed.
#[derive(Clone, Copy, Debug)]
pub struct Terrain<'a> {
    /// Width and height of the world.
    pub bounds: Vec2,
    /// Walls a new item must keep clear of.
    pub walls: &'a [Wall],
    /// Centres of maze cells holding neither agents nor items; empty in open worlds.
    pub vacant_cells: &'a [Vec2],
}

/// Pure system that emits cull and spawn commands as the clock advances.
#[derive(Debug)]
pub struct Population {
    config: PopulationConfig,
    rng: ChaCha8Rng,
}

impl Population {
    /// Creates a new population system using the supplied configuration.
    #[must_use]
    pub fn new(config: PopulationConfig) -> Self {
        let config = config.sanitized();
        Self {
            rng: ChaCha8Rng::seed_from_u64(config.rng_seed),
            config,
        }
    }

    /// Configuration the system runs with.
    #[must_use]
    pub const fn config(&self) -> &PopulationConfig {
        &self.config
    }

    /// Emits spawn commands until the live population reaches the target.
    pub fn seed(&mut self, items: &ItemView, terrain: Terrain<'_>, out: &mut Vec<Command>) {
        let live = live_count(items);
        let mut taken = Vec::new();
        for _ in live..self.config.target_count {
            if let Some(command) = self.spawn(terrain, &mut taken) {
                out.push(command);
            }
        }
        debug!(live, requested = taken.len(), "initial items requested");
    }

    /// Consumes events and immutable views to emit cull and spawn commands.
    pub fn handle(
        &mut self,
        events: &[Event],
        items: &ItemView,
        terrain: Terrain<'_>,
        out: &mut Vec<Command>,
    ) {
        for event in events {
            let Event::TimeAdvanced { clock } = event else {
                continue;
            };
            let mut culled = 0;
            if clock % self.config.cull_interval == 0 {
                culled = self.cull(items, out);
            }
            if clock % self.config.spawn_interval == 0
                && live_count(items).saturating_sub(culled) < self.config.target_count
                && self.rng.gen::<f32>() < self.config.spawn_chance
            {
                if let Some(command) = self.spawn(terrain, &mut Vec::new()) {
                    out.push(command);
                }
            }
        }
    }

    fn cull(&mut self, items: &ItemView, out: &mut Vec<Command>) -> usize {
        let mut culled = 0;
        for item in items.iter().filter(|item| !item.clean_up) {
            if item.age > self.config.cull_age && self.rng.gen::<f32>() < self.config.cull_chance {
                out.push(Command::CullItem { item: item.id });
                culled += 1;
            }
        }
        culled
    }

    fn spawn(&mut self, terrain: Terrain<'_>, taken: &mut Vec<Vec2>) -> Option<Command> {
        let kind = if self.rng.gen::<f32>() < self.config.food_ratio {
            ItemKind::Food
        } else {
            ItemKind::Poison
        };
        let position = self.place(terrain, taken)?;
        taken.push(position);
        Some(Command::SpawnItem { kind, position })
    }

    fn place(&mut self, terrain: Terrain<'_>, taken: &[Vec2]) -> Option<Vec2> {
        let free: Vec<Vec2> = terrain
            .vacant_cells
            .iter()
            .copied()
            .filter(|cell| !taken.contains(cell))
            .collect();
        if !free.is_empty() {
            return Some(free[self.rng.gen_range(0..free.len())]);
        }

        let radius = self.config.item_radius;
        if terrain.bounds.x <= 2.0 * radius || terrain.bounds.y <= 2.0 * radius {
            return None;
        }
        for _ in 0..PLACEMENT_ATTEMPTS {
            let point = Vec2::new(
                self.rng.gen_range(radius..terrain.bounds.x - radius),
                self.rng.gen_range(radius..terrain.bounds.y - radius),
            );
            if clear_of_walls(terrain.walls, point, radius) {
                return Some(point);
            }
        }
        debug!("no open position found for a new item");
        None
    }
}

fn live_count(items: &ItemView) -> usize {
    items.iter().filter(|item| !item.clean_up).count()
}

fn clear_of_walls(walls: &[Wall], point: Vec2, radius: f32) -> bool {
    walls
        .iter()
        .all(|wall| geometry::point_segment_distance(point, wall.start(), wall.end()) >= radius)
}

#[cfg(test)]
mod tests {
    use super::*;
    use learninator_core::{ItemId, ItemSnapshot};

    fn item(id: u32, age: u64) -> ItemSnapshot {
        ItemSnapshot {
            id: ItemId::new(id),
            kind: ItemKind::Food,
            position: Vec2::new(50.0, 50.0),
            radius: 10.0,
            age,
            clean_up: false,
        }
    }

    fn open(bounds: Vec2) -> Terrain<'static> {
        Terrain {
            bounds,
            walls: &[],
            vacant_cells: &[],
        }
    }

    #[test]
    fn seed_fills_up_to_target() {
        let mut population = Population::new(PopulationConfig {
            target_count: 5,
            ..PopulationConfig::new(3)
        });
        let items = ItemView::from_snapshots(vec![item(0, 0), item(1, 0)]);
        let mut out = Vec::new();
        population.seed(&items, open(Vec2::new(600.0, 600.0)), &mut out);
        assert_eq!(out.len(), 3);
        assert!(out
            .iter()
            .all(|command| matches!(command, Command::SpawnItem { .. })));
    }

    #[test]
    fn old_items_are_culled_on_cull_ticks_only() {
        let mut population = Population::new(PopulationConfig {
            cull_chance: 1.0,
            spawn_chance: 0.0,
            ..PopulationConfig::new(1)
        });
        let items = ItemView::from_snapshots(vec![item(0, 6000), item(1, 10)]);
        let terrain = open(Vec2::new(600.0, 600.0));

        let mut out = Vec::new();
        population.handle(&[Event::TimeAdvanced { clock: 99 }], &items, terrain, &mut out);
        assert!(out.is_empty());

        population.handle(&[Event::TimeAdvanced { clock: 100 }], &items, terrain, &mut out);
        assert_eq!(
            out,
            vec![Command::CullItem {
                item: ItemId::new(0)
            }]
        );
    }

    #[test]
    fn full_population_spawns_nothing() {
        let mut population = Population::new(PopulationConfig {
            target_count: 2,
            spawn_chance: 1.0,
            ..PopulationConfig::new(1)
        });
        let items = ItemView::from_snapshots(vec![item(0, 0), item(1, 0)]);
        let mut out = Vec::new();
        population.handle(
            &[Event::TimeAdvanced { clock: 10 }],
            &items,
            open(Vec2::new(600.0, 600.0)),
            &mut out,
        );
        assert!(out.is_empty());
    }

    #[test]
    fn vacant_cells_are_preferred() {
        let cells = [Vec2::new(150.0, 250.0)];
        let mut population = Population::new(PopulationConfig {
            target_count: 1,
            ..PopulationConfig::new(9)
        });
        let mut out = Vec::new();
        population.seed(
            &ItemView::default(),
            Terrain {
                bounds: Vec2::new(600.0, 600.0),
                walls: &[],
                vacant_cells: &cells,
            },
            &mut out,
        );
        assert!(matches!(
            out.as_slice(),
            [Command::SpawnItem { position, .. }] if *position == cells[0]
        ));
    }

    #[test]
    fn placements_keep_clear_of_walls() {
        let walls = [Wall::new(Vec2::new(0.0, 50.0), Vec2::new(100.0, 50.0))];
        let mut population = Population::new(PopulationConfig {
            target_count: 20,
            ..PopulationConfig::new(4)
        });
        let mut out = Vec::new();
        population.seed(
            &ItemView::default(),
            Terrain {
                bounds: Vec2::new(100.0, 100.0),
                walls: &walls,
                vacant_cells: &[],
            },
            &mut out,
        );
        assert!(!out.is_empty());
        for command in &out {
            let Command::SpawnItem { position, .. } = command else {
                panic!("unexpected command {command:?}");
            };
            assert!((position.y - 50.0).abs() >= 10.0);
        }
    }

    #[test]
    fn tiny_world_has_no_room() {
        let mut population = Population::new(PopulationConfig::new(1));
        let mut out = Vec::new();
        population.seed(&ItemView::default(), open(Vec2::new(10.0, 10.0)), &mut out);
        assert!(out.is_empty());
    }

    #[test]
    fn invalid_options_fall_back_to_defaults() {
        let config = PopulationConfig {
            cull_interval: 0,
            spawn_chance: 4.0,
            item_radius: -1.0,
            ..PopulationConfig::default()
        }
        .sanitized();
        let defaults = PopulationConfig::default();
        assert_eq!(config.cull_interval, defaults.cull_interval);
        assert_eq!(config.spawn_chance, defaults.spawn_chance);
        assert_eq!(config.item_radius, defaults.item_radius);
    }
}
