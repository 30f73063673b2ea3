use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use learninator_core::{Command, Event};
use learninator_maze::{Maze, MazeConfig};
use learninator_system_population::{Population, PopulationConfig, Terrain};
use learninator_world::{self as world, query, World, WorldConfig};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

fn maze_world(seed: u64) -> World {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let maze = Maze::generate(&MazeConfig::default(), &mut rng);
    World::with_maze(WorldConfig::default(), maze)
}

fn seed_items(world: &mut World, population: &mut Population) {
    let bounds = query::bounds(world);
    let walls = query::walls(world).to_vec();
    let vacant = query::vacant_cell_centers(world);
    let mut commands = Vec::new();
    population.seed(
        &query::item_view(world),
        Terrain {
            bounds,
            walls: &walls,
            vacant_cells: &vacant,
        },
        &mut commands,
    );
    let mut events = Vec::new();
    for command in commands {
        world::apply(world, command, &mut events);
    }
}

fn step(world: &mut World, population: &mut Population, log: &mut Vec<Event>) {
    let mut events = Vec::new();
    world::apply(world, Command::Tick, &mut events);

    let bounds = query::bounds(world);
    let walls = query::walls(world).to_vec();
    let vacant = query::vacant_cell_centers(world);
    let mut commands = Vec::new();
    population.handle(
        &events,
        &query::item_view(world),
        Terrain {
            bounds,
            walls: &walls,
            vacant_cells: &vacant,
        },
        &mut commands,
    );
    for command in commands {
        world::apply(world, command, &mut events);
    }
    log.extend(events);
}

fn fingerprint(events: &[Event]) -> u64 {
    let mut hasher = DefaultHasher::new();
    for event in events {
        format!("{event:?}").hash(&mut hasher);
    }
    hasher.finish()
}

#[test]
fn seeding_places_one_item_per_vacant_cell() {
    let mut world = maze_world(7);
    let mut population = Population::new(PopulationConfig {
        target_count: 30,
        ..PopulationConfig::new(11)
    });
    seed_items(&mut world, &mut population);

    let items = query::item_view(&world);
    assert_eq!(items.len(), 30);
    let mut positions: Vec<(i64, i64)> = items
        .iter()
        .map(|item| (item.position.x as i64, item.position.y as i64))
        .collect();
    positions.sort_unstable();
    positions.dedup();
    assert_eq!(positions.len(), 30);
    for item in items.iter() {
        assert!(query::is_open_position(&world, item.position, item.radius));
    }
}

#[test]
fn population_recovers_after_items_are_culled() {
    let mut world = maze_world(3);
    let mut population = Population::new(PopulationConfig {
        target_count: 10,
        cull_age: 50,
        cull_chance: 1.0,
        spawn_chance: 1.0,
        ..PopulationConfig::new(5)
    });
    seed_items(&mut world, &mut population);

    let mut log = Vec::new();
    for _ in 0..100 {
        step(&mut world, &mut population, &mut log);
    }
    let culled = log
        .iter()
        .filter(|event| matches!(event, Event::ItemCulled { .. }))
        .count();
    assert_eq!(culled, 10);

    for _ in 0..90 {
        step(&mut world, &mut population, &mut log);
    }
    let live = query::item_view(&world)
        .iter()
        .filter(|item| !item.clean_up)
        .count();
    assert_eq!(live, 10);
}

#[test]
fn equal_seeds_replay_identically() {
    let run = || {
        let mut world = maze_world(21);
        let mut population = Population::new(PopulationConfig {
            target_count: 12,
            cull_age: 30,
            ..PopulationConfig::new(8)
        });
        seed_items(&mut world, &mut population);
        let mut log = Vec::new();
        for _ in 0..400 {
            step(&mut world, &mut population, &mut log);
        }
        log
    };

    let first = run();
    let second = run();
    assert_eq!(first, second);
    assert_eq!(fingerprint(&first), fingerprint(&second));
}
