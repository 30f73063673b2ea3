use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use learninator_core::{BrainKind, Event, Vec2, Wall};
use learninator_maze::MazeConfig;
use learninator_system_simulation::{Session, SessionConfig};
use learninator_world::{AgentConfig, MovementModel};

fn config(kind: BrainKind, maze: bool) -> SessionConfig {
    SessionConfig {
        maze: maze.then(MazeConfig::default),
        agent: AgentConfig {
            brain_type: kind,
            ..AgentConfig::default()
        },
        agent_count: 2,
        seed: 42,
        ..SessionConfig::default()
    }
}

fn run(config: SessionConfig, frames: usize) -> Vec<Event> {
    let mut session = Session::new(config);
    let mut log = Vec::new();
    for _ in 0..frames {
        log.extend(session.advance_frame());
    }
    log
}

fn fingerprint(events: &[Event]) -> u64 {
    let mut hasher = DefaultHasher::new();
    for event in events {
        format!("{event:?}").hash(&mut hasher);
    }
    hasher.finish()
}

#[test]
fn equal_seeds_replay_identically_for_every_brain() {
    for kind in [
        BrainKind::Qlearn,
        BrainKind::Sarsa,
        BrainKind::Td,
        BrainKind::Dqn,
        BrainKind::Ga,
    ] {
        for maze in [false, true] {
            let first = run(config(kind, maze), 300);
            let second = run(config(kind, maze), 300);
            assert_eq!(
                fingerprint(&first),
                fingerprint(&second),
                "{kind} replay diverged (maze: {maze})"
            );
            assert_eq!(first, second);
        }
    }
}

#[test]
fn different_seeds_diverge() {
    let first = run(config(BrainKind::Qlearn, false), 200);
    let second = run(
        SessionConfig {
            seed: 43,
            ..config(BrainKind::Qlearn, false)
        },
        200,
    );
    assert_ne!(first, second);
}

#[test]
fn paused_session_stands_still() {
    let mut session = Session::new(config(BrainKind::Td, false));
    let _ = session.advance_frame();
    let before = session.frame();

    assert_eq!(
        session.set_paused(true),
        vec![Event::PauseChanged { paused: true }]
    );
    for _ in 0..10 {
        assert!(session.advance_frame().is_empty());
    }
    let after = session.frame();
    assert!(after.paused);
    assert_eq!(after.clock, before.clock);
    assert_eq!(after.agents, before.agents);

    let _ = session.set_paused(false);
    let _ = session.advance_frame();
    assert_eq!(session.frame().clock, before.clock + 1);
}

#[test]
fn every_tick_rewards_every_agent_once() {
    let mut session = Session::new(config(BrainKind::Sarsa, true));
    let events = session.advance_frame();
    let rewarded = events
        .iter()
        .filter(|event| matches!(event, Event::AgentRewarded { .. }))
        .count();
    assert_eq!(rewarded, session.agents().len());
}

#[test]
fn maze_agents_never_leave_the_maze() {
    let mut session = Session::new(SessionConfig {
        agent: AgentConfig {
            movement: MovementModel::Velocity,
            ..AgentConfig::default()
        },
        ..config(BrainKind::Qlearn, true)
    });
    for _ in 0..500 {
        let _ = session.advance_frame();
        for agent in session.frame().agents {
            let position = agent.motion.position();
            assert!((0.0..=600.0).contains(&position.x), "{position:?}");
            assert!((0.0..=600.0).contains(&position.y), "{position:?}");
        }
    }
}

#[test]
fn reward_series_fills_in_over_time() {
    let mut session = Session::new(config(BrainKind::Dqn, false));
    for _ in 0..250 {
        let _ = session.advance_frame();
    }
    let rewards = session.frame().rewards;
    assert_eq!(rewards.clock, 250);
    assert_eq!(rewards.agents.len(), 2);
    for agent in &rewards.agents {
        assert_eq!(agent.samples.len(), 2);
    }
}

#[test]
fn replaced_walls_block_sight() {
    let mut session = Session::new(config(BrainKind::Td, false));
    let walls = vec![
        Wall::new(Vec2::new(0.0, 0.0), Vec2::new(600.0, 0.0)),
        Wall::new(Vec2::new(600.0, 0.0), Vec2::new(600.0, 600.0)),
    ];
    assert_eq!(
        session.configure_walls(walls.clone()),
        vec![Event::WallsChanged { count: 2 }]
    );
    assert_eq!(session.frame().walls, walls);
}

#[test]
fn worker_brains_drive_a_session() {
    let mut session = Session::new(SessionConfig {
        agent: AgentConfig {
            worker: true,
            ..AgentConfig::default()
        },
        ..config(BrainKind::Td, false)
    });
    for _ in 0..50 {
        let _ = session.advance_frame();
    }
    assert_eq!(session.frame().clock, 50);
}
