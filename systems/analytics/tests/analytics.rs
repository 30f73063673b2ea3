use learninator_core::{AgentId, Brain, BrainKind, Command, Event, ItemKind, Vec2};
use learninator_system_analytics::{Analytics, AnalyticsConfig};
use learninator_world::{self as world, AgentConfig, World, WorldConfig};

#[derive(Debug)]
struct Idle;

impl Brain for Idle {
    fn kind(&self) -> BrainKind {
        BrainKind::Td
    }

    fn act(&mut self, _state: &[f32]) -> usize {
        usize::MAX
    }

    fn learn(&mut self, _reward: f32) {}
}

#[test]
fn meal_shows_up_in_the_report() {
    let mut world = World::new(WorldConfig::default());
    let mut events = Vec::new();
    world::apply(
        &mut world,
        Command::SpawnItem {
            kind: ItemKind::Food,
            position: Vec2::new(200.0, 200.0),
        },
        &mut events,
    );
    let agent = world.add_agent(
        AgentConfig::default(),
        Vec2::new(200.0, 200.0),
        0.0,
        Box::new(Idle),
    );

    let mut analytics = Analytics::default();
    for _ in 0..100 {
        let mut events = Vec::new();
        world::apply(&mut world, Command::Tick, &mut events);
        analytics.handle(&events);
    }

    let report = analytics.report();
    assert_eq!(report.clock, 100);
    assert_eq!(report.food_eaten, 1);
    assert_eq!(report.poison_eaten, 0);
    assert_eq!(report.agents.len(), 1);
    assert_eq!(report.agents[0].agent, agent);
    assert_eq!(report.agents[0].samples.len(), 1);
    assert!(report.agents[0].samples[0] > 0.0, "meal lifts the window mean");
    assert!(analytics.smoothed(agent).is_some());
}

#[test]
fn series_keeps_only_the_latest_samples() {
    let mut analytics = Analytics::new(AnalyticsConfig {
        sample_interval: 1,
        max_samples: 3,
        ..AnalyticsConfig::default()
    });
    for clock in 1..=5 {
        analytics.handle(&[
            Event::TimeAdvanced { clock },
            Event::AgentRewarded {
                agent: AgentId::new(0),
                reward: clock as f32,
            },
        ]);
    }
    assert_eq!(
        analytics.samples(AgentId::new(0)).collect::<Vec<_>>(),
        vec![3.0, 4.0, 5.0]
    );
}

#[test]
fn agents_keep_separate_series() {
    let mut analytics = Analytics::new(AnalyticsConfig {
        sample_interval: 2,
        ..AnalyticsConfig::default()
    });
    for clock in 1..=4 {
        analytics.handle(&[
            Event::TimeAdvanced { clock },
            Event::AgentRewarded {
                agent: AgentId::new(0),
                reward: 10.0,
            },
            Event::AgentRewarded {
                agent: AgentId::new(1),
                reward: -10.0,
            },
        ]);
    }
    assert_eq!(
        analytics.samples(AgentId::new(0)).collect::<Vec<_>>(),
        vec![10.0, 10.0]
    );
    assert_eq!(
        analytics.samples(AgentId::new(1)).collect::<Vec<_>>(),
        vec![-10.0, -10.0]
    );

    let report = analytics.report();
    assert_eq!(report.agents.len(), 2);
    assert_eq!(report.agents[0].samples, vec![10.0, 10.0]);
    assert_eq!(report.agents[1].samples, vec![-10.0, -10.0]);
}

#[test]
fn quiet_agent_skips_windows_without_rewards() {
    let mut analytics = Analytics::new(AnalyticsConfig {
        sample_interval: 1,
        ..AnalyticsConfig::default()
    });
    analytics.handle(&[
        Event::TimeAdvanced { clock: 1 },
        Event::AgentRewarded {
            agent: AgentId::new(0),
            reward: 1.0,
        },
        Event::AgentRewarded {
            agent: AgentId::new(1),
            reward: 3.0,
        },
    ]);
    analytics.handle(&[
        Event::TimeAdvanced { clock: 2 },
        Event::AgentRewarded {
            agent: AgentId::new(0),
            reward: 2.0,
        },
    ]);
    assert_eq!(
        analytics.samples(AgentId::new(0)).collect::<Vec<_>>(),
        vec![1.0, 2.0]
    );
    assert_eq!(
        analytics.samples(AgentId::new(1)).collect::<Vec<_>>(),
        vec![3.0]
    );
}

#[test]
fn report_serializes_to_json() {
    let mut analytics = Analytics::default();
    analytics.handle(&[Event::AgentRewarded {
        agent: AgentId::new(2),
        reward: -1.5,
    }]);
    let json = serde_json::to_value(analytics.report()).expect("encode");
    assert_eq!(json["agents"][0]["smoothed"], serde_json::json!(-1.5));
    assert_eq!(json["agents"][0]["samples"], serde_json::json!([]));
}
