//! Dyson construction: metal → sphere mass at 2:1.

use dyson_core::{
    command::Action,
    config::{GameData, NewGameConfig},
    engine::SimEngine,
    event::SimEvent,
    state::Activity,
};
use std::collections::BTreeMap;

fn builders_at_the_sphere(run_id: &str, data: GameData) -> SimEngine {
    let config = NewGameConfig {
        starting_zone: "dyson_sphere".into(),
        initial_probes: 10,
        initial_metal_kg: 1000.0,
        ..NewGameConfig::default()
    };
    let mut engine = SimEngine::new(run_id.into(), data, &config).unwrap();
    let mut allocations = BTreeMap::new();
    allocations.insert(Activity::Construct, 1.0);
    engine
        .apply_action(Action::AllocateProbes { zone: "dyson_sphere".into(), allocations })
        .unwrap();
    engine
}

#[test]
fn construction_consumes_two_kg_of_metal_per_kg_of_mass() {
    let mut engine = builders_at_the_sphere("dyson-ratio", GameData::default_test());
    let mut last_mass = 0.0;
    for _ in 0..5 {
        engine.tick(1.0).unwrap();
        let mass = engine.state().dyson.mass_kg;
        assert!(mass >= last_mass, "Dyson mass decreased");
        last_mass = mass;
    }
    let state = engine.state();
    assert!((state.dyson.mass_kg - 500.0).abs() < 1e-9, "mass = {}", state.dyson.mass_kg);
    assert!(state.stored_metal("dyson_sphere").abs() < 1e-9);
    assert!(state.dyson.progress > 0.0 && state.dyson.progress < 1.0);
}

#[test]
fn completion_fires_once_and_mass_may_exceed_target() {
    let mut data = GameData::default_test();
    data.tuning.dyson_base_target_mass_kg = 300.0;
    let mut engine = builders_at_the_sphere("dyson-complete", data);

    let events = engine.run_ticks(5, 1.0).unwrap();
    let completions = events
        .iter()
        .filter(|e| matches!(e, SimEvent::DysonCompleted { .. }))
        .count();
    assert_eq!(completions, 1);

    let dyson = &engine.state().dyson;
    assert_eq!(dyson.progress, 1.0);
    assert!(dyson.mass_kg > dyson.target_mass_kg);
}

#[test]
fn construction_is_rejected_outside_the_dyson_zone() {
    let mut engine = SimEngine::build_test("dyson-elsewhere".into()).unwrap();
    let mut allocations = BTreeMap::new();
    allocations.insert(Activity::Construct, 0.5);
    assert!(engine
        .apply_action(Action::AllocateProbes { zone: "earth".into(), allocations })
        .is_err());
}
