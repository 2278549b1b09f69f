//! Mining: rates, conservation and depletion.

use dyson_core::{
    command::Action,
    config::{GameData, NewGameConfig},
    engine::SimEngine,
    event::SimEvent,
    state::Activity,
};
use std::collections::BTreeMap;

fn harvest(engine: &mut SimEngine, zone: &str, fraction: f64) {
    let mut allocations = BTreeMap::new();
    allocations.insert(Activity::Harvest, fraction);
    engine
        .apply_action(Action::AllocateProbes { zone: zone.into(), allocations })
        .expect("allocation");
}

/// 1 probe at earth, 1000 kg, harvest 0.5, baseline skills, one day:
/// exactly 100 · 0.5 = 50 kg of metal.
#[test]
fn one_probe_half_harvest_mines_fifty_kg_in_a_day() {
    let mut engine = SimEngine::build_test("mining-scenario".into()).unwrap();
    harvest(&mut engine, "earth", 0.5);
    let before = engine.state().stored_metal("earth");
    assert_eq!(before, 1000.0);

    engine.tick(1.0).unwrap();
    let state = engine.state();
    assert_eq!(state.energy.throttle, 1.0);
    let mined = state.stored_metal("earth") - before;
    assert!((mined - 50.0).abs() < 1e-9, "mined = {mined}");
    assert!((state.derived.metal_mined_per_day - 50.0).abs() < 1e-9);
}

#[test]
fn slag_matches_metallicity() {
    let mut engine = SimEngine::build_test("mining-conservation".into()).unwrap();
    harvest(&mut engine, "earth", 1.0);
    let metal_before = engine.state().stored_metal("earth");
    let slag_before = engine.state().zones["earth"].slag;

    engine.run_ticks(10, 1.0).unwrap();
    let metal = engine.state().stored_metal("earth") - metal_before;
    let slag = engine.state().zones["earth"].slag - slag_before;
    assert!((metal - 1000.0).abs() < 1e-6, "metal = {metal}");
    assert!(((metal / 0.32) - (metal + slag)).abs() < 1e-6);
    assert_eq!(engine.state().slag, engine.state().zones["earth"].slag);
}

#[test]
fn small_zone_depletes_once_and_stays_depleted() {
    let mut data = GameData::default_test();
    let earth = data.zones.iter_mut().find(|z| z.id == "earth").unwrap();
    earth.total_mass_kg = 1000.0; // 320 kg of metal
    let config = NewGameConfig { initial_probes: 10, ..NewGameConfig::default() };
    let mut engine = SimEngine::new("mining-depletion".into(), data, &config).unwrap();
    harvest(&mut engine, "earth", 1.0);

    let events = engine.run_ticks(5, 1.0).unwrap();
    let depletions = events
        .iter()
        .filter(|e| matches!(e, SimEvent::ZoneDepleted { zone, .. } if zone == "earth"))
        .count();
    assert_eq!(depletions, 1);

    let zone = &engine.state().zones["earth"];
    assert!(zone.depleted);
    assert_eq!(zone.remaining_metal, 0.0);
    assert!((engine.state().stored_metal("earth") - 1320.0).abs() < 1e-9);
    assert!((zone.slag - 680.0).abs() < 1e-9);
}

#[test]
fn dyson_zone_cannot_be_harvested() {
    let mut engine = SimEngine::build_test("mining-dyson".into()).unwrap();
    let mut allocations = BTreeMap::new();
    allocations.insert(Activity::Harvest, 1.0);
    let before = engine.snapshot();
    let result = engine.apply_action(Action::AllocateProbes { zone: "dyson_sphere".into(), allocations });
    assert!(result.is_err());
    assert_eq!(engine.snapshot(), before);
}
