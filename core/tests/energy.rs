//! Energy balance, throttle and the Dyson power split.

use dyson_core::{
    command::Action,
    config::{GameData, NewGameConfig},
    energy_subsystem::compute_energy,
    engine::SimEngine,
    event::SimEvent,
    state::Activity,
};
use std::collections::BTreeMap;

fn engine_with_probes(run_id: &str, probes: u64) -> SimEngine {
    let config = NewGameConfig { initial_probes: probes, ..NewGameConfig::default() };
    SimEngine::new(run_id.into(), GameData::default_test(), &config).unwrap()
}

fn allocate(engine: &mut SimEngine, activity: Activity, fraction: f64) {
    let mut allocations = BTreeMap::new();
    allocations.insert(activity, fraction);
    engine
        .apply_action(Action::AllocateProbes { zone: "earth".into(), allocations })
        .unwrap();
}

#[test]
fn no_consumers_means_full_throttle() {
    let mut engine = engine_with_probes("energy-idle", 50);
    engine.tick(1.0).unwrap();
    let energy = &engine.state().energy;
    assert_eq!(energy.consumption_w, 0.0);
    assert_eq!(energy.throttle, 1.0);
}

#[test]
fn shortfall_throttles_mining_and_emits_events() {
    let mut engine = engine_with_probes("energy-shortfall", 100);
    allocate(&mut engine, Activity::Harvest, 1.0);

    let events = engine.tick(1.0).unwrap();
    let energy = engine.state().energy.clone();
    assert!(energy.throttle > 0.0 && energy.throttle < 1.0, "throttle = {}", energy.throttle);
    assert!(events.iter().any(|e| matches!(e, SimEvent::EnergyShortfallStarted { .. })));

    // Mining ran at the throttled rate.
    let mined = engine.state().derived.metal_mined_per_day;
    assert!((mined - 100.0 * 100.0 * energy.throttle).abs() < 1e-6, "mined = {mined}");

    // Idling the probes ends the shortfall.
    allocate(&mut engine, Activity::Replicate, 1.0);
    let events = engine.tick(1.0).unwrap();
    assert_eq!(engine.state().energy.throttle, 1.0);
    assert!(events.iter().any(|e| matches!(e, SimEvent::EnergyShortfallEnded { .. })));
}

#[test]
fn solar_arrays_lift_the_throttle() {
    let data = GameData::default_test();
    let mut engine = engine_with_probes("energy-solar", 100);
    allocate(&mut engine, Activity::Harvest, 1.0);
    let before = compute_energy(&data, engine.state());

    engine
        .apply_action(Action::PurchaseStructure {
            zone: "earth".into(),
            structure_id: "solar_array".into(),
            count: 5,
        })
        .unwrap();
    let after = compute_energy(&data, engine.state());
    assert!((after.production_w - before.production_w - 2.5e6).abs() < 1e-3);
    assert!(after.throttle > before.throttle);
}

#[test]
fn dyson_power_split_moves_watts_into_compute() {
    let data = GameData::default_test();
    let mut engine = engine_with_probes("energy-split", 1);
    let mut state = engine.snapshot();
    state.dyson.mass_kg = 1.0e6;

    state.dyson.economy_fraction = 1.0;
    let all_economy = compute_energy(&data, &state);
    state.dyson.economy_fraction = 0.0;
    let all_compute = compute_energy(&data, &state);

    assert!((all_economy.production_w - all_compute.production_w - 5.0e9).abs() < 1.0);
    assert!(all_compute.intelligence_flops > all_economy.intelligence_flops);

    assert!(engine.apply_action(Action::SetDysonAllocation { economy_fraction: 2.0 }).is_err());
    engine.apply_action(Action::SetDysonAllocation { economy_fraction: 0.3 }).unwrap();
    assert_eq!(engine.state().dyson.economy_fraction, 0.3);
}
