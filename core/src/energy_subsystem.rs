//! Energy subsystem: production/consumption balance and throttle.
//!
//! Production: base supply, probe generation, structure generation and
//! the economy share of Dyson power. Consumption: probes harvesting or
//! recycling slag plus structure draw, divided by the energy-efficiency
//! factor. Every other probe activity is free.
//!
//! The throttle computed here is the single dampener applied to mining,
//! replication, recycling and Dyson construction for the rest of the
//! tick. There is no priority between consumers during a shortfall.

use crate::{
    composite::{divisor_factor, CompositeCategory},
    config::GameData,
    error::SimResult,
    event::SimEvent,
    skills::SkillId,
    state::{Activity, EnergyBalance, WorldState},
    subsystem::{SimSubsystem, TickContext},
    types::Watts,
};

/// Throttle from a production/consumption pair. Always in [0, 1].
pub fn throttle(production: Watts, consumption: Watts) -> f64 {
    if !(consumption > 0.0) {
        return 1.0;
    }
    if !(production > 0.0) {
        return 0.0;
    }
    let ratio = production / consumption;
    if ratio.is_finite() { ratio.min(1.0) } else { 1.0 }
}

/// Compute the full balance for the current state without mutating it.
pub fn compute_energy(data: &GameData, state: &WorldState) -> EnergyBalance {
    let t = &data.tuning;
    let skills = &state.skills;
    let solar = skills.get(SkillId::SolarPv);

    let mut production = t.base_energy_supply_w;
    let mut draw = 0.0;
    let mut structure_flops = 0.0;

    for zone in &data.zones {
        let probes = state.probe_count(&zone.id) as f64;
        production += probes * t.probe_energy_generation_w * solar * zone.energy_multiplier;

        for activity in Activity::ALL.into_iter().filter(|a| a.draws_energy()) {
            draw += state.probes_on(&zone.id, activity) * t.activity_draw_w(activity);
        }

        if let Some(structures) = state.structures.get(&zone.id) {
            for (id, count) in structures {
                let Some(b) = data.building(id) else { continue };
                let n = *count as f64;
                let eff = b.efficiency_in(&zone.id);
                production += b.energy_production_w * n * eff;
                draw += b.energy_consumption_w * n;
                structure_flops += b.compute_flops * n * eff;
            }
        }
    }

    let dyson_power = state.dyson.power_w(data);
    let economy = state.dyson.economy_fraction.clamp(0.0, 1.0);
    production += dyson_power * economy;

    let consumption = draw / divisor_factor(CompositeCategory::EnergyEfficiency, skills);

    let dyson_flops = dyson_power * (1.0 - economy) * t.dyson_flops_per_watt;
    let intelligence =
        (t.base_intelligence_flops + structure_flops + dyson_flops) * skills.get(SkillId::Compute);

    let production = production.max(0.0);
    let consumption = consumption.max(0.0);
    EnergyBalance {
        production_w: production,
        consumption_w: consumption,
        throttle: throttle(production, consumption),
        intelligence_flops: if intelligence.is_finite() { intelligence.max(0.0) } else { 0.0 },
    }
}

pub struct EnergySubsystem;

impl EnergySubsystem {
    pub fn new() -> Self {
        Self
    }
}

impl Default for EnergySubsystem {
    fn default() -> Self { Self::new() }
}

impl SimSubsystem for EnergySubsystem {
    fn name(&self) -> &'static str { "energy" }

    fn update(&mut self, ctx: &mut TickContext<'_>, state: &mut WorldState) -> SimResult<Vec<SimEvent>> {
        let previous = state.energy.throttle;
        let balance = compute_energy(ctx.data, state);
        ctx.throttle = balance.throttle;

        let mut events = Vec::new();
        if balance.throttle < 1.0 && previous >= 1.0 {
            log::info!(
                "tick={} energy: shortfall, throttle={:.3} ({:.3e} W / {:.3e} W)",
                ctx.tick,
                balance.throttle,
                balance.production_w,
                balance.consumption_w
            );
            events.push(SimEvent::EnergyShortfallStarted { tick: ctx.tick, throttle: balance.throttle });
        } else if balance.throttle >= 1.0 && previous < 1.0 {
            events.push(SimEvent::EnergyShortfallEnded { tick: ctx.tick });
        }

        state.energy = balance;
        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn throttle_edges() {
        assert_eq!(throttle(0.0, 0.0), 1.0);
        assert_eq!(throttle(5.0, 0.0), 1.0);
        assert_eq!(throttle(0.0, 5.0), 0.0);
        assert_eq!(throttle(10.0, 5.0), 1.0);
        assert_eq!(throttle(5.0, 10.0), 0.5);
    }

    #[test]
    fn idle_probes_draw_nothing() {
        let data = GameData::default_test();
        let mut state = WorldState::new_game(&data, &Default::default()).unwrap();
        state.add_probes("earth", "probe", 1000);
        state
            .allocations
            .entry("earth".into())
            .or_default()
            .insert(Activity::Replicate, 1.0);
        let balance = compute_energy(&data, &state);
        assert_eq!(balance.consumption_w, 0.0);
        assert_eq!(balance.throttle, 1.0);
    }

    #[test]
    fn only_energy_drawing_activities_have_a_draw() {
        let t = GameData::default_test().tuning;
        for activity in Activity::ALL {
            assert_eq!(t.activity_draw_w(activity) > 0.0, activity.draws_energy(), "{activity:?}");
        }
    }

    #[test]
    fn harvesters_can_cause_shortfall() {
        let data = GameData::default_test();
        let mut state = WorldState::new_game(&data, &Default::default()).unwrap();
        state.add_probes("earth", "probe", 1000);
        state
            .allocations
            .entry("earth".into())
            .or_default()
            .insert(Activity::Harvest, 1.0);
        let balance = compute_energy(&data, &state);
        assert!(balance.consumption_w > balance.production_w);
        assert!(balance.throttle > 0.0 && balance.throttle < 1.0);
    }
}
