//! Dyson subsystem.
//!
//! Probes allocated to "construct" in the Dyson zone turn stockpiled metal
//! into sphere mass at a fixed 2:1 ratio, scaled by the dyson construction
//! skill and the energy throttle. Mass never decreases. Progress is
//! clamped to 1.0, the raw mass is not.

use crate::{
    config::GameData,
    error::{ActionError, SimResult},
    event::SimEvent,
    production::probe_building_rate,
    skills::{SkillId, SkillSet},
    state::{Activity, WorldState},
    subsystem::{SimSubsystem, TickContext},
    types::{Kg, Watts},
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DysonState {
    pub mass_kg: Kg,
    pub target_mass_kg: Kg,
    /// mass / target, clamped to [0, 1].
    pub progress: f64,
    /// Share of Dyson power fed to the economy; the rest goes to compute.
    pub economy_fraction: f64,
}

impl DysonState {
    pub fn new(data: &GameData) -> Self {
        Self {
            mass_kg: 0.0,
            target_mass_kg: data.tuning.dyson_base_target_mass_kg,
            progress: 0.0,
            economy_fraction: 0.5,
        }
    }

    pub fn power_w(&self, data: &GameData) -> Watts {
        (self.mass_kg * data.tuning.dyson_watts_per_kg).max(0.0)
    }

    pub fn is_complete(&self) -> bool {
        self.progress >= 1.0
    }
}

/// Target mass after research: the base target divided by the materials
/// skill (never raised above the base).
pub fn target_mass(data: &GameData, skills: &SkillSet) -> Kg {
    data.tuning.dyson_base_target_mass_kg / skills.get(SkillId::Materials).max(1.0)
}

pub fn progress_fraction(mass: Kg, target: Kg) -> f64 {
    if !(target > 0.0) {
        return 1.0;
    }
    (mass / target).clamp(0.0, 1.0)
}

pub struct DysonSubsystem;

impl DysonSubsystem {
    pub fn new() -> Self {
        Self
    }
}

impl Default for DysonSubsystem {
    fn default() -> Self { Self::new() }
}

impl SimSubsystem for DysonSubsystem {
    fn name(&self) -> &'static str { "dyson" }

    fn update(&mut self, ctx: &mut TickContext<'_>, state: &mut WorldState) -> SimResult<Vec<SimEvent>> {
        let mut events = Vec::new();
        let data = ctx.data;
        let was_complete = state.dyson.is_complete();
        state.dyson.target_mass_kg = target_mass(data, &state.skills);

        if let Some(zone) = data.dyson_zone() {
            let skills = &state.skills;
            let builders = state.probes_on(&zone.id, Activity::Construct);
            let rate = probe_building_rate(
                data.tuning.base_building_rate_kg_day,
                builders,
                skills.get(SkillId::Dexterity),
                skills.get(SkillId::Production),
            ) * skills.get(SkillId::DysonConstruction);

            let wanted = rate * ctx.throttle * ctx.dt;
            let ratio = data.tuning.dyson_metal_per_mass.max(1.0);
            if wanted > 0.0 {
                if let Some(res) = state.zones.get_mut(&zone.id) {
                    let added = wanted.min(res.stored_metal / ratio).max(0.0);
                    if added > 0.0 {
                        res.stored_metal = (res.stored_metal - added * ratio).max(0.0);
                        state.dyson.mass_kg += added;
                        ctx.flows_mut(&zone.id).dyson_mass_added += added;
                    }
                }
            }
        }

        state.dyson.progress = progress_fraction(state.dyson.mass_kg, state.dyson.target_mass_kg);
        if state.dyson.is_complete() && !was_complete {
            log::info!("tick={} dyson: sphere complete at {:.3e} kg", ctx.tick, state.dyson.mass_kg);
            events.push(SimEvent::DysonCompleted { tick: ctx.tick, mass: state.dyson.mass_kg });
        }
        Ok(events)
    }
}

/// Set the economy/compute split of Dyson power.
pub fn set_dyson_allocation(state: &mut WorldState, economy_fraction: f64) -> Result<(), ActionError> {
    if !economy_fraction.is_finite() || !(0.0..=1.0).contains(&economy_fraction) {
        return Err(ActionError::InvalidValue { field: "economy_fraction", value: economy_fraction });
    }
    state.dyson.economy_fraction = economy_fraction;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_clamps_but_mass_may_exceed() {
        assert_eq!(progress_fraction(3.0, 2.0), 1.0);
        assert_eq!(progress_fraction(1.0, 4.0), 0.25);
        assert_eq!(progress_fraction(1.0, 0.0), 1.0);
    }

    #[test]
    fn materials_research_lowers_target() {
        let data = GameData::default_test();
        let mut skills = SkillSet::default();
        let base = target_mass(&data, &skills);
        skills.set(SkillId::Materials, 2.0);
        assert_eq!(target_mass(&data, &skills), base / 2.0);
        skills.set(SkillId::Materials, 0.5);
        assert_eq!(target_mass(&data, &skills), base);
    }

    #[test]
    fn allocation_must_be_a_fraction() {
        let data = GameData::default_test();
        let mut state = WorldState::new_game(&data, &Default::default()).unwrap();
        assert!(set_dyson_allocation(&mut state, 1.5).is_err());
        set_dyson_allocation(&mut state, 0.2).unwrap();
        assert_eq!(state.dyson.economy_fraction, 0.2);
    }
}
