//! Probe subsystem: replication, manual probe purchase and activity
//! allocation.
//!
//! Replication accumulates fractional kilograms from the "replicate"
//! share of each zone's probes. Whenever the progress crosses whole probe
//! masses, that many probes appear and the remainder carries forward.
//! Progress is paid for out of the zone's metal stockpile as it accrues.

use crate::{
    config::GameData,
    error::{ActionError, SimResult},
    event::SimEvent,
    production::zone_replication_rate,
    state::{Activity, WorldState},
    subsystem::{SimSubsystem, TickContext},
    types::Kg,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Tolerance on the allocation sum, for fractions that came through JSON.
const ALLOCATION_EPSILON: f64 = 1e-9;

/// Split accumulated progress into whole probes and carried remainder.
pub fn whole_probes(progress: Kg, probe_mass: Kg) -> (u64, Kg) {
    if !(probe_mass > 0.0) || !(progress >= probe_mass) {
        return (0, progress.max(0.0));
    }
    let n = (progress / probe_mass).floor();
    let remainder = (progress - n * probe_mass).max(0.0);
    (n as u64, remainder)
}

pub struct ProbeSubsystem;

impl ProbeSubsystem {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ProbeSubsystem {
    fn default() -> Self { Self::new() }
}

impl SimSubsystem for ProbeSubsystem {
    fn name(&self) -> &'static str { "probe" }

    fn update(&mut self, ctx: &mut TickContext<'_>, state: &mut WorldState) -> SimResult<Vec<SimEvent>> {
        let mut events = Vec::new();
        let data = ctx.data;
        let Some(probe) = data.default_probe() else {
            return Ok(events);
        };

        for zone in &data.zones {
            let rate = zone_replication_rate(data, state, &zone.id);
            if rate <= 0.0 {
                continue;
            }
            let Some(res) = state.zones.get_mut(&zone.id) else { continue };

            let wanted = rate * ctx.throttle * ctx.dt;
            let spent = wanted.min(res.stored_metal).max(0.0);
            if spent <= 0.0 {
                continue;
            }
            res.stored_metal -= spent;
            res.build_progress_kg += spent;

            let (built, carry) = whole_probes(res.build_progress_kg, probe.mass_kg);
            res.build_progress_kg = carry;

            let flows = ctx.flows_mut(&zone.id);
            flows.probe_mass_built += spent;
            flows.probes_built += built;

            if built > 0 {
                state.add_probes(&zone.id, &probe.id, built);
                log::debug!("tick={} probe: {} +{built} probes", ctx.tick, zone.id);
                events.push(SimEvent::ProbesReplicated {
                    tick: ctx.tick,
                    zone: zone.id.clone(),
                    count: built,
                });
            }
        }

        Ok(events)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbePurchase {
    pub zone: String,
    pub probe_type: String,
    pub count: u64,
    pub metal_spent: Kg,
}

/// Build `count` probes directly from the zone's stockpile.
pub fn purchase_probe(
    state: &mut WorldState,
    data: &GameData,
    zone: &str,
    probe_type: &str,
    count: u64,
) -> Result<ProbePurchase, ActionError> {
    if count == 0 {
        return Err(ActionError::InvalidCount("probe count must be at least 1".into()));
    }
    if data.zone(zone).is_none() {
        return Err(ActionError::UnknownZone(zone.to_string()));
    }
    let cfg = data
        .probe_type(probe_type)
        .ok_or_else(|| ActionError::UnknownProbeType(probe_type.to_string()))?;
    let cost = cfg.mass_kg * count as f64;
    let available = state.stored_metal(zone);
    if cost > available {
        return Err(ActionError::InsufficientMetal { zone: zone.to_string(), needed: cost, available });
    }

    if let Some(res) = state.zones.get_mut(zone) {
        res.stored_metal = (res.stored_metal - cost).max(0.0);
    }
    state.add_probes(zone, probe_type, count);
    state.recompute_pools();
    Ok(ProbePurchase {
        zone: zone.to_string(),
        probe_type: probe_type.to_string(),
        count,
        metal_spent: cost,
    })
}

/// Replace the activity allocation of `zone`. Fractions must each lie in
/// [0, 1] and sum to at most 1; whatever is left over is idle.
pub fn allocate_probes(
    state: &mut WorldState,
    data: &GameData,
    zone: &str,
    allocations: &BTreeMap<Activity, f64>,
) -> Result<(), ActionError> {
    let cfg = data.zone(zone).ok_or_else(|| ActionError::UnknownZone(zone.to_string()))?;

    let mut total = 0.0;
    for (activity, fraction) in allocations {
        if !fraction.is_finite() || !(0.0..=1.0).contains(fraction) {
            return Err(ActionError::InvalidAllocation(format!(
                "{activity:?} fraction {fraction} outside [0, 1]"
            )));
        }
        total += fraction;
    }
    if total > 1.0 + ALLOCATION_EPSILON {
        return Err(ActionError::InvalidAllocation(format!("fractions sum to {total:.4} > 1")));
    }
    let wants = |a: Activity| allocations.get(&a).copied().unwrap_or(0.0) > 0.0;
    if cfg.is_dyson_zone && wants(Activity::Harvest) {
        return Err(ActionError::InvalidAllocation(format!("{zone} cannot be mined")));
    }
    if !cfg.is_dyson_zone && wants(Activity::Construct) {
        return Err(ActionError::InvalidAllocation(format!(
            "construction is only possible in the Dyson zone, not {zone}"
        )));
    }

    let cleaned = allocations
        .iter()
        .filter(|(_, f)| **f > 0.0)
        .map(|(a, f)| (*a, *f))
        .collect();
    state.allocations.insert(zone.to_string(), cleaned);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NewGameConfig;

    #[test]
    fn whole_probes_carry_remainder() {
        assert_eq!(whole_probes(250.0, 100.0), (2, 50.0));
        assert_eq!(whole_probes(99.0, 100.0), (0, 99.0));
        assert_eq!(whole_probes(100.0, 100.0), (1, 0.0));
    }

    #[test]
    fn over_allocation_is_rejected() {
        let data = GameData::default_test();
        let mut state = WorldState::new_game(&data, &NewGameConfig::default()).unwrap();
        let mut alloc = BTreeMap::new();
        alloc.insert(Activity::Harvest, 0.7);
        alloc.insert(Activity::Replicate, 0.4);
        let before = state.clone();
        assert!(allocate_probes(&mut state, &data, "earth", &alloc).is_err());
        assert_eq!(state, before);
    }

    #[test]
    fn partial_allocation_leaves_idle_remainder() {
        let data = GameData::default_test();
        let mut state = WorldState::new_game(&data, &NewGameConfig::default()).unwrap();
        let mut alloc = BTreeMap::new();
        alloc.insert(Activity::Harvest, 0.25);
        allocate_probes(&mut state, &data, "earth", &alloc).unwrap();
        assert_eq!(state.allocation("earth", Activity::Harvest), 0.25);
        assert_eq!(state.allocation("earth", Activity::Replicate), 0.0);
    }

    #[test]
    fn purchase_needs_metal() {
        let data = GameData::default_test();
        let mut state = WorldState::new_game(&data, &NewGameConfig::default()).unwrap();
        purchase_probe(&mut state, &data, "earth", "probe", 10).unwrap();
        assert_eq!(state.probe_count("earth"), 11);
        assert_eq!(state.stored_metal("earth"), 0.0);
        let err = purchase_probe(&mut state, &data, "earth", "probe", 1).unwrap_err();
        assert!(matches!(err, ActionError::InsufficientMetal { .. }));
    }
}
