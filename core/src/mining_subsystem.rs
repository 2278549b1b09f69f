//! Mining subsystem.
//!
//! For every zone that is neither depleted nor construction-only:
//!
//!   metal    = min(rate · throttle · Δt, remaining_metal)
//!   removed  = metal / metallicity
//!   slag     = removed − metal
//!
//! Mined metal goes to the zone's stockpile; slag accumulates in the zone.
//! A zone whose remaining metal reaches zero is marked depleted for good.

use crate::{
    error::SimResult,
    event::SimEvent,
    production::zone_mining_rate,
    state::WorldState,
    subsystem::{SimSubsystem, TickContext},
    types::Kg,
};

/// Result of extracting from one zone.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Extraction {
    pub metal: Kg,
    pub slag: Kg,
}

/// Extraction arithmetic, separated out for testing.
pub fn extract(requested: Kg, remaining_metal: Kg, metallicity: f64) -> Extraction {
    if !(requested > 0.0) || !(remaining_metal > 0.0) || !(metallicity > 0.0) {
        return Extraction { metal: 0.0, slag: 0.0 };
    }
    let metal = requested.min(remaining_metal);
    let removed = metal / metallicity;
    Extraction { metal, slag: (removed - metal).max(0.0) }
}

pub struct MiningSubsystem;

impl MiningSubsystem {
    pub fn new() -> Self {
        Self
    }
}

impl Default for MiningSubsystem {
    fn default() -> Self { Self::new() }
}

impl SimSubsystem for MiningSubsystem {
    fn name(&self) -> &'static str { "mining" }

    fn update(&mut self, ctx: &mut TickContext<'_>, state: &mut WorldState) -> SimResult<Vec<SimEvent>> {
        let mut events = Vec::new();
        let data = ctx.data;

        for zone in &data.zones {
            if !zone.allows_mining() {
                continue;
            }
            let depleted = state.zones.get(&zone.id).map(|z| z.depleted).unwrap_or(true);
            if depleted {
                continue;
            }

            let rate = zone_mining_rate(data, state, &zone.id);
            let requested = rate * ctx.throttle * ctx.dt;
            let Some(res) = state.zones.get_mut(&zone.id) else { continue };
            let out = extract(requested, res.remaining_metal, zone.metal_fraction);
            if out.metal <= 0.0 {
                continue;
            }

            res.remaining_metal = (res.remaining_metal - out.metal).max(0.0);
            res.remaining_mass = (res.remaining_mass - out.metal - out.slag).max(0.0);
            res.stored_metal += out.metal;
            res.slag += out.slag;

            if res.remaining_metal <= 0.0 {
                res.depleted = true;
                log::info!("tick={} mining: {} depleted", ctx.tick, zone.id);
                events.push(SimEvent::ZoneDepleted { tick: ctx.tick, zone: zone.id.clone() });
            }

            let flows = ctx.flows_mut(&zone.id);
            flows.metal_mined += out.metal;
            flows.slag_produced += out.slag;
        }

        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extraction_conserves_mass() {
        let out = extract(32.0, 1.0e9, 0.32);
        assert_eq!(out.metal, 32.0);
        assert!((out.metal / 0.32 - (out.metal + out.slag)).abs() < 1e-9);
    }

    #[test]
    fn extraction_is_capped_by_remaining_metal() {
        let out = extract(500.0, 120.0, 0.5);
        assert_eq!(out.metal, 120.0);
        assert_eq!(out.slag, 120.0);
    }

    #[test]
    fn zero_metallicity_extracts_nothing() {
        assert_eq!(extract(10.0, 10.0, 0.0).metal, 0.0);
    }
}
