//! Structure subsystem.
//!
//! Purchases are instant and atomic: the metal is debited from the
//! zone's stockpile and the count incremented in the same step, or
//! nothing happens at all. The per-tick update is the hook for
//! multi-stage construction and currently changes nothing.

use crate::{
    config::GameData,
    error::{ActionError, SimResult},
    event::SimEvent,
    state::WorldState,
    subsystem::{SimSubsystem, TickContext},
    types::Kg,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructurePurchase {
    pub zone: String,
    pub structure_id: String,
    pub count: u64,
    pub metal_spent: Kg,
    pub new_count: u64,
}

/// Buy `count` structures in `zone`, paying from the zone's stockpile.
pub fn purchase_structure(
    state: &mut WorldState,
    data: &GameData,
    zone: &str,
    structure_id: &str,
    count: u64,
) -> Result<StructurePurchase, ActionError> {
    if count == 0 {
        return Err(ActionError::InvalidCount("structure count must be at least 1".into()));
    }
    if data.zone(zone).is_none() {
        return Err(ActionError::UnknownZone(zone.to_string()));
    }
    let building = data
        .building(structure_id)
        .ok_or_else(|| ActionError::UnknownStructure(structure_id.to_string()))?;
    if !building.allowed_in(zone) {
        return Err(ActionError::StructureNotAllowed {
            zone: zone.to_string(),
            structure: structure_id.to_string(),
        });
    }

    let cost = building.cost_metal_kg * count as f64;
    let available = state.stored_metal(zone);
    if cost > available {
        return Err(ActionError::InsufficientMetal {
            zone: zone.to_string(),
            needed: cost,
            available,
        });
    }

    if let Some(res) = state.zones.get_mut(zone) {
        res.stored_metal = (res.stored_metal - cost).max(0.0);
    }
    state.add_structures(zone, structure_id, count);
    state.recompute_pools();

    Ok(StructurePurchase {
        zone: zone.to_string(),
        structure_id: structure_id.to_string(),
        count,
        metal_spent: cost,
        new_count: state.structure_count(zone, structure_id),
    })
}

pub struct StructureSubsystem;

impl StructureSubsystem {
    pub fn new() -> Self {
        Self
    }
}

impl Default for StructureSubsystem {
    fn default() -> Self { Self::new() }
}

impl SimSubsystem for StructureSubsystem {
    fn name(&self) -> &'static str { "structure" }

    fn update(&mut self, _ctx: &mut TickContext<'_>, _state: &mut WorldState) -> SimResult<Vec<SimEvent>> {
        // Construction is instantaneous; nothing progresses per tick yet.
        Ok(vec![])
    }
}
