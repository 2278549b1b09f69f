//! The world state: one serializable aggregate holding everything a
//! tick reads or writes.
//!
//! RULE: nothing outside a full tick or an applied action mutates this.
//! All maps are ordered so serialized snapshots are byte-stable.

use crate::{
    clock::SimClock,
    config::{GameData, NewGameConfig},
    dyson_subsystem::DysonState,
    error::{SimError, SimResult},
    skills::{compute_skills, ResearchState, SkillSet},
    transfer_subsystem::Transfer,
    types::{Kg, ProbeTypeId, StructureId, Watts, ZoneId},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// What a share of a zone's probes is doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Activity {
    Harvest,
    Replicate,
    Construct,
    RecycleSlag,
}

impl Activity {
    pub const ALL: [Activity; 4] = [
        Activity::Harvest,
        Activity::Replicate,
        Activity::Construct,
        Activity::RecycleSlag,
    ];

    /// Only harvesting and slag recycling draw energy.
    pub fn draws_energy(self) -> bool {
        matches!(self, Activity::Harvest | Activity::RecycleSlag)
    }
}

/// Per-zone resource bookkeeping.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ZoneResources {
    /// Unmined metal still in the zone.
    pub remaining_metal: Kg,
    /// Unmined mass (metal + rock) still in the zone.
    pub remaining_mass: Kg,
    /// Mined metal stockpiled in the zone.
    pub stored_metal: Kg,
    pub slag: Kg,
    /// Fractional kilograms toward the next replicated probe.
    pub build_progress_kg: Kg,
    /// One-way: once set, the zone is never mined again.
    pub depleted: bool,
    /// Unused mass-driver throughput carried into the next tick, at most
    /// one metal batch.
    #[serde(default)]
    pub driver_credit_kg: Kg,
}

/// Energy and compute balance for the current tick. Recomputed, never
/// accumulated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnergyBalance {
    pub production_w: Watts,
    pub consumption_w: Watts,
    pub throttle: f64,
    pub intelligence_flops: f64,
}

impl Default for EnergyBalance {
    fn default() -> Self {
        Self {
            production_w: 0.0,
            consumption_w: 0.0,
            throttle: 1.0,
            intelligence_flops: 0.0,
        }
    }
}

/// Per-zone display rates.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ZoneRates {
    pub metal_mined_per_day: f64,
    pub slag_per_day: f64,
    pub probes_per_day: f64,
    pub metal_recycled_per_day: f64,
}

/// Display-only aggregate. Never read by a subsystem.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DerivedRates {
    pub metal_mined_per_day: f64,
    pub slag_per_day: f64,
    pub probes_per_day: f64,
    pub metal_recycled_per_day: f64,
    pub dyson_mass_per_day: f64,
    pub energy_net_w: Watts,
    pub total_probes: u64,
    pub probes_in_transit: f64,
    pub metal_in_transit: Kg,
    pub zones: BTreeMap<ZoneId, ZoneRates>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldState {
    pub clock: SimClock,
    /// Sum of every zone's stockpile.
    pub metal: Kg,
    /// Sum of every zone's slag.
    pub slag: Kg,
    pub energy: EnergyBalance,
    pub skills: SkillSet,
    pub probes: BTreeMap<ZoneId, BTreeMap<ProbeTypeId, u64>>,
    pub allocations: BTreeMap<ZoneId, BTreeMap<Activity, f64>>,
    pub structures: BTreeMap<ZoneId, BTreeMap<StructureId, u64>>,
    pub zones: BTreeMap<ZoneId, ZoneResources>,
    pub research: ResearchState,
    pub dyson: DysonState,
    pub transfers: Vec<Transfer>,
    pub next_transfer_id: u64,
    pub derived: DerivedRates,
}

impl WorldState {
    /// A fresh world for a new game.
    pub fn new_game(data: &GameData, config: &NewGameConfig) -> SimResult<Self> {
        let start = data.zone(&config.starting_zone).ok_or_else(|| SimError::ZoneNotFound {
            zone: config.starting_zone.clone(),
        })?;
        let probe_type = match &config.probe_type {
            Some(id) => data
                .probe_type(id)
                .ok_or_else(|| SimError::Initialization(format!("unknown probe type '{id}'")))?,
            None => data
                .default_probe()
                .ok_or_else(|| SimError::Initialization("no default probe type".into()))?,
        };

        let zones = data
            .zones
            .iter()
            .map(|z| {
                (
                    z.id.clone(),
                    ZoneResources {
                        remaining_metal: z.metal_mass_kg(),
                        remaining_mass: z.total_mass_kg,
                        ..ZoneResources::default()
                    },
                )
            })
            .collect();

        let research = ResearchState::new(data);
        let mut state = Self {
            clock: SimClock::default(),
            metal: 0.0,
            slag: 0.0,
            energy: EnergyBalance::default(),
            skills: compute_skills(data, &research, 0.0),
            probes: BTreeMap::new(),
            allocations: BTreeMap::new(),
            structures: BTreeMap::new(),
            zones,
            research,
            dyson: DysonState::new(data),
            transfers: Vec::new(),
            next_transfer_id: 1,
            derived: DerivedRates::default(),
        };
        state.clock.set_speed(config.speed());

        if config.initial_probes > 0 {
            state.add_probes(&start.id, &probe_type.id, config.initial_probes);
        }
        for (structure, count) in &config.initial_structures {
            if data.building(structure).is_none() {
                return Err(SimError::Initialization(format!("unknown structure '{structure}'")));
            }
            state.add_structures(&start.id, structure, *count);
        }
        if let Some(zone) = state.zones.get_mut(&start.id) {
            zone.stored_metal = config.initial_metal_kg.max(0.0);
        }
        state.recompute_pools();
        Ok(state)
    }

    // ── Probes ────────────────────────────────────────────────

    pub fn probe_count(&self, zone: &str) -> u64 {
        self.probes.get(zone).map(|m| m.values().sum()).unwrap_or(0)
    }

    pub fn probes_of_type(&self, zone: &str, probe_type: &str) -> u64 {
        self.probes
            .get(zone)
            .and_then(|m| m.get(probe_type))
            .copied()
            .unwrap_or(0)
    }

    pub fn total_probes(&self) -> u64 {
        self.probes.values().flat_map(|m| m.values()).sum()
    }

    pub fn add_probes(&mut self, zone: &str, probe_type: &str, count: u64) {
        if count == 0 {
            return;
        }
        *self
            .probes
            .entry(zone.to_string())
            .or_default()
            .entry(probe_type.to_string())
            .or_insert(0) += count;
    }

    /// Remove up to `count` probes; returns how many were removed.
    pub fn remove_probes(&mut self, zone: &str, probe_type: &str, count: u64) -> u64 {
        let Some(slot) = self.probes.get_mut(zone).and_then(|m| m.get_mut(probe_type)) else {
            return 0;
        };
        let removed = count.min(*slot);
        *slot -= removed;
        removed
    }

    /// Probes in `zone` assigned to `activity`, as a fractional headcount.
    pub fn probes_on(&self, zone: &str, activity: Activity) -> f64 {
        self.probe_count(zone) as f64 * self.allocation(zone, activity)
    }

    pub fn allocation(&self, zone: &str, activity: Activity) -> f64 {
        self.allocations
            .get(zone)
            .and_then(|m| m.get(&activity))
            .copied()
            .unwrap_or(0.0)
    }

    // ── Structures ────────────────────────────────────────────

    pub fn structure_count(&self, zone: &str, structure: &str) -> u64 {
        self.structures
            .get(zone)
            .and_then(|m| m.get(structure))
            .copied()
            .unwrap_or(0)
    }

    pub fn add_structures(&mut self, zone: &str, structure: &str, count: u64) {
        if count == 0 {
            return;
        }
        *self
            .structures
            .entry(zone.to_string())
            .or_default()
            .entry(structure.to_string())
            .or_insert(0) += count;
    }

    /// Number of mass drivers in `zone`.
    pub fn mass_driver_count(&self, zone: &str, data: &GameData) -> u64 {
        self.structures
            .get(zone)
            .map(|m| {
                m.iter()
                    .filter(|(id, _)| data.building(id).is_some_and(|b| b.is_mass_driver()))
                    .map(|(_, n)| *n)
                    .sum()
            })
            .unwrap_or(0)
    }

    /// Outbound mass-driver throughput of `zone`, kg/day.
    pub fn mass_driver_capacity(&self, zone: &str, data: &GameData) -> f64 {
        self.structures
            .get(zone)
            .map(|m| {
                m.iter()
                    .filter_map(|(id, n)| {
                        data.building(id)
                            .filter(|b| b.is_mass_driver())
                            .map(|b| b.mass_driver_capacity_kg_day * b.efficiency_in(zone) * *n as f64)
                    })
                    .sum()
            })
            .unwrap_or(0.0)
    }

    // ── Metal ─────────────────────────────────────────────────

    pub fn stored_metal(&self, zone: &str) -> Kg {
        self.zones.get(zone).map(|z| z.stored_metal).unwrap_or(0.0)
    }

    /// Re-derive the global metal and slag pools from the zones.
    pub fn recompute_pools(&mut self) {
        self.metal = self.zones.values().map(|z| z.stored_metal).sum();
        self.slag = self.zones.values().map(|z| z.slag).sum();
    }
}
