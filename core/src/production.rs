//! Production calculator: pure rate formulas, all in kg/day.
//!
//! Zero or invalid inputs produce a zero rate, never an error.

use crate::{
    composite::{composite_factor, CompositeCategory},
    config::GameData,
    skills::{SkillId, SkillSet},
    state::{Activity, WorldState},
    types::StructureId,
};
use std::collections::BTreeMap;

fn sanitize(x: f64) -> f64 {
    if x.is_finite() && x > 0.0 { x } else { 0.0 }
}

/// base · probes · dexterity · production · zone multiplier
pub fn probe_mining_rate(base: f64, probes: f64, dexterity: f64, production: f64, zone_multiplier: f64) -> f64 {
    sanitize(base) * sanitize(probes) * sanitize(dexterity) * sanitize(production) * sanitize(zone_multiplier)
}

/// base · probes · dexterity · production
pub fn probe_building_rate(base: f64, probes: f64, dexterity: f64, production: f64) -> f64 {
    sanitize(base) * sanitize(probes) * sanitize(dexterity) * sanitize(production)
}

/// Mining contributed by structures in `zone`:
/// Σ rate · count · zone efficiency · production · mining factor.
pub fn structure_mining_rate(
    data: &GameData,
    structures: Option<&BTreeMap<StructureId, u64>>,
    zone: &str,
    skills: &SkillSet,
) -> f64 {
    let Some(structures) = structures else {
        return 0.0;
    };
    let per_skill = sanitize(skills.get(SkillId::Production))
        * composite_factor(CompositeCategory::Mining, skills);
    structures
        .iter()
        .filter_map(|(id, count)| data.building(id).map(|b| (b, *count)))
        .map(|(b, count)| {
            sanitize(b.mining_rate_kg_day) * count as f64 * sanitize(b.efficiency_in(zone)) * per_skill
        })
        .sum()
}

/// Rated (unthrottled) mining rate of a zone: harvesting probes plus
/// mining structures.
pub fn zone_mining_rate(data: &GameData, state: &WorldState, zone: &str) -> f64 {
    let Some(cfg) = data.zone(zone) else {
        return 0.0;
    };
    if !cfg.allows_mining() {
        return 0.0;
    }
    let skills = &state.skills;
    let probes = state.probes_on(zone, Activity::Harvest);
    probe_mining_rate(
        data.tuning.base_mining_rate_kg_day,
        probes,
        skills.get(SkillId::Dexterity),
        skills.get(SkillId::Production),
        cfg.mining_multiplier,
    ) + structure_mining_rate(data, state.structures.get(zone), zone, skills)
}

/// Rated replication rate of a zone, kg/day of probe mass.
pub fn zone_replication_rate(data: &GameData, state: &WorldState, zone: &str) -> f64 {
    let skills = &state.skills;
    let probes = state.probes_on(zone, Activity::Replicate);
    probe_building_rate(
        data.tuning.base_building_rate_kg_day,
        probes,
        skills.get(SkillId::Dexterity),
        skills.get(SkillId::Production),
    ) * composite_factor(CompositeCategory::Building, skills)
}
