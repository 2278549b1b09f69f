//! Recycling subsystem.
//!
//! Probes on "recycle slag" process a zone's slag. A salvage fraction of
//! what they process comes back as metal; the rest stays slag. The
//! fraction starts at the baseline and approaches, but never reaches,
//! 100% as the salvage factor grows.

use crate::{
    composite::{divisor_factor, CompositeCategory},
    config::Tuning,
    error::SimResult,
    event::SimEvent,
    skills::{SkillId, SkillSet},
    state::{Activity, WorldState},
    subsystem::{SimSubsystem, TickContext},
};

/// 1 − (1 − baseline) / salvage factor. Factor floored at 1.
pub fn salvage_fraction(tuning: &Tuning, skills: &SkillSet) -> f64 {
    let loss = (1.0 - tuning.baseline_salvage_fraction).clamp(0.0, 1.0);
    1.0 - loss / divisor_factor(CompositeCategory::Salvage, skills)
}

pub struct RecyclingSubsystem;

impl RecyclingSubsystem {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RecyclingSubsystem {
    fn default() -> Self { Self::new() }
}

impl SimSubsystem for RecyclingSubsystem {
    fn name(&self) -> &'static str { "recycling" }

    fn update(&mut self, ctx: &mut TickContext<'_>, state: &mut WorldState) -> SimResult<Vec<SimEvent>> {
        let data = ctx.data;
        let fraction = salvage_fraction(&data.tuning, &state.skills);
        let dexterity = state.skills.get(SkillId::Dexterity).max(0.0);

        for zone in &data.zones {
            let probes = state.probes_on(&zone.id, Activity::RecycleSlag);
            if probes <= 0.0 {
                continue;
            }
            let Some(res) = state.zones.get_mut(&zone.id) else { continue };
            let capacity = data.tuning.base_recycle_rate_kg_day * probes * dexterity * ctx.throttle * ctx.dt;
            let processed = capacity.min(res.slag).max(0.0);
            if processed <= 0.0 {
                continue;
            }
            let recovered = processed * fraction;
            res.slag = (res.slag - recovered).max(0.0);
            res.stored_metal += recovered;
            ctx.flows_mut(&zone.id).metal_recycled += recovered;
            log::debug!("tick={} recycling: {} recovered {recovered:.2} kg", ctx.tick, zone.id);
        }

        Ok(vec![])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn baseline_salvage_is_about_75_percent() {
        let tuning = Tuning::default();
        let f = salvage_fraction(&tuning, &SkillSet::default());
        // The materials coefficient nudges the baseline factor just above 1.
        assert!((0.75..0.76).contains(&f), "f = {f}");
    }

    #[test]
    fn salvage_improves_but_stays_below_one() {
        let tuning = Tuning::default();
        let mut skills = SkillSet::default();
        for skill in [SkillId::Recycling, SkillId::Materials, SkillId::Production] {
            skills.set(skill, 100.0);
        }
        let f = salvage_fraction(&tuning, &skills);
        assert!(f > 0.75 && f < 1.0);
    }
}
