//! Skill / research calculator.
//!
//! Research progress is turned into skill multipliers by continuous
//! exponential compounding:
//!
//!   researching:  bonus(t) = per_tranche · tranches · e^(r·(t − started_at))
//!   completed:    bonus(t) = 2 · per_tranche · tranche_count · e^(r·(t − completed_at))
//!
//! Tiers of one tree multiply: skill = Π (1 + bonus). Trees are never
//! summed with each other; each feeds its own `SkillId`.

use crate::{
    config::{GameData, ResearchTierConfig, ResearchTreeConfig},
    types::{Days, TreeId},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Compounding rate, per simulated day.
pub const COMPOUND_RATE_PER_DAY: f64 = 0.20;

/// Upper bound on the compounding exponent. e^50 ≈ 5e21, far past any
/// balance-relevant value but comfortably finite.
pub const MAX_COMPOUND_EXPONENT: f64 = 50.0;

/// Every skill the simulation knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkillId {
    Propulsion,
    Locomotion,
    Dexterity,
    Materials,
    Production,
    Recycling,
    DysonConstruction,
    SolarPv,
    Thermal,
    Cpu,
    Gpu,
    Interconnect,
    IoBandwidth,
    /// Geometric mean of the four compute sub-skills. Never researched directly.
    Compute,
}

impl SkillId {
    pub const ALL: [SkillId; 14] = [
        SkillId::Propulsion,
        SkillId::Locomotion,
        SkillId::Dexterity,
        SkillId::Materials,
        SkillId::Production,
        SkillId::Recycling,
        SkillId::DysonConstruction,
        SkillId::SolarPv,
        SkillId::Thermal,
        SkillId::Cpu,
        SkillId::Gpu,
        SkillId::Interconnect,
        SkillId::IoBandwidth,
        SkillId::Compute,
    ];

    pub const COMPUTE_PARTS: [SkillId; 4] =
        [SkillId::Cpu, SkillId::Gpu, SkillId::Interconnect, SkillId::IoBandwidth];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Propulsion => "propulsion",
            Self::Locomotion => "locomotion",
            Self::Dexterity => "dexterity",
            Self::Materials => "materials",
            Self::Production => "production",
            Self::Recycling => "recycling",
            Self::DysonConstruction => "dyson_construction",
            Self::SolarPv => "solar_pv",
            Self::Thermal => "thermal",
            Self::Cpu => "cpu",
            Self::Gpu => "gpu",
            Self::Interconnect => "interconnect",
            Self::IoBandwidth => "io_bandwidth",
            Self::Compute => "compute",
        }
    }
}

/// Current multiplier for every skill. Missing entries read as 1.0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillSet {
    values: BTreeMap<SkillId, f64>,
}

impl Default for SkillSet {
    fn default() -> Self {
        Self {
            values: SkillId::ALL.iter().map(|s| (*s, 1.0)).collect(),
        }
    }
}

impl SkillSet {
    pub fn get(&self, skill: SkillId) -> f64 {
        self.values.get(&skill).copied().unwrap_or(1.0)
    }

    /// Set a skill value. Non-finite or negative input is stored as 0.0.
    pub fn set(&mut self, skill: SkillId, value: f64) {
        let value = if value.is_finite() { value.max(0.0) } else { 0.0 };
        self.values.insert(skill, value);
    }

    pub fn iter(&self) -> impl Iterator<Item = (SkillId, f64)> + '_ {
        self.values.iter().map(|(k, v)| (*k, *v))
    }

    /// Recompute the compute skill from its four parts.
    pub fn refresh_compute(&mut self) {
        let mean = geometric_mean(SkillId::COMPUTE_PARTS.iter().map(|s| self.get(*s)));
        self.set(SkillId::Compute, mean);
    }
}

/// Geometric mean over the strictly positive, finite inputs.
/// Returns 1.0 when nothing survives the filter.
pub fn geometric_mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum_ln, n) = values
        .filter(|v| v.is_finite() && *v > 0.0)
        .fold((0.0, 0usize), |(acc, n), v| (acc + v.ln(), n + 1));
    if n == 0 {
        return 1.0;
    }
    (sum_ln / n as f64).exp()
}

// ── Research progress ─────────────────────────────────────────────

/// Progress of one research tier.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TierProgress {
    pub tranches_completed: u32,
    /// FLOP-days accumulated toward the next tranche.
    pub progress: f64,
    /// Day the first intelligence was spent on this tier.
    pub started_at: Option<Days>,
    /// Day the final tranche completed.
    pub completed_at: Option<Days>,
}

impl TierProgress {
    pub fn is_completed(&self) -> bool {
        self.completed_at.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeProgress {
    pub enabled: bool,
    pub tiers: Vec<TierProgress>,
}

/// Research progress for every tree in the catalogue.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResearchState {
    pub trees: BTreeMap<TreeId, TreeProgress>,
}

impl ResearchState {
    /// Fresh state with every tree enabled and no progress.
    pub fn new(data: &GameData) -> Self {
        let trees = data
            .research
            .iter()
            .map(|tree| {
                (
                    tree.id.clone(),
                    TreeProgress {
                        enabled: true,
                        tiers: vec![TierProgress::default(); tree.tiers.len()],
                    },
                )
            })
            .collect();
        Self { trees }
    }
}

fn compound(principal: f64, since: Days, now: Days) -> f64 {
    if principal <= 0.0 || !principal.is_finite() {
        return 0.0;
    }
    let elapsed = (now - since).max(0.0);
    let exponent = (COMPOUND_RATE_PER_DAY * elapsed).min(MAX_COMPOUND_EXPONENT);
    principal * exponent.exp()
}

/// Bonus contributed by a single tier at day `now`.
pub fn tier_bonus(config: &ResearchTierConfig, progress: &TierProgress, now: Days) -> f64 {
    if let Some(completed_at) = progress.completed_at {
        let principal = 2.0 * config.bonus_per_tranche * f64::from(config.tranches);
        return compound(principal, completed_at, now);
    }
    if progress.tranches_completed == 0 {
        return 0.0;
    }
    let principal = config.bonus_per_tranche * f64::from(progress.tranches_completed);
    compound(principal, progress.started_at.unwrap_or(now), now)
}

/// Multiplier produced by a whole tree: the product of (1 + bonus) per tier.
pub fn tree_multiplier(config: &ResearchTreeConfig, progress: Option<&TreeProgress>, now: Days) -> f64 {
    let Some(progress) = progress else {
        return 1.0;
    };
    config
        .tiers
        .iter()
        .zip(progress.tiers.iter())
        .map(|(tier, p)| 1.0 + tier_bonus(tier, p, now))
        .product()
}

/// Recompute every skill from research progress.
pub fn compute_skills(data: &GameData, research: &ResearchState, now: Days) -> SkillSet {
    let mut skills = SkillSet::default();
    for tree in &data.research {
        if tree.skill == SkillId::Compute {
            continue;
        }
        let m = tree_multiplier(tree, research.trees.get(&tree.id), now);
        let current = skills.get(tree.skill);
        skills.set(tree.skill, current * m);
    }
    skills.refresh_compute();
    skills
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tier(per: f64, tranches: u32) -> ResearchTierConfig {
        ResearchTierConfig {
            id: "t1".into(),
            name: "Tier 1".into(),
            tranches,
            bonus_per_tranche: per,
            tranche_cost: 1.0,
        }
    }

    #[test]
    fn zero_progress_gives_no_bonus() {
        let cfg = tier(0.02, 10);
        assert_eq!(tier_bonus(&cfg, &TierProgress::default(), 100.0), 0.0);
    }

    #[test]
    fn researching_tier_compounds_from_start() {
        let cfg = tier(0.02, 10);
        let p = TierProgress {
            tranches_completed: 5,
            progress: 0.0,
            started_at: Some(0.0),
            completed_at: None,
        };
        let expected = 0.10 * 2.0f64.exp();
        assert!((tier_bonus(&cfg, &p, 10.0) - expected).abs() < 1e-6);
        assert!((tier_bonus(&cfg, &p, 10.0) - 0.739).abs() < 1e-3);
    }

    #[test]
    fn completed_tier_doubles_principal() {
        let cfg = tier(0.02, 10);
        let p = TierProgress {
            tranches_completed: 10,
            progress: 0.0,
            started_at: Some(0.0),
            completed_at: Some(30.0),
        };
        assert!((tier_bonus(&cfg, &p, 30.0) - 0.40).abs() < 1e-12);
        let later = 0.40 * (COMPOUND_RATE_PER_DAY * 5.0).exp();
        assert!((tier_bonus(&cfg, &p, 35.0) - later).abs() < 1e-9);
    }

    #[test]
    fn compounding_stays_finite_far_in_the_future() {
        let cfg = tier(1.0, 10);
        let p = TierProgress {
            tranches_completed: 10,
            progress: 0.0,
            started_at: Some(0.0),
            completed_at: Some(0.0),
        };
        assert!(tier_bonus(&cfg, &p, 1.0e9).is_finite());
    }

    #[test]
    fn geometric_mean_ignores_non_positive() {
        assert_eq!(geometric_mean([0.0, -1.0].into_iter()), 1.0);
        assert!((geometric_mean([4.0, 1.0, 0.0].into_iter()) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn compute_is_geometric_mean_of_parts() {
        let mut skills = SkillSet::default();
        skills.set(SkillId::Cpu, 16.0);
        skills.refresh_compute();
        assert!((skills.get(SkillId::Compute) - 2.0).abs() < 1e-12);
    }
}
