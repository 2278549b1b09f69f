//! Composite skill calculator.
//!
//!   factor = (Π coeff_i · skill_i) ^ (α / n)
//!
//! A geometric mean raised to a per-category exponent. Terms that are
//! non-positive or non-finite are dropped before the mean; with nothing
//! left the factor is 1.0.

use crate::skills::{SkillId, SkillSet};
use serde::{Deserialize, Serialize};

/// Exponent used by categories that do not set their own.
pub const DEFAULT_ALPHA: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompositeCategory {
    Mining,
    Building,
    Salvage,
    TransferSpeed,
    DeltaVReduction,
    EnergyEfficiency,
    /// Placeholder with no table; always evaluates to 1.0.
    Unconfigured,
}

impl CompositeCategory {
    /// The (skill, coefficient) table for this category.
    pub fn weights(self) -> &'static [(SkillId, f64)] {
        use SkillId::*;
        match self {
            Self::Mining => &[(Dexterity, 1.0), (Production, 1.0), (Materials, 1.1)],
            Self::Building => &[(Production, 1.0), (Dexterity, 1.0), (Materials, 1.0)],
            Self::Salvage => &[(Recycling, 1.0), (Materials, 1.1), (Production, 1.0)],
            Self::TransferSpeed => &[(Propulsion, 1.0), (Locomotion, 1.0)],
            Self::DeltaVReduction => &[(Propulsion, 1.0), (Compute, 1.05)],
            Self::EnergyEfficiency => &[(Thermal, 1.0), (Materials, 1.0), (Compute, 1.1)],
            Self::Unconfigured => &[],
        }
    }

    pub fn alpha(self) -> f64 {
        match self {
            Self::TransferSpeed => 0.75,
            Self::DeltaVReduction => 0.35,
            _ => DEFAULT_ALPHA,
        }
    }
}

/// Evaluate the composite factor for `category` against `skills`.
pub fn composite_factor(category: CompositeCategory, skills: &SkillSet) -> f64 {
    weighted_factor(
        category.weights().iter().map(|(s, c)| c * skills.get(*s)),
        category.alpha(),
    )
}

/// The formula itself, on pre-multiplied terms.
pub fn weighted_factor(terms: impl Iterator<Item = f64>, alpha: f64) -> f64 {
    let (sum_ln, n) = terms
        .filter(|t| t.is_finite() && *t > 0.0)
        .fold((0.0, 0usize), |(acc, n), t| (acc + t.ln(), n + 1));
    if n == 0 || !alpha.is_finite() {
        return 1.0;
    }
    let factor = (sum_ln * alpha / n as f64).exp();
    if factor.is_finite() { factor } else { 1.0 }
}

/// Composite factor used as a divisor: never below 1 so research can
/// only shorten, cheapen or speed things up.
pub fn divisor_factor(category: CompositeCategory, skills: &SkillSet) -> f64 {
    composite_factor(category, skills).max(1.0)
}
