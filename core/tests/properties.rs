//! Property tests over the pure arithmetic at the heart of a tick.

use dyson_core::{
    composite::{composite_factor, divisor_factor, weighted_factor, CompositeCategory},
    config::Tuning,
    energy_subsystem::throttle,
    mining_subsystem::extract,
    recycling_subsystem::salvage_fraction,
    skills::{SkillId, SkillSet},
};
use proptest::prelude::*;

const CATEGORIES: [CompositeCategory; 6] = [
    CompositeCategory::Mining,
    CompositeCategory::Building,
    CompositeCategory::Salvage,
    CompositeCategory::TransferSpeed,
    CompositeCategory::DeltaVReduction,
    CompositeCategory::EnergyEfficiency,
];

fn skills_from(values: &[f64]) -> SkillSet {
    let mut skills = SkillSet::default();
    for (skill, value) in SkillId::ALL.iter().zip(values) {
        skills.set(*skill, *value);
    }
    skills
}

proptest! {
    #[test]
    fn throttle_stays_in_unit_interval(production in any::<f64>(), consumption in any::<f64>()) {
        let t = throttle(production, consumption);
        prop_assert!((0.0..=1.0).contains(&t), "throttle({production}, {consumption}) = {t}");
    }

    #[test]
    fn composites_are_finite_and_positive(values in prop::collection::vec(1.0f64..1.0e6, 14)) {
        let skills = skills_from(&values);
        for category in CATEGORIES {
            let f = composite_factor(category, &skills);
            prop_assert!(f.is_finite() && f > 0.0, "{category:?} = {f}");
            prop_assert!(divisor_factor(category, &skills) >= 1.0);
        }
    }

    #[test]
    fn weighted_factor_ignores_bad_terms(good in 0.5f64..10.0, alpha in 0.1f64..2.0) {
        let clean = weighted_factor([good].into_iter(), alpha);
        let noisy = weighted_factor([good, f64::NAN, -1.0, 0.0, f64::INFINITY].into_iter(), alpha);
        prop_assert_eq!(clean, noisy);
    }

    #[test]
    fn extraction_conserves_mass(
        requested in 0.0f64..1.0e6,
        remaining in 0.0f64..1.0e6,
        metallicity in 0.01f64..1.0,
    ) {
        let out = extract(requested, remaining, metallicity);
        prop_assert!(out.metal >= 0.0 && out.slag >= 0.0);
        prop_assert!(out.metal <= requested && out.metal <= remaining);
        let removed = out.metal + out.slag;
        prop_assert!((removed * metallicity - out.metal).abs() <= 1e-9 * removed.max(1.0));
    }

    #[test]
    fn salvage_never_reaches_one(values in prop::collection::vec(1.0f64..1.0e9, 14)) {
        let tuning = Tuning::default();
        let f = salvage_fraction(&tuning, &skills_from(&values));
        prop_assert!(f >= tuning.baseline_salvage_fraction && f < 1.0, "f = {f}");
    }
}
