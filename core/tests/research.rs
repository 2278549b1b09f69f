//! Research: intelligence → tranches → compounding skills.

use dyson_core::{
    command::Action,
    config::ResearchTierConfig,
    engine::SimEngine,
    event::SimEvent,
    skills::{tier_bonus, SkillId, TierProgress},
};

fn tier(bonus_per_tranche: f64, tranches: u32) -> ResearchTierConfig {
    ResearchTierConfig {
        id: "t".into(),
        name: "t".into(),
        tranches,
        bonus_per_tranche,
        tranche_cost: 1.0e15,
    }
}

/// 0.02/tranche, 5 of 10 tranches done, 10 days in: 0.10 · e² ≈ 0.739.
#[test]
fn researching_tier_compounds_continuously() {
    let progress = TierProgress {
        tranches_completed: 5,
        progress: 0.0,
        started_at: Some(0.0),
        completed_at: None,
    };
    let bonus = tier_bonus(&tier(0.02, 10), &progress, 10.0);
    assert!((bonus - 0.1 * 2f64.exp()).abs() < 1e-6, "bonus = {bonus}");
    assert!((bonus - 0.739).abs() < 1e-3);
}

/// On completion the principal doubles and compounding restarts.
#[test]
fn completed_tier_restarts_from_doubled_principal() {
    let progress = TierProgress {
        tranches_completed: 10,
        progress: 0.0,
        started_at: Some(0.0),
        completed_at: Some(42.0),
    };
    let cfg = tier(0.02, 10);
    assert!((tier_bonus(&cfg, &progress, 42.0) - 0.40).abs() < 1e-12);
    assert!((tier_bonus(&cfg, &progress, 47.0) - 0.40 * 1f64.exp()).abs() < 1e-9);
}

#[test]
fn huge_elapsed_time_stays_finite() {
    let progress = TierProgress {
        tranches_completed: 10,
        progress: 0.0,
        started_at: Some(0.0),
        completed_at: Some(0.0),
    };
    assert!(tier_bonus(&tier(0.02, 10), &progress, 1.0e12).is_finite());
}

#[test]
fn intelligence_completes_tranches_and_raises_skills() {
    let mut engine = SimEngine::build_test("research-progress".into()).unwrap();
    let mut last_counts: Vec<u32> = Vec::new();
    let mut tranche_events = 0;

    for _ in 0..40 {
        let events = engine.tick(1.0).unwrap();
        tranche_events += events
            .iter()
            .filter(|e| matches!(e, SimEvent::TrancheCompleted { .. }))
            .count();

        let counts: Vec<u32> = engine
            .state()
            .research
            .trees
            .values()
            .flat_map(|t| t.tiers.iter().map(|p| p.tranches_completed))
            .collect();
        if !last_counts.is_empty() {
            for (before, after) in last_counts.iter().zip(&counts) {
                assert!(after >= before, "tranche count went backwards");
            }
        }
        last_counts = counts;
    }

    assert!(tranche_events > 0);
    let skills = &engine.state().skills;
    assert!(skills.get(SkillId::Propulsion) > 1.0);
    assert!(skills.get(SkillId::Compute) > 1.0);
    for (_, value) in skills.iter() {
        assert!(value.is_finite() && value >= 1.0);
    }
}

#[test]
fn disabled_tree_gets_no_progress() {
    let mut engine = SimEngine::build_test("research-disabled".into()).unwrap();
    engine
        .apply_action(Action::SetResearchEnabled { tree: "propulsion".into(), enabled: false })
        .unwrap();
    engine.run_ticks(40, 1.0).unwrap();

    let state = engine.state();
    assert_eq!(state.skills.get(SkillId::Propulsion), 1.0);
    assert!(state.skills.get(SkillId::Locomotion) > 1.0);
    assert_eq!(state.research.trees["propulsion"].tiers[0].progress, 0.0);
}

#[test]
fn unknown_tree_is_rejected() {
    let mut engine = SimEngine::build_test("research-unknown".into()).unwrap();
    let err = engine
        .apply_action(Action::SetResearchEnabled { tree: "alchemy".into(), enabled: true })
        .unwrap_err();
    assert!(err.to_string().contains("alchemy"));
}
