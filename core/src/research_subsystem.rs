//! Research subsystem: first in the tick.
//!
//! Spends last tick's intelligence on research, then recomputes every
//! skill from the updated progress. Skills are never mutated anywhere
//! else; every later subsystem reads `state.skills` as written here.
//!
//! Intelligence is split evenly across enabled trees and always goes to
//! the lowest tier of a tree that is not yet completed. Progress past a
//! tranche boundary carries over, including into the next tier.

use crate::{
    config::{GameData, ResearchTreeConfig},
    error::{ActionError, SimResult},
    event::SimEvent,
    skills::{compute_skills, TreeProgress},
    state::WorldState,
    subsystem::{SimSubsystem, TickContext},
    types::{Days, Tick},
};

pub struct ResearchSubsystem;

impl ResearchSubsystem {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ResearchSubsystem {
    fn default() -> Self { Self::new() }
}

/// Feed `budget` FLOP-days into one tree. Returns any budget left over
/// once every tier is complete.
fn advance_tree(
    tick: Tick,
    config: &ResearchTreeConfig,
    progress: &mut TreeProgress,
    mut budget: f64,
    started: Days,
    now: Days,
    events: &mut Vec<SimEvent>,
) -> f64 {
    for (tier_cfg, tier) in config.tiers.iter().zip(progress.tiers.iter_mut()) {
        if tier.is_completed() {
            continue;
        }
        if budget <= 0.0 {
            break;
        }
        tier.started_at.get_or_insert(started);
        tier.progress += budget;
        budget = 0.0;

        while tier.progress >= tier_cfg.tranche_cost && tier.tranches_completed < tier_cfg.tranches {
            tier.progress -= tier_cfg.tranche_cost;
            tier.tranches_completed += 1;
            events.push(SimEvent::TrancheCompleted {
                tick,
                tree: config.id.clone(),
                tier: tier_cfg.id.clone(),
                tranches_completed: tier.tranches_completed,
            });
        }

        if tier.tranches_completed >= tier_cfg.tranches {
            tier.completed_at = Some(now);
            budget = std::mem::take(&mut tier.progress);
            log::info!("tick={tick} research: {}/{} completed", config.id, tier_cfg.id);
            events.push(SimEvent::TierCompleted {
                tick,
                tree: config.id.clone(),
                tier: tier_cfg.id.clone(),
                day: now,
            });
        }
    }
    budget
}

impl SimSubsystem for ResearchSubsystem {
    fn name(&self) -> &'static str { "research" }

    fn update(&mut self, ctx: &mut TickContext<'_>, state: &mut WorldState) -> SimResult<Vec<SimEvent>> {
        let mut events = Vec::new();
        let budget = state.energy.intelligence_flops * ctx.dt;

        let active: Vec<&ResearchTreeConfig> = ctx
            .data
            .research
            .iter()
            .filter(|tree| {
                state.research.trees.get(&tree.id).is_some_and(|p| {
                    p.enabled && p.tiers.iter().any(|t| !t.is_completed())
                })
            })
            .collect();

        if budget > 0.0 && budget.is_finite() && !active.is_empty() {
            let share = budget / active.len() as f64;
            let started = ctx.now - ctx.dt;
            for tree in active {
                if let Some(progress) = state.research.trees.get_mut(&tree.id) {
                    advance_tree(ctx.tick, tree, progress, share, started, ctx.now, &mut events);
                }
            }
        }

        state.skills = compute_skills(ctx.data, &state.research, ctx.now);
        ctx.metrics.invalidate();

        log::debug!(
            "tick={} research: budget={budget:.3e} compute={:.4}",
            ctx.tick,
            state.skills.get(crate::skills::SkillId::Compute)
        );
        Ok(events)
    }
}

/// Enable or disable research on a tree.
pub fn set_research_enabled(
    state: &mut WorldState,
    data: &GameData,
    tree: &str,
    enabled: bool,
) -> Result<(), ActionError> {
    if data.research_tree(tree).is_none() {
        return Err(ActionError::UnknownResearchTree(tree.to_string()));
    }
    let progress = state
        .research
        .trees
        .get_mut(tree)
        .ok_or_else(|| ActionError::UnknownResearchTree(tree.to_string()))?;
    progress.enabled = enabled;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ResearchTierConfig;
    use crate::skills::{SkillId, TierProgress};

    fn two_tier_tree() -> ResearchTreeConfig {
        let tier = |id: &str| ResearchTierConfig {
            id: id.into(),
            name: id.into(),
            tranches: 2,
            bonus_per_tranche: 0.1,
            tranche_cost: 10.0,
        };
        ResearchTreeConfig {
            id: "propulsion".into(),
            name: "Propulsion".into(),
            skill: SkillId::Propulsion,
            tiers: vec![tier("a"), tier("b")],
        }
    }

    #[test]
    fn progress_carries_across_tranches_and_tiers() {
        let tree = two_tier_tree();
        let mut progress = TreeProgress { enabled: true, tiers: vec![TierProgress::default(); 2] };
        let mut events = Vec::new();

        let left = advance_tree(1, &tree, &mut progress, 25.0, 0.0, 1.0, &mut events);
        assert_eq!(left, 0.0);
        assert!(progress.tiers[0].is_completed());
        assert_eq!(progress.tiers[0].completed_at, Some(1.0));
        assert_eq!(progress.tiers[1].progress, 5.0);
        assert_eq!(progress.tiers[1].started_at, Some(0.0));
        assert_eq!(events.len(), 3); // two tranches + tier completion
    }

    #[test]
    fn exhausted_tree_returns_budget() {
        let tree = two_tier_tree();
        let mut progress = TreeProgress { enabled: true, tiers: vec![TierProgress::default(); 2] };
        let mut events = Vec::new();
        let left = advance_tree(1, &tree, &mut progress, 100.0, 0.0, 1.0, &mut events);
        assert_eq!(left, 60.0);
        assert!(progress.tiers.iter().all(|t| t.is_completed()));
    }
}
