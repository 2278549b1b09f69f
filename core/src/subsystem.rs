//! Subsystem trait and per-tick context.
//!
//! RULE: Every subsystem implements SimSubsystem.
//! The engine calls update() on each registered subsystem
//! in registration order, every tick.
//! Execution order is fixed and documented in engine.rs.

use crate::{
    config::GameData,
    error::SimResult,
    event::SimEvent,
    orbital::{TransferMetricsCache, ZoneRegistry},
    state::WorldState,
    types::{Days, Kg, Tick, ZoneId},
};
use std::collections::BTreeMap;

/// Stable slot for each subsystem. The order of the variants is the
/// execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SubsystemSlot {
    Research,
    Energy,
    Mining,
    Structure,
    Probe,
    Dyson,
    Transfer,
    Recycling,
}

impl SubsystemSlot {
    pub fn name(self) -> &'static str {
        match self {
            Self::Research => "research",
            Self::Energy => "energy",
            Self::Mining => "mining",
            Self::Structure => "structure",
            Self::Probe => "probe",
            Self::Dyson => "dyson",
            Self::Transfer => "transfer",
            Self::Recycling => "recycling",
        }
    }
}

/// What happened in one zone during the current tick.
/// Used for percent-of-production transfers and display rates.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ZoneFlows {
    pub metal_mined: Kg,
    pub slag_produced: Kg,
    pub probe_mass_built: Kg,
    pub probes_built: u64,
    pub metal_recycled: Kg,
    pub dyson_mass_added: Kg,
}

/// Everything a subsystem may read besides the world state.
/// Lives for exactly one tick.
pub struct TickContext<'a> {
    pub tick: Tick,
    /// Length of this tick in days.
    pub dt: Days,
    /// Elapsed days at the end of this tick.
    pub now: Days,
    pub data: &'a GameData,
    pub registry: &'a ZoneRegistry,
    pub metrics: &'a mut TransferMetricsCache,
    /// Energy dampener for this tick. Set by the energy subsystem; 1.0
    /// until then.
    pub throttle: f64,
    pub flows: BTreeMap<ZoneId, ZoneFlows>,
}

impl<'a> TickContext<'a> {
    pub fn new(
        tick: Tick,
        dt: Days,
        now: Days,
        data: &'a GameData,
        registry: &'a ZoneRegistry,
        metrics: &'a mut TransferMetricsCache,
    ) -> Self {
        Self {
            tick,
            dt,
            now,
            data,
            registry,
            metrics,
            throttle: 1.0,
            flows: BTreeMap::new(),
        }
    }

    pub fn flows_mut(&mut self, zone: &str) -> &mut ZoneFlows {
        self.flows.entry(zone.to_string()).or_default()
    }

    pub fn flows(&self, zone: &str) -> Option<&ZoneFlows> {
        self.flows.get(zone)
    }
}

/// The contract every subsystem must fulfill.
pub trait SimSubsystem: Send {
    /// Unique stable name for this subsystem.
    fn name(&self) -> &'static str;

    /// Called once per tick by the engine.
    ///
    /// - `ctx`:   this tick's Δt, game data and throttle
    /// - `state`: the live world state; mutate only your own slice
    ///
    /// Returns a vec of new events to add to the tick's event log.
    fn update(&mut self, ctx: &mut TickContext<'_>, state: &mut WorldState) -> SimResult<Vec<SimEvent>>;
}
