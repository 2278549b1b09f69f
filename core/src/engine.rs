//! The simulation engine: owns the world state and advances it.
//!
//! EXECUTION ORDER (fixed, documented, never reordered):
//!   1. Research   (intelligence → tranche progress → skills)
//!   2. Energy     (balance and throttle for this tick)
//!   3. Mining
//!   4. Structures
//!   5. Probes     (replication)
//!   6. Dyson
//!   7. Transfers  (dispatch, then arrival)
//!   8. Recycling
//! then derived rates are recomputed and, every SNAPSHOT_INTERVAL ticks,
//! a snapshot is persisted.
//!
//! RULES:
//!   - Every subsystem sees the same Δt, skills and throttle.
//!   - No subsystem calls another subsystem's update directly.
//!   - Actions are applied between ticks, never during one.
//!   - No randomness: the same state and inputs give the same next state.

use crate::{
    command::{Action, ActionResult},
    config::{GameData, NewGameConfig, ZoneConfig},
    dyson_subsystem::{set_dyson_allocation, DysonSubsystem},
    energy_subsystem::EnergySubsystem,
    error::{ActionError, SimError, SimResult, TrajectoryError},
    event::{EventLogEntry, SimEvent},
    mining_subsystem::MiningSubsystem,
    orbital::{
        GravityAssistEstimate, TrajectoryEstimate, TrajectoryRequest, TransferEstimate, TransferMetricsCache,
        ZoneRegistry,
    },
    probe_subsystem::{allocate_probes, purchase_probe, ProbeSubsystem},
    recycling_subsystem::RecyclingSubsystem,
    research_subsystem::{set_research_enabled, ResearchSubsystem},
    snapshot::{self, SimSnapshot, SNAPSHOT_INTERVAL},
    state::{DerivedRates, WorldState, ZoneRates},
    store::SimStore,
    structure_subsystem::{purchase_structure, StructureSubsystem},
    subsystem::{SimSubsystem, SubsystemSlot, TickContext, ZoneFlows},
    transfer_subsystem::{
        create_transfer, delete_transfer, effective_duration, modify_transfer, ResourceKind,
        TransferSubsystem,
    },
    types::{Days, RunId, Tick, ZoneId},
};
use std::collections::BTreeMap;

/// Real-time tick cadence. One tick advances `time_speed / TICK_HZ` days.
pub const TICK_HZ: f64 = 60.0;

pub struct SimEngine {
    pub run_id: RunId,
    data: GameData,
    registry: ZoneRegistry,
    metrics: TransferMetricsCache,
    state: WorldState,
    subsystems: Vec<(SubsystemSlot, Box<dyn SimSubsystem>)>,
    store: Option<SimStore>,
}

impl SimEngine {
    /// A new game, fully wired with every subsystem.
    pub fn new(run_id: RunId, data: GameData, config: &NewGameConfig) -> SimResult<Self> {
        data.validate()?;
        let state = WorldState::new_game(&data, config)?;
        Ok(Self::build(run_id, data, state))
    }

    /// Resume from a prior world state (a snapshot).
    pub fn from_state(run_id: RunId, data: GameData, state: WorldState) -> SimResult<Self> {
        data.validate()?;
        for zone in state.zones.keys() {
            if data.zone(zone).is_none() {
                return Err(SimError::ZoneNotFound { zone: zone.clone() });
            }
        }
        Ok(Self::build(run_id, data, state))
    }

    /// Test engine: built-in game data, default new-game config and a
    /// migrated in-memory store.
    pub fn build_test(run_id: RunId) -> SimResult<Self> {
        let store = SimStore::in_memory()?;
        store.migrate()?;
        store.insert_run(&run_id, "test", "{}")?;
        Ok(Self::new(run_id, GameData::default_test(), &NewGameConfig::default())?.with_store(store))
    }

    fn build(run_id: RunId, data: GameData, state: WorldState) -> Self {
        let registry = ZoneRegistry::new(&data);
        let mut engine = Self {
            run_id,
            data,
            registry,
            metrics: TransferMetricsCache::default(),
            state,
            subsystems: Vec::new(),
            store: None,
        };

        // Execution order. Never reorder.
        engine.register(SubsystemSlot::Research, Box::new(ResearchSubsystem::new()));
        engine.register(SubsystemSlot::Energy, Box::new(EnergySubsystem::new()));
        engine.register(SubsystemSlot::Mining, Box::new(MiningSubsystem::new()));
        engine.register(SubsystemSlot::Structure, Box::new(StructureSubsystem::new()));
        engine.register(SubsystemSlot::Probe, Box::new(ProbeSubsystem::new()));
        engine.register(SubsystemSlot::Dyson, Box::new(DysonSubsystem::new()));
        engine.register(SubsystemSlot::Transfer, Box::new(TransferSubsystem::new()));
        engine.register(SubsystemSlot::Recycling, Box::new(RecyclingSubsystem::new()));
        engine
    }

    /// Register a subsystem. Call in the documented execution order.
    fn register(&mut self, slot: SubsystemSlot, subsystem: Box<dyn SimSubsystem>) {
        debug_assert_eq!(slot.name(), subsystem.name());
        self.subsystems.push((slot, subsystem));
    }

    /// Attach a store: events and periodic snapshots are persisted from
    /// now on.
    pub fn with_store(mut self, store: SimStore) -> Self {
        self.store = Some(store);
        self
    }

    pub fn store(&self) -> Option<&SimStore> {
        self.store.as_ref()
    }

    pub fn state(&self) -> &WorldState {
        &self.state
    }

    pub fn data(&self) -> &GameData {
        &self.data
    }

    /// An owned copy of the world state, safe to hand to another thread.
    pub fn snapshot(&self) -> WorldState {
        self.state.clone()
    }

    pub fn snapshot_json(&self) -> SimResult<String> {
        snapshot::to_json(&self.state)
    }

    pub fn current_tick(&self) -> Tick {
        self.state.clock.current_tick
    }

    /// Δt of one real-time tick at the current speed.
    pub fn tick_dt(&self) -> Days {
        self.state.clock.time_speed / TICK_HZ
    }

    /// Advance one real-time tick at the current speed.
    pub fn step(&mut self) -> SimResult<Vec<SimEvent>> {
        self.tick(self.tick_dt())
    }

    /// Advance one tick of `dt` days. This is the core simulation step.
    pub fn tick(&mut self, dt: Days) -> SimResult<Vec<SimEvent>> {
        if !dt.is_finite() || dt < 0.0 {
            return Err(SimError::NonFinite { what: "dt", value: dt });
        }

        let current_tick = self.state.clock.advance(dt);
        let now = self.state.clock.elapsed_days;
        let mut emitted: Vec<(&'static str, Vec<SimEvent>)> = Vec::with_capacity(self.subsystems.len());
        let flows = {
            let mut ctx = TickContext::new(
                current_tick,
                dt,
                now,
                &self.data,
                &self.registry,
                &mut self.metrics,
            );
            for (_, subsystem) in &mut self.subsystems {
                let new_events = subsystem.update(&mut ctx, &mut self.state)?;
                emitted.push((subsystem.name(), new_events));
            }
            ctx.flows
        };

        self.state.recompute_pools();
        self.state.derived = derive_rates(&self.data, &self.state, &flows, dt);

        // The state is final for this tick; only now are events written out.
        if let Some(store) = &self.store {
            for (name, events) in &emitted {
                persist_events(store, &self.run_id, current_tick, name, events)?;
            }
        }
        let tick_events: Vec<SimEvent> = emitted.into_iter().flat_map(|(_, events)| events).collect();

        if self.store.is_some() && current_tick % SNAPSHOT_INTERVAL == 0 {
            self.save_snapshot()?;
        }

        log::debug!(
            "tick={current_tick} engine: day={now:.3} probes={} metal={:.1} throttle={:.3}",
            self.state.total_probes(),
            self.state.metal,
            self.state.energy.throttle
        );
        Ok(tick_events)
    }

    /// Run `n` ticks of `dt` days. Used for testing and fast-forward.
    pub fn run_ticks(&mut self, n: u64, dt: Days) -> SimResult<Vec<SimEvent>> {
        let mut events = Vec::new();
        for _ in 0..n {
            events.extend(self.tick(dt)?);
        }
        Ok(events)
    }

    /// Apply a player action between ticks. On error nothing has changed.
    pub fn apply_action(&mut self, action: Action) -> Result<ActionResult, ActionError> {
        let action_type = action.type_name();
        let result = self.dispatch_action(action);
        match &result {
            Ok(_) => {
                self.state.recompute_pools();
                let event = SimEvent::ActionApplied {
                    tick: self.state.clock.current_tick,
                    action_type: action_type.to_string(),
                };
                if let Some(store) = &self.store {
                    let tick = self.state.clock.current_tick;
                    if let Err(e) = persist_events(store, &self.run_id, tick, "action", &[event]) {
                        log::warn!("engine: failed to log {action_type}: {e}");
                    }
                }
            }
            Err(e) => log::warn!("engine: rejected {action_type}: {e}"),
        }
        result
    }

    fn dispatch_action(&mut self, action: Action) -> Result<ActionResult, ActionError> {
        let data = &self.data;
        let state = &mut self.state;
        Ok(match action {
            Action::PurchaseStructure { zone, structure_id, count } => {
                ActionResult::StructurePurchased(purchase_structure(state, data, &zone, &structure_id, count)?)
            }
            Action::PurchaseProbe { zone, probe_type, count } => {
                let probe_type = probe_type.unwrap_or_else(|| data.tuning.default_probe_type.clone());
                ActionResult::ProbesPurchased(purchase_probe(state, data, &zone, &probe_type, count)?)
            }
            Action::AllocateProbes { zone, allocations } => {
                allocate_probes(state, data, &zone, &allocations)?;
                ActionResult::ProbesAllocated { zone }
            }
            Action::CreateTransfer(request) => {
                let transfer_id = create_transfer(state, data, &self.registry, &request)?;
                ActionResult::TransferCreated { transfer_id }
            }
            Action::ModifyTransfer { transfer_id, rate, paused } => {
                modify_transfer(state, data, &transfer_id, rate, paused)?;
                ActionResult::TransferModified { transfer_id }
            }
            Action::DeleteTransfer { transfer_id } => {
                let removed = delete_transfer(state, &transfer_id)?;
                ActionResult::TransferDeleted { transfer_id, returned: removed.in_transit() }
            }
            Action::SetTimeSpeed { speed } => {
                if !speed.is_finite() {
                    return Err(ActionError::InvalidValue { field: "speed", value: speed });
                }
                ActionResult::TimeSpeedSet { speed: state.clock.set_speed(speed) }
            }
            Action::SetResearchEnabled { tree, enabled } => {
                set_research_enabled(state, data, &tree, enabled)?;
                ActionResult::ResearchToggled { tree, enabled }
            }
            Action::SetDysonAllocation { economy_fraction } => {
                set_dyson_allocation(state, economy_fraction)?;
                ActionResult::DysonAllocationSet { economy_fraction }
            }
        })
    }

    /// Delta-v and duration for a prospective transfer under the current
    /// skills, including mass-driver and Dyson-zone adjustments.
    pub fn transfer_estimate(&mut self, from: &str, to: &str, resource: ResourceKind) -> Option<TransferEstimate> {
        let raw = self.metrics.get(&self.registry, from, to, &self.state.skills)?;
        Some(TransferEstimate {
            delta_v_km_s: raw.delta_v_km_s,
            duration_days: effective_duration(&self.data, &self.state, from, to, resource, raw.duration_days),
        })
    }

    pub fn zones(&self) -> &[ZoneConfig] {
        self.registry.zones()
    }

    pub fn gravity_assist_estimate(
        &self,
        from: &str,
        via: &str,
        to: &str,
    ) -> Result<GravityAssistEstimate, TrajectoryError> {
        self.registry.gravity_assist_estimate(from, via, to, &self.state.skills)
    }

    pub fn batch_estimates(
        &self,
        requests: &[TrajectoryRequest],
    ) -> Result<Vec<Result<TrajectoryEstimate, TrajectoryError>>, TrajectoryError> {
        self.registry.batch_estimates(requests, &self.state.skills)
    }

    /// Persist the current state to the attached store, if any.
    pub fn save_snapshot(&self) -> SimResult<()> {
        let Some(store) = &self.store else {
            return Ok(());
        };
        let tick = self.state.clock.current_tick;
        let json = SimSnapshot::new(self.run_id.clone(), &self.state).to_json()?;
        store.save_snapshot(&self.run_id, tick, &json)?;
        log::debug!("Snapshot saved at tick {tick}");
        Ok(())
    }
}

fn persist_events(
    store: &SimStore,
    run_id: &str,
    tick: Tick,
    subsystem: &str,
    events: &[SimEvent],
) -> SimResult<()> {
    for event in events {
        let entry = EventLogEntry {
            id: None,
            run_id: run_id.to_string(),
            tick,
            subsystem: subsystem.to_string(),
            event_type: event.type_name().to_string(),
            payload: serde_json::to_string(event)?,
        };
        store.append_event(&entry)?;
    }
    Ok(())
}

/// Display rates for this tick. Per-day figures are flows divided by Δt.
fn derive_rates(
    data: &GameData,
    state: &WorldState,
    flows: &BTreeMap<ZoneId, ZoneFlows>,
    dt: Days,
) -> DerivedRates {
    let per_day = |x: f64| if dt > 0.0 { x / dt } else { 0.0 };
    let probe_mass = data.default_probe().map(|p| p.mass_kg).unwrap_or(0.0);

    let mut derived = DerivedRates {
        energy_net_w: state.energy.production_w - state.energy.consumption_w,
        total_probes: state.total_probes(),
        ..DerivedRates::default()
    };
    for (zone, f) in flows {
        let rates = ZoneRates {
            metal_mined_per_day: per_day(f.metal_mined),
            slag_per_day: per_day(f.slag_produced),
            probes_per_day: if probe_mass > 0.0 { per_day(f.probe_mass_built) / probe_mass } else { 0.0 },
            metal_recycled_per_day: per_day(f.metal_recycled),
        };
        derived.metal_mined_per_day += rates.metal_mined_per_day;
        derived.slag_per_day += rates.slag_per_day;
        derived.probes_per_day += rates.probes_per_day;
        derived.metal_recycled_per_day += rates.metal_recycled_per_day;
        derived.dyson_mass_per_day += per_day(f.dyson_mass_added);
        derived.zones.insert(zone.clone(), rates);
    }
    for t in &state.transfers {
        match t.resource {
            ResourceKind::Probes => derived.probes_in_transit += t.in_transit(),
            ResourceKind::Metal => derived.metal_in_transit += t.in_transit(),
        }
    }
    derived
}
