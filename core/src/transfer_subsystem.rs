//! Transfer subsystem: orbital logistics between zones.
//!
//! Two modes:
//!   - one-time:   the whole quantity is debited at creation and travels
//!                 as a single batch; the transfer disappears on arrival.
//!   - continuous: a rate feeds an accumulator every tick; whole batches
//!                 (1 probe, or `metal_batch_kg` of metal) dispatch when the
//!                 source has the stock and are debited immediately.
//!
//! Metal can only leave a zone through its mass drivers. Their combined
//! throughput (capacity · Δt, plus up to one batch of credit left unused
//! by earlier ticks) is a hard per-tick ceiling, consumed in transfer
//! creation order. Batches already in flight always arrive, paused or not.

use crate::{
    config::GameData,
    error::{ActionError, SimResult},
    event::SimEvent,
    orbital::ZoneRegistry,
    state::WorldState,
    subsystem::{SimSubsystem, TickContext},
    types::{Days, ProbeTypeId, TransferId, ZoneId},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Probes,
    Metal,
}

/// Rate of a continuous transfer. Percentages are 0–100.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransferRate {
    /// Units per day.
    Fixed { per_day: f64 },
    /// Share of what the source zone produced this tick.
    PercentOfProduction { percent: f64 },
    /// Share of the source stock, per day.
    PercentOfStock { percent: f64 },
}

impl TransferRate {
    fn validate(&self) -> Result<(), ActionError> {
        match *self {
            TransferRate::Fixed { per_day } => {
                if !per_day.is_finite() || per_day <= 0.0 {
                    return Err(ActionError::InvalidValue { field: "per_day", value: per_day });
                }
            }
            TransferRate::PercentOfProduction { percent } | TransferRate::PercentOfStock { percent } => {
                if !percent.is_finite() || percent <= 0.0 || percent > 100.0 {
                    return Err(ActionError::InvalidValue { field: "percent", value: percent });
                }
            }
        }
        Ok(())
    }

    /// Nominal kg/day this rate could ask of the mass drivers, if known up front.
    fn nominal_per_day(&self) -> Option<f64> {
        match *self {
            TransferRate::Fixed { per_day } => Some(per_day),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransferMode {
    OneTime { quantity: f64 },
    Continuous { rate: TransferRate },
}

/// Cargo in flight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CargoBatch {
    pub quantity: f64,
    pub departure_day: Days,
    pub arrival_day: Days,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transfer {
    pub id: TransferId,
    pub from_zone: ZoneId,
    pub to_zone: ZoneId,
    pub resource: ResourceKind,
    /// Set for probe transfers only.
    pub probe_type: Option<ProbeTypeId>,
    pub mode: TransferMode,
    pub paused: bool,
    pub created_at: Days,
    pub delta_v_km_s: f64,
    /// Duration a batch dispatched now would take, after mass-driver and
    /// Dyson-zone adjustments.
    pub transfer_time_days: Days,
    /// Fractional units waiting to form a whole batch.
    pub send_accumulator: f64,
    /// Mass-driver throughput reserved by a continuous metal transfer, kg/day.
    pub rate_cap_per_day: Option<f64>,
    pub in_flight: Vec<CargoBatch>,
    pub total_dispatched: f64,
    pub total_arrived: f64,
}

impl Transfer {
    pub fn is_continuous(&self) -> bool {
        matches!(self.mode, TransferMode::Continuous { .. })
    }

    pub fn in_transit(&self) -> f64 {
        self.in_flight.iter().map(|b| b.quantity).sum()
    }
}

/// Payload of the create-transfer action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTransfer {
    pub from_zone: ZoneId,
    pub to_zone: ZoneId,
    pub resource_kind: ResourceKind,
    #[serde(default)]
    pub probe_type: Option<ProbeTypeId>,
    pub mode: TransferMode,
}

/// Base duration adjusted for the source's mass drivers and for metal
/// bound for the Dyson zone.
pub fn effective_duration(
    data: &GameData,
    state: &WorldState,
    from: &str,
    to: &str,
    resource: ResourceKind,
    base: Days,
) -> Days {
    let mut days = base;
    if state.mass_driver_count(from, data) > 0 {
        days *= data.tuning.mass_driver_duration_factor;
    }
    let into_dyson = data.zone(to).is_some_and(|z| z.is_dyson_zone);
    if resource == ResourceKind::Metal && into_dyson {
        days *= data.tuning.dyson_zone_metal_duration_factor;
    }
    days.max(0.0)
}

fn batch_size(data: &GameData, resource: ResourceKind) -> f64 {
    match resource {
        ResourceKind::Metal => data.tuning.metal_batch_kg,
        ResourceKind::Probes => data.tuning.probe_batch.max(1.0).floor(),
    }
}

fn source_stock(state: &WorldState, t: &Transfer) -> f64 {
    match t.resource {
        ResourceKind::Metal => state.stored_metal(&t.from_zone),
        ResourceKind::Probes => {
            state.probes_of_type(&t.from_zone, t.probe_type.as_deref().unwrap_or_default()) as f64
        }
    }
}

fn debit(state: &mut WorldState, zone: &str, resource: ResourceKind, probe_type: Option<&str>, qty: f64) {
    match resource {
        ResourceKind::Metal => {
            if let Some(res) = state.zones.get_mut(zone) {
                res.stored_metal = (res.stored_metal - qty).max(0.0);
            }
        }
        ResourceKind::Probes => {
            state.remove_probes(zone, probe_type.unwrap_or_default(), qty.round() as u64);
        }
    }
}

fn credit(state: &mut WorldState, zone: &str, resource: ResourceKind, probe_type: Option<&str>, qty: f64) {
    match resource {
        ResourceKind::Metal => {
            if let Some(res) = state.zones.get_mut(zone) {
                res.stored_metal += qty.max(0.0);
            }
        }
        ResourceKind::Probes => {
            state.add_probes(zone, probe_type.unwrap_or_default(), qty.round() as u64);
        }
    }
}

/// Throughput available to a zone's mass drivers this tick.
fn driver_budget(carried: f64, capacity_per_day: f64, dt: Days) -> f64 {
    (carried.max(0.0) + capacity_per_day * dt).max(0.0)
}

/// Unused throughput kept for the next tick, capped at one batch.
fn carried_credit(left: f64, batch: f64) -> f64 {
    left.clamp(0.0, batch.max(0.0))
}

/// Mass-driver throughput of `zone` not yet reserved by continuous metal
/// transfers other than `except`.
fn unreserved_capacity(state: &WorldState, data: &GameData, zone: &str, except: Option<&str>) -> f64 {
    let reserved: f64 = state
        .transfers
        .iter()
        .filter(|t| t.from_zone == zone && t.resource == ResourceKind::Metal && t.is_continuous())
        .filter(|t| except != Some(t.id.as_str()))
        .filter_map(|t| t.rate_cap_per_day)
        .sum();
    state.mass_driver_capacity(zone, data) - reserved
}

/// Cap reserved for a continuous metal rate, or an error if the source's
/// drivers are fully booked.
fn metal_rate_cap(
    state: &WorldState,
    data: &GameData,
    zone: &str,
    rate: &TransferRate,
    except: Option<&str>,
) -> Result<f64, ActionError> {
    let remaining = unreserved_capacity(state, data, zone, except);
    if remaining <= 0.0 {
        return Err(ActionError::MassDriverSaturated(zone.to_string()));
    }
    Ok(match rate.nominal_per_day() {
        Some(per_day) => per_day.min(remaining),
        None => remaining,
    })
}

/// Validate and register a new transfer. One-time transfers debit the
/// source here; nothing is mutated if validation fails.
pub fn create_transfer(
    state: &mut WorldState,
    data: &GameData,
    registry: &ZoneRegistry,
    request: &NewTransfer,
) -> Result<TransferId, ActionError> {
    let from = request.from_zone.as_str();
    let to = request.to_zone.as_str();
    if data.zone(from).is_none() {
        return Err(ActionError::UnknownZone(from.to_string()));
    }
    if data.zone(to).is_none() {
        return Err(ActionError::UnknownZone(to.to_string()));
    }
    if from == to {
        return Err(ActionError::InvalidTransfer("source and destination are the same zone".into()));
    }

    let resource = request.resource_kind;
    let probe_type = match resource {
        ResourceKind::Metal => None,
        ResourceKind::Probes => {
            let id = match &request.probe_type {
                Some(id) => id.clone(),
                None => data.tuning.default_probe_type.clone(),
            };
            if data.probe_type(&id).is_none() {
                return Err(ActionError::UnknownProbeType(id));
            }
            Some(id)
        }
    };
    if resource == ResourceKind::Metal && state.mass_driver_count(from, data) == 0 {
        return Err(ActionError::NoMassDriver(from.to_string()));
    }

    let mut rate_cap = None;
    match &request.mode {
        TransferMode::OneTime { quantity } => {
            let q = *quantity;
            if !q.is_finite() || q <= 0.0 {
                return Err(ActionError::InvalidValue { field: "quantity", value: q });
            }
            match resource {
                ResourceKind::Metal => {
                    let available = state.stored_metal(from);
                    if q > available {
                        return Err(ActionError::InsufficientMetal {
                            zone: from.to_string(),
                            needed: q,
                            available,
                        });
                    }
                }
                ResourceKind::Probes => {
                    if q.fract() != 0.0 {
                        return Err(ActionError::InvalidCount(format!("{q} is not a whole number of probes")));
                    }
                    let available = state.probes_of_type(from, probe_type.as_deref().unwrap_or_default());
                    if q as u64 > available {
                        return Err(ActionError::InsufficientProbes {
                            zone: from.to_string(),
                            needed: q as u64,
                            available,
                        });
                    }
                }
            }
        }
        TransferMode::Continuous { rate } => {
            rate.validate()?;
            if resource == ResourceKind::Metal {
                rate_cap = Some(metal_rate_cap(state, data, from, rate, None)?);
            }
        }
    }

    let estimate = registry
        .transfer_estimate(from, to, &state.skills)
        .ok_or_else(|| ActionError::InvalidTransfer(format!("no trajectory from {from} to {to}")))?;
    let duration = effective_duration(data, state, from, to, resource, estimate.duration_days);
    let now = state.clock.elapsed_days;

    let id = format!("transfer-{}", state.next_transfer_id);
    state.next_transfer_id += 1;

    let mut transfer = Transfer {
        id: id.clone(),
        from_zone: from.to_string(),
        to_zone: to.to_string(),
        resource,
        probe_type,
        mode: request.mode,
        paused: false,
        created_at: now,
        delta_v_km_s: estimate.delta_v_km_s,
        transfer_time_days: duration,
        send_accumulator: 0.0,
        rate_cap_per_day: rate_cap,
        in_flight: Vec::new(),
        total_dispatched: 0.0,
        total_arrived: 0.0,
    };

    if let TransferMode::OneTime { quantity } = request.mode {
        debit(state, from, resource, transfer.probe_type.as_deref(), quantity);
        transfer.in_flight.push(CargoBatch {
            quantity,
            departure_day: now,
            arrival_day: now + duration,
        });
        transfer.total_dispatched = quantity;
    }

    log::debug!("transfer: created {id} {from} -> {to} ({resource:?}, {duration:.1} days)");
    state.transfers.push(transfer);
    state.recompute_pools();
    Ok(id)
}

/// Change a transfer's rate and/or paused flag.
pub fn modify_transfer(
    state: &mut WorldState,
    data: &GameData,
    transfer_id: &str,
    rate: Option<TransferRate>,
    paused: Option<bool>,
) -> Result<(), ActionError> {
    let index = state
        .transfers
        .iter()
        .position(|t| t.id == transfer_id)
        .ok_or_else(|| ActionError::UnknownTransfer(transfer_id.to_string()))?;

    let mut new_cap = state.transfers[index].rate_cap_per_day;
    if let Some(rate) = &rate {
        let t = &state.transfers[index];
        if !t.is_continuous() {
            return Err(ActionError::InvalidTransfer(format!("{transfer_id} is not continuous")));
        }
        rate.validate()?;
        if t.resource == ResourceKind::Metal {
            new_cap = Some(metal_rate_cap(state, data, &t.from_zone, rate, Some(transfer_id))?);
        }
    }

    let t = &mut state.transfers[index];
    if let Some(rate) = rate {
        t.mode = TransferMode::Continuous { rate };
        t.rate_cap_per_day = new_cap;
    }
    if let Some(paused) = paused {
        t.paused = paused;
    }
    Ok(())
}

/// Remove a transfer. Cargo still in flight goes back to the source.
pub fn delete_transfer(state: &mut WorldState, transfer_id: &str) -> Result<Transfer, ActionError> {
    let index = state
        .transfers
        .iter()
        .position(|t| t.id == transfer_id)
        .ok_or_else(|| ActionError::UnknownTransfer(transfer_id.to_string()))?;
    let transfer = state.transfers.remove(index);
    let returned = transfer.in_transit();
    if returned > 0.0 {
        credit(
            state,
            &transfer.from_zone,
            transfer.resource,
            transfer.probe_type.as_deref(),
            returned,
        );
    }
    state.recompute_pools();
    Ok(transfer)
}

/// Units a continuous rate asks for during one tick.
fn requested_this_tick(ctx: &TickContext<'_>, state: &WorldState, t: &Transfer, rate: &TransferRate) -> f64 {
    let amount = match *rate {
        TransferRate::Fixed { per_day } => per_day * ctx.dt,
        TransferRate::PercentOfProduction { percent } => {
            let produced = ctx
                .flows(&t.from_zone)
                .map(|f| match t.resource {
                    ResourceKind::Metal => f.metal_mined + f.metal_recycled,
                    ResourceKind::Probes => f.probes_built as f64,
                })
                .unwrap_or(0.0);
            produced * percent / 100.0
        }
        TransferRate::PercentOfStock { percent } => source_stock(state, t) * percent / 100.0 * ctx.dt,
    };
    let amount = match t.rate_cap_per_day {
        Some(cap) => amount.min(cap * ctx.dt),
        None => amount,
    };
    amount.max(0.0)
}

pub struct TransferSubsystem;

impl TransferSubsystem {
    pub fn new() -> Self {
        Self
    }
}

impl Default for TransferSubsystem {
    fn default() -> Self { Self::new() }
}

impl SimSubsystem for TransferSubsystem {
    fn name(&self) -> &'static str { "transfer" }

    fn update(&mut self, ctx: &mut TickContext<'_>, state: &mut WorldState) -> SimResult<Vec<SimEvent>> {
        let mut events = Vec::new();
        let data = ctx.data;
        let now = ctx.now;
        let mut transfers = std::mem::take(&mut state.transfers);

        // Per-zone mass-driver budget: this tick's throughput plus the
        // credit carried from earlier ticks.
        let metal_batch = batch_size(data, ResourceKind::Metal);
        let mut ceiling: BTreeMap<ZoneId, f64> = BTreeMap::new();
        for zone in &data.zones {
            let capacity = state.mass_driver_capacity(&zone.id, data);
            if capacity > 0.0 {
                let carried = state.zones.get(&zone.id).map(|z| z.driver_credit_kg).unwrap_or(0.0);
                ceiling.insert(zone.id.clone(), driver_budget(carried, capacity, ctx.dt));
            }
        }

        // ── Dispatch ─────────────────────────────────────────
        for t in transfers.iter_mut() {
            if let Some(est) = ctx.metrics.get(ctx.registry, &t.from_zone, &t.to_zone, &state.skills) {
                t.delta_v_km_s = est.delta_v_km_s;
                if t.is_continuous() {
                    t.transfer_time_days =
                        effective_duration(data, state, &t.from_zone, &t.to_zone, t.resource, est.duration_days);
                }
            }

            let TransferMode::Continuous { rate } = t.mode else {
                if t.paused {
                    for batch in t.in_flight.iter_mut() {
                        batch.arrival_day += ctx.dt;
                    }
                }
                continue;
            };
            if t.paused {
                continue;
            }

            t.send_accumulator += requested_this_tick(ctx, state, t, &rate);
            let batch = batch_size(data, t.resource);
            if !(batch > 0.0) {
                continue;
            }
            let wanted = (t.send_accumulator / batch).floor();
            if wanted < 1.0 {
                continue;
            }

            let mut allowed = (source_stock(state, t) / batch).floor().min(wanted);
            if t.resource == ResourceKind::Metal {
                let budget = ceiling.entry(t.from_zone.clone()).or_insert(0.0);
                allowed = allowed.min((*budget / batch).floor());
                *budget = (*budget - allowed * batch).max(0.0);
            }
            let allowed = allowed.max(0.0);

            if allowed > 0.0 {
                let quantity = allowed * batch;
                debit(state, &t.from_zone, t.resource, t.probe_type.as_deref(), quantity);
                t.send_accumulator -= quantity;
                t.total_dispatched += quantity;
                let arrival_day = now + t.transfer_time_days;
                t.in_flight.push(CargoBatch { quantity, departure_day: now, arrival_day });
                log::debug!("tick={} transfer: {} dispatched {quantity}", ctx.tick, t.id);
                events.push(SimEvent::TransferDispatched {
                    tick: ctx.tick,
                    transfer_id: t.id.clone(),
                    quantity,
                    arrival_day,
                });
            }
            if allowed < wanted {
                // Blocked on stock or throughput: don't let a backlog pile up.
                t.send_accumulator = t.send_accumulator.min(batch);
            }
        }

        for (zone, left) in &ceiling {
            if let Some(res) = state.zones.get_mut(zone) {
                res.driver_credit_kg = carried_credit(*left, metal_batch);
            }
        }

        // ── Arrival ──────────────────────────────────────────
        for t in transfers.iter_mut() {
            let (arrived, pending): (Vec<CargoBatch>, Vec<CargoBatch>) =
                t.in_flight.drain(..).partition(|b| b.arrival_day <= now);
            t.in_flight = pending;
            for batch in arrived {
                credit(state, &t.to_zone, t.resource, t.probe_type.as_deref(), batch.quantity);
                t.total_arrived += batch.quantity;
                events.push(SimEvent::TransferArrived {
                    tick: ctx.tick,
                    transfer_id: t.id.clone(),
                    to_zone: t.to_zone.clone(),
                    quantity: batch.quantity,
                });
            }
        }

        transfers.retain(|t| {
            let done = !t.is_continuous() && t.in_flight.is_empty();
            if done {
                log::debug!("tick={} transfer: {} complete", ctx.tick, t.id);
                events.push(SimEvent::TransferCompleted { tick: ctx.tick, transfer_id: t.id.clone() });
            }
            !done
        });

        state.transfers = transfers;
        Ok(events)
    }
}
