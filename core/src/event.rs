//! Domain events emitted during a tick or by an applied action.
//!
//! Events are a record of what happened; no subsystem reads them back.
//! The engine hands them to the caller and, when a store is attached,
//! appends them to the event log.

use crate::types::{Days, Kg, RunId, Tick, TransferId, ZoneId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SimEvent {
    // ── Research ───────────────────────────────────
    TrancheCompleted {
        tick: Tick,
        tree: String,
        tier: String,
        tranches_completed: u32,
    },
    TierCompleted {
        tick: Tick,
        tree: String,
        tier: String,
        day: Days,
    },

    // ── Energy ─────────────────────────────────────
    EnergyShortfallStarted {
        tick: Tick,
        throttle: f64,
    },
    EnergyShortfallEnded {
        tick: Tick,
    },

    // ── Mining / probes / Dyson ────────────────────
    ZoneDepleted {
        tick: Tick,
        zone: ZoneId,
    },
    ProbesReplicated {
        tick: Tick,
        zone: ZoneId,
        count: u64,
    },
    DysonCompleted {
        tick: Tick,
        mass: Kg,
    },

    // ── Transfers ──────────────────────────────────
    TransferDispatched {
        tick: Tick,
        transfer_id: TransferId,
        quantity: f64,
        arrival_day: Days,
    },
    TransferArrived {
        tick: Tick,
        transfer_id: TransferId,
        to_zone: ZoneId,
        quantity: f64,
    },
    TransferCompleted {
        tick: Tick,
        transfer_id: TransferId,
    },

    // ── Actions ────────────────────────────────────
    ActionApplied {
        tick: Tick,
        action_type: String,
    },
}

impl SimEvent {
    /// Stable string name, used for the event_type column.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::TrancheCompleted { .. } => "tranche_completed",
            Self::TierCompleted { .. } => "tier_completed",
            Self::EnergyShortfallStarted { .. } => "energy_shortfall_started",
            Self::EnergyShortfallEnded { .. } => "energy_shortfall_ended",
            Self::ZoneDepleted { .. } => "zone_depleted",
            Self::ProbesReplicated { .. } => "probes_replicated",
            Self::DysonCompleted { .. } => "dyson_completed",
            Self::TransferDispatched { .. } => "transfer_dispatched",
            Self::TransferArrived { .. } => "transfer_arrived",
            Self::TransferCompleted { .. } => "transfer_completed",
            Self::ActionApplied { .. } => "action_applied",
        }
    }
}

/// The event log entry as persisted to SQLite.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventLogEntry {
    pub id: Option<i64>,
    pub run_id: RunId,
    pub tick: Tick,
    pub subsystem: String,
    pub event_type: String,
    pub payload: String, // JSON-serialized SimEvent
}
