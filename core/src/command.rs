use crate::{
    probe_subsystem::ProbePurchase,
    state::Activity,
    structure_subsystem::StructurePurchase,
    transfer_subsystem::{NewTransfer, TransferRate},
    types::{ProbeTypeId, StructureId, TransferId, TreeId, ZoneId},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

fn one() -> u64 {
    1
}

/// All player-issued actions. Applied between ticks, never mid-tick.
/// Wire shape: `{"type": "purchase_structure", "payload": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum Action {
    // ── Economy ───────────────────────────────────
    PurchaseStructure {
        zone: ZoneId,
        structure_id: StructureId,
        #[serde(default = "one")]
        count: u64,
    },
    PurchaseProbe {
        zone: ZoneId,
        #[serde(default)]
        probe_type: Option<ProbeTypeId>,
        #[serde(default = "one")]
        count: u64,
    },
    AllocateProbes {
        zone: ZoneId,
        allocations: BTreeMap<Activity, f64>,
    },

    // ── Logistics ─────────────────────────────────
    CreateTransfer(NewTransfer),
    ModifyTransfer {
        transfer_id: TransferId,
        #[serde(default)]
        rate: Option<TransferRate>,
        #[serde(default)]
        paused: Option<bool>,
    },
    DeleteTransfer {
        transfer_id: TransferId,
    },

    // ── Control ───────────────────────────────────
    SetTimeSpeed {
        speed: f64,
    },
    SetResearchEnabled {
        tree: TreeId,
        enabled: bool,
    },
    SetDysonAllocation {
        economy_fraction: f64,
    },
}

impl Action {
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::PurchaseStructure { .. } => "purchase_structure",
            Self::PurchaseProbe { .. } => "purchase_probe",
            Self::AllocateProbes { .. } => "allocate_probes",
            Self::CreateTransfer(_) => "create_transfer",
            Self::ModifyTransfer { .. } => "modify_transfer",
            Self::DeleteTransfer { .. } => "delete_transfer",
            Self::SetTimeSpeed { .. } => "set_time_speed",
            Self::SetResearchEnabled { .. } => "set_research_enabled",
            Self::SetDysonAllocation { .. } => "set_dyson_allocation",
        }
    }
}

/// What a successful action did.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ActionResult {
    StructurePurchased(StructurePurchase),
    ProbesPurchased(ProbePurchase),
    ProbesAllocated { zone: ZoneId },
    TransferCreated { transfer_id: TransferId },
    TransferModified { transfer_id: TransferId },
    TransferDeleted { transfer_id: TransferId, returned: f64 },
    TimeSpeedSet { speed: f64 },
    ResearchToggled { tree: TreeId, enabled: bool },
    DysonAllocationSet { economy_fraction: f64 },
}
