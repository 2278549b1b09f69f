use thiserror::Error;

use crate::types::{StructureId, TransferId, ZoneId};

/// Engine-level failures. Anything here is either fatal to initialization
/// or a transport/persistence problem; player mistakes are `ActionError`.
#[derive(Error, Debug)]
pub enum SimError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Initialization failed: {0}")]
    Initialization(String),

    #[error("Zone '{zone}' not found")]
    ZoneNotFound { zone: ZoneId },

    #[error("Engine has not been started")]
    NotStarted,

    #[error("Non-finite value for {what}: {value}")]
    NonFinite { what: &'static str, value: f64 },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type SimResult<T> = Result<T, SimError>;

/// A rejected action. Returned before any mutation happens, so the
/// world state is untouched whenever one of these comes back.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ActionError {
    #[error("unknown zone '{0}'")]
    UnknownZone(ZoneId),

    #[error("unknown structure '{0}'")]
    UnknownStructure(StructureId),

    #[error("unknown probe type '{0}'")]
    UnknownProbeType(String),

    #[error("unknown research tree '{0}'")]
    UnknownResearchTree(String),

    #[error("unknown transfer '{0}'")]
    UnknownTransfer(TransferId),

    #[error("insufficient metal in {zone}: need {needed:.1} kg, have {available:.1} kg")]
    InsufficientMetal { zone: ZoneId, needed: f64, available: f64 },

    #[error("insufficient probes in {zone}: need {needed}, have {available}")]
    InsufficientProbes { zone: ZoneId, needed: u64, available: u64 },

    #[error("structure '{structure}' cannot be built in {zone}")]
    StructureNotAllowed { zone: ZoneId, structure: StructureId },

    #[error("no mass driver in {0}")]
    NoMassDriver(ZoneId),

    #[error("no mass driver capacity left in {0}")]
    MassDriverSaturated(ZoneId),

    #[error("invalid allocation: {0}")]
    InvalidAllocation(String),

    #[error("invalid transfer: {0}")]
    InvalidTransfer(String),

    #[error("invalid count: {0}")]
    InvalidCount(String),

    #[error("invalid value for {field}: {value}")]
    InvalidValue { field: &'static str, value: f64 },
}

/// A trajectory query that cannot be answered.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TrajectoryError {
    #[error("unknown zone '{0}'")]
    UnknownZone(ZoneId),

    #[error("flyby zone '{0}' must differ from both endpoints")]
    InvalidFlyby(ZoneId),

    #[error("batch of {requested} exceeds the limit of {limit}")]
    BatchTooLarge { requested: usize, limit: usize },
}
