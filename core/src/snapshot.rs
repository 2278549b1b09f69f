//! Snapshot serialization: full world state to/from JSON.
//!
//! A snapshot is taken every SNAPSHOT_INTERVAL ticks when a store is
//! attached. It is stored as a `SimSnapshot` envelope (run, tick, state)
//! and captures everything needed to resume from that tick.
//! Every map in the world state is ordered, so serializing the same state
//! twice yields the same bytes.

use crate::{
    clock::clamp_speed,
    error::{SimError, SimResult},
    state::WorldState,
    types::{RunId, Tick},
};
use serde::{Deserialize, Serialize};

/// Ticks between persisted snapshots (one minute of wall time at 60 Hz).
pub const SNAPSHOT_INTERVAL: Tick = 3600;

/// What the store keeps for each saved tick.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimSnapshot {
    pub run_id: RunId,
    pub tick: Tick,
    pub state: WorldState,
}

impl SimSnapshot {
    pub fn new(run_id: impl Into<RunId>, state: &WorldState) -> Self {
        Self {
            run_id: run_id.into(),
            tick: state.clock.current_tick,
            state: state.clone(),
        }
    }

    pub fn to_json(&self) -> SimResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse a stored snapshot. The envelope tick must match the clock
    /// inside the state.
    pub fn from_json(json: &str) -> SimResult<Self> {
        let mut snapshot: SimSnapshot = serde_json::from_str(json)?;
        snapshot.state = validate(snapshot.state)?;
        if snapshot.tick != snapshot.state.clock.current_tick {
            return Err(SimError::Initialization(format!(
                "snapshot for tick {} holds a state at tick {}",
                snapshot.tick, snapshot.state.clock.current_tick
            )));
        }
        Ok(snapshot)
    }
}

pub fn to_json(state: &WorldState) -> SimResult<String> {
    Ok(serde_json::to_string(state)?)
}

/// Parse a bare world state and reject states that could not have been
/// produced by a tick.
pub fn from_json(json: &str) -> SimResult<WorldState> {
    validate(serde_json::from_str(json)?)
}

fn validate(mut state: WorldState) -> SimResult<WorldState> {
    let elapsed = state.clock.elapsed_days;
    if !elapsed.is_finite() || elapsed < 0.0 {
        return Err(SimError::NonFinite { what: "elapsed_days", value: elapsed });
    }
    if !state.metal.is_finite() {
        return Err(SimError::NonFinite { what: "metal", value: state.metal });
    }
    state.clock.time_speed = clamp_speed(state.clock.time_speed);
    Ok(state)
}
