//! Shared primitive types used across the entire simulation.

/// A simulation tick counter. Ticks are not fixed-length: each one
/// advances the world by a caller-supplied number of days.
pub type Tick = u64;

/// Simulated time, in days.
pub type Days = f64;

/// Stable identifier of an orbital zone ("earth", "mars", "dyson_sphere").
pub type ZoneId = String;

/// Identifier of a structure in the building catalogue.
pub type StructureId = String;

/// Identifier of a probe type in the probe catalogue.
pub type ProbeTypeId = String;

/// Identifier of a research tree in the research catalogue.
pub type TreeId = String;

/// Deterministic transfer identifier, `transfer-<n>`.
pub type TransferId = String;

/// Correlation id attached to an action by the foreground.
pub type ActionId = u64;

/// Kilograms.
pub type Kg = f64;

/// Watts.
pub type Watts = f64;

/// The canonical run identifier used by the snapshot store.
pub type RunId = String;
