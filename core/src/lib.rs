//! Deterministic simulation core for a Dyson-swarm incremental game.
//!
//! `SimEngine` owns the world state and advances it one tick at a time;
//! `harness` runs an engine on its own thread behind a message channel.

pub mod clock;
pub mod command;
pub mod composite;
pub mod config;
pub mod dyson_subsystem;
pub mod energy_subsystem;
pub mod engine;
pub mod error;
pub mod event;
pub mod harness;
pub mod mining_subsystem;
pub mod orbital;
pub mod probe_subsystem;
pub mod production;
pub mod recycling_subsystem;
pub mod research_subsystem;
pub mod skills;
pub mod snapshot;
pub mod state;
pub mod store;
pub mod structure_subsystem;
pub mod subsystem;
pub mod transfer_subsystem;
pub mod types;
