//! SQLite persistence layer.
//!
//! RULE: Only store.rs talks to the database.
//! The engine calls store methods; subsystems never see it.

use rusqlite::{params, Connection, OptionalExtension};
use crate::{
    error::SimResult,
    event::EventLogEntry,
    types::Tick,
};

pub struct SimStore {
    conn: Connection,
}

impl SimStore {
    /// Open (or create) the simulation database at `path`.
    pub fn open(path: &str) -> SimResult<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn })
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> SimResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn })
    }

    /// Apply all schema migrations in order.
    pub fn migrate(&self) -> SimResult<()> {
        self.conn.execute_batch(include_str!("../../migrations/001_foundation.sql"))?;
        Ok(())
    }

    // ── Run ────────────────────────────────────────────────────

    /// Register a run. Re-registering an existing run is a no-op so a
    /// resumed run can reuse its id.
    pub fn insert_run(&self, run_id: &str, version: &str, config_json: &str) -> SimResult<()> {
        self.conn.execute(
            "INSERT OR IGNORE INTO run (run_id, version, config_json, started_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![run_id, version, config_json, 0i64],
        )?;
        Ok(())
    }

    pub fn run_config(&self, run_id: &str) -> SimResult<Option<String>> {
        let config = self
            .conn
            .query_row(
                "SELECT config_json FROM run WHERE run_id = ?1",
                params![run_id],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(config)
    }

    // ── Event log ──────────────────────────────────────────────

    pub fn append_event(&self, entry: &EventLogEntry) -> SimResult<()> {
        self.conn.execute(
            "INSERT INTO event_log (run_id, tick, subsystem, event_type, payload)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                entry.run_id,
                entry.tick as i64,
                entry.subsystem,
                entry.event_type,
                entry.payload,
            ],
        )?;
        Ok(())
    }

    pub fn events_for_tick(&self, run_id: &str, tick: Tick) -> SimResult<Vec<EventLogEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, run_id, tick, subsystem, event_type, payload
             FROM event_log WHERE run_id = ?1 AND tick = ?2
             ORDER BY id ASC"
        )?;
        let entries = stmt.query_map(params![run_id, tick as i64], |row| {
            Ok(EventLogEntry {
                id:         Some(row.get(0)?),
                run_id:     row.get(1)?,
                tick:       row.get::<_, i64>(2)? as u64,
                subsystem:  row.get(3)?,
                event_type: row.get(4)?,
                payload:    row.get(5)?,
            })
        })?.collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    /// Every payload logged for a run, in insertion order.
    pub fn event_payloads(&self, run_id: &str) -> SimResult<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT payload FROM event_log WHERE run_id = ?1 ORDER BY id ASC"
        )?;
        let payloads = stmt
            .query_map(params![run_id], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(payloads)
    }

    pub fn count_events(&self, run_id: &str, event_type: &str) -> SimResult<u64> {
        let n: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM event_log WHERE run_id = ?1 AND event_type = ?2",
            params![run_id, event_type],
            |row| row.get(0),
        )?;
        Ok(n as u64)
    }

    // ── Snapshot ───────────────────────────────────────────────

    pub fn save_snapshot(&self, run_id: &str, tick: Tick, state_json: &str) -> SimResult<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO snapshot (run_id, tick, state_json) VALUES (?1, ?2, ?3)",
            params![run_id, tick as i64, state_json],
        )?;
        Ok(())
    }

    pub fn latest_snapshot_before(
        &self, run_id: &str, tick: Tick
    ) -> SimResult<Option<(Tick, String)>> {
        let result = self.conn.query_row(
            "SELECT tick, state_json FROM snapshot
             WHERE run_id = ?1 AND tick <= ?2
             ORDER BY tick DESC LIMIT 1",
            params![run_id, tick.min(i64::MAX as u64) as i64],
            |row| Ok((row.get::<_, i64>(0)? as u64, row.get::<_, String>(1)?)),
        ).optional()?;
        Ok(result)
    }

    pub fn latest_snapshot(&self, run_id: &str) -> SimResult<Option<(Tick, String)>> {
        self.latest_snapshot_before(run_id, Tick::MAX)
    }
}
