//! SQLite persistence layer.
//!
//! RULE: Only the store talks to the database.
//! The simulator and the estimators never execute SQL; the runner hands
//! their results to the store after the compute phase.

use crate::{
    config::SimConfig,
    error::{PanelError, PanelResult},
};
use rusqlite::{params, Connection, OptionalExtension};

mod estimate;
mod panel;

pub struct PanelStore {
    conn: Connection,
}

impl PanelStore {
    pub fn open(path: &str) -> PanelResult<Self> {
        let conn = Connection::open_with_flags(
            path,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
                | rusqlite::OpenFlags::SQLITE_OPEN_URI,
        )?;
        // WAL only applies to real files; ignore the answer for anything else.
        let _ = conn.execute_batch("PRAGMA journal_mode=WAL;");
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn })
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> PanelResult<Self> {
        let conn = Connection::open(":memory:")?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn })
    }

    /// Apply all schema migrations in order. Safe to call repeatedly.
    pub fn migrate(&self) -> PanelResult<()> {
        self.conn
            .execute_batch(include_str!("../../../migrations/001_foundation.sql"))?;
        self.conn
            .execute_batch(include_str!("../../../migrations/002_panel.sql"))?;
        self.conn
            .execute_batch(include_str!("../../../migrations/003_estimates.sql"))?;
        Ok(())
    }

    // ── Run ────────────────────────────────────────────────────

    pub fn insert_run(&self, run_id: &str, config: &SimConfig, version: &str) -> PanelResult<()> {
        let started_at = chrono::Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO run (run_id, seed, version, config_json, started_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                run_id,
                config.seed as i64,
                version,
                serde_json::to_string(config)?,
                started_at
            ],
        )?;
        log::debug!("store: run {run_id} recorded (seed {})", config.seed);
        Ok(())
    }

    pub fn run_exists(&self, run_id: &str) -> PanelResult<bool> {
        let found = self
            .conn
            .query_row("SELECT 1 FROM run WHERE run_id = ?1", params![run_id], |_| Ok(()))
            .optional()?;
        Ok(found.is_some())
    }

    /// The configuration a run was generated from.
    pub fn run_config(&self, run_id: &str) -> PanelResult<SimConfig> {
        let json: Option<String> = self
            .conn
            .query_row(
                "SELECT config_json FROM run WHERE run_id = ?1",
                params![run_id],
                |row| row.get(0),
            )
            .optional()?;
        let json = json.ok_or_else(|| PanelError::RunNotFound { run_id: run_id.to_string() })?;
        Ok(serde_json::from_str(&json)?)
    }

    pub fn run_started_at(&self, run_id: &str) -> PanelResult<chrono::DateTime<chrono::Utc>> {
        let raw: Option<String> = self
            .conn
            .query_row(
                "SELECT started_at FROM run WHERE run_id = ?1",
                params![run_id],
                |row| row.get(0),
            )
            .optional()?;
        let raw = raw.ok_or_else(|| PanelError::RunNotFound { run_id: run_id.to_string() })?;
        let parsed = chrono::DateTime::parse_from_rfc3339(&raw)
            .map_err(|e| anyhow::anyhow!("run {run_id}: bad started_at '{raw}': {e}"))?;
        Ok(parsed.with_timezone(&chrono::Utc))
    }

    fn require_run(&self, run_id: &str) -> PanelResult<()> {
        if self.run_exists(run_id)? {
            Ok(())
        } else {
            Err(PanelError::RunNotFound { run_id: run_id.to_string() })
        }
    }
}
