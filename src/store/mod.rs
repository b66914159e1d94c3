//! `store` — content-addressed tagging engine on SQLite.
//!
//! [`TagStore`] is the single storage handle: open it once at startup, share
//! it behind an `Arc`, drop it at shutdown. Tests open a fresh in-memory
//! store each.
//!
//! ```text
//! path ──identity_of──▶ files.hash ──▶ files.id ─┐
//!                                                ├─ files_tags ─▶ tags.count
//! (type, label) ───────────────────▶ tags.id ────┘
//! ```
//!
//! The operations are split by table:
//! - [`files`] — file registry (get-or-create by content identity).
//! - [`tags`] — tag registry (get-or-create by `(type, label)`, rename, delete).
//! - [`associations`] — links, counter maintenance and the join queries.
//!
//! Get-or-create never checks before inserting: it runs
//! `INSERT .. ON CONFLICT DO NOTHING` and reads the winning row back, so the
//! unique constraints decide races between connections. Every mutation that
//! changes links recomputes the affected counters inside the same
//! `IMMEDIATE` transaction.

pub mod associations;
pub mod files;
pub mod hasher;
pub mod schema;
pub mod tags;

use std::fs;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{SecondsFormat, Utc};
use rusqlite::{Connection, TransactionBehavior};
use tracing::info;

use crate::error::AppError;

pub use hasher::{Identity, IdentitySource, identity_of};

/// Shared handle to the tag database.
pub struct TagStore {
    conn: Mutex<Connection>,
}

impl TagStore {
    /// Open (or create) the database at `db_path` and bootstrap the schema.
    /// The parent directory is created when missing; failing to create it is
    /// [`AppError::Io`].
    pub fn open(db_path: &Path) -> Result<Self, AppError> {
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(db_path).map_err(|e| {
            AppError::Storage(format!("tagstore: open {}: {e}", db_path.display()))
        })?;
        conn.pragma_update(None, "busy_timeout", 5000)
            .map_err(sql_err("set busy_timeout"))?;
        conn.pragma_update(None, "journal_mode", "WAL")
            .map_err(sql_err("set journal_mode WAL"))?;

        let store = Self::with_connection(conn)?;
        info!(db_path = %db_path.display(), "tag store opened");
        Ok(store)
    }

    /// Fresh private in-memory database.
    pub fn open_in_memory() -> Result<Self, AppError> {
        let conn = Connection::open_in_memory().map_err(sql_err("open in-memory database"))?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self, AppError> {
        conn.pragma_update(None, "foreign_keys", "ON")
            .map_err(sql_err("set foreign_keys ON"))?;
        conn.pragma_update(None, "busy_timeout", 5000)
            .map_err(sql_err("set busy_timeout"))?;
        schema::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, AppError> {
        self.conn
            .lock()
            .map_err(|_| AppError::Storage("tagstore: connection lock poisoned".into()))
    }

    /// Run a read-only closure against the connection.
    pub(crate) fn read<T>(
        &self,
        f: impl FnOnce(&Connection) -> Result<T, AppError>,
    ) -> Result<T, AppError> {
        let conn = self.lock()?;
        f(&conn)
    }

    /// Run `f` inside an `IMMEDIATE` transaction; commit on `Ok`, roll back on `Err`.
    pub(crate) fn write<T>(
        &self,
        f: impl FnOnce(&Connection) -> Result<T, AppError>,
    ) -> Result<T, AppError> {
        let mut conn = self.lock()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(sql_err("begin tx"))?;
        let out = f(&tx)?;
        tx.commit().map_err(sql_err("commit tx"))?;
        Ok(out)
    }
}

/// Build a `map_err` adapter that tags a rusqlite error with the failing step.
pub(crate) fn sql_err(step: &'static str) -> impl Fn(rusqlite::Error) -> AppError {
    move |e| AppError::Storage(format!("tagstore: {step}: {e}"))
}

/// Current UTC time as RFC 3339 with second precision, e.g. `"2025-04-01T12:00:00Z"`.
pub(crate) fn now_iso8601() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}
