//! Schema bootstrap for the tag store.
//!
//! Three tables: `tags`, `files` and the `files_tags` join. Every statement is
//! `IF NOT EXISTS`, so bootstrapping an initialised database is a no-op.
//! Databases created before the `count` column existed get it added in place
//! and every counter recomputed. `created_at` has no column default: every
//! insert writes RFC 3339 UTC, and legacy `CURRENT_TIMESTAMP` values are
//! rewritten to that form during the upgrade.

use rusqlite::Connection;
use tracing::info;

use super::sql_err;
use crate::error::AppError;

/// Schema version stored in `PRAGMA user_version`.
pub(crate) const SCHEMA_VERSION: i64 = 1;

const DDL: &str = "
    CREATE TABLE IF NOT EXISTS tags (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        type TEXT NOT NULL,
        label TEXT NOT NULL,
        count INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL,
        UNIQUE(type, label)
    );
    CREATE INDEX IF NOT EXISTS idx_tags_type ON tags(type);

    CREATE TABLE IF NOT EXISTS files (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        hash TEXT NOT NULL UNIQUE,
        folder TEXT NOT NULL,
        filename TEXT NOT NULL,
        created_at TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_files_hash ON files(hash);
    CREATE INDEX IF NOT EXISTS idx_files_folder ON files(folder);
    CREATE INDEX IF NOT EXISTS idx_files_filename ON files(filename);

    CREATE TABLE IF NOT EXISTS files_tags (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        fileId INTEGER NOT NULL,
        tagId INTEGER NOT NULL,
        created_at TEXT NOT NULL,
        FOREIGN KEY (fileId) REFERENCES files(id) ON DELETE CASCADE,
        FOREIGN KEY (tagId) REFERENCES tags(id) ON DELETE CASCADE,
        UNIQUE(fileId, tagId)
    );
    CREATE INDEX IF NOT EXISTS idx_files_tags_fileId ON files_tags(fileId);
    CREATE INDEX IF NOT EXISTS idx_files_tags_tagId ON files_tags(tagId);
";

const LEGACY_TIMESTAMP_TABLES: [&str; 3] = ["tags", "files", "files_tags"];

/// Create missing tables and indexes, and upgrade a legacy `tags` table.
pub(crate) fn init_schema(conn: &Connection) -> Result<(), AppError> {
    let version: i64 = conn
        .query_row("PRAGMA user_version;", [], |row| row.get(0))
        .map_err(sql_err("read schema version"))?;
    if version > SCHEMA_VERSION {
        return Err(AppError::Storage(format!(
            "tagstore: unsupported schema version {version}, expected {SCHEMA_VERSION}"
        )));
    }

    conn.execute_batch(DDL).map_err(sql_err("initialize schema"))?;

    if !has_column(conn, "tags", "count")? {
        conn.execute_batch(
            "ALTER TABLE tags ADD COLUMN count INTEGER NOT NULL DEFAULT 0;
             UPDATE tags SET count = (
                 SELECT COUNT(DISTINCT fileId) FROM files_tags WHERE tagId = tags.id
             );",
        )
        .map_err(sql_err("add tags.count column"))?;
        for table in LEGACY_TIMESTAMP_TABLES {
            normalize_timestamps(conn, table)?;
        }
        info!("added missing tags.count column and recomputed counters");
    }

    if version != SCHEMA_VERSION {
        conn.pragma_update(None, "user_version", SCHEMA_VERSION)
            .map_err(sql_err("write schema version"))?;
    }
    Ok(())
}

/// Rewrite `YYYY-MM-DD HH:MM:SS` values to `YYYY-MM-DDTHH:MM:SSZ`.
fn normalize_timestamps(conn: &Connection, table: &str) -> Result<(), AppError> {
    conn.execute(
        &format!(
            "UPDATE {table} SET created_at = strftime('%Y-%m-%dT%H:%M:%SZ', created_at)
             WHERE created_at LIKE '____-__-__ __:__:__'"
        ),
        [],
    )
    .map_err(sql_err("normalize legacy timestamps"))?;
    Ok(())
}

fn has_column(conn: &Connection, table: &str, column: &str) -> Result<bool, AppError> {
    let mut stmt = conn
        .prepare(&format!("PRAGMA table_info({table})"))
        .map_err(sql_err("prepare table_info"))?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(1))
        .map_err(sql_err("query table_info"))?;
    for name in names {
        if name.map_err(sql_err("read table_info row"))? == column {
            return Ok(true);
        }
    }
    Ok(false)
}
