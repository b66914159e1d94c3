//! File registry: content identity → `files` row.

use std::path::Path;

use rusqlite::{Connection, OptionalExtension, Row, params};
use tracing::debug;

use super::associations::recount_tag;
use super::hasher::{Identity, identity_of};
use super::{TagStore, now_iso8601, sql_err};
use crate::error::AppError;
use crate::models::File;

/// Column list matching [`file_from_row`], prefixable with a table alias.
pub(crate) const FILE_COLUMNS: &str = "f.id, f.hash, f.folder, f.filename, f.created_at";

pub(crate) fn file_from_row(row: &Row<'_>) -> rusqlite::Result<File> {
    Ok(File {
        id: row.get(0)?,
        hash: row.get(1)?,
        folder: row.get(2)?,
        filename: row.get(3)?,
        created_at: row.get(4)?,
    })
}

/// Split a path into the `(folder, filename)` pair recorded on first sight.
fn split_path(path: &Path) -> (String, String) {
    let folder = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_string_lossy().into_owned(),
        _ => ".".to_string(),
    };
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned());
    (folder, filename)
}

/// Resolve an already computed `identity` to its file id, recording `path`
/// as folder/filename when the row is new. Hashing happens before the caller
/// opens its transaction, so large files never hold the write lock.
pub(crate) fn get_or_create_file(
    conn: &Connection,
    path: &Path,
    identity: &Identity,
) -> Result<i64, AppError> {
    let (folder, filename) = split_path(path);

    let inserted = conn
        .execute(
            "INSERT INTO files (hash, folder, filename, created_at) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(hash) DO NOTHING",
            params![identity.as_str(), folder, filename, now_iso8601()],
        )
        .map_err(sql_err("insert file"))?;
    if inserted > 0 {
        let id = conn.last_insert_rowid();
        debug!(file_id = id, hash = %identity, path = %path.display(), "file registered");
        return Ok(id);
    }

    conn.query_row(
        "SELECT id FROM files WHERE hash = ?1",
        params![identity.as_str()],
        |row| row.get(0),
    )
    .map_err(sql_err("resolve existing file"))
}

pub(crate) fn find_file(conn: &Connection, identity: &Identity) -> Result<Option<File>, AppError> {
    conn.query_row(
        &format!("SELECT {FILE_COLUMNS} FROM files f WHERE f.hash = ?1"),
        params![identity.as_str()],
        file_from_row,
    )
    .optional()
    .map_err(sql_err("get file by hash"))
}

impl TagStore {
    /// Resolve `path` to its file id, registering the file on first sight.
    pub fn get_or_create_file(&self, path: &Path) -> Result<i64, AppError> {
        let identity = identity_of(path);
        self.write(|conn| get_or_create_file(conn, path, &identity))
    }

    /// Look the file up by the current identity of `path`; never creates.
    pub fn get_file_by_path(&self, path: &Path) -> Result<Option<File>, AppError> {
        let identity = identity_of(path);
        self.read(|conn| find_file(conn, &identity))
    }

    pub fn get_file(&self, id: i64) -> Result<Option<File>, AppError> {
        self.read(|conn| {
            conn.query_row(
                &format!("SELECT {FILE_COLUMNS} FROM files f WHERE f.id = ?1"),
                params![id],
                file_from_row,
            )
            .optional()
            .map_err(sql_err("get file by id"))
        })
    }

    /// All known files ordered by folder, then filename.
    pub fn list_files(&self) -> Result<Vec<File>, AppError> {
        self.read(|conn| {
            let mut stmt = conn
                .prepare(&format!(
                    "SELECT {FILE_COLUMNS} FROM files f ORDER BY f.folder, f.filename"
                ))
                .map_err(sql_err("prepare list_files"))?;
            let rows = stmt
                .query_map([], file_from_row)
                .map_err(sql_err("query list_files"))?;
            rows.collect::<Result<Vec<_>, _>>()
                .map_err(sql_err("map list_files row"))
        })
    }

    /// Delete a file row. Its links go with it and the counters of the tags
    /// it carried are recomputed. Returns `false` if no such file.
    pub fn delete_file(&self, id: i64) -> Result<bool, AppError> {
        self.write(|conn| {
            let tag_ids = tag_ids_for_file(conn, id)?;
            let removed = conn
                .execute("DELETE FROM files WHERE id = ?1", params![id])
                .map_err(sql_err("delete file"))?;
            if removed == 0 {
                return Ok(false);
            }
            for tag_id in tag_ids {
                recount_tag(conn, tag_id)?;
            }
            debug!(file_id = id, "file deleted");
            Ok(true)
        })
    }
}

pub(crate) fn tag_ids_for_file(conn: &Connection, file_id: i64) -> Result<Vec<i64>, AppError> {
    let mut stmt = conn
        .prepare("SELECT tagId FROM files_tags WHERE fileId = ?1")
        .map_err(sql_err("prepare tag ids for file"))?;
    let rows = stmt
        .query_map(params![file_id], |row| row.get(0))
        .map_err(sql_err("query tag ids for file"))?;
    rows.collect::<Result<Vec<i64>, _>>()
        .map_err(sql_err("map tag id row"))
}
