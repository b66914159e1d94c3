//! Tag registry: `(type, label)` → `tags` row.

use rusqlite::{Connection, OptionalExtension, Row, params};
use tracing::debug;

use super::{TagStore, now_iso8601, sql_err};
use crate::error::AppError;
use crate::models::Tag;

pub(crate) const TAG_COLUMNS: &str = "t.id, t.type, t.label, t.count, t.created_at";

pub(crate) fn tag_from_row(row: &Row<'_>) -> rusqlite::Result<Tag> {
    Ok(Tag {
        id: row.get(0)?,
        kind: row.get(1)?,
        label: row.get(2)?,
        count: row.get(3)?,
        created_at: row.get(4)?,
    })
}

pub(crate) fn get_or_create_tag(
    conn: &Connection,
    kind: &str,
    label: &str,
) -> Result<i64, AppError> {
    let inserted = conn
        .execute(
            "INSERT INTO tags (type, label, created_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(type, label) DO NOTHING",
            params![kind, label, now_iso8601()],
        )
        .map_err(sql_err("insert tag"))?;
    if inserted > 0 {
        let id = conn.last_insert_rowid();
        debug!(tag_id = id, kind, label, "tag created");
        return Ok(id);
    }

    conn.query_row(
        "SELECT id FROM tags WHERE type = ?1 AND label = ?2",
        params![kind, label],
        |row| row.get(0),
    )
    .map_err(sql_err("resolve existing tag"))
}

pub(crate) fn find_tag(conn: &Connection, id: i64) -> Result<Option<Tag>, AppError> {
    conn.query_row(
        &format!("SELECT {TAG_COLUMNS} FROM tags t WHERE t.id = ?1"),
        params![id],
        tag_from_row,
    )
    .optional()
    .map_err(sql_err("get tag by id"))
}

impl TagStore {
    /// Id of the `(kind, label)` tag, creating it if absent.
    pub fn get_or_create_tag(&self, kind: &str, label: &str) -> Result<i64, AppError> {
        self.write(|conn| get_or_create_tag(conn, kind, label))
    }

    pub fn get_tag(&self, id: i64) -> Result<Option<Tag>, AppError> {
        self.read(|conn| find_tag(conn, id))
    }

    /// Tags of one type ordered by label, or every tag ordered by type then label.
    pub fn list_tags(&self, kind: Option<&str>) -> Result<Vec<Tag>, AppError> {
        self.read(|conn| {
            let (sql, args) = match kind {
                Some(k) => (
                    format!("SELECT {TAG_COLUMNS} FROM tags t WHERE t.type = ?1 ORDER BY t.label"),
                    vec![k],
                ),
                None => (
                    format!("SELECT {TAG_COLUMNS} FROM tags t ORDER BY t.type, t.label"),
                    Vec::new(),
                ),
            };
            let mut stmt = conn.prepare(&sql).map_err(sql_err("prepare list_tags"))?;
            let rows = stmt
                .query_map(rusqlite::params_from_iter(args), tag_from_row)
                .map_err(sql_err("query list_tags"))?;
            rows.collect::<Result<Vec<_>, _>>()
                .map_err(sql_err("map list_tags row"))
        })
    }

    /// Change a tag's label in place. Returns `false` if the tag does not
    /// exist. Renaming onto a label another tag of the same type already
    /// holds fails with [`AppError::LabelConflict`] and changes nothing.
    pub fn rename_tag(&self, id: i64, new_label: &str) -> Result<bool, AppError> {
        self.write(|conn| {
            let Some(tag) = find_tag(conn, id)? else {
                return Ok(false);
            };
            if tag.label == new_label {
                return Ok(true);
            }

            let holder: Option<i64> = conn
                .query_row(
                    "SELECT id FROM tags WHERE type = ?1 AND label = ?2",
                    params![tag.kind, new_label],
                    |row| row.get(0),
                )
                .optional()
                .map_err(sql_err("check rename target"))?;
            if let Some(existing_id) = holder {
                return Err(AppError::LabelConflict {
                    tag_id: id,
                    existing_id,
                    kind: tag.kind,
                    label: new_label.to_string(),
                });
            }

            conn.execute(
                "UPDATE tags SET label = ?1 WHERE id = ?2",
                params![new_label, id],
            )
            .map_err(sql_err("rename tag"))?;
            debug!(tag_id = id, from = %tag.label, to = new_label, "tag renamed");
            Ok(true)
        })
    }

    /// Delete a tag; its links are removed by the foreign-key cascade.
    /// Returns `false` if no such tag.
    pub fn delete_tag(&self, id: i64) -> Result<bool, AppError> {
        self.write(|conn| {
            let removed = conn
                .execute("DELETE FROM tags WHERE id = ?1", params![id])
                .map_err(sql_err("delete tag"))?;
            if removed > 0 {
                debug!(tag_id = id, "tag deleted");
            }
            Ok(removed > 0)
        })
    }
}
