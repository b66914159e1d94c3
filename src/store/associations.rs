//! File ↔ tag links, counter maintenance and the join queries.
//!
//! `tags.count` is a cache of `COUNT(DISTINCT fileId)` over a tag's links.
//! It is always recomputed from the join table, never incremented, and the
//! recompute shares a transaction with the link change that caused it.

use std::collections::BTreeSet;
use std::path::Path;

use rusqlite::{Connection, params, params_from_iter};
use tracing::debug;

use super::files::{FILE_COLUMNS, file_from_row, find_file, get_or_create_file, tag_ids_for_file};
use super::hasher::identity_of;
use super::tags::{TAG_COLUMNS, find_tag, tag_from_row};
use super::{TagStore, now_iso8601, sql_err};
use crate::error::AppError;
use crate::models::{File, FileWithTags, Tag, TagRef};

pub(crate) fn recount_tag(conn: &Connection, tag_id: i64) -> Result<(), AppError> {
    conn.execute(
        "UPDATE tags
         SET count = (SELECT COUNT(DISTINCT fileId) FROM files_tags WHERE tagId = ?1)
         WHERE id = ?1",
        params![tag_id],
    )
    .map_err(sql_err("recount tag"))?;
    Ok(())
}

/// Insert the link if absent. Returns whether a row was inserted.
pub(crate) fn link_file(conn: &Connection, file_id: i64, tag_id: i64) -> Result<bool, AppError> {
    let inserted = conn
        .execute(
            "INSERT INTO files_tags (fileId, tagId, created_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(fileId, tagId) DO NOTHING",
            params![file_id, tag_id, now_iso8601()],
        )
        .map_err(sql_err("insert link"))?;
    if inserted > 0 {
        recount_tag(conn, tag_id)?;
        debug!(file_id, tag_id, "linked");
    }
    Ok(inserted > 0)
}

/// Delete the link if present. Returns whether a row was removed.
pub(crate) fn unlink_file(conn: &Connection, file_id: i64, tag_id: i64) -> Result<bool, AppError> {
    let removed = conn
        .execute(
            "DELETE FROM files_tags WHERE fileId = ?1 AND tagId = ?2",
            params![file_id, tag_id],
        )
        .map_err(sql_err("delete link"))?;
    if removed > 0 {
        recount_tag(conn, tag_id)?;
        debug!(file_id, tag_id, "unlinked");
    }
    Ok(removed > 0)
}

pub(crate) fn tags_for_file(conn: &Connection, file_id: i64) -> Result<Vec<Tag>, AppError> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {TAG_COLUMNS} FROM tags t
             INNER JOIN files_tags ft ON ft.tagId = t.id
             WHERE ft.fileId = ?1
             ORDER BY t.label"
        ))
        .map_err(sql_err("prepare tags_for"))?;
    let rows = stmt
        .query_map(params![file_id], tag_from_row)
        .map_err(sql_err("query tags_for"))?;
    rows.collect::<Result<Vec<_>, _>>()
        .map_err(sql_err("map tags_for row"))
}

impl TagStore {
    /// Link the file at `path` (registered on first sight) to `tag_id`.
    ///
    /// Returns `false` when the link already existed; the counter is then
    /// left untouched. Linking to a tag that does not exist is
    /// [`AppError::InvalidInput`] and registers nothing.
    pub fn link(&self, path: &Path, tag_id: i64) -> Result<bool, AppError> {
        let identity = identity_of(path);
        self.write(|conn| {
            if find_tag(conn, tag_id)?.is_none() {
                return Err(AppError::InvalidInput(format!("tag {tag_id} does not exist")));
            }
            let file_id = get_or_create_file(conn, path, &identity)?;
            link_file(conn, file_id, tag_id)
        })
    }

    /// Remove the link between the file at `path` and `tag_id`.
    /// Returns `false` if the file is unknown or was not linked.
    pub fn unlink(&self, path: &Path, tag_id: i64) -> Result<bool, AppError> {
        let identity = identity_of(path);
        self.write(|conn| match find_file(conn, &identity)? {
            Some(file) => unlink_file(conn, file.id, tag_id),
            None => Ok(false),
        })
    }

    /// Remove every link of the file at `path` and recompute the counters of
    /// the tags it carried. Returns the number of links removed.
    pub fn unlink_all(&self, path: &Path) -> Result<usize, AppError> {
        let identity = identity_of(path);
        self.write(|conn| {
            let Some(file) = find_file(conn, &identity)? else {
                return Ok(0);
            };
            let tag_ids = tag_ids_for_file(conn, file.id)?;
            let removed = conn
                .execute("DELETE FROM files_tags WHERE fileId = ?1", params![file.id])
                .map_err(sql_err("delete links for file"))?;
            for tag_id in tag_ids {
                recount_tag(conn, tag_id)?;
            }
            debug!(file_id = file.id, removed, "unlinked all");
            Ok(removed)
        })
    }

    /// Tags linked to the file at `path`, ordered by label.
    /// An unknown file has no tags.
    pub fn tags_for(&self, path: &Path) -> Result<Vec<Tag>, AppError> {
        let identity = identity_of(path);
        self.read(|conn| match find_file(conn, &identity)? {
            Some(file) => tags_for_file(conn, file.id),
            None => Ok(Vec::new()),
        })
    }

    /// Files linked to `tag_id`, ordered by folder then filename.
    pub fn files_for(&self, tag_id: i64) -> Result<Vec<File>, AppError> {
        self.read(|conn| {
            let mut stmt = conn
                .prepare(&format!(
                    "SELECT {FILE_COLUMNS} FROM files f
                     INNER JOIN files_tags ft ON ft.fileId = f.id
                     WHERE ft.tagId = ?1
                     ORDER BY f.folder, f.filename"
                ))
                .map_err(sql_err("prepare files_for"))?;
            let rows = stmt
                .query_map(params![tag_id], file_from_row)
                .map_err(sql_err("query files_for"))?;
            rows.collect::<Result<Vec<_>, _>>()
                .map_err(sql_err("map files_for row"))
        })
    }

    /// Files linked to every tag in `tag_ids` (set intersection).
    ///
    /// Repeated ids count once. An empty set matches nothing.
    pub fn files_for_all(&self, tag_ids: &[i64]) -> Result<Vec<File>, AppError> {
        let wanted: BTreeSet<i64> = tag_ids.iter().copied().collect();
        if wanted.is_empty() {
            return Ok(Vec::new());
        }
        if let (1, Some(&only)) = (wanted.len(), wanted.first()) {
            return self.files_for(only);
        }

        let placeholders = vec!["?"; wanted.len()].join(", ");
        let sql = format!(
            "SELECT {FILE_COLUMNS} FROM files f
             WHERE (
                 SELECT COUNT(DISTINCT ft.tagId) FROM files_tags ft
                 WHERE ft.fileId = f.id AND ft.tagId IN ({placeholders})
             ) = ?
             ORDER BY f.folder, f.filename"
        );
        let mut args: Vec<i64> = wanted.iter().copied().collect();
        args.push(wanted.len() as i64);

        self.read(|conn| {
            let mut stmt = conn.prepare(&sql).map_err(sql_err("prepare files_for_all"))?;
            let rows = stmt
                .query_map(params_from_iter(args), file_from_row)
                .map_err(sql_err("query files_for_all"))?;
            rows.collect::<Result<Vec<_>, _>>()
                .map_err(sql_err("map files_for_all row"))
        })
    }

    /// Every known file with its tags, including files with none.
    /// Files are ordered by folder then filename, tags by label.
    pub fn all_files_with_tags(&self) -> Result<Vec<FileWithTags>, AppError> {
        self.read(|conn| {
            let mut stmt = conn
                .prepare(&format!(
                    "SELECT {FILE_COLUMNS}, t.id, t.label FROM files f
                     LEFT JOIN files_tags ft ON ft.fileId = f.id
                     LEFT JOIN tags t ON t.id = ft.tagId
                     ORDER BY f.folder, f.filename, f.id, t.label"
                ))
                .map_err(sql_err("prepare all_files_with_tags"))?;
            let rows = stmt
                .query_map([], |row| {
                    let file = file_from_row(row)?;
                    let tag_id: Option<i64> = row.get(5)?;
                    let label: Option<String> = row.get(6)?;
                    Ok((file, tag_id.zip(label)))
                })
                .map_err(sql_err("query all_files_with_tags"))?;

            let mut out: Vec<FileWithTags> = Vec::new();
            for row in rows {
                let (file, tag) = row.map_err(sql_err("map all_files_with_tags row"))?;
                let same_file = out.last().is_some_and(|last| last.file.id == file.id);
                if !same_file {
                    out.push(FileWithTags { file, tags: Vec::new() });
                }
                if let (Some((id, label)), Some(last)) = (tag, out.last_mut()) {
                    last.tags.push(TagRef { id, label });
                }
            }
            Ok(out)
        })
    }

    /// Recompute one tag's counter from its links.
    pub fn recount(&self, tag_id: i64) -> Result<(), AppError> {
        self.write(|conn| recount_tag(conn, tag_id))
    }

    /// Recompute every counter. Returns the number of tags touched.
    pub fn recount_all(&self) -> Result<usize, AppError> {
        self.write(|conn| {
            conn.execute(
                "UPDATE tags
                 SET count = (SELECT COUNT(DISTINCT fileId) FROM files_tags WHERE tagId = tags.id)",
                [],
            )
            .map_err(sql_err("recount all tags"))
        })
    }
}
