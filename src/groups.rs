//! Exclusive tag groups layered on top of the tag store.
//!
//! The store itself lets a file carry any number of tags of any type. Some
//! types are conventionally single-valued per file, most notably `rating`
//! (labels `"1"`..=`"5"`). [`ExclusiveGroups`] enforces that convention for
//! a configured set of types: assigning a tag of an exclusive type first
//! removes the file's other tags of that type, atomically.

use std::collections::HashSet;
use std::path::Path;

use rusqlite::Connection;
use tracing::debug;

use crate::error::AppError;
use crate::models::Tag;
use crate::store::TagStore;
use crate::store::associations::{link_file, tags_for_file, unlink_file};
use crate::store::files::{find_file, get_or_create_file};
use crate::store::hasher::{Identity, identity_of};
use crate::store::tags::{find_tag, get_or_create_tag};

/// Tag type used for star ratings.
pub const RATING_TYPE: &str = "rating";

/// Result of [`ExclusiveGroups::assign`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    /// `false` if the file already carried the tag.
    pub linked: bool,
    /// Tags of the same exclusive type that were removed from the file.
    pub replaced: Vec<i64>,
}

pub struct ExclusiveGroups<'a> {
    store: &'a TagStore,
    types: HashSet<String>,
}

impl<'a> ExclusiveGroups<'a> {
    pub fn new<I, S>(store: &'a TagStore, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            store,
            types: types.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_exclusive(&self, kind: &str) -> bool {
        self.types.contains(kind)
    }

    /// Link `tag_id` to the file at `path`. If the tag's type is exclusive,
    /// the file's other tags of that type are unlinked in the same
    /// transaction. Non-exclusive types behave exactly like
    /// [`TagStore::link`].
    pub fn assign(&self, path: &Path, tag_id: i64) -> Result<Assignment, AppError> {
        let identity = identity_of(path);
        self.store
            .write(|conn| self.assign_in(conn, path, &identity, tag_id))
    }

    fn assign_in(
        &self,
        conn: &Connection,
        path: &Path,
        identity: &Identity,
        tag_id: i64,
    ) -> Result<Assignment, AppError> {
        let Some(tag) = find_tag(conn, tag_id)? else {
            return Err(AppError::InvalidInput(format!("tag {tag_id} does not exist")));
        };
        let file_id = get_or_create_file(conn, path, identity)?;

        let mut replaced = Vec::new();
        if self.is_exclusive(&tag.kind) {
            for other in tags_for_file(conn, file_id)? {
                if other.kind == tag.kind && other.id != tag_id {
                    unlink_file(conn, file_id, other.id)?;
                    replaced.push(other.id);
                }
            }
        }
        let linked = link_file(conn, file_id, tag_id)?;
        if !replaced.is_empty() {
            debug!(file_id, tag_id, ?replaced, kind = %tag.kind, "exclusive tag replaced");
        }
        Ok(Assignment { linked, replaced })
    }

    /// Remove every tag of the exclusive type `kind` from the file at `path`.
    /// Returns the number of links removed.
    pub fn clear(&self, path: &Path, kind: &str) -> Result<usize, AppError> {
        let identity = identity_of(path);
        self.store.write(|conn| {
            let Some(file) = find_file(conn, &identity)? else {
                return Ok(0);
            };
            let mut removed = 0;
            for tag in tags_for_file(conn, file.id)? {
                if tag.kind == kind && unlink_file(conn, file.id, tag.id)? {
                    removed += 1;
                }
            }
            Ok(removed)
        })
    }

    /// Give the file at `path` a rating of `stars` (1..=5), replacing any
    /// previous rating when `rating` is configured as exclusive.
    pub fn set_rating(&self, path: &Path, stars: u8) -> Result<Assignment, AppError> {
        if !(1..=5).contains(&stars) {
            return Err(AppError::InvalidInput(format!(
                "rating must be between 1 and 5, got {stars}"
            )));
        }
        let identity = identity_of(path);
        self.store.write(|conn| {
            let tag_id = get_or_create_tag(conn, RATING_TYPE, &stars.to_string())?;
            self.assign_in(conn, path, &identity, tag_id)
        })
    }

    pub fn clear_rating(&self, path: &Path) -> Result<usize, AppError> {
        self.clear(path, RATING_TYPE)
    }

    /// The file's current rating tag, if any.
    pub fn rating(&self, path: &Path) -> Result<Option<Tag>, AppError> {
        Ok(self
            .store
            .tags_for(path)?
            .into_iter()
            .find(|t| t.kind == RATING_TYPE))
    }
}
