//! Row types returned by the tag store.
//!
//! All types serialize with camelCase keys (`fileId`, `createdAt`, …) so a
//! transport layer can hand them straight to the browser UI.

use serde::Serialize;

/// A `(type, label)` tag with its cached usage counter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Tag {
    pub id: i64,
    /// Flat namespace, e.g. `"image"` or `"rating"`.
    #[serde(rename = "type")]
    pub kind: String,
    pub label: String,
    /// Number of distinct files currently linked to this tag.
    pub count: i64,
    pub created_at: String,
}

/// A file known to the store, keyed by its content identity.
///
/// `folder` and `filename` are the location at first sight; they are not
/// refreshed when the file moves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct File {
    pub id: i64,
    pub hash: String,
    pub folder: String,
    pub filename: String,
    pub created_at: String,
}

/// Compact tag reference used when listing files together with their tags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagRef {
    pub id: i64,
    pub label: String,
}

/// A file with every tag linked to it (possibly none).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileWithTags {
    #[serde(flatten)]
    pub file: File,
    pub tags: Vec<TagRef>,
}
