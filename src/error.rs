//! Application-wide error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(String),

    #[error("logger error: {0}")]
    Logger(String),

    /// The embedded store could not be opened, read or written.
    #[error("storage error: {0}")]
    Storage(String),

    /// A rename would give two tags of the same type the same label.
    #[error(
        "label conflict: {kind}/{label} held by tag {existing_id}, cannot rename tag {tag_id}"
    )]
    LabelConflict {
        tag_id: i64,
        existing_id: i64,
        kind: String,
        label: String,
    },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
