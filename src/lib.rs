//! Content-addressed tagging engine for the local file browser.
//!
//! Files are identified by the SHA-256 of their bytes, so tags follow a file
//! across moves and renames as long as its content is unchanged. See
//! [`store::TagStore`] for the operations and [`groups::ExclusiveGroups`]
//! for single-valued tag types such as ratings.

pub mod config;
pub mod error;
pub mod groups;
pub mod logger;
pub mod models;
pub mod store;

pub use error::AppError;
pub use store::TagStore;
