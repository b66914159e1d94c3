//! Logging initialisation via tracing-subscriber.
//!
//! Call [`init`] once at startup, after the config is resolved.

use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use crate::error::AppError;

/// Initialise the global tracing subscriber, writing to stderr so that
/// command output on stdout stays machine-readable.
///
/// `level` is validated with [`parse_level`] first, whatever `RUST_LOG` says.
/// With `prefer_level` the configured level is the whole filter; otherwise
/// `RUST_LOG` directives apply on top of it.
pub fn init(level: &str, prefer_level: bool) -> Result<(), AppError> {
    let default = parse_level(level)?;
    let builder = EnvFilter::builder().with_default_directive(default.into());
    let filter = if prefer_level {
        builder.parse_lossy("")
    } else {
        builder.from_env_lossy()
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| AppError::Logger(format!("failed to set subscriber: {e}")))?;

    Ok(())
}

/// Parse a log level string into a [`LevelFilter`], returning an error on
/// unrecognised values.
pub fn parse_level(level: &str) -> Result<LevelFilter, AppError> {
    if level.is_empty() {
        return Err(AppError::Logger("log level must not be empty".into()));
    }
    level
        .parse::<LevelFilter>()
        .map_err(|_| AppError::Logger(format!("unrecognised log level: '{level}'")))
}
