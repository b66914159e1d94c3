//! Content identity for files.
//!
//! A file is identified by the SHA-256 of its bytes. When the bytes cannot be
//! read (missing file, permissions, a directory) the identity degrades to the
//! SHA-256 of the raw path bytes, so resolution never fails.

use std::fmt;
use std::fs;
use std::io;
use std::path::Path;

use sha2::{Digest, Sha256};
use tracing::warn;

/// Where an [`Identity`] was derived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdentitySource {
    Content,
    /// Fallback: the file could not be read.
    Path,
}

/// Lowercase hex SHA-256 digest identifying a file.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identity {
    hash: String,
    source: IdentitySource,
}

impl Identity {
    pub fn as_str(&self) -> &str {
        &self.hash
    }

    pub fn source(&self) -> IdentitySource {
        self.source
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.hash)
    }
}

/// Compute the identity of the file at `path`.
pub fn identity_of(path: &Path) -> Identity {
    match hash_content(path) {
        Ok(hash) => Identity {
            hash,
            source: IdentitySource::Content,
        },
        Err(e) => {
            warn!(path = %path.display(), error = %e, "content unreadable, using path identity");
            Identity {
                hash: sha256_hex(path.as_os_str().as_encoded_bytes()),
                source: IdentitySource::Path,
            }
        }
    }
}

fn hash_content(path: &Path) -> io::Result<String> {
    let mut file = fs::File::open(path)?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher)?;
    Ok(hex::encode(hasher.finalize()))
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}
