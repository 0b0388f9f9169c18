use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors produced while resolving, downloading and installing a server build.
///
/// Each variant names the stage that failed. Callers that only need a message
/// can rely on `Display`; the source chain carries the underlying cause where
/// one exists.
#[derive(Debug, Error)]
pub enum InstallError {
    /// Channel metadata was unavailable, malformed, or missing the channel.
    #[error("failed to resolve channel {channel}: {message}")]
    Resolution { channel: String, message: String },

    /// The checksum manifest was unavailable or did not list the version.
    #[error("could not find SHA256 hash for {version}: {message}")]
    ChecksumLookup { version: String, message: String },

    /// Transport or status failure while fetching the archive.
    #[error("failed to download {url}: {message}")]
    Download { url: String, message: String },

    /// Malformed container or an entry escaping the destination.
    #[error("failed to extract archive: {0}")]
    Extraction(String),

    #[error("SHA256 sum does not match: expected {expected}, got {actual}")]
    Integrity { expected: String, actual: String },

    #[error("failed to track installed version in {}", path.display())]
    Persist {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{context}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },

    #[error("output directory {} is not empty", .0.display())]
    DestinationNotEmpty(PathBuf),

    #[error("invalid version {0:?}")]
    InvalidVersion(String),

    #[error("invalid SHA256 sum {0:?}: expected 64 hex characters")]
    InvalidChecksum(String),

    #[error("installation cancelled")]
    Cancelled,
}

impl InstallError {
    pub(crate) fn io(context: impl Into<String>, source: io::Error) -> Self {
        InstallError::Io {
            context: context.into(),
            source,
        }
    }
}

pub type Result<T, E = InstallError> = std::result::Result<T, E>;
