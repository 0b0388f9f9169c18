//! Remote release metadata and archive transport.
//!
//! Everything that talks to the release server goes through
//! [`ReleaseSource`]. The HTTP implementation lives in `http`; the channel
//! and checksum lookups are written against the trait so they do not care
//! where the bytes come from.

mod channel;
mod checksum;
mod http;

use serde::Deserialize;
use std::io::Read;
use thiserror::Error;

pub use channel::{
    Channel, ChannelBuilds, LatestReleases, VersionSpec, check_version, is_channel, resolve_channel,
};
pub use checksum::{Checksum, checksum_for, find_checksum};
pub use http::{HttpSource, http_client};

/// Platform segment of the download URL. Only 64-bit Linux headless is served.
pub const PLATFORM: &str = "linux64";

/// File name the checksum manifest uses for a version's headless archive.
pub fn archive_file_name(version: &str) -> String {
    format!("factorio_headless_x64_{}.tar.xz", version)
}

/// A failed outbound request, before it is attributed to a stage.
#[derive(Debug, Error)]
#[error("request to {url} failed: {message}")]
pub struct FetchError {
    pub url: String,
    pub message: String,
}

impl FetchError {
    pub fn new(url: impl Into<String>, message: impl ToString) -> Self {
        Self {
            url: url.into(),
            message: message.to_string(),
        }
    }
}

/// The three queries the installer makes against the release server.
pub trait ReleaseSource {
    /// Latest version per channel.
    fn latest_releases(&self) -> Result<LatestReleases, FetchError>;

    /// Raw `<digest> <file name>` manifest.
    fn checksum_manifest(&self) -> Result<String, FetchError>;

    /// Where the archive for `version` is fetched from. Used in messages.
    fn archive_url(&self, version: &str) -> String;

    /// Streaming body of the archive for `version`.
    fn open_archive(&self, version: &str) -> Result<Box<dyn Read + Send>, FetchError>;
}

/// Base URL of the release server, shared by all three queries.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Endpoints {
    pub base_url: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            base_url: "https://factorio.com".to_string(),
        }
    }
}

impl Endpoints {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }

    fn base(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    pub fn latest_releases_url(&self) -> String {
        format!("{}/api/latest-releases", self.base())
    }

    pub fn checksums_url(&self) -> String {
        format!("{}/download/sha256sums/", self.base())
    }

    pub fn download_url(&self, version: &str) -> String {
        format!("{}/get-download/{}/headless/{}", self.base(), version, PLATFORM)
    }
}
