use std::fmt;
use std::str::FromStr;

use super::{ReleaseSource, archive_file_name};
use crate::error::{InstallError, Result};

/// Lowercase hex SHA-256 digest of an archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Checksum(String);

impl Checksum {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for Checksum {
    type Err = InstallError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.len() != 64 || !s.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(InstallError::InvalidChecksum(s.to_string()));
        }
        Ok(Checksum(s.to_ascii_lowercase()))
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Find the digest listed for `file_name` in a `sha256sum`-style manifest.
///
/// Lines are `<digest> <file name>`; the `*` binary-mode marker is accepted.
/// The file name must match as a whole field.
pub fn find_checksum<'a>(manifest: &'a str, file_name: &str) -> Option<&'a str> {
    manifest.lines().find_map(|line| {
        let mut fields = line.split_whitespace();
        let digest = fields.next()?;
        let name = fields.next()?.trim_start_matches('*');
        (name == file_name).then_some(digest)
    })
}

/// Look up the published checksum of `version`'s headless archive.
pub fn checksum_for(source: &dyn ReleaseSource, version: &str) -> Result<Checksum> {
    let lookup_err = |message: String| InstallError::ChecksumLookup {
        version: version.to_string(),
        message,
    };

    let manifest = source
        .checksum_manifest()
        .map_err(|e| lookup_err(e.to_string()))?;

    let file_name = archive_file_name(version);
    let digest = find_checksum(&manifest, &file_name)
        .ok_or_else(|| lookup_err(format!("{} is not listed", file_name)))?;

    digest
        .parse()
        .map_err(|_| lookup_err(format!("malformed digest for {}: {}", file_name, digest)))
}
