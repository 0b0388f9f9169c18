//! Test helpers: in-memory release archives and a release source that
//! counts how often it is queried.

use sha2::{Digest, Sha256};
use std::cell::Cell;
use std::collections::HashMap;
use std::io::{Cursor, Read, Write};
use tar::{EntryType, Header};
use xz2::write::XzEncoder;

use crate::release::{FetchError, LatestReleases, ReleaseSource, archive_file_name};

pub(crate) fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Builds a `.tar.xz` in memory.
///
/// Names are written into the header verbatim, so entries such as
/// `../outside.txt` can be produced; `tar::Builder` refuses those.
pub(crate) struct ArchiveBuilder {
    tar: tar::Builder<Vec<u8>>,
}

impl ArchiveBuilder {
    pub(crate) fn new() -> Self {
        Self {
            tar: tar::Builder::new(Vec::new()),
        }
    }

    pub(crate) fn dir(self, name: &str) -> Self {
        self.raw(name, EntryType::Directory, b"", 0o755)
    }

    pub(crate) fn file(self, name: &str, data: &[u8], mode: u32) -> Self {
        self.raw(name, EntryType::Regular, data, mode)
    }

    pub(crate) fn raw(mut self, name: &str, kind: EntryType, data: &[u8], mode: u32) -> Self {
        let mut header = Header::new_gnu();
        let field = &mut header.as_old_mut().name;
        assert!(name.len() < field.len(), "name too long for test header");
        field[..name.len()].copy_from_slice(name.as_bytes());
        header.set_entry_type(kind);
        header.set_size(data.len() as u64);
        header.set_mode(mode);
        header.set_mtime(1_700_000_000);
        header.set_cksum();
        self.tar.append(&header, data).unwrap();
        self
    }

    pub(crate) fn finish(self) -> Vec<u8> {
        let tar = self.tar.into_inner().unwrap();
        let mut enc = XzEncoder::new(Vec::new(), 6);
        enc.write_all(&tar).unwrap();
        enc.finish().unwrap()
    }
}

/// A [`ReleaseSource`] serving fixed data from memory.
pub(crate) struct MemorySource {
    latest: LatestReleases,
    manifest: String,
    archives: HashMap<String, Vec<u8>>,
    flip_byte: Option<usize>,
    latest_calls: Cell<usize>,
    manifest_calls: Cell<usize>,
    archive_calls: Cell<usize>,
}

impl MemorySource {
    pub(crate) fn new() -> Self {
        Self {
            latest: LatestReleases::default(),
            manifest: String::new(),
            archives: HashMap::new(),
            flip_byte: None,
            latest_calls: Cell::new(0),
            manifest_calls: Cell::new(0),
            archive_calls: Cell::new(0),
        }
    }

    pub(crate) fn with_channels(mut self, stable: &str, experimental: &str) -> Self {
        self.latest.stable.headless = Some(stable.to_string());
        self.latest.experimental.headless = Some(experimental.to_string());
        self
    }

    /// Serve `archive` for `version` and list its true checksum.
    pub(crate) fn with_archive(mut self, version: &str, archive: Vec<u8>) -> Self {
        self.manifest.push_str(&format!(
            "{} {}\n",
            sha256_hex(&archive),
            archive_file_name(version)
        ));
        self.archives.insert(version.to_string(), archive);
        self
    }

    /// Flip one bit of the served archive at `offset`, as a bad transport would.
    pub(crate) fn flipping_byte(mut self, offset: usize) -> Self {
        self.flip_byte = Some(offset);
        self
    }

    pub(crate) fn latest_calls(&self) -> usize {
        self.latest_calls.get()
    }

    pub(crate) fn manifest_calls(&self) -> usize {
        self.manifest_calls.get()
    }

    pub(crate) fn archive_calls(&self) -> usize {
        self.archive_calls.get()
    }

    pub(crate) fn total_calls(&self) -> usize {
        self.latest_calls() + self.manifest_calls() + self.archive_calls()
    }
}

impl ReleaseSource for MemorySource {
    fn latest_releases(&self) -> Result<LatestReleases, FetchError> {
        self.latest_calls.set(self.latest_calls.get() + 1);
        Ok(self.latest.clone())
    }

    fn checksum_manifest(&self) -> Result<String, FetchError> {
        self.manifest_calls.set(self.manifest_calls.get() + 1);
        Ok(self.manifest.clone())
    }

    fn archive_url(&self, version: &str) -> String {
        format!("mem://get-download/{}/headless/linux64", version)
    }

    fn open_archive(&self, version: &str) -> Result<Box<dyn Read + Send>, FetchError> {
        self.archive_calls.set(self.archive_calls.get() + 1);
        let mut bytes = self
            .archives
            .get(version)
            .cloned()
            .ok_or_else(|| FetchError::new(self.archive_url(version), "404 Not Found"))?;
        if let Some(at) = self.flip_byte {
            let at = at.min(bytes.len().saturating_sub(1));
            bytes[at] ^= 0x01;
        }
        Ok(Box::new(Cursor::new(bytes)))
    }
}
