//! Single-pass download, decompression, extraction and verification.
//!
//! The response body is hashed as it is read, before the xz decoder sees it,
//! so the digest covers exactly the bytes the server sent. Extraction runs in
//! the same pass; the integrity verdict is only known once the stream ends.

use sha2::{Digest, Sha256};
use std::fs::{self, File, Permissions};
use std::io::{self, Read, Write};
use std::os::unix::fs::PermissionsExt;
use std::path::{Component, Path, PathBuf};
use tar::Archive;
use tracing::{debug, info, warn};
use xz2::read::XzDecoder;

use crate::cancel::CancelToken;
use crate::error::{InstallError, Result};
use crate::release::{Checksum, ReleaseSource};

/// Top-level directory every release archive wraps its contents in.
pub const ARCHIVE_ROOT: &str = "factorio";

/// Bytes copied per write; cancellation is checked between chunks.
const COPY_CHUNK: usize = 4096;

/// What a successful install wrote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Extracted {
    pub files: usize,
    /// Compressed bytes received and hashed.
    pub bytes: u64,
}

/// Reader that feeds every byte it returns into a SHA-256 hasher.
///
/// It also remembers whether the inner reader failed, which lets the caller
/// tell a dropped connection apart from a corrupt container.
struct HashingReader<R> {
    inner: R,
    hasher: Sha256,
    bytes: u64,
    transport_error: Option<String>,
}

impl<R: Read> HashingReader<R> {
    fn new(inner: R) -> Self {
        Self {
            inner,
            hasher: Sha256::new(),
            bytes: 0,
            transport_error: None,
        }
    }

    fn finalize(self) -> String {
        hex::encode(self.hasher.finalize())
    }
}

impl<R: Read> Read for HashingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.inner.read(buf) {
            Ok(n) => {
                self.hasher.update(&buf[..n]);
                self.bytes += n as u64;
                Ok(n)
            }
            Err(e) => {
                if e.kind() != io::ErrorKind::Interrupted {
                    self.transport_error.get_or_insert_with(|| e.to_string());
                }
                Err(e)
            }
        }
    }
}

/// Why unpacking stopped early.
enum Abort {
    /// The compressed or tar stream could not be decoded.
    Corrupt(String),
    /// Everything else: unsafe paths, local I/O, cancellation.
    Fatal(InstallError),
}

impl From<InstallError> for Abort {
    fn from(e: InstallError) -> Self {
        Abort::Fatal(e)
    }
}

fn corrupt(e: io::Error) -> Abort {
    Abort::Corrupt(e.to_string())
}

fn illegal_path(entry: &Path) -> InstallError {
    InstallError::Extraction(format!("{}: illegal file path", entry.display()))
}

/// Fail unless `dest` is an existing, empty directory.
pub(crate) fn ensure_empty_dir(dest: &Path) -> Result<()> {
    let mut rd = fs::read_dir(dest).map_err(|e| {
        InstallError::io(format!("cannot read output directory {}", dest.display()), e)
    })?;
    if rd.next().is_some() {
        return Err(InstallError::DestinationNotEmpty(dest.to_path_buf()));
    }
    Ok(())
}

/// Map an archive entry path to its location under `dest`.
///
/// The [`ARCHIVE_ROOT`] component is stripped and `.`/`..` are resolved
/// lexically. Absolute paths and paths climbing out of `dest` are rejected.
pub fn entry_destination(dest: &Path, entry: &Path) -> Result<PathBuf> {
    let relative = entry.strip_prefix(ARCHIVE_ROOT).unwrap_or(entry);

    let mut clean = PathBuf::new();
    for component in relative.components() {
        match component {
            Component::Normal(part) => clean.push(part),
            Component::CurDir => {}
            Component::ParentDir => {
                if !clean.pop() {
                    return Err(illegal_path(entry));
                }
            }
            Component::RootDir | Component::Prefix(_) => return Err(illegal_path(entry)),
        }
    }

    let target = dest.join(&clean);
    if !target.starts_with(dest) {
        return Err(illegal_path(entry));
    }
    Ok(target)
}

/// Download `version`, extract it into the empty directory `dest`, and
/// verify the archive against `expected`.
///
/// Files already written stay on disk when this fails, including on
/// [`InstallError::Integrity`] and [`InstallError::Cancelled`]; the caller
/// must not treat `dest` as installed in that case.
pub fn install_archive(
    source: &dyn ReleaseSource,
    version: &str,
    expected: &Checksum,
    dest: &Path,
    cancel: &CancelToken,
) -> Result<Extracted> {
    ensure_empty_dir(dest)?;
    cancel.check()?;

    let url = source.archive_url(version);
    info!(%version, %url, "downloading");
    let body = source.open_archive(version).map_err(|e| InstallError::Download {
        url: url.clone(),
        message: e.message,
    })?;

    let extracted = extract_stream(body, &url, expected, dest, cancel)?;
    info!(
        %version,
        files = extracted.files,
        bytes = extracted.bytes,
        "downloaded and validated"
    );
    Ok(extracted)
}

fn extract_stream<R: Read>(
    body: R,
    url: &str,
    expected: &Checksum,
    dest: &Path,
    cancel: &CancelToken,
) -> Result<Extracted> {
    let mut archive = Archive::new(XzDecoder::new(HashingReader::new(body)));
    let unpacked = unpack_entries(&mut archive, dest, cancel);

    // The tar reader stops at the end-of-archive marker. Trailing padding and
    // the xz index still have to go through the hasher.
    let mut decoder = archive.into_inner();
    let unpacked = unpacked.and_then(|files| {
        io::copy(&mut decoder, &mut io::sink()).map_err(corrupt)?;
        Ok(files)
    });
    let hashing = decoder.into_inner();

    match unpacked {
        Ok(files) => {
            let bytes = verify(hashing, url, expected)?;
            Ok(Extracted { files, bytes })
        }
        Err(Abort::Fatal(e)) => Err(e),
        Err(Abort::Corrupt(message)) => {
            // A damaged download is reported as such; only a release that
            // matches its checksum and still fails to decode is malformed.
            verify(hashing, url, expected)?;
            Err(InstallError::Extraction(message))
        }
    }
}

/// Read the rest of the response so the digest covers the whole body.
fn drain<R: Read>(hashing: &mut HashingReader<R>, url: &str) -> Result<()> {
    let download_err = |message: String| InstallError::Download {
        url: url.to_string(),
        message,
    };
    if let Some(message) = hashing.transport_error.take() {
        return Err(download_err(message));
    }
    io::copy(hashing, &mut io::sink()).map_err(|e| download_err(e.to_string()))?;
    Ok(())
}

fn verify<R: Read>(mut hashing: HashingReader<R>, url: &str, expected: &Checksum) -> Result<u64> {
    drain(&mut hashing, url)?;
    let bytes = hashing.bytes;
    let actual = hashing.finalize();
    if actual != expected.as_str() {
        return Err(InstallError::Integrity {
            expected: expected.to_string(),
            actual,
        });
    }
    Ok(bytes)
}

fn unpack_entries<R: Read>(
    archive: &mut Archive<R>,
    dest: &Path,
    cancel: &CancelToken,
) -> std::result::Result<usize, Abort> {
    let mut files = 0;
    for entry in archive.entries().map_err(corrupt)? {
        cancel.check()?;
        let mut entry = entry.map_err(corrupt)?;
        let raw = entry.path().map_err(corrupt)?.into_owned();
        let target = entry_destination(dest, &raw)?;

        let kind = entry.header().entry_type();
        if kind.is_dir() {
            // Created on demand below.
            continue;
        }
        if !kind.is_file() {
            warn!(entry = %raw.display(), kind = ?kind, "skipping unsupported entry type");
            continue;
        }
        if target == dest {
            return Err(illegal_path(&raw).into());
        }

        let mode = entry.header().mode().map_err(corrupt)? & 0o7777;
        let size = entry.size();
        write_entry(&mut entry, &target, mode, cancel)?;
        debug!(path = %target.display(), size, mode = %format!("{:o}", mode), "extracted");
        files += 1;
    }
    Ok(files)
}

/// Materialize one file. The handle is closed when this returns, on every
/// path out.
fn write_entry<R: Read>(
    entry: &mut R,
    target: &Path,
    mode: u32,
    cancel: &CancelToken,
) -> std::result::Result<u64, Abort> {
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            InstallError::io(format!("failed to create directory {}", parent.display()), e)
        })?;
    }

    let mut file = File::create(target)
        .map_err(|e| InstallError::io(format!("failed to create file {}", target.display()), e))?;
    file.set_permissions(Permissions::from_mode(mode))
        .map_err(|e| InstallError::io(format!("failed to chmod file {}", target.display()), e))?;

    let mut buf = [0u8; COPY_CHUNK];
    let mut written = 0u64;
    loop {
        cancel.check()?;
        let n = match entry.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(corrupt(e)),
        };
        file.write_all(&buf[..n])
            .map_err(|e| InstallError::io(format!("failed to write {}", target.display()), e))?;
        written += n as u64;
    }
    Ok(written)
}
