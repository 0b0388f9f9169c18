mod archive;
#[cfg(test)]
pub(crate) mod fixtures;
mod state;

use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::cancel::CancelToken;
use crate::error::{InstallError, Result};
use crate::release::{Checksum, ReleaseSource, VersionSpec, checksum_for};

pub use archive::{ARCHIVE_ROOT, Extracted, entry_destination, install_archive};
pub use state::{InstallState, STATE_FILE};

/// What the caller wants installed, and where.
#[derive(Debug, Clone)]
pub struct InstallRequest {
    pub version: VersionSpec,
    pub install_dir: PathBuf,
    /// Skips the checksum manifest lookup when set.
    pub sha256sum: Option<Checksum>,
}

/// How [`ensure_installed`] converged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The stored version already matched; nothing was touched.
    UpToDate { version: String },
    /// The directory was wiped and `version` installed over `previous`.
    Installed {
        version: String,
        previous: Option<String>,
    },
}

impl Outcome {
    pub fn version(&self) -> &str {
        match self {
            Outcome::UpToDate { version } | Outcome::Installed { version, .. } => version,
        }
    }
}

/// Ensure `request.install_dir` holds the requested server version.
///
/// Flow:
/// 1. Read `state.json` from the install directory, creating the directory if
///    it is missing.
/// 2. Resolve a channel to its latest version.
/// 3. If the stored version matches, stop without touching anything.
/// 4. Otherwise delete everything in the install directory, including the
///    state file.
/// 5. Download, extract and verify the archive.
/// 6. Record the new version.
///
/// Any failure is returned as is. Nothing is retried, and the state file is
/// only written after a fully verified install.
pub fn ensure_installed(
    source: &dyn ReleaseSource,
    request: &InstallRequest,
    cancel: &CancelToken,
) -> Result<Outcome> {
    request.version.validate()?;
    let dir = &request.install_dir;
    let mut state = InstallState::open_in(dir);
    if state.is_empty() {
        info!(dir = %dir.display(), "no version installed");
    }
    fs::create_dir_all(dir).map_err(|e| {
        InstallError::io(format!("failed to create install directory {}", dir.display()), e)
    })?;

    let version = request.version.resolve(source)?;
    if let VersionSpec::Channel(channel) = &request.version {
        info!(%channel, %version, "resolved channel");
    }

    if state.version() == version {
        info!(%version, "already at desired version");
        return Ok(Outcome::UpToDate { version });
    }

    let previous = (!state.is_empty()).then(|| state.version().to_string());
    info!(
        %version,
        previous = previous.as_deref().unwrap_or("none"),
        "installing"
    );
    clear_dir(dir)?;

    let checksum = match &request.sha256sum {
        Some(sum) => sum.clone(),
        None => checksum_for(source, &version)?,
    };
    install_archive(source, &version, &checksum, dir, cancel)?;

    state.set_version(&version)?;
    state.save()?;
    Ok(Outcome::Installed { version, previous })
}

/// One-shot install into an empty `output_dir`, created if missing.
///
/// Unlike [`ensure_installed`] this neither reads nor writes install state.
/// Returns the concrete version that was installed.
pub fn download(
    source: &dyn ReleaseSource,
    version: &VersionSpec,
    sha256sum: Option<&Checksum>,
    output_dir: &Path,
    cancel: &CancelToken,
) -> Result<String> {
    version.validate()?;
    fs::create_dir_all(output_dir).map_err(|e| {
        InstallError::io(format!("failed to create {}", output_dir.display()), e)
    })?;
    archive::ensure_empty_dir(output_dir)?;

    let version = version.resolve(source)?;
    let checksum = match sha256sum {
        Some(sum) => sum.clone(),
        None => checksum_for(source, &version)?,
    };
    install_archive(source, &version, &checksum, output_dir, cancel)?;
    Ok(version)
}

/// Remove every entry of `dir`, stopping at the first failure.
fn clear_dir(dir: &Path) -> Result<usize> {
    let rd = fs::read_dir(dir)
        .map_err(|e| InstallError::io(format!("failed to read {}", dir.display()), e))?;

    let mut removed = 0;
    for ent in rd {
        let ent =
            ent.map_err(|e| InstallError::io(format!("failed to read {}", dir.display()), e))?;
        let path = ent.path();
        let is_dir = ent.file_type().map(|t| t.is_dir()).unwrap_or(false);
        let res = if is_dir {
            fs::remove_dir_all(&path)
        } else {
            fs::remove_file(&path)
        };
        res.map_err(|e| {
            InstallError::io(
                format!("failed to remove existing installation at {}", path.display()),
                e,
            )
        })?;
        removed += 1;
    }
    if removed > 0 {
        info!(dir = %dir.display(), removed, "cleared install directory");
    }
    Ok(removed)
}
