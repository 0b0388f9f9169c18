use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

use crate::error::{InstallError, Result};
use crate::release::{check_version, is_channel};

/// Name of the state file inside the install directory.
pub const STATE_FILE: &str = "state.json";

/// Which version currently occupies the install directory.
///
/// `version` is empty when nothing is installed and otherwise always a
/// concrete version; channel tokens are never stored.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InstallState {
    #[serde(skip)]
    path: PathBuf,

    #[serde(default)]
    version: String,
}

impl InstallState {
    /// Read the state at `path`.
    ///
    /// A missing, unreadable or undecodable file yields an empty state: a
    /// fresh install is always a valid way to recover.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let version = fs::read_to_string(&path)
            .ok()
            .and_then(|txt| serde_json::from_str::<InstallState>(&txt).ok())
            .map(|s| s.version.trim().to_string())
            .filter(|v| !is_channel(v))
            .unwrap_or_default();
        Self { path, version }
    }

    /// State for the conventional `state.json` inside `install_dir`.
    pub fn open_in(install_dir: &Path) -> Self {
        Self::open(install_dir.join(STATE_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn is_empty(&self) -> bool {
        self.version.is_empty()
    }

    /// Record `version` in memory. Channel tokens and strings that are not a
    /// valid version are refused.
    pub fn set_version(&mut self, version: impl Into<String>) -> Result<()> {
        let version = version.into();
        check_version(&version)?;
        self.version = version;
        Ok(())
    }

    /// Replace the file at [`path`](Self::path) with this state.
    ///
    /// The new content is written next to the target and renamed over it, so
    /// readers see either the old file or the new one.
    pub fn save(&self) -> Result<()> {
        let persist_err = |source: io::Error| InstallError::Persist {
            path: self.path.clone(),
            source,
        };

        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let mut tmp = NamedTempFile::new_in(dir).map_err(persist_err)?;
        serde_json::to_writer(&mut tmp, self).map_err(|e| persist_err(e.into()))?;
        tmp.write_all(b"\n").map_err(persist_err)?;
        tmp.as_file().sync_all().map_err(persist_err)?;
        tmp.persist(&self.path).map_err(|e| persist_err(e.error))?;
        Ok(())
    }
}
