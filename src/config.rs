use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::InstallError;
use crate::install::InstallRequest;
use crate::paths::default_config_path;
use crate::release::{Checksum, Endpoints, VersionSpec};

/// Installer settings.
///
/// Sources are layered, later wins: built-in defaults, the TOML file,
/// `FACTORIO_*` environment variables, then command-line flags (applied by
/// the binary).
///
/// Example TOML:
/// ```toml
/// version = "experimental"
/// install_path = "/opt/factorio"
/// server_data_path = "/data"
///
/// [endpoints]
/// base_url = "https://factorio.com"
/// ```
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    /// `stable`, `experimental` or a concrete version.
    pub version: String,
    pub install_path: PathBuf,
    /// Where saves and server settings live. Not touched by the installer.
    pub server_data_path: PathBuf,
    /// Skip the published manifest and verify against this digest.
    pub sha256sum: Option<String>,
    pub endpoints: Endpoints,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: "stable".to_string(),
            install_path: PathBuf::from("/opt/factorio"),
            server_data_path: PathBuf::from("/data"),
            sha256sum: None,
            endpoints: Endpoints::default(),
        }
    }
}

impl Settings {
    pub fn from_toml_str(txt: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(txt)
    }

    /// Override fields from `FACTORIO_*` variables looked up through `env`.
    /// Unset and empty variables leave the field alone.
    pub fn apply_env(&mut self, env: impl Fn(&str) -> Option<String>) {
        let var = |key: &str| env(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = var("FACTORIO_VERSION") {
            self.version = v;
        }
        if let Some(v) = var("FACTORIO_INSTALL_PATH") {
            self.install_path = PathBuf::from(v);
        }
        if let Some(v) = var("FACTORIO_SERVER_DATA_PATH") {
            self.server_data_path = PathBuf::from(v);
        }
        if let Some(v) = var("FACTORIO_SHA256SUM") {
            self.sha256sum = Some(v);
        }
        if let Some(v) = var("FACTORIO_BASE_URL") {
            self.endpoints = Endpoints::new(v);
        }
    }

    pub fn version_spec(&self) -> Result<VersionSpec, InstallError> {
        self.version.parse()
    }

    pub fn checksum_override(&self) -> Result<Option<Checksum>, InstallError> {
        self.sha256sum
            .as_deref()
            .map(str::parse::<Checksum>)
            .transpose()
    }

    pub fn install_request(&self) -> Result<InstallRequest, InstallError> {
        Ok(InstallRequest {
            version: self.version_spec()?,
            install_dir: self.install_path.clone(),
            sha256sum: self.checksum_override()?,
        })
    }
}

/// Load settings from `explicit` (or the default config path) and the
/// environment.
///
/// # Errors
/// - An explicitly named file that cannot be read.
/// - A config file that is not valid TOML for [`Settings`].
///
/// A missing default config file is not an error.
pub fn load_settings(
    explicit: Option<&Path>,
    env: impl Fn(&str) -> Option<String>,
) -> Result<Settings> {
    let mut settings = match explicit {
        Some(path) => {
            let txt = fs::read_to_string(path)
                .with_context(|| format!("config not found: {}", path.display()))?;
            parse_file(&txt, path)?
        }
        None => {
            let path = default_config_path(&env);
            match fs::read_to_string(&path) {
                Ok(txt) => parse_file(&txt, &path)?,
                Err(e) if e.kind() == io::ErrorKind::NotFound => Settings::default(),
                Err(e) => {
                    return Err(e)
                        .with_context(|| format!("failed to read {}", path.display()));
                }
            }
        }
    };
    settings.apply_env(&env);
    Ok(settings)
}

fn parse_file(txt: &str, path: &Path) -> Result<Settings> {
    Settings::from_toml_str(txt).with_context(|| format!("failed to parse {}", path.display()))
}
