//! Crate entry point for **factorio-dl**.
//!
//! Installs a Factorio headless server build into a directory and keeps it at
//! the requested version or release channel. Each submodule owns one concern:
//! `release` talks to the release server, `install` extracts archives and
//! reconciles the install directory, `config` layers the settings.
//!
//! The `pub use` re-exports are what the `factorio-dl` binary and the
//! integration tests build on.

mod cancel;
mod config;
mod error;
mod install;
mod logging;
mod paths;
pub mod progress;
pub mod release;

pub use cancel::CancelToken;
pub use config::{Settings, load_settings};
pub use error::{InstallError, Result};
pub use install::{
    ARCHIVE_ROOT, Extracted, InstallRequest, InstallState, Outcome, STATE_FILE, download,
    ensure_installed, entry_destination, install_archive,
};
pub use logging::init_logging;
pub use paths::{config_home, default_config_path};
pub use release::{
    Channel, Checksum, Endpoints, FetchError, HttpSource, LatestReleases, ReleaseSource,
    VersionSpec,
};
