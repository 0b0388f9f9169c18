//! # factorio-dl
//!
//! Installs and updates a Factorio headless server.
//!
//! Features:
//! - `factorio-dl ensure` keeps the install directory at the configured
//!   version or channel, doing nothing when it already matches
//! - `factorio-dl download <dir>` installs one version into an empty directory
//! - `factorio-dl latest` prints the newest version of each channel
//! - `factorio-dl checksum <version>` prints the published archive checksum
//!
//! Settings come from `$XDG_CONFIG_HOME/factorio-dl/config.toml`, the
//! `FACTORIO_*` environment variables, and flags, in that order.

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use colored::Colorize;
use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{debug, warn};

use factorio_dl::progress::{finish_err, finish_ok, spinner};
use factorio_dl::release::checksum_for;
use factorio_dl::{
    CancelToken, Channel, Checksum, HttpSource, Outcome, ReleaseSource, Settings, VersionSpec,
    download, ensure_installed, init_logging, load_settings,
};

/// Command-line interface definition.
#[derive(Parser, Debug)]
#[command(
    name = "factorio-dl",
    version,
    about = "Install and update a Factorio headless server",
    arg_required_else_help = true
)]
struct Cli {
    /// Read settings from this file instead of the default location
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// More log output (-v progress, -vv every extracted file)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    cmd: Option<Cmd>,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Bring the install directory to the desired version
    Ensure {
        /// `stable`, `experimental` or a concrete version
        #[arg(long)]
        version: Option<String>,
        #[arg(long, value_name = "DIR")]
        install_path: Option<PathBuf>,
        /// Verify against this SHA-256 instead of the published one
        #[arg(long, value_name = "HEX")]
        sha256sum: Option<String>,
    },
    /// Install one version into an empty directory
    Download {
        output_dir: PathBuf,
        #[arg(long, default_value = "stable")]
        version: String,
        #[arg(long, value_name = "HEX")]
        sha256sum: Option<String>,
    },
    /// Print the latest version of each channel
    Latest,
    /// Print the published SHA-256 of a version's archive
    Checksum { version: String },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {:#}", "error:".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let Some(cmd) = cli.cmd else {
        Cli::command().print_help()?;
        return Ok(());
    };

    let settings = load_settings(cli.config.as_deref(), |key| env::var(key).ok())?;
    debug!(?settings, "effective settings");
    let source = HttpSource::new(settings.endpoints.clone()).context("failed to build HTTP client")?;

    // Ctrl-C stops an install between chunks instead of mid-write.
    let cancel = CancelToken::new();
    if let Err(e) = cancel.cancel_on_interrupt() {
        warn!(error = %e, "could not install Ctrl-C handler");
    }

    match cmd {
        Cmd::Ensure {
            version,
            install_path,
            sha256sum,
        } => cmd_ensure(&source, &cancel, settings, version, install_path, sha256sum),
        Cmd::Download {
            output_dir,
            version,
            sha256sum,
        } => cmd_download(&source, &cancel, &output_dir, &version, sha256sum.as_deref()),
        Cmd::Latest => cmd_latest(&source),
        Cmd::Checksum { version } => {
            let sum = checksum_for(&source, &version)?;
            println!("{}", sum);
            Ok(())
        }
    }
}

fn cmd_ensure(
    source: &dyn ReleaseSource,
    cancel: &CancelToken,
    mut settings: Settings,
    version: Option<String>,
    install_path: Option<PathBuf>,
    sha256sum: Option<String>,
) -> Result<()> {
    if let Some(v) = version {
        settings.version = v;
    }
    if let Some(p) = install_path {
        settings.install_path = p;
    }
    if let Some(s) = sha256sum {
        settings.sha256sum = Some(s);
    }
    let request = settings.install_request()?;

    let pb = spinner(format!(
        "ensuring factorio {} in {}",
        request.version,
        request.install_dir.display()
    ));
    match ensure_installed(source, &request, cancel) {
        Ok(Outcome::UpToDate { version }) => {
            finish_ok(&pb, format!("already up to date ({})", version));
            Ok(())
        }
        Ok(Outcome::Installed { version, previous }) => {
            let msg = match previous {
                Some(prev) => format!("upgraded {} -> {}", prev, version),
                None => format!("installed {}", version),
            };
            finish_ok(&pb, msg);
            Ok(())
        }
        Err(e) => {
            finish_err(&pb, "install failed");
            Err(e.into())
        }
    }
}

fn cmd_download(
    source: &dyn ReleaseSource,
    cancel: &CancelToken,
    output_dir: &std::path::Path,
    version: &str,
    sha256sum: Option<&str>,
) -> Result<()> {
    let spec: VersionSpec = version.parse()?;
    let sum = sha256sum.map(str::parse::<Checksum>).transpose()?;

    let pb = spinner(format!("downloading factorio {} to {}", spec, output_dir.display()));
    match download(source, &spec, sum.as_ref(), output_dir, cancel) {
        Ok(installed) => {
            finish_ok(&pb, format!("downloaded and validated {}", installed));
            Ok(())
        }
        Err(e) => {
            finish_err(&pb, "download failed");
            Err(e.into())
        }
    }
}

fn cmd_latest(source: &dyn ReleaseSource) -> Result<()> {
    let releases = source
        .latest_releases()
        .context("failed to query latest releases")?;
    for channel in [Channel::Stable, Channel::Experimental] {
        println!("{}: {}", channel, releases.headless(channel).unwrap_or("-"));
    }
    Ok(())
}
