use serde::Deserialize;
use std::fmt;
use std::str::FromStr;
use tracing::debug;

use super::ReleaseSource;
use crate::error::{InstallError, Result};

/// A rolling release track that always points at its newest version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Stable,
    Experimental,
}

impl Channel {
    pub fn as_str(self) -> &'static str {
        match self {
            Channel::Stable => "stable",
            Channel::Experimental => "experimental",
        }
    }

    /// Exact token match; anything else is a concrete version.
    pub fn parse(s: &str) -> Option<Channel> {
        match s {
            "stable" => Some(Channel::Stable),
            "experimental" => Some(Channel::Experimental),
            _ => None,
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// True iff `version` is one of the reserved channel tokens.
pub fn is_channel(version: &str) -> bool {
    Channel::parse(version).is_some()
}

/// What the user asked for: a channel to follow or a pinned version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionSpec {
    Channel(Channel),
    Exact(String),
}

impl FromStr for VersionSpec {
    type Err = InstallError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if let Some(channel) = Channel::parse(s) {
            return Ok(VersionSpec::Channel(channel));
        }
        check_version(s)?;
        Ok(VersionSpec::Exact(s.to_string()))
    }
}

/// Accept only strings usable as a concrete version.
///
/// The version is spliced into a URL path, a file name and the state file, so
/// it is limited to `[0-9A-Za-z._-]`, may not be `.` or `..`, and may not be a
/// channel token.
pub fn check_version(version: &str) -> Result<()> {
    let charset_ok = version
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'.' | b'_' | b'-'));
    if version.is_empty() || !charset_ok || version == "." || version == ".." || is_channel(version)
    {
        return Err(InstallError::InvalidVersion(version.to_string()));
    }
    Ok(())
}

impl fmt::Display for VersionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionSpec::Channel(c) => c.fmt(f),
            VersionSpec::Exact(v) => f.write_str(v),
        }
    }
}

impl VersionSpec {
    /// Fail with [`InstallError::InvalidVersion`] if an `Exact` value would
    /// not be accepted by `parse`. Enum literals bypass parsing.
    pub fn validate(&self) -> Result<()> {
        match self {
            VersionSpec::Channel(_) => Ok(()),
            VersionSpec::Exact(version) => check_version(version),
        }
    }

    /// Turn this into a concrete version, querying the server for channels.
    pub fn resolve(&self, source: &dyn ReleaseSource) -> Result<String> {
        match self {
            VersionSpec::Channel(channel) => resolve_channel(source, *channel),
            VersionSpec::Exact(version) => {
                check_version(version)?;
                Ok(version.clone())
            }
        }
    }
}

/// Builds published for one channel. Other build kinds are ignored.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct ChannelBuilds {
    #[serde(default)]
    pub headless: Option<String>,
}

/// Response of the latest-releases endpoint, keyed by channel.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct LatestReleases {
    #[serde(default)]
    pub stable: ChannelBuilds,
    #[serde(default)]
    pub experimental: ChannelBuilds,
}

impl LatestReleases {
    /// Latest headless version on `channel`, if the server listed one.
    pub fn headless(&self, channel: Channel) -> Option<&str> {
        let builds = match channel {
            Channel::Stable => &self.stable,
            Channel::Experimental => &self.experimental,
        };
        builds
            .headless
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
    }
}

/// Resolve `channel` to the newest concrete version. Never cached.
pub fn resolve_channel(source: &dyn ReleaseSource, channel: Channel) -> Result<String> {
    let releases = source
        .latest_releases()
        .map_err(|e| InstallError::Resolution {
            channel: channel.to_string(),
            message: e.to_string(),
        })?;

    let version = releases
        .headless(channel)
        .ok_or_else(|| InstallError::Resolution {
            channel: channel.to_string(),
            message: "no headless release listed".to_string(),
        })?;
    check_version(version).map_err(|e| InstallError::Resolution {
        channel: channel.to_string(),
        message: e.to_string(),
    })?;
    debug!(%channel, version, "latest release");
    Ok(version.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::release::FetchError;
    use std::io::Read;

    struct Fixed(std::result::Result<&'static str, &'static str>);

    impl ReleaseSource for Fixed {
        fn latest_releases(&self) -> std::result::Result<LatestReleases, FetchError> {
            match self.0 {
                Ok(body) => serde_json::from_str(body).map_err(|e| FetchError::new("test", e)),
                Err(msg) => Err(FetchError::new("test", msg)),
            }
        }
        fn checksum_manifest(&self) -> std::result::Result<String, FetchError> {
            unreachable!()
        }
        fn archive_url(&self, version: &str) -> String {
            version.to_string()
        }
        fn open_archive(
            &self,
            _version: &str,
        ) -> std::result::Result<Box<dyn Read + Send>, FetchError> {
            unreachable!()
        }
    }

    #[test]
    fn is_channel_only_matches_reserved_tokens() {
        assert!(is_channel("stable"));
        assert!(is_channel("experimental"));
        for other in ["", "Stable", "stable ", "1.1.110", "latest", "experimental2"] {
            assert!(!is_channel(other), "{other:?}");
        }
    }

    #[test]
    fn version_spec_parses_channels_and_versions() {
        assert_eq!(
            "stable".parse::<VersionSpec>().unwrap(),
            VersionSpec::Channel(Channel::Stable)
        );
        assert_eq!(
            "1.1.110".parse::<VersionSpec>().unwrap(),
            VersionSpec::Exact("1.1.110".into())
        );
        assert!(matches!(
            "".parse::<VersionSpec>(),
            Err(InstallError::InvalidVersion(_))
        ));
        assert!(matches!(
            "../1.1".parse::<VersionSpec>(),
            Err(InstallError::InvalidVersion(_))
        ));
    }

    #[test]
    fn version_spec_rejects_path_and_query_characters() {
        for bad in ["..", ".", "1.1?x=1", "1.1#frag", "1.1%2f", "a\\b", "1.1 .2", "\u{e9}"] {
            assert!(
                matches!(bad.parse::<VersionSpec>(), Err(InstallError::InvalidVersion(_))),
                "{bad:?}"
            );
        }
        for good in ["1.1.110", "2.0.7", "0.17.79-rc_1"] {
            assert_eq!(
                good.parse::<VersionSpec>().unwrap(),
                VersionSpec::Exact(good.to_string())
            );
        }
    }

    #[test]
    fn exact_channel_token_is_invalid() {
        let src = Fixed(Err("must not be called"));
        let spec = VersionSpec::Exact("stable".into());
        assert!(matches!(spec.validate(), Err(InstallError::InvalidVersion(_))));
        assert!(matches!(spec.resolve(&src), Err(InstallError::InvalidVersion(_))));
        assert!(VersionSpec::Channel(Channel::Stable).validate().is_ok());
    }

    #[test]
    fn server_version_with_path_characters_is_resolution_error() {
        let src = Fixed(Ok(r#"{"stable":{"headless":"../1.1"},"experimental":{"headless":"2.0.7"}}"#));
        assert!(matches!(
            resolve_channel(&src, Channel::Stable),
            Err(InstallError::Resolution { .. })
        ));
    }

    #[test]
    fn exact_version_resolves_without_query() {
        // Fixed(Err) would fail the resolution if it were consulted.
        let src = Fixed(Err("must not be called"));
        let spec = VersionSpec::Exact("1.1.100".into());
        assert_eq!(spec.resolve(&src).unwrap(), "1.1.100");
    }

    #[test]
    fn resolves_each_channel_from_headless_field() {
        let src = Fixed(Ok(
            r#"{"stable":{"alpha":"1.1.110","headless":"1.1.110"},
                "experimental":{"headless":"2.0.7","expansion":"2.0.7"}}"#,
        ));
        assert_eq!(resolve_channel(&src, Channel::Stable).unwrap(), "1.1.110");
        assert_eq!(resolve_channel(&src, Channel::Experimental).unwrap(), "2.0.7");
    }

    #[test]
    fn empty_channel_field_is_resolution_error() {
        let src = Fixed(Ok(r#"{"stable":{"headless":"1.1.110"},"experimental":{"headless":""}}"#));
        let err = resolve_channel(&src, Channel::Experimental).unwrap_err();
        assert!(matches!(err, InstallError::Resolution { ref channel, .. } if channel == "experimental"));
    }

    #[test]
    fn undecodable_or_failed_query_is_resolution_error() {
        let src = Fixed(Ok("<html>maintenance</html>"));
        assert!(matches!(
            resolve_channel(&src, Channel::Stable),
            Err(InstallError::Resolution { .. })
        ));

        let src = Fixed(Err("connection refused"));
        let err = resolve_channel(&src, Channel::Stable).unwrap_err();
        assert!(err.to_string().contains("connection refused"));
    }
}
