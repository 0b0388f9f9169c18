use reqwest::blocking::{Client, Response};
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use std::io::Read;
use std::time::Duration;
use tracing::debug;

use super::{Endpoints, FetchError, LatestReleases, ReleaseSource};

/// Upper bound for the small metadata queries. The archive download is not
/// time-limited.
const METADATA_TIMEOUT: Duration = Duration::from_secs(30);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

pub fn http_client() -> reqwest::Result<Client> {
    let mut headers = HeaderMap::new();
    headers.insert(
        USER_AGENT,
        HeaderValue::from_static(concat!("factorio-dl/", env!("CARGO_PKG_VERSION"))),
    );
    Client::builder()
        .default_headers(headers)
        .connect_timeout(CONNECT_TIMEOUT)
        // The blocking client defaults to a 30s total timeout.
        .timeout(Option::<Duration>::None)
        .build()
}

/// [`ReleaseSource`] backed by the release server's HTTP endpoints.
#[derive(Debug, Clone)]
pub struct HttpSource {
    client: Client,
    endpoints: Endpoints,
}

impl HttpSource {
    pub fn new(endpoints: Endpoints) -> reqwest::Result<Self> {
        Ok(Self::with_client(http_client()?, endpoints))
    }

    pub fn with_client(client: Client, endpoints: Endpoints) -> Self {
        Self { client, endpoints }
    }

    fn get(&self, url: &str, timeout: Option<Duration>) -> Result<Response, FetchError> {
        debug!(url, "GET");
        let mut req = self.client.get(url);
        if let Some(t) = timeout {
            req = req.timeout(t);
        }
        req.send()
            .and_then(Response::error_for_status)
            .map_err(|e| FetchError::new(url, e))
    }
}

impl ReleaseSource for HttpSource {
    fn latest_releases(&self) -> Result<LatestReleases, FetchError> {
        let url = self.endpoints.latest_releases_url();
        let resp = self.get(&url, Some(METADATA_TIMEOUT))?;
        resp.json().map_err(|e| FetchError::new(&url, e))
    }

    fn checksum_manifest(&self) -> Result<String, FetchError> {
        let url = self.endpoints.checksums_url();
        let resp = self.get(&url, Some(METADATA_TIMEOUT))?;
        resp.text().map_err(|e| FetchError::new(&url, e))
    }

    fn archive_url(&self, version: &str) -> String {
        self.endpoints.download_url(version)
    }

    fn open_archive(&self, version: &str) -> Result<Box<dyn Read + Send>, FetchError> {
        let url = self.archive_url(version);
        let resp = self.get(&url, None)?;
        debug!(url, length = ?resp.content_length(), "archive response");
        let body: Box<dyn Read + Send> = Box::new(resp);
        Ok(body)
    }
}
