//! Fetching the log document behind a rejected artifact's log URL.

use std::time::Duration;

use tracing::debug;

/// HTTP fetcher for rejection logs.
#[derive(Debug, Clone)]
pub struct LogFetcher {
    client: reqwest::Client,
}

impl LogFetcher {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    /// Whether a diagnostic reference points at something fetchable.
    pub fn is_fetchable(reference: &str) -> bool {
        reference.starts_with("https://") || reference.starts_with("http://")
    }

    /// Downloads the log body.
    pub async fn fetch(&self, url: &str) -> Result<String, reqwest::Error> {
        debug!("Fetching rejection log from {}", url);
        self.client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await
    }
}
