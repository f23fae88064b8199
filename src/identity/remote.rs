use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use http::header::{ACCEPT, USER_AGENT};
use reqwest::Client;
use tracing::{info, warn};

use crate::error::{RelayError, RelayResult};
use crate::identity::{parse_batch, GuestIdentity, IdentityProvider};

pub const TIER_REMOTE: &str = "remote";
pub const RELAY_USER_AGENT: &str = concat!("token-relay/", env!("CARGO_PKG_VERSION"));

/// Fetches the identity document over HTTP and caches it on disk for the next run.
#[derive(Debug, Clone)]
pub struct RemoteProvider {
    client: Client,
    url: String,
    timeout: Duration,
    write_back: Option<PathBuf>,
}

impl RemoteProvider {
    pub fn new(client: Client, url: String, timeout: Duration, write_back: Option<PathBuf>) -> Self {
        Self { client, url, timeout, write_back }
    }

    async fn fetch(&self) -> RelayResult<Vec<GuestIdentity>> {
        let response = self
            .client
            .get(&self.url)
            .timeout(self.timeout)
            .header(USER_AGENT, RELAY_USER_AGENT)
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| RelayError::SourceUnavailable(format!("GET {}: {}", self.url, e)))?;

        if !response.status().is_success() {
            return Err(RelayError::SourceUnavailable(format!(
                "GET {} returned {}",
                self.url,
                response.status()
            )));
        }
        let body = response
            .text()
            .await
            .map_err(|e| RelayError::SourceUnavailable(format!("GET {} body: {}", self.url, e)))?;
        parse_batch(&body)
    }
}

#[async_trait]
impl IdentityProvider for RemoteProvider {
    fn tier(&self) -> &str {
        TIER_REMOTE
    }

    async fn load(&self) -> RelayResult<Vec<GuestIdentity>> {
        let batch = self.fetch().await?;
        info!("downloaded {} identities from {}", batch.len(), self.url);

        if let Some(path) = &self.write_back {
            match write_back(path, &batch).await {
                Ok(()) => info!("identities cached locally at '{}'", path.display()),
                Err(e) => warn!("could not cache identities at '{}': {}", path.display(), e),
            }
        }
        Ok(batch)
    }
}

async fn write_back(path: &Path, batch: &[GuestIdentity]) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    let json = serde_json::to_string_pretty(batch)?;
    // readers of the local tier must never see a half-written document
    let tmp = path.with_extension("tmp");
    tokio::fs::write(&tmp, json).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}
