use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use http::header::{ACCEPT, AUTHORIZATION, USER_AGENT};
use http::StatusCode;
use reqwest::{Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::config::service::StoreConfig;
use crate::error::{RelayError, RelayResult};
use crate::helpers::time::now_utc;
use crate::identity::remote::RELAY_USER_AGENT;
use crate::observability::metrics::{get_metrics, OUTCOME_CONFLICT, OUTCOME_FAILED, OUTCOME_OK};
use crate::publish::BatchPublisher;
use crate::resilience::retry::RetrySettings;
use crate::token::SignedToken;

const GITHUB_ACCEPT: &str = "application/vnd.github.v3+json";
/// read-then-write rounds per publish: the first one plus one retry after a conflict
const CONFLICT_ROUNDS: u32 = 2;

/// `GET .../contents/{path}` response, only the fields we need.
#[derive(Debug, Deserialize)]
struct StoredContent {
    #[serde(default)]
    content: String,
    #[serde(rename = "sha", alias = "revision")]
    revision: String,
}

#[derive(Debug, Serialize)]
struct Committer<'a> {
    name: &'a str,
    email: &'a str,
}

/// `PUT .../contents/{path}` body. `sha` is omitted on create.
#[derive(Debug, Serialize)]
struct PutContents<'a> {
    message: String,
    content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    sha: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    branch: Option<&'a str>,
    committer: Committer<'a>,
}

/// Publishes the batch as one JSON file through the GitHub contents API,
/// using the file `sha` as the optimistic-concurrency revision marker.
#[derive(Debug, Clone)]
pub struct GitHubContentsPublisher {
    client: Client,
    cfg: StoreConfig,
    retry: RetrySettings,
}

impl GitHubContentsPublisher {
    pub fn new(client: Client, cfg: StoreConfig) -> Self {
        let retry = RetrySettings::from(cfg.retry.as_ref());
        Self { client, cfg, retry }
    }

    pub fn is_enabled(&self) -> bool {
        !self.cfg.token.is_empty()
    }

    fn contents_url(&self) -> String {
        format!(
            "{}/repos/{}/{}/contents/{}",
            self.cfg.api_base.trim_end_matches('/'),
            self.cfg.owner,
            self.cfg.repo,
            self.cfg.path.trim_start_matches('/'),
        )
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .timeout(Duration::from_millis(self.cfg.timeout_ms))
            .header(AUTHORIZATION, format!("token {}", self.cfg.token))
            .header(ACCEPT, GITHUB_ACCEPT)
            .header(USER_AGENT, RELAY_USER_AGENT)
    }

    /// Current content and revision; `None` when the file does not exist yet.
    async fn read(&self) -> RelayResult<Option<StoredContent>> {
        let mut request = self.client.get(self.contents_url());
        if let Some(branch) = &self.cfg.branch {
            request = request.query(&[("ref", branch)]);
        }
        let response = self
            .authorized(request)
            .send()
            .await
            .map_err(|e| RelayError::PublishUnreachable(e.to_string()))?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => response
                .json::<StoredContent>()
                .await
                .map(Some)
                .map_err(|e| RelayError::PublishUnreachable(format!("unexpected contents body: {e}"))),
            _ => Err(status_error(response, None).await),
        }
    }

    async fn write(&self, content: &[u8], revision: Option<String>) -> RelayResult<()> {
        let body = PutContents {
            message: format!("Update tokens - {}", now_utc().to_rfc3339()),
            content: STANDARD.encode(content),
            sha: revision.clone(),
            branch: self.cfg.branch.as_deref(),
            committer: Committer {
                name: &self.cfg.committer_name,
                email: &self.cfg.committer_email,
            },
        };
        let response = self
            .authorized(self.client.put(self.contents_url()))
            .json(&body)
            .send()
            .await
            .map_err(|e| RelayError::PublishUnreachable(e.to_string()))?;

        match response.status() {
            StatusCode::OK | StatusCode::CREATED => Ok(()),
            _ => Err(status_error(response, revision).await),
        }
    }

    /// Read the revision, write against it; on conflict do it once more.
    async fn publish_once(&self, content: &[u8]) -> RelayResult<()> {
        let metrics = get_metrics().await;
        let mut round = 1;
        loop {
            let revision = self.read().await?.map(|stored| stored.revision);
            if revision.is_none() {
                info!("token file '{}' does not exist, creating it", self.cfg.path);
            }
            match self.write(content, revision).await {
                Err(e @ RelayError::PublishConflict { .. }) if round < CONFLICT_ROUNDS => {
                    metrics.publish_attempts.with_label_values(&[OUTCOME_CONFLICT]).inc();
                    warn!("{}, re-reading revision and retrying once", e);
                    round += 1;
                }
                other => return other,
            }
        }
    }
}

#[async_trait]
impl BatchPublisher for GitHubContentsPublisher {
    async fn publish(&self, batch: &[SignedToken]) -> bool {
        if !self.is_enabled() {
            warn!("content store token not configured, skipping publish");
            return false;
        }
        let metrics = get_metrics().await;
        let content = match serde_json::to_vec_pretty(batch) {
            Ok(content) => content,
            Err(e) => {
                error!("cannot serialize token batch: {}", e);
                return false;
            }
        };

        let result = self
            .retry
            .run_with_retry(
                || self.publish_once(&content),
                |e| matches!(e, RelayError::PublishUnreachable(_)),
            )
            .await;

        match result {
            Ok(()) => {
                metrics.publish_attempts.with_label_values(&[OUTCOME_OK]).inc();
                info!(count = batch.len(), path = %self.cfg.path, "token batch published");
                true
            }
            Err(e) => {
                let outcome = match e {
                    RelayError::PublishConflict { .. } => OUTCOME_CONFLICT,
                    _ => OUTCOME_FAILED,
                };
                metrics.publish_attempts.with_label_values(&[outcome]).inc();
                error!(error = %e, "publishing token batch failed");
                false
            }
        }
    }

    async fn current(&self) -> RelayResult<Option<Vec<SignedToken>>> {
        if !self.is_enabled() {
            warn!("content store token not configured");
            return Ok(None);
        }
        let Some(stored) = self.read().await? else {
            info!("token file '{}' does not exist in the store", self.cfg.path);
            return Ok(None);
        };
        // the API wraps base64 at 60 columns
        let packed: String = stored.content.split_whitespace().collect();
        let bytes = STANDARD
            .decode(packed)
            .map_err(|e| RelayError::PublishUnreachable(format!("stored content is not base64: {e}")))?;
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| RelayError::PublishUnreachable(format!("stored content is not a token batch: {e}")))
    }
}

async fn status_error(response: Response, revision: Option<String>) -> RelayError {
    let status = response.status();
    match status {
        StatusCode::CONFLICT | StatusCode::PRECONDITION_FAILED => RelayError::PublishConflict { revision },
        // create without `sha` raced by another writer: the file exists now
        StatusCode::UNPROCESSABLE_ENTITY if revision.is_none() => RelayError::PublishConflict { revision },
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => RelayError::Unauthorized(status.as_u16()),
        _ => {
            let body = response.text().await.unwrap_or_default();
            let snippet: String = body.chars().take(200).collect();
            RelayError::PublishUnreachable(format!("store returned {status}: {snippet}"))
        }
    }
}
