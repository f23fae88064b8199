use std::time::Duration;

use async_trait::async_trait;
use http::StatusCode;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder};
use serde_json::{json, Value};
use tracing::{error, info, warn};

use crate::config::service::NotifyConfig;
use crate::error::{RelayError, RelayResult};
use crate::helpers::time::{date_stamp, now_utc};
use crate::notify::Notifier;
use crate::observability::metrics::{get_metrics, OUTCOME_FAILED, OUTCOME_OK};
use crate::resilience::retry::RetrySettings;
use crate::token::SignedToken;

const COLOR_OK: u32 = 0x00ff00;
const COLOR_ERROR: u32 = 0xff0000;
const FOOTER: &str = "Token Relay";
const KIND_BATCH: &str = "batch";
const KIND_ERROR: &str = "error";

/// Discord-style webhook. Success is `204 No Content`.
#[derive(Debug, Clone)]
pub struct DiscordWebhook {
    client: Client,
    webhook_url: String,
    timeout: Duration,
    cadence_description: String,
    retry: RetrySettings,
}

impl DiscordWebhook {
    pub fn new(client: Client, cfg: &NotifyConfig, cadence_description: String) -> Self {
        Self {
            client,
            webhook_url: cfg.webhook_url.to_owned(),
            timeout: Duration::from_millis(cfg.timeout_ms),
            cadence_description,
            retry: RetrySettings::from(cfg.retry.as_ref()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        !self.webhook_url.is_empty()
    }

    fn batch_payload(&self, count: usize, generated_at: &str) -> Value {
        json!({
            "content": format!(
                "**Token file attached**\n\nGenerated {count} tokens. Check the attached file for the complete token list."
            ),
            "embeds": [{
                "title": "Tokens Generated",
                "description": format!("Successfully generated {count} tokens"),
                "color": COLOR_OK,
                "fields": [
                    { "name": "Token Count", "value": count.to_string(), "inline": true },
                    { "name": "Generated At", "value": generated_at, "inline": true },
                    { "name": "Refresh Interval", "value": self.cadence_description, "inline": true },
                ],
                "timestamp": generated_at,
                "footer": { "text": FOOTER },
            }],
        })
    }

    fn error_payload(message: &str) -> Value {
        json!({
            "embeds": [{
                "title": "Token Generation Error",
                "description": message,
                "color": COLOR_ERROR,
                "timestamp": now_utc().to_rfc3339(),
                "footer": { "text": FOOTER },
            }],
        })
    }

    /// Send with the configured retry policy. `build` is called once per attempt
    /// since multipart bodies cannot be replayed.
    async fn deliver<B>(&self, kind: &str, build: B) -> bool
    where
        B: Fn() -> RelayResult<RequestBuilder>,
    {
        if !self.is_enabled() {
            warn!("webhook url not configured, skipping {} notification", kind);
            return false;
        }
        let metrics = get_metrics().await;

        let result = self
            .retry
            .run_with_retry(
                || {
                    let request = build();
                    async move {
                        let response = request?
                            .send()
                            .await
                            .map_err(|e| RelayError::NotifyUnreachable(e.to_string()))?;
                        match response.status() {
                            StatusCode::NO_CONTENT => Ok(()),
                            status => {
                                let body = response.text().await.unwrap_or_default();
                                Err(RelayError::NotifyUnreachable(format!(
                                    "webhook returned {status}: {}",
                                    body.chars().take(200).collect::<String>()
                                )))
                            }
                        }
                    }
                },
                |e| matches!(e, RelayError::NotifyUnreachable(_)),
            )
            .await;

        match result {
            Ok(()) => {
                metrics.notifications.with_label_values(&[kind, OUTCOME_OK]).inc();
                info!("{} notification delivered", kind);
                true
            }
            Err(e) => {
                metrics.notifications.with_label_values(&[kind, OUTCOME_FAILED]).inc();
                error!(error = %e, "{} notification failed", kind);
                false
            }
        }
    }
}

#[async_trait]
impl Notifier for DiscordWebhook {
    async fn notify_batch(&self, batch: &[SignedToken]) -> bool {
        let now = now_utc();
        let generated_at = now.to_rfc3339();
        let file_name = format!("tokens_{}.json", date_stamp(&now));
        let attachment = match serde_json::to_vec_pretty(batch) {
            Ok(bytes) => bytes,
            Err(e) => {
                error!("cannot serialize token batch: {}", e);
                return false;
            }
        };
        let payload = self.batch_payload(batch.len(), &generated_at).to_string();
        info!(count = batch.len(), bytes = attachment.len(), file = %file_name, "sending batch notification");

        self.deliver(KIND_BATCH, || {
            let file = Part::bytes(attachment.clone())
                .file_name(file_name.clone())
                .mime_str("application/json")
                .map_err(|e| RelayError::NotifyUnreachable(e.to_string()))?;
            let form = Form::new().text("payload_json", payload.clone()).part("file", file);
            Ok(self.client.post(&self.webhook_url).timeout(self.timeout).multipart(form))
        })
        .await
    }

    async fn notify_error(&self, message: &str) -> bool {
        let payload = Self::error_payload(message);
        self.deliver(KIND_ERROR, || {
            Ok(self.client.post(&self.webhook_url).timeout(self.timeout).json(&payload))
        })
        .await
    }
}
