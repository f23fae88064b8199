//! Control surface consumed by the HTTP layer.
//!
//! Every call returns a [`ControlResponse`]; transport errors are turned into a
//! flag plus a readable message here and never leave this module raw.

use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info};

use crate::refresh::{RefreshOrchestrator, RefreshResult};
use crate::scheduler::{Scheduler, SchedulerState};
use crate::token::SignedToken;

const IDENTITY_SAMPLE_SIZE: usize = 3;

#[derive(Debug, Clone, Serialize)]
pub struct ControlResponse<T> {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ControlResponse<T> {
    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self { success: true, message: message.into(), data: Some(data) }
    }

    pub fn failed(message: impl Into<String>, data: Option<T>) -> Self {
        Self { success: false, message: message.into(), data }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateSummary {
    pub token_count: usize,
    pub published: bool,
    pub notified: bool,
    pub persisted: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenList {
    pub tokens: Vec<SignedToken>,
    pub count: usize,
}

impl TokenList {
    fn new(tokens: Vec<SignedToken>) -> Self {
        Self { count: tokens.len(), tokens }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IdentitySample {
    pub count: usize,
    /// ids only, credentials stay inside the process
    pub sample: Vec<String>,
}

pub struct ControlSurface {
    orchestrator: Arc<RefreshOrchestrator>,
    scheduler: Arc<Scheduler>,
}

impl ControlSurface {
    pub fn new(orchestrator: Arc<RefreshOrchestrator>, scheduler: Arc<Scheduler>) -> Self {
        Self { orchestrator, scheduler }
    }

    /// Run (or join) a refresh and summarize it.
    pub async fn generate(&self) -> ControlResponse<GenerateSummary> {
        info!("manual token generation requested");
        let result = self.scheduler.force_refresh().await;
        let summary = GenerateSummary {
            token_count: result.token_count,
            published: result.published,
            notified: result.notified,
            persisted: result.persisted,
        };
        if result.is_success() {
            ControlResponse::ok("Tokens generated successfully", summary)
        } else {
            ControlResponse::failed(
                format!("Failed to generate tokens: {}", result.error.unwrap_or_default()),
                Some(summary),
            )
        }
    }

    /// Batch held in the local token cache.
    pub async fn current_tokens(&self) -> ControlResponse<TokenList> {
        match self.orchestrator.cache().load().await {
            Ok(tokens) => ControlResponse::ok("Tokens loaded", TokenList::new(tokens)),
            Err(e) => {
                error!(error = %e, "reading local token cache failed");
                ControlResponse::failed("Failed to retrieve tokens", None)
            }
        }
    }

    pub async fn force_refresh(&self) -> ControlResponse<RefreshResult> {
        let result = self.scheduler.force_refresh().await;
        if result.is_success() {
            ControlResponse::ok("Token refresh completed", result)
        } else {
            ControlResponse::failed("Token refresh failed", Some(result))
        }
    }

    pub fn scheduler_status(&self) -> ControlResponse<SchedulerState> {
        ControlResponse::ok("Scheduler status", self.scheduler.status())
    }

    /// Batch currently held by the content store.
    pub async fn current_published_tokens(&self) -> ControlResponse<TokenList> {
        match self.orchestrator.publisher().current().await {
            Ok(Some(tokens)) => ControlResponse::ok("Published tokens loaded", TokenList::new(tokens)),
            Ok(None) => ControlResponse::ok("No published tokens", TokenList::new(Vec::new())),
            Err(e) => {
                error!(error = %e, "reading published tokens failed");
                ControlResponse::failed("Failed to retrieve published tokens", None)
            }
        }
    }

    /// Dry run of the identity tiers, without forging anything.
    pub async fn test_identities(&self) -> ControlResponse<IdentitySample> {
        match self.orchestrator.identities().load().await {
            Ok(batch) => ControlResponse::ok(
                "Guest identities loaded successfully",
                IdentitySample {
                    count: batch.len(),
                    sample: batch.iter().take(IDENTITY_SAMPLE_SIZE).map(|i| i.id.clone()).collect(),
                },
            ),
            Err(e) => {
                error!(error = %e, "identity test failed");
                ControlResponse::failed("Failed to load guest identities", None)
            }
        }
    }
}
