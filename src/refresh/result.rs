use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::helpers::time::now_utc;

/// Cycle state machine. `Done` and `Aborted` are terminal for one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshStage {
    Idle,
    Loading,
    Forging,
    Publishing,
    Done,
    Aborted,
}

impl RefreshStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            RefreshStage::Idle => "idle",
            RefreshStage::Loading => "loading",
            RefreshStage::Forging => "forging",
            RefreshStage::Publishing => "publishing",
            RefreshStage::Done => "done",
            RefreshStage::Aborted => "aborted",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResult {
    pub token_count: usize,
    pub published: bool,
    pub notified: bool,
    /// the local token cache was rewritten
    pub persisted: bool,
    pub stage: RefreshStage,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RefreshResult {
    /// Cycle stopped at load/forge. `notified` is the outcome of the error alert.
    pub fn aborted(error: String, notified: bool) -> Self {
        Self {
            token_count: 0,
            published: false,
            notified,
            persisted: false,
            stage: RefreshStage::Aborted,
            timestamp: now_utc(),
            error: Some(error),
        }
    }

    pub fn done(token_count: usize, persisted: bool, published: bool, notified: bool, error: Option<String>) -> Self {
        Self {
            token_count,
            published,
            notified,
            persisted,
            stage: RefreshStage::Done,
            timestamp: now_utc(),
            error,
        }
    }

    /// Tokens were forged. Downstream failures are flagged separately.
    pub fn is_success(&self) -> bool {
        self.stage == RefreshStage::Done
    }

    /// Every target accepted the batch.
    pub fn is_complete(&self) -> bool {
        self.is_success() && self.persisted && self.published && self.notified
    }
}
