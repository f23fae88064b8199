//! Versioned content store publishing.

use async_trait::async_trait;

use crate::error::RelayResult;
use crate::token::SignedToken;

pub mod github;

pub use github::GitHubContentsPublisher;

/// Writes a token batch to a remote store that tracks revisions.
#[async_trait]
pub trait BatchPublisher: Send + Sync {
    /// Best-effort replace of the published batch. Failures are logged and reported as `false`.
    async fn publish(&self, batch: &[SignedToken]) -> bool;

    /// The batch currently held by the store, `None` when nothing was published yet.
    async fn current(&self) -> RelayResult<Option<Vec<SignedToken>>>;
}
