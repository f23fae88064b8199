//! Best-effort notifications about refresh outcomes.

use async_trait::async_trait;

use crate::token::SignedToken;

pub mod discord;

pub use discord::DiscordWebhook;

#[async_trait]
pub trait Notifier: Send + Sync {
    /// Announce a fresh batch with the batch attached as a file.
    async fn notify_batch(&self, batch: &[SignedToken]) -> bool;

    /// Lightweight failure alert, no attachment.
    async fn notify_error(&self, message: &str) -> bool;
}
