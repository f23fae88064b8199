//! One refresh cycle: identities → tokens → local cache → store + notification.

pub mod cache;
pub mod orchestrator;
pub mod result;

pub use cache::TokenBatchCache;
pub use orchestrator::RefreshOrchestrator;
pub use result::{RefreshResult, RefreshStage};
