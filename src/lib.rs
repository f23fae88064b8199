//! # Token Relay Library
//!
//! Forges short-lived signed guest tokens on a schedule and propagates each
//! batch to a local cache, a versioned content store and a webhook channel.
//!
//! Modules:
//! - `config`: service configuration, loading and validation
//! - `identity`: tiered guest identity sourcing (local → remote → embedded)
//! - `token`: token claims and HS256 forging
//! - `refresh`: the single-flight refresh cycle and local batch cache
//! - `publish`: versioned content store publishing
//! - `notify`: webhook notifications
//! - `scheduler`: cron cadence driving refreshes
//! - `control` / `server`: HTTP control surface and metrics

pub mod config;
pub mod control;
pub mod error;
pub mod helpers;
pub mod identity;
pub mod notify;
pub mod observability;
pub mod publish;
pub mod refresh;
pub mod resilience;
pub mod scheduler;
pub mod server;
pub mod token;
pub mod utils;

#[cfg(test)]
mod tests;

pub use crate::config::service::ServiceConfig;
pub use crate::error::{RelayError, RelayResult};
