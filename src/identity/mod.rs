//! Identity sourcing.
//!
//! An [`IdentitySource`] is an ordered list of [`IdentityProvider`] tiers. The first tier that
//! yields a non-empty batch wins; the source only fails when every tier failed.
//!
//! Default wiring (see [`IdentitySource::from_config`]):
//! - `local`: candidate files on disk, tried in order
//! - `remote`: a JSON document over HTTP, written back to the primary local candidate
//! - `embedded`: a dataset compiled into the binary, never fails

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::service::IdentitiesConfig;
use crate::error::{RelayError, RelayResult};
use crate::observability::metrics::{get_metrics, OUTCOME_FAILED, OUTCOME_OK};

pub mod embedded;
pub mod local;
pub mod remote;

use embedded::EmbeddedProvider;
use local::LocalFileProvider;
use remote::RemoteProvider;

/// A guest account record. Never mutated after loading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuestIdentity {
    #[serde(alias = "uid")]
    pub id: String,
    #[serde(alias = "password")]
    pub credential: String,
}

impl GuestIdentity {
    pub fn new(id: impl Into<String>, credential: impl Into<String>) -> Self {
        Self { id: id.into(), credential: credential.into() }
    }

    /// `id` as the integer bound into `external_uid`.
    pub fn external_uid(&self) -> RelayResult<i64> {
        self.id.trim().parse::<i64>().map_err(|e| RelayError::MalformedIdentity {
            id: self.id.clone(),
            reason: e.to_string(),
        })
    }
}

/// One sourcing tier.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    fn tier(&self) -> &str;

    async fn load(&self) -> RelayResult<Vec<GuestIdentity>>;
}

/// Parse an identity document. Empty arrays count as "no data".
pub fn parse_batch(raw: &str) -> RelayResult<Vec<GuestIdentity>> {
    let batch: Vec<GuestIdentity> = serde_json::from_str(raw)
        .map_err(|e| RelayError::SourceUnavailable(format!("unparseable identity document: {e}")))?;
    if batch.is_empty() {
        return Err(RelayError::SourceUnavailable("identity document is empty".to_string()));
    }
    Ok(batch)
}

#[derive(Clone)]
pub struct IdentitySource {
    providers: Vec<Arc<dyn IdentityProvider>>,
}

impl IdentitySource {
    pub fn new(providers: Vec<Arc<dyn IdentityProvider>>) -> Self {
        Self { providers }
    }

    /// local candidates → remote (if configured) → embedded
    pub fn from_config(cfg: &IdentitiesConfig, client: &Client) -> Self {
        let paths: Vec<PathBuf> = cfg.local_paths.iter().map(PathBuf::from).collect();
        let mut providers: Vec<Arc<dyn IdentityProvider>> =
            vec![Arc::new(LocalFileProvider::new(paths.clone()))];

        if let Some(url) = &cfg.remote_url {
            providers.push(Arc::new(RemoteProvider::new(
                client.clone(),
                url.to_owned(),
                Duration::from_millis(cfg.remote_timeout_ms),
                paths.first().cloned(),
            )));
        }
        providers.push(Arc::new(EmbeddedProvider::new()));

        Self::new(providers)
    }

    pub fn tiers(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.tier()).collect()
    }

    pub async fn load(&self) -> RelayResult<Vec<GuestIdentity>> {
        let metrics = get_metrics().await;
        let mut failures = Vec::with_capacity(self.providers.len());

        for provider in &self.providers {
            match provider.load().await {
                Ok(batch) => {
                    metrics.identity_loads.with_label_values(&[provider.tier(), OUTCOME_OK]).inc();
                    info!(tier = provider.tier(), count = batch.len(), "identities loaded");
                    return Ok(batch);
                }
                Err(e) => {
                    metrics.identity_loads.with_label_values(&[provider.tier(), OUTCOME_FAILED]).inc();
                    warn!(tier = provider.tier(), error = %e, "identity tier failed, trying next");
                    failures.push(format!("{}: {}", provider.tier(), e));
                }
            }
        }

        Err(RelayError::SourceUnavailable(if failures.is_empty() {
            "no identity tiers configured".to_string()
        } else {
            failures.join("; ")
        }))
    }
}
