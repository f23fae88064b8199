use async_trait::async_trait;
use tracing::info;

use crate::error::RelayResult;
use crate::identity::{GuestIdentity, IdentityProvider};

pub const TIER_EMBEDDED: &str = "embedded";

const FALLBACK_IDENTITIES: &str = include_str!("fallback_identities.json");

/// Last-resort tier backed by the dataset bundled at build time.
#[derive(Debug, Clone)]
pub struct EmbeddedProvider {
    batch: Vec<GuestIdentity>,
}

impl EmbeddedProvider {
    pub fn new() -> Self {
        Self::with_batch(bundled())
    }

    pub fn with_batch(batch: Vec<GuestIdentity>) -> Self {
        Self { batch }
    }
}

impl Default for EmbeddedProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IdentityProvider for EmbeddedProvider {
    fn tier(&self) -> &str {
        TIER_EMBEDDED
    }

    async fn load(&self) -> RelayResult<Vec<GuestIdentity>> {
        info!("using {} embedded fallback identities", self.batch.len());
        Ok(self.batch.clone())
    }
}

/// The bundled dataset. The file is checked in and covered by tests, so a parse
/// failure can only come from editing it.
pub fn bundled() -> Vec<GuestIdentity> {
    serde_json::from_str(FALLBACK_IDENTITIES).unwrap_or_default()
}
