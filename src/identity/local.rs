use std::path::PathBuf;

use async_trait::async_trait;
use tracing::debug;

use crate::error::{RelayError, RelayResult};
use crate::identity::{parse_batch, GuestIdentity, IdentityProvider};

pub const TIER_LOCAL: &str = "local";

/// Reads the first usable candidate file. Missing, unreadable, corrupt or empty
/// candidates are skipped.
#[derive(Debug, Clone)]
pub struct LocalFileProvider {
    candidates: Vec<PathBuf>,
}

impl LocalFileProvider {
    pub fn new(candidates: Vec<PathBuf>) -> Self {
        Self { candidates }
    }
}

#[async_trait]
impl IdentityProvider for LocalFileProvider {
    fn tier(&self) -> &str {
        TIER_LOCAL
    }

    async fn load(&self) -> RelayResult<Vec<GuestIdentity>> {
        for path in &self.candidates {
            let raw = match tokio::fs::read_to_string(path).await {
                Ok(raw) => raw,
                Err(e) => {
                    debug!("identity candidate '{}' not readable: {}", path.display(), e);
                    continue;
                }
            };
            match parse_batch(&raw) {
                Ok(batch) => {
                    debug!("identity candidate '{}' used", path.display());
                    return Ok(batch);
                }
                Err(e) => debug!("identity candidate '{}' skipped: {}", path.display(), e),
            }
        }

        Err(RelayError::SourceUnavailable(format!(
            "none of {} local candidate(s) usable",
            self.candidates.len()
        )))
    }
}
