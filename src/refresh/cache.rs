use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::{RelayError, RelayResult};
use crate::token::SignedToken;

/// The last forged batch on local disk. Written only from inside a refresh cycle.
#[derive(Debug, Clone)]
pub struct TokenBatchCache {
    path: PathBuf,
}

impl TokenBatchCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replace the cached batch: write a temp file next to the target, then rename over it.
    pub async fn store(&self, batch: &[SignedToken]) -> RelayResult<()> {
        let json = serde_json::to_string_pretty(batch).map_err(|e| RelayError::CacheIo(e.to_string()))?;
        let io_err = |e: std::io::Error| RelayError::CacheIo(format!("{}: {}", self.path.display(), e));

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
        }
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, json).await.map_err(io_err)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tokio::fs::set_permissions(&tmp, std::fs::Permissions::from_mode(0o600))
                .await
                .map_err(io_err)?;
        }
        tokio::fs::rename(&tmp, &self.path).await.map_err(io_err)?;

        info!("token batch ({}) written to '{}'", batch.len(), self.path.display());
        Ok(())
    }

    /// Cached batch; empty when nothing was written yet.
    pub async fn load(&self) -> RelayResult<Vec<SignedToken>> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => serde_json::from_str(&raw)
                .map_err(|e| RelayError::CacheIo(format!("{}: {}", self.path.display(), e))),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(RelayError::CacheIo(format!("{}: {}", self.path.display(), e))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn store_replaces_previous_batch_atomically() {
        let dir = tempfile::tempdir().unwrap();
        let cache = TokenBatchCache::new(dir.path().join("nested/tokens.json"));

        assert!(cache.load().await.unwrap().is_empty());

        cache.store(&[SignedToken::new("a".into()), SignedToken::new("b".into())]).await.unwrap();
        cache.store(&[SignedToken::new("c".into())]).await.unwrap();

        assert_eq!(cache.load().await.unwrap(), vec![SignedToken::new("c".into())]);
        assert!(!cache.path().with_extension("tmp").exists());

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(cache.path()).unwrap().permissions().mode() & 0o777;
            assert_eq!(mode, 0o600, "permissions mismatch (expected 0600)");
        }
    }
}
