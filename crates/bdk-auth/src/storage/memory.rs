//! In-memory token repository.

use std::{num::NonZeroUsize, sync::RwLock};

use async_trait::async_trait;
use bdk_core::{BdkError, TokenRepository};
use lru::LruCache;

/// Default number of retained token pairs.
pub const DEFAULT_CAPACITY: usize = 10_000;

/// In-memory token repository.
///
/// Useful for single-process deployments. Holds at most `capacity` pairs and
/// evicts the oldest insertion first; lookups do not change the order, so
/// they only need a read lock. Data is lost on restart.
pub struct InMemoryTokensRepository {
    tokens: RwLock<LruCache<String, String>>,
}

impl InMemoryTokensRepository {
    /// Create a repository with [`DEFAULT_CAPACITY`].
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(NonZeroUsize::new(DEFAULT_CAPACITY).unwrap_or(NonZeroUsize::MIN))
    }

    /// Create a repository holding at most `capacity` pairs.
    #[must_use]
    pub fn with_capacity(capacity: NonZeroUsize) -> Self {
        Self {
            tokens: RwLock::new(LruCache::new(capacity)),
        }
    }

    /// Number of stored pairs.
    ///
    /// # Errors
    /// Returns error if the lock is poisoned.
    pub fn len(&self) -> Result<usize, BdkError> {
        Ok(self
            .tokens
            .read()
            .map_err(|e| BdkError::Storage(e.to_string()))?
            .len())
    }

    /// Whether the repository holds no pair.
    ///
    /// # Errors
    /// Returns error if the lock is poisoned.
    pub fn is_empty(&self) -> Result<bool, BdkError> {
        Ok(self.len()? == 0)
    }
}

impl Default for InMemoryTokensRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TokenRepository for InMemoryTokensRepository {
    async fn save(&self, app_token: &str, symphony_token: &str) -> Result<(), BdkError> {
        let evicted = self
            .tokens
            .write()
            .map_err(|e| BdkError::Storage(e.to_string()))?
            .push(app_token.to_string(), symphony_token.to_string());

        if let Some((evicted_app_token, _)) = evicted {
            if evicted_app_token != app_token {
                tracing::debug!("token repository full, evicted oldest pair");
            }
        }

        Ok(())
    }

    async fn lookup(&self, app_token: &str) -> Result<Option<String>, BdkError> {
        Ok(self
            .tokens
            .read()
            .map_err(|e| BdkError::Storage(e.to_string()))?
            .peek(app_token)
            .cloned())
    }
}
