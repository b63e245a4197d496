//! Core traits for credential refresh, token storage and time.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;

use crate::{BdkError, SessionTokens};

/// Capability to re-run the handshake that produced a session.
///
/// A session holds one of these instead of a reference to the authenticator
/// that created it.
#[async_trait]
pub trait SessionRefresher: Send + Sync {
    /// Perform the handshake and return a fresh token pair.
    async fn authenticate(&self) -> Result<SessionTokens, BdkError>;
}

/// Trait for extension app token storage backends.
///
/// Maps an app token to the platform token issued alongside it.
#[async_trait]
pub trait TokenRepository: Send + Sync {
    /// Store a freshly issued pair.
    async fn save(&self, app_token: &str, symphony_token: &str) -> Result<(), BdkError>;

    /// Get the platform token stored for `app_token`.
    async fn lookup(&self, app_token: &str) -> Result<Option<String>, BdkError>;
}

/// Wall clock and sleep, injectable for tests.
#[async_trait]
pub trait Clock: Send + Sync {
    /// Milliseconds since the Unix epoch.
    fn now_millis(&self) -> i64;

    /// Suspend the calling task.
    async fn sleep(&self, duration: Duration);
}

/// Clock backed by the system time and tokio timers.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

#[async_trait]
impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
            .unwrap_or(0)
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
