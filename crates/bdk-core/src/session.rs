//! Live authentication sessions.

use std::sync::{Arc, PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::{BdkError, SessionRefresher};

/// One consistent pair of tokens.
///
/// `generation` increases by one each time the owning session is refreshed;
/// callers hand it back to [`AuthSession::refresh_after`] so that concurrent
/// failures observed on the same pair trigger a single handshake.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionTokens {
    session_token: String,
    key_manager_token: Option<String>,
    generation: u64,
}

impl SessionTokens {
    /// Create a token pair. OBO sessions have no key manager token.
    #[must_use]
    pub fn new(session_token: impl Into<String>, key_manager_token: Option<String>) -> Self {
        Self {
            session_token: session_token.into(),
            key_manager_token,
            generation: 0,
        }
    }

    #[must_use]
    pub fn session_token(&self) -> &str {
        &self.session_token
    }

    #[must_use]
    pub fn key_manager_token(&self) -> Option<&str> {
        self.key_manager_token.as_deref()
    }

    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }
}

impl std::fmt::Debug for SessionTokens {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionTokens")
            .field("session_token", &"<redacted>")
            .field("has_key_manager_token", &self.key_manager_token.is_some())
            .field("generation", &self.generation)
            .finish()
    }
}

/// Credentials of one authenticated identity (bot or impersonated user).
///
/// Tokens are swapped as a unit, so readers always see a consistent pair.
/// Refreshes are serialized: at most one handshake runs at a time and
/// callers that lost the race reuse its result.
pub struct AuthSession {
    tokens: RwLock<Arc<SessionTokens>>,
    refresh_gate: Mutex<()>,
    refresher: Arc<dyn SessionRefresher>,
}

impl AuthSession {
    /// Wrap tokens produced by `refresher`.
    #[must_use]
    pub fn new(tokens: SessionTokens, refresher: Arc<dyn SessionRefresher>) -> Self {
        Self {
            tokens: RwLock::new(Arc::new(SessionTokens {
                generation: 0,
                ..tokens
            })),
            refresh_gate: Mutex::new(()),
            refresher,
        }
    }

    /// Run the handshake once and wrap the result.
    ///
    /// # Errors
    /// Returns the handshake failure.
    pub async fn authenticate(refresher: Arc<dyn SessionRefresher>) -> Result<Self, BdkError> {
        let tokens = refresher.authenticate().await?;
        Ok(Self::new(tokens, refresher))
    }

    /// Snapshot of the current token pair.
    #[must_use]
    pub fn tokens(&self) -> Arc<SessionTokens> {
        // The guarded value is replaced in a single assignment, so a poisoned
        // lock still holds a consistent pair.
        Arc::clone(&*self.tokens.read().unwrap_or_else(PoisonError::into_inner))
    }

    #[must_use]
    pub fn session_token(&self) -> String {
        self.tokens().session_token.clone()
    }

    #[must_use]
    pub fn key_manager_token(&self) -> Option<String> {
        self.tokens().key_manager_token.clone()
    }

    /// Re-run the handshake and replace both tokens.
    ///
    /// A call that arrives while another refresh is in flight waits for it
    /// and returns without starting a second handshake.
    ///
    /// # Errors
    /// Returns the handshake failure; the previous tokens stay in place.
    pub async fn refresh(&self) -> Result<(), BdkError> {
        let seen = self.tokens().generation;
        self.refresh_after(seen).await
    }

    /// Refresh unless the tokens have moved past `seen_generation`.
    ///
    /// # Errors
    /// Returns the handshake failure; the previous tokens stay in place.
    pub async fn refresh_after(&self, seen_generation: u64) -> Result<(), BdkError> {
        let _guard = self.refresh_gate.lock().await;

        if self.tokens().generation != seen_generation {
            tracing::debug!(
                generation = seen_generation,
                "session already refreshed by a concurrent caller"
            );
            return Ok(());
        }

        tracing::debug!(generation = seen_generation, "refreshing session");
        let fresh = self.refresher.authenticate().await?;
        let generation = seen_generation + 1;

        *self.tokens.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(SessionTokens {
            generation,
            ..fresh
        });

        tracing::info!(generation, "session refreshed");
        Ok(())
    }
}

impl std::fmt::Debug for AuthSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthSession")
            .field("tokens", &self.tokens())
            .finish_non_exhaustive()
    }
}

/// Session of an extension application.
///
/// Immutable: a new handshake produces a new session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppAuthSession {
    app_id: String,
    app_token: String,
    symphony_token: String,
    /// Epoch milliseconds.
    expire_at: i64,
}

impl AppAuthSession {
    #[must_use]
    pub fn new(
        app_id: impl Into<String>,
        app_token: impl Into<String>,
        symphony_token: impl Into<String>,
        expire_at: i64,
    ) -> Self {
        Self {
            app_id: app_id.into(),
            app_token: app_token.into(),
            symphony_token: symphony_token.into(),
            expire_at,
        }
    }

    #[must_use]
    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    #[must_use]
    pub fn app_token(&self) -> &str {
        &self.app_token
    }

    #[must_use]
    pub fn symphony_token(&self) -> &str {
        &self.symphony_token
    }

    /// Expiry instant in epoch milliseconds.
    #[must_use]
    pub const fn expire_at(&self) -> i64 {
        self.expire_at
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;

    struct CountingRefresher {
        calls: AtomicU32,
        fail: bool,
    }

    impl CountingRefresher {
        fn new(fail: bool) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicU32::new(0),
                fail,
            })
        }
    }

    #[async_trait]
    impl SessionRefresher for CountingRefresher {
        async fn authenticate(&self) -> Result<SessionTokens, BdkError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            tokio::time::sleep(Duration::from_millis(20)).await;
            if self.fail {
                return Err(BdkError::Unauthorized("rejected".to_string()));
            }
            Ok(SessionTokens::new(format!("session-{n}"), Some(format!("km-{n}"))))
        }
    }

    #[tokio::test]
    async fn test_authenticate_and_refresh() {
        let refresher = CountingRefresher::new(false);
        let session = AuthSession::authenticate(refresher.clone()).await.unwrap();
        assert_eq!(session.session_token(), "session-1");
        assert_eq!(session.key_manager_token().as_deref(), Some("km-1"));

        session.refresh().await.unwrap();
        let tokens = session.tokens();
        assert_eq!(tokens.session_token(), "session-2");
        assert_eq!(tokens.key_manager_token(), Some("km-2"));
        assert_eq!(tokens.generation(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_refresh_runs_one_handshake() {
        let refresher = CountingRefresher::new(false);
        let session = AuthSession::authenticate(refresher.clone()).await.unwrap();

        let (a, b) = tokio::join!(session.refresh(), session.refresh());
        a.unwrap();
        b.unwrap();

        // One call for the initial handshake, one for the shared refresh
        assert_eq!(refresher.calls.load(Ordering::SeqCst), 2);
        assert_eq!(session.tokens().generation(), 1);
    }

    #[tokio::test]
    async fn test_stale_generation_skips_handshake() {
        let refresher = CountingRefresher::new(false);
        let session = AuthSession::authenticate(refresher.clone()).await.unwrap();
        session.refresh().await.unwrap();

        session.refresh_after(0).await.unwrap();
        assert_eq!(refresher.calls.load(Ordering::SeqCst), 2);
        assert_eq!(session.session_token(), "session-2");
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_tokens() {
        let refresher = CountingRefresher::new(true);
        let session = AuthSession::new(
            SessionTokens::new("old", Some("old-km".to_string())),
            refresher.clone(),
        );

        let err = session.refresh().await.unwrap_err();
        assert!(err.is_unauthorized());
        assert_eq!(session.session_token(), "old");
        assert_eq!(session.tokens().generation(), 0);
    }

    #[test]
    fn test_debug_redacts_tokens() {
        let tokens = SessionTokens::new("secret", None);
        assert!(!format!("{tokens:?}").contains("secret"));
    }

    #[test]
    fn test_app_session_serde() {
        let session: AppAuthSession = serde_json::from_str(
            r#"{"appId":"appId","appToken":"APP","symphonyToken":"SYM","expireAt":1539636528288}"#,
        )
        .unwrap();
        assert_eq!(session.app_token(), "APP");
        assert_eq!(session.symphony_token(), "SYM");
        assert_eq!(session.expire_at(), 1_539_636_528_288);
    }
}
