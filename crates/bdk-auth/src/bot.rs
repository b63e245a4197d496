//! Bot service account authentication.

use std::sync::Arc;

use async_trait::async_trait;
use bdk_core::{
    ApiClient, ApiRequest, AuthSession, BdkError, Clock, SessionRefresher, SessionTokens,
    SystemClock, transport::invoke,
};
use bdk_retry::{RetryPolicy, RetryWithRecovery};

use crate::{
    credential::Credential,
    model::{AuthenticateRequest, Token},
};

/// Bot authenticator service.
#[async_trait]
pub trait BotAuthenticator: Send + Sync {
    /// Authenticate the bot's service account.
    async fn authenticate_bot(&self) -> Result<Arc<AuthSession>, BdkError>;
}

/// Authenticates the bot against the pod and the key manager.
///
/// The returned session refreshes itself by running the same handshake.
pub struct BotAuthenticatorService {
    handshake: Arc<BotHandshake>,
}

struct BotHandshake {
    credential: Credential,
    /// Pod login (RSA) or session auth (certificate) API.
    session_api: Arc<dyn ApiClient>,
    /// Relay (RSA) or key auth (certificate) API.
    key_manager_api: Arc<dyn ApiClient>,
    retry: RetryWithRecovery,
    clock: Arc<dyn Clock>,
}

impl BotAuthenticatorService {
    /// Create an authenticator.
    ///
    /// Handshake calls retry under `policy` without a session: a rejected
    /// credential is surfaced, never refreshed.
    #[must_use]
    pub fn new(
        credential: Credential,
        session_api: Arc<dyn ApiClient>,
        key_manager_api: Arc<dyn ApiClient>,
        policy: Arc<RetryPolicy>,
    ) -> Self {
        Self {
            handshake: Arc::new(BotHandshake {
                credential,
                session_api,
                key_manager_api,
                retry: RetryWithRecovery::new(policy),
                clock: Arc::new(SystemClock),
            }),
        }
    }

    /// Replace the clock used to stamp JWTs.
    #[must_use]
    pub fn with_clock(self, clock: Arc<dyn Clock>) -> Self {
        let handshake = &self.handshake;
        Self {
            handshake: Arc::new(BotHandshake {
                credential: handshake.credential.clone(),
                session_api: Arc::clone(&handshake.session_api),
                key_manager_api: Arc::clone(&handshake.key_manager_api),
                retry: handshake.retry.clone(),
                clock,
            }),
        }
    }
}

impl BotHandshake {
    fn request(&self, rsa_path: &str, certificate_path: &str) -> Result<ApiRequest, BdkError> {
        match &self.credential {
            Credential::Rsa { subject, signer } => {
                let token = signer.sign(subject, self.clock.now_millis())?;
                ApiRequest::post(rsa_path).json(&AuthenticateRequest { token })
            }
            Credential::Certificate => Ok(ApiRequest::post(certificate_path)),
        }
    }

    async fn session_token(&self) -> Result<String, BdkError> {
        let request = self.request("/login/pubkey/authenticate", "/sessionauth/v1/authenticate")?;
        let token: Token = invoke(self.session_api.as_ref(), request).await?;
        Ok(token.token)
    }

    async fn key_manager_token(&self) -> Result<String, BdkError> {
        let request = self.request("/relay/pubkey/authenticate", "/keyauth/v1/authenticate")?;
        let token: Token = invoke(self.key_manager_api.as_ref(), request).await?;
        Ok(token.token)
    }
}

#[async_trait]
impl SessionRefresher for BotHandshake {
    async fn authenticate(&self) -> Result<SessionTokens, BdkError> {
        let session_token = self
            .retry
            .execute("authenticateBot", || self.session_token())
            .await?;
        let key_manager_token = self
            .retry
            .execute("authenticateBotKeyManager", || self.key_manager_token())
            .await?;

        tracing::debug!("bot authenticated");
        Ok(SessionTokens::new(session_token, Some(key_manager_token)))
    }
}

#[async_trait]
impl BotAuthenticator for BotAuthenticatorService {
    async fn authenticate_bot(&self) -> Result<Arc<AuthSession>, BdkError> {
        let refresher: Arc<dyn SessionRefresher> = self.handshake.clone();
        Ok(Arc::new(AuthSession::authenticate(refresher).await?))
    }
}
