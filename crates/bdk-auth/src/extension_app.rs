//! Extension app authentication and token validation.

use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
};

use async_trait::async_trait;
use bdk_core::{
    ApiClient, ApiRequest, AppAuthSession, BdkError, Clock, SystemClock, TokenRepository,
    transport::invoke,
};
use bdk_retry::{RetryPolicy, RetryWithRecovery};

use crate::model::{ExtensionAppAuthenticateRequest, ExtensionAppTokens, PodCertificate};

/// Extension app authenticator service.
#[async_trait]
pub trait ExtensionAppAuthenticator: Send + Sync {
    /// Exchange `app_token` for a platform token.
    ///
    /// The pair is stored before the session is returned.
    ///
    /// # Errors
    /// Returns `Unauthorized` on 401 and `Api` on any other non-2xx status.
    async fn authenticate_extension_app(&self, app_token: &str)
    -> Result<AppAuthSession, BdkError>;

    /// Fetch the platform's public certificate.
    ///
    /// # Errors
    /// Returns `Api` on a non-2xx status once retries are spent.
    async fn get_pod_certificate(&self) -> Result<PodCertificate, BdkError>;

    /// Whether `symphony_token` is the token issued for `app_token` and
    /// its session has not expired.
    ///
    /// Never fails: unknown or expired tokens and storage errors all yield
    /// `false`.
    async fn validate_tokens(&self, app_token: &str, symphony_token: &str) -> bool;

    /// Whether the session's `expire_at` has passed.
    fn is_expired(&self, session: &AppAuthSession) -> bool;
}

/// Certificate-based extension app authenticator.
///
/// `client` must carry the app's client certificate.
pub struct ExtensionAppAuthenticatorCert {
    app_id: String,
    client: Arc<dyn ApiClient>,
    retry: RetryWithRecovery,
    repository: Arc<dyn TokenRepository>,
    /// `expireAt` of every issued app token still live.
    expirations: RwLock<HashMap<String, i64>>,
    clock: Arc<dyn Clock>,
}

impl ExtensionAppAuthenticatorCert {
    #[must_use]
    pub fn new(
        app_id: impl Into<String>,
        client: Arc<dyn ApiClient>,
        policy: Arc<RetryPolicy>,
        repository: Arc<dyn TokenRepository>,
    ) -> Self {
        Self {
            app_id: app_id.into(),
            client,
            retry: RetryWithRecovery::new(policy),
            repository,
            expirations: RwLock::new(HashMap::new()),
            clock: Arc::new(SystemClock),
        }
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    /// Remember when `app_token` expires, dropping entries already past.
    fn record_expiry(&self, app_token: &str, expire_at: i64) -> Result<(), BdkError> {
        let now = self.clock.now_millis();
        let mut expirations = self
            .expirations
            .write()
            .map_err(|e| BdkError::Storage(format!("Lock poisoned: {e}")))?;
        expirations.retain(|_, at| *at > now);
        expirations.insert(app_token.to_string(), expire_at);
        Ok(())
    }

    fn is_live(&self, app_token: &str) -> bool {
        let Ok(expirations) = self.expirations.read() else {
            tracing::warn!("expiry table poisoned, rejecting tokens");
            return false;
        };
        expirations
            .get(app_token)
            .is_some_and(|expire_at| self.clock.now_millis() < *expire_at)
    }
}

#[async_trait]
impl ExtensionAppAuthenticator for ExtensionAppAuthenticatorCert {
    async fn authenticate_extension_app(
        &self,
        app_token: &str,
    ) -> Result<AppAuthSession, BdkError> {
        let body = &ExtensionAppAuthenticateRequest {
            app_id: self.app_id.clone(),
            app_token: app_token.to_string(),
        };

        let tokens: ExtensionAppTokens = self
            .retry
            .execute("authenticateExtensionApp", move || async move {
                let request =
                    ApiRequest::post("/sessionauth/v1/authenticate/extensionApp").json(body)?;
                invoke(self.client.as_ref(), request).await
            })
            .await?;

        self.record_expiry(&tokens.app_token, tokens.expire_at)?;
        self.repository
            .save(&tokens.app_token, &tokens.symphony_token)
            .await?;

        tracing::info!(app_id = %self.app_id, expire_at = tokens.expire_at, "extension app authenticated");
        Ok(AppAuthSession::new(
            tokens.app_id.unwrap_or_else(|| self.app_id.clone()),
            tokens.app_token,
            tokens.symphony_token,
            tokens.expire_at,
        ))
    }

    async fn get_pod_certificate(&self) -> Result<PodCertificate, BdkError> {
        self.retry
            .execute("getPodCertificate", || {
                invoke(
                    self.client.as_ref(),
                    ApiRequest::get("/sessionauth/v1/app/pod/certificate"),
                )
            })
            .await
    }

    async fn validate_tokens(&self, app_token: &str, symphony_token: &str) -> bool {
        if !self.is_live(app_token) {
            return false;
        }
        match self.repository.lookup(app_token).await {
            Ok(Some(stored)) => stored == symphony_token,
            Ok(None) => false,
            Err(err) => {
                tracing::warn!(error = %err, "token lookup failed, rejecting tokens");
                false
            }
        }
    }

    fn is_expired(&self, session: &AppAuthSession) -> bool {
        session.expire_at() <= self.clock.now_millis()
    }
}
