//! On-behalf-of authentication: an extension app acting as one of its users.

use std::sync::Arc;

use async_trait::async_trait;
use bdk_core::{
    ApiClient, ApiRequest, AuthSession, BdkError, Clock, SessionRefresher, SessionTokens,
    SystemClock, transport::invoke,
};
use bdk_retry::{RetryPolicy, RetryWithRecovery};

use crate::{
    credential::Credential,
    model::{AuthenticateRequest, OboAuthResponse, Token},
};

/// OBO authenticator service.
#[async_trait]
pub trait OboAuthenticator: Send + Sync {
    /// Authenticate as the user named `username`.
    ///
    /// # Errors
    /// Returns `InvalidArgument` for an empty username, without any request.
    async fn authenticate_by_username(&self, username: &str) -> Result<Arc<AuthSession>, BdkError>;

    /// Authenticate as the user identified by `user_id`.
    ///
    /// # Errors
    /// Returns `InvalidArgument` for a non-positive id, without any request.
    async fn authenticate_by_user_id(&self, user_id: i64) -> Result<Arc<AuthSession>, BdkError>;
}

/// The impersonated user.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Impersonated {
    Username(String),
    UserId(i64),
}

struct AppHandshake {
    credential: Credential,
    /// Pod login (RSA) or session auth (certificate) API.
    api: Arc<dyn ApiClient>,
    retry: RetryWithRecovery,
    clock: Arc<dyn Clock>,
}

impl AppHandshake {
    async fn app_session_token(&self) -> Result<String, BdkError> {
        let request = match &self.credential {
            Credential::Rsa { subject, signer } => {
                let token = signer.sign(subject, self.clock.now_millis())?;
                ApiRequest::post("/login/pubkey/app/authenticate")
                    .json(&AuthenticateRequest { token })?
            }
            Credential::Certificate => ApiRequest::post("/sessionauth/v1/app/authenticate"),
        };
        let token: Token = invoke(self.api.as_ref(), request).await?;
        Ok(token.token)
    }

    async fn user_session_token(
        &self,
        app_session_token: &str,
        user: &Impersonated,
    ) -> Result<String, BdkError> {
        let prefix = match self.credential {
            Credential::Rsa { .. } => "/login/pubkey/app",
            Credential::Certificate => "/sessionauth/v1/app",
        };
        let path = match user {
            Impersonated::Username(username) => {
                format!("{prefix}/username/{}/authenticate", urlencoding::encode(username))
            }
            Impersonated::UserId(user_id) => format!("{prefix}/user/{user_id}/authenticate"),
        };
        let request = ApiRequest::post(path).header("sessionToken", app_session_token);
        let response: OboAuthResponse = invoke(self.api.as_ref(), request).await?;
        Ok(response.session_token)
    }
}

/// Handshake of one impersonated user, replayed on every refresh.
struct OboHandshake {
    app: Arc<AppHandshake>,
    user: Impersonated,
}

#[async_trait]
impl SessionRefresher for OboHandshake {
    async fn authenticate(&self) -> Result<SessionTokens, BdkError> {
        let app_session_token = self
            .app
            .retry
            .execute("authenticateApp", || self.app.app_session_token())
            .await?;
        let session_token = self
            .app
            .retry
            .execute("authenticateOboUser", || {
                self.app.user_session_token(&app_session_token, &self.user)
            })
            .await?;

        tracing::debug!(user = ?self.user, "on-behalf-of session authenticated");
        Ok(SessionTokens::new(session_token, None))
    }
}

/// Authenticates an extension app, then the user it acts for.
pub struct OboAuthenticatorService {
    app: Arc<AppHandshake>,
}

impl OboAuthenticatorService {
    /// `credential` identifies the app; an RSA credential's subject is the
    /// app id. Handshake calls retry under `policy` without a session.
    #[must_use]
    pub fn new(credential: Credential, api: Arc<dyn ApiClient>, policy: Arc<RetryPolicy>) -> Self {
        Self {
            app: Arc::new(AppHandshake {
                credential,
                api,
                retry: RetryWithRecovery::new(policy),
                clock: Arc::new(SystemClock),
            }),
        }
    }

    #[must_use]
    pub fn with_clock(self, clock: Arc<dyn Clock>) -> Self {
        let app = &self.app;
        Self {
            app: Arc::new(AppHandshake {
                credential: app.credential.clone(),
                api: Arc::clone(&app.api),
                retry: app.retry.clone(),
                clock,
            }),
        }
    }

    async fn authenticate(&self, user: Impersonated) -> Result<Arc<AuthSession>, BdkError> {
        let refresher: Arc<dyn SessionRefresher> = Arc::new(OboHandshake {
            app: Arc::clone(&self.app),
            user,
        });
        Ok(Arc::new(AuthSession::authenticate(refresher).await?))
    }
}

#[async_trait]
impl OboAuthenticator for OboAuthenticatorService {
    async fn authenticate_by_username(&self, username: &str) -> Result<Arc<AuthSession>, BdkError> {
        if username.trim().is_empty() {
            return Err(BdkError::InvalidArgument(
                "username must not be empty".to_string(),
            ));
        }
        self.authenticate(Impersonated::Username(username.to_string()))
            .await
    }

    async fn authenticate_by_user_id(&self, user_id: i64) -> Result<Arc<AuthSession>, BdkError> {
        if user_id <= 0 {
            return Err(BdkError::InvalidArgument(format!(
                "user id must be positive, got {user_id}"
            )));
        }
        self.authenticate(Impersonated::UserId(user_id)).await
    }
}
