//! Signal management on the agent.

use std::sync::Arc;

use bdk_core::{
    ApiClient, ApiRequest, AuthSession, BdkError, Clock, SessionTokens, transport::invoke,
};
use bdk_retry::{
    Page, PaginationAttribute, RetryPolicy, RetryWithRecovery, StreamPaginationAttribute,
    fetch_page, stream_all,
};
use futures::stream::BoxStream;

use crate::model::{
    BaseSignal, ChannelSubscriber, ChannelSubscriberResponse, ChannelSubscriptionResponse, Signal,
};

const SIGNALS: &str = "/v1/signals";

/// Attach the session headers the agent expects.
fn authorized(request: ApiRequest, tokens: &SessionTokens) -> ApiRequest {
    let request = request.header("sessionToken", tokens.session_token());
    match tokens.key_manager_token() {
        Some(key_manager_token) => request.header("keyManagerToken", key_manager_token),
        None => request,
    }
}

/// Path of `action` on signal `id`; the id is one encoded path segment.
fn signal_path(id: &str, action: &str) -> String {
    format!("{SIGNALS}/{}/{action}", urlencoding::encode(id))
}

fn list_request(path: String, page: PaginationAttribute) -> ApiRequest {
    ApiRequest::get(path)
        .query("skip", page.offset)
        .query("limit", page.limit)
}

/// Create, read, update, delete and subscribe to signals.
///
/// Every call runs through the retry engine with the bound session. Writes
/// are sent once: only a rejected session token makes them go out again. A
/// service built with [`SignalService::new_obo`] has no session until
/// [`obo`](Self::obo) binds one; calls made before that fail with
/// `Configuration` and send nothing.
#[derive(Clone)]
pub struct SignalService {
    client: Arc<dyn ApiClient>,
    retry: RetryWithRecovery,
}

impl SignalService {
    /// Create a service acting as the bot.
    #[must_use]
    pub fn new(
        client: Arc<dyn ApiClient>,
        session: Arc<AuthSession>,
        policy: Arc<RetryPolicy>,
    ) -> Self {
        Self {
            client,
            retry: RetryWithRecovery::new(policy).with_session(session),
        }
    }

    /// Create a service usable only through [`obo`](Self::obo).
    #[must_use]
    pub fn new_obo(client: Arc<dyn ApiClient>, policy: Arc<RetryPolicy>) -> Self {
        Self {
            client,
            retry: RetryWithRecovery::new(policy),
        }
    }

    /// Same service acting on behalf of the user owning `session`.
    #[must_use]
    pub fn obo(&self, session: Arc<AuthSession>) -> Self {
        Self {
            client: Arc::clone(&self.client),
            retry: self.retry.clone().with_session(session),
        }
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.retry = self.retry.with_clock(clock);
        self
    }

    /// List signals, one page.
    ///
    /// # Errors
    /// Returns the failure surfaced by the retry engine.
    pub async fn list_signals(
        &self,
        pagination: Option<PaginationAttribute>,
    ) -> Result<Vec<Signal>, BdkError> {
        let client = &self.client;
        fetch_page(&self.retry, "listSignals", pagination, |tokens, page| async move {
            let request = authorized(list_request(format!("{SIGNALS}/list"), page), &tokens);
            let signals: Vec<Signal> = invoke(client.as_ref(), request).await?;
            Ok(Page::from(signals))
        })
        .await
    }

    /// Stream every signal, `chunk_size` per request.
    #[must_use]
    pub fn list_all_signals(
        &self,
        pagination: StreamPaginationAttribute,
    ) -> BoxStream<'static, Result<Signal, BdkError>> {
        let client = Arc::clone(&self.client);
        stream_all(self.retry.clone(), "listAllSignals", pagination, move |tokens, page| {
            let client = Arc::clone(&client);
            async move {
                let request = authorized(list_request(format!("{SIGNALS}/list"), page), &tokens);
                let signals: Vec<Signal> = invoke(client.as_ref(), request).await?;
                Ok(Page::from(signals))
            }
        })
    }

    /// Get one signal.
    ///
    /// # Errors
    /// Returns the failure surfaced by the retry engine.
    pub async fn get_signal(&self, id: &str) -> Result<Signal, BdkError> {
        self.retry
            .execute_authenticated("getSignal", |tokens| {
                let request = authorized(ApiRequest::get(signal_path(id, "get")), &tokens);
                invoke(self.client.as_ref(), request)
            })
            .await
    }

    /// Create a signal.
    ///
    /// # Errors
    /// Returns the failure surfaced by the retry engine.
    pub async fn create_signal(&self, signal: &BaseSignal) -> Result<Signal, BdkError> {
        let client = &self.client;
        self.retry
            .execute_non_idempotent("createSignal", |tokens| async move {
                let request =
                    authorized(ApiRequest::post(format!("{SIGNALS}/create")), &tokens).json(signal)?;
                invoke(client.as_ref(), request).await
            })
            .await
    }

    /// Replace the fields of signal `id`.
    ///
    /// # Errors
    /// Returns the failure surfaced by the retry engine.
    pub async fn update_signal(&self, id: &str, signal: &BaseSignal) -> Result<Signal, BdkError> {
        let client = &self.client;
        self.retry
            .execute_non_idempotent("updateSignal", |tokens| async move {
                let request = authorized(ApiRequest::post(signal_path(id, "update")), &tokens)
                    .json(signal)?;
                invoke(client.as_ref(), request).await
            })
            .await
    }

    /// Delete signal `id`.
    ///
    /// # Errors
    /// Returns the failure surfaced by the retry engine.
    pub async fn delete_signal(&self, id: &str) -> Result<(), BdkError> {
        let client = &self.client;
        self.retry
            .execute_non_idempotent("deleteSignal", |tokens| async move {
                let request = authorized(ApiRequest::post(signal_path(id, "delete")), &tokens);
                client.send(request).await.map(drop)
            })
            .await
    }

    /// Subscribe users to signal `id`; `pushed` forces the subscription on
    /// them.
    ///
    /// # Errors
    /// Returns the failure surfaced by the retry engine.
    pub async fn subscribe_users_to_signal(
        &self,
        id: &str,
        pushed: bool,
        user_ids: &[i64],
    ) -> Result<ChannelSubscriptionResponse, BdkError> {
        let client = &self.client;
        self.retry
            .execute_non_idempotent("subscribeUsersToSignal", |tokens| async move {
                let request =
                    authorized(ApiRequest::post(signal_path(id, "subscribe")), &tokens)
                        .query("pushed", pushed)
                        .json(user_ids)?;
                invoke(client.as_ref(), request).await
            })
            .await
    }

    /// Unsubscribe users from signal `id`.
    ///
    /// # Errors
    /// Returns the failure surfaced by the retry engine.
    pub async fn unsubscribe_users_from_signal(
        &self,
        id: &str,
        user_ids: &[i64],
    ) -> Result<ChannelSubscriptionResponse, BdkError> {
        let client = &self.client;
        self.retry
            .execute_non_idempotent("unsubscribeUsersFromSignal", |tokens| async move {
                let request =
                    authorized(ApiRequest::post(signal_path(id, "unsubscribe")), &tokens)
                        .json(user_ids)?;
                invoke(client.as_ref(), request).await
            })
            .await
    }

    /// List subscribers of signal `id`, one page.
    ///
    /// # Errors
    /// Returns the failure surfaced by the retry engine.
    pub async fn list_subscribers(
        &self,
        id: &str,
        pagination: Option<PaginationAttribute>,
    ) -> Result<Vec<ChannelSubscriber>, BdkError> {
        let client = &self.client;
        fetch_page(&self.retry, "listSubscribers", pagination, |tokens, page| async move {
            fetch_subscribers(client.as_ref(), &tokens, id, page).await
        })
        .await
    }

    /// Stream every subscriber of signal `id`.
    #[must_use]
    pub fn list_all_subscribers(
        &self,
        id: &str,
        pagination: StreamPaginationAttribute,
    ) -> BoxStream<'static, Result<ChannelSubscriber, BdkError>> {
        let client = Arc::clone(&self.client);
        let id: Arc<str> = Arc::from(id);
        stream_all(self.retry.clone(), "listAllSubscribers", pagination, move |tokens, page| {
            let client = Arc::clone(&client);
            let id = Arc::clone(&id);
            async move { fetch_subscribers(client.as_ref(), &tokens, &id, page).await }
        })
    }
}

async fn fetch_subscribers(
    client: &dyn ApiClient,
    tokens: &SessionTokens,
    id: &str,
    page: PaginationAttribute,
) -> Result<Page<ChannelSubscriber>, BdkError> {
    let request = authorized(list_request(signal_path(id, "subscribers"), page), tokens);
    let response: ChannelSubscriberResponse = invoke(client, request).await?;
    Ok(Page::new(response.data, Some(response.has_more)))
}

impl std::fmt::Debug for SignalService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignalService")
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}
