//! Bot authentication against mock pod and key manager servers.

use std::{sync::Arc, time::Duration};

use bdk_auth::{BotAuthenticator, BotAuthenticatorService, Credential};
use bdk_core::RetryConfig;
use bdk_http::ReqwestApiClient;
use bdk_retry::RetryPolicy;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{method, path},
};

fn client(server: &MockServer) -> Arc<ReqwestApiClient> {
    Arc::new(ReqwestApiClient::new(server.uri(), Duration::from_secs(5)).unwrap())
}

fn policy() -> Arc<RetryPolicy> {
    Arc::new(RetryPolicy::new(
        RetryConfig::new()
            .with_max_attempts(3)
            .with_initial_interval(Duration::from_millis(1)),
    ))
}

#[tokio::test]
async fn test_certificate_bot_session_and_refresh() {
    let session_auth = MockServer::start().await;
    let key_auth = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/sessionauth/v1/authenticate"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({ "name": "sessionToken", "token": "SESSION" })),
        )
        .expect(2)
        .mount(&session_auth)
        .await;
    Mock::given(method("POST"))
        .and(path("/keyauth/v1/authenticate"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({ "name": "keyManagerToken", "token": "KM" })),
        )
        .expect(2)
        .mount(&key_auth)
        .await;

    let authenticator = BotAuthenticatorService::new(
        Credential::Certificate,
        client(&session_auth),
        client(&key_auth),
        policy(),
    );

    let session = authenticator.authenticate_bot().await.unwrap();
    assert_eq!(session.session_token(), "SESSION");
    assert_eq!(session.key_manager_token().as_deref(), Some("KM"));

    session.refresh().await.unwrap();
    assert_eq!(session.tokens().generation(), 1);
}

#[tokio::test]
async fn test_bot_session_recovers_from_server_error() {
    let session_auth = MockServer::start().await;
    let key_auth = MockServer::start().await;

    Mock::given(path("/sessionauth/v1/authenticate"))
        .respond_with(ResponseTemplate::new(502))
        .up_to_n_times(1)
        .mount(&session_auth)
        .await;
    Mock::given(path("/sessionauth/v1/authenticate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "token": "S" })))
        .mount(&session_auth)
        .await;
    Mock::given(path("/keyauth/v1/authenticate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "token": "K" })))
        .mount(&key_auth)
        .await;

    let authenticator = BotAuthenticatorService::new(
        Credential::Certificate,
        client(&session_auth),
        client(&key_auth),
        policy(),
    );

    let session = authenticator.authenticate_bot().await.unwrap();
    assert_eq!(session.session_token(), "S");
}

#[tokio::test]
async fn test_bot_unauthorized_fails_once() {
    let session_auth = MockServer::start().await;
    let key_auth = MockServer::start().await;

    Mock::given(path("/sessionauth/v1/authenticate"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&session_auth)
        .await;
    Mock::given(path("/keyauth/v1/authenticate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "token": "K" })))
        .expect(0)
        .mount(&key_auth)
        .await;

    let authenticator = BotAuthenticatorService::new(
        Credential::Certificate,
        client(&session_auth),
        client(&key_auth),
        policy(),
    );

    let err = authenticator.authenticate_bot().await.unwrap_err();
    assert!(err.is_unauthorized());
}
