//! `ApiClient` over reqwest.

use std::{path::Path, time::Duration};

use async_trait::async_trait;
use bdk_core::{ApiClient, ApiRequest, ApiResponse, BdkError, HttpMethod};
use tracing::{debug, warn};

/// HTTP client bound to one service base URL.
#[derive(Clone)]
pub struct ReqwestApiClient {
    http_client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl ReqwestApiClient {
    /// Create a client without client identity.
    ///
    /// # Errors
    /// Returns `Configuration` if the TLS backend cannot be initialized.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, BdkError> {
        Self::build(base_url.into(), timeout, None)
    }

    /// Create a client presenting the certificate and key in `pem`.
    ///
    /// # Errors
    /// Returns `Configuration` if the bundle is not a valid PEM identity.
    pub fn with_identity_pem(
        base_url: impl Into<String>,
        timeout: Duration,
        pem: &[u8],
    ) -> Result<Self, BdkError> {
        let identity = reqwest::Identity::from_pem(pem)
            .map_err(|e| BdkError::Configuration(format!("invalid client certificate: {e}")))?;
        Self::build(base_url.into(), timeout, Some(identity))
    }

    /// Create a client presenting the PEM bundle stored at `path`.
    ///
    /// # Errors
    /// Returns `Configuration` if the file cannot be read or parsed.
    pub fn with_identity_file(
        base_url: impl Into<String>,
        timeout: Duration,
        path: impl AsRef<Path>,
    ) -> Result<Self, BdkError> {
        let path = path.as_ref();
        let pem = std::fs::read(path).map_err(|e| {
            BdkError::Configuration(format!("failed to read {}: {e}", path.display()))
        })?;
        Self::with_identity_pem(base_url, timeout, &pem)
    }

    fn build(
        base_url: String,
        timeout: Duration,
        identity: Option<reqwest::Identity>,
    ) -> Result<Self, BdkError> {
        let mut builder = reqwest::Client::builder().timeout(timeout);
        if let Some(identity) = identity {
            builder = builder.identity(identity);
        }
        let http_client = builder
            .build()
            .map_err(|e| BdkError::Configuration(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
        })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn map_send_error(&self, err: &reqwest::Error) -> BdkError {
        if err.is_timeout() {
            BdkError::Timeout(self.timeout)
        } else {
            BdkError::Transport(err.to_string())
        }
    }
}

#[async_trait]
impl ApiClient for ReqwestApiClient {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, BdkError> {
        let url = self.url(&request.path);
        let mut builder = match request.method {
            HttpMethod::Get => self.http_client.get(&url),
            HttpMethod::Post => self.http_client.post(&url),
        };
        builder = builder.header("Accept", "application/json");
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        debug!(method = ?request.method, path = %request.path, "sending request");
        let response = builder.send().await.map_err(|e| self.map_send_error(&e))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| self.map_send_error(&e))?;

        if !(200..300).contains(&status) {
            warn!(path = %request.path, status, "request failed");
            return Err(BdkError::from_status(status, body));
        }

        Ok(ApiResponse { status, body })
    }
}

impl std::fmt::Debug for ReqwestApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReqwestApiClient")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use bdk_core::FailureKind;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{body_json, header, method, path, query_param},
    };

    use super::*;

    fn client(server: &MockServer) -> ReqwestApiClient {
        ReqwestApiClient::new(server.uri(), Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_trailing_slash_is_trimmed() {
        let client = ReqwestApiClient::new("https://acme.example.com/", Duration::from_secs(1))
            .unwrap();
        assert_eq!(client.url("/v1/x"), "https://acme.example.com/v1/x");
    }

    #[tokio::test]
    async fn test_get_with_headers_and_query() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/signals/list"))
            .and(header("sessionToken", "S"))
            .and(query_param("limit", "10"))
            .respond_with(ResponseTemplate::new(200).set_body_string("[]"))
            .expect(1)
            .mount(&server)
            .await;

        let response = client(&server)
            .send(
                ApiRequest::get("/v1/signals/list")
                    .header("sessionToken", "S")
                    .query("limit", 10),
            )
            .await
            .unwrap();

        assert_eq!(response.status, 200);
        assert_eq!(response.body, "[]");
    }

    #[tokio::test]
    async fn test_post_json_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/create"))
            .and(body_json(serde_json::json!({ "name": "n" })))
            .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
            .expect(1)
            .mount(&server)
            .await;

        client(&server)
            .send(
                ApiRequest::post("/create")
                    .json(&serde_json::json!({ "name": "n" }))
                    .unwrap(),
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_status_classification() {
        let server = MockServer::start().await;
        Mock::given(path("/unauthorized"))
            .respond_with(ResponseTemplate::new(401).set_body_string("expired"))
            .mount(&server)
            .await;
        Mock::given(path("/bad"))
            .respond_with(ResponseTemplate::new(400))
            .mount(&server)
            .await;
        Mock::given(path("/down"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let client = client(&server);

        let err = client.send(ApiRequest::get("/unauthorized")).await.unwrap_err();
        assert!(matches!(err, BdkError::Unauthorized(ref body) if body == "expired"));

        let err = client.send(ApiRequest::get("/bad")).await.unwrap_err();
        assert_eq!(err.status(), Some(400));
        assert_eq!(err.kind(), FailureKind::ClientRequest);

        let err = client.send(ApiRequest::get("/down")).await.unwrap_err();
        assert_eq!(err.kind(), FailureKind::Transient);
    }

    #[tokio::test]
    async fn test_timeout_is_transient() {
        let server = MockServer::start().await;
        Mock::given(path("/slow"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
            .mount(&server)
            .await;

        let client = ReqwestApiClient::new(server.uri(), Duration::from_millis(50)).unwrap();
        let err = client.send(ApiRequest::get("/slow")).await.unwrap_err();

        assert!(matches!(err, BdkError::Timeout(_)));
        assert_eq!(err.kind(), FailureKind::Transient);
    }

    #[tokio::test]
    async fn test_connection_refused_is_transport_error() {
        let client = ReqwestApiClient::new("http://127.0.0.1:1", Duration::from_secs(1)).unwrap();
        let err = client.send(ApiRequest::get("/")).await.unwrap_err();

        assert!(matches!(err, BdkError::Transport(_)));
    }

    #[test]
    fn test_invalid_identity_is_configuration_error() {
        let err =
            ReqwestApiClient::with_identity_pem("https://a", Duration::from_secs(1), b"nope")
                .unwrap_err();
        assert!(matches!(err, BdkError::Configuration(_)));
    }
}
