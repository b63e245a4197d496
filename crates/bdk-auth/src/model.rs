//! Wire payloads of the authentication endpoints.

use serde::{Deserialize, Serialize};

/// Body of the RSA authentication endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct AuthenticateRequest {
    /// Signed JWT.
    pub token: String,
}

/// Token returned by bot and app authentication endpoints.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Token {
    pub token: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// Answer of the OBO user authentication endpoints.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OboAuthResponse {
    pub session_token: String,
}

/// Body of the extension app authentication endpoint.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtensionAppAuthenticateRequest {
    pub app_id: String,
    pub app_token: String,
}

/// Answer of the extension app authentication endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtensionAppTokens {
    #[serde(default)]
    pub app_id: Option<String>,
    pub app_token: String,
    pub symphony_token: String,
    /// Epoch milliseconds.
    pub expire_at: i64,
}

/// The platform's public certificate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PodCertificate {
    /// PEM content.
    pub certificate: String,
}
