//! How an identity proves itself during a handshake.

use std::path::Path;

use bdk_core::BdkError;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::Serialize;

/// Lifetime of a signed authentication JWT, in milliseconds.
const JWT_LIFETIME_MS: i64 = 5 * 60 * 1000;

#[derive(Serialize)]
struct Claims<'a> {
    sub: &'a str,
    /// Epoch seconds.
    exp: i64,
}

/// Signs short-lived RS512 authentication JWTs.
#[derive(Clone)]
pub struct JwtSigner {
    key: EncodingKey,
}

impl JwtSigner {
    /// Load a PEM-encoded RSA private key (PKCS#1 or PKCS#8).
    ///
    /// # Errors
    /// Returns `Configuration` if the key cannot be parsed.
    pub fn from_pem(pem: &[u8]) -> Result<Self, BdkError> {
        let key = EncodingKey::from_rsa_pem(pem)
            .map_err(|e| BdkError::Configuration(format!("invalid RSA private key: {e}")))?;
        Ok(Self { key })
    }

    /// Read and load a PEM file.
    ///
    /// # Errors
    /// Returns `Configuration` if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, BdkError> {
        let path = path.as_ref();
        let pem = std::fs::read(path).map_err(|e| {
            BdkError::Configuration(format!("failed to read {}: {e}", path.display()))
        })?;
        Self::from_pem(&pem)
    }

    /// Sign a JWT for `subject`, valid for five minutes from `now_millis`.
    ///
    /// # Errors
    /// Returns `Configuration` if signing fails.
    pub fn sign(&self, subject: &str, now_millis: i64) -> Result<String, BdkError> {
        let claims = Claims {
            sub: subject,
            exp: (now_millis + JWT_LIFETIME_MS) / 1000,
        };
        jsonwebtoken::encode(&Header::new(Algorithm::RS512), &claims, &self.key)
            .map_err(|e| BdkError::Configuration(format!("failed to sign JWT: {e}")))
    }
}

impl std::fmt::Debug for JwtSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("JwtSigner(<redacted>)")
    }
}

/// Proof of identity used by bot and OBO handshakes.
#[derive(Debug, Clone)]
pub enum Credential {
    /// Signed JWT whose subject is the bot username or the app id.
    Rsa { subject: String, signer: JwtSigner },
    /// Client certificate carried by the transport itself.
    Certificate,
}

impl Credential {
    #[must_use]
    pub fn rsa(subject: impl Into<String>, signer: JwtSigner) -> Self {
        Self::Rsa {
            subject: subject.into(),
            signer,
        }
    }
}
