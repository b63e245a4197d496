//! Failure taxonomy.
//!
//! Every remote call and every authentication flow fails with a [`BdkError`].
//! The retry engine never looks at variants directly: it asks for the
//! [`FailureKind`] and matches recovery rules against that.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Coarse classification used to pick a recovery action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Credential rejected or expired.
    Unauthorized,
    /// Network failure, timeout or server-side error.
    Transient,
    /// The request itself was refused or its answer could not be read.
    ClientRequest,
    /// Caller wiring fault, detected before any network attempt.
    Configuration,
    /// Local failure unrelated to the remote call.
    Internal,
}

/// Error returned by every platform operation.
#[derive(Debug, Error)]
pub enum BdkError {
    /// The platform answered 401.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The platform answered with any other non-2xx status.
    #[error("api error ({status}): {body}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Raw response body.
        body: String,
    },

    /// Connection-level failure (refused, reset, DNS, TLS).
    #[error("transport error: {0}")]
    Transport(String),

    /// A single attempt exceeded its deadline.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// Caller input rejected before any request was sent.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Missing session, missing credential or malformed configuration.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Response body could not be decoded.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Token repository failure.
    #[error("storage error: {0}")]
    Storage(String),
}

impl BdkError {
    /// Build the error matching a non-2xx HTTP status.
    pub fn from_status(status: u16, body: impl Into<String>) -> Self {
        let body = body.into();
        if status == 401 {
            Self::Unauthorized(body)
        } else {
            Self::Api { status, body }
        }
    }

    /// Classify this failure for the retry engine.
    #[must_use]
    pub const fn kind(&self) -> FailureKind {
        match self {
            Self::Unauthorized(_) => FailureKind::Unauthorized,
            Self::Api { status, .. } => match *status {
                408 | 429 | 500..=599 => FailureKind::Transient,
                _ => FailureKind::ClientRequest,
            },
            Self::Transport(_) | Self::Timeout(_) => FailureKind::Transient,
            Self::InvalidArgument(_) | Self::Serialization(_) => FailureKind::ClientRequest,
            Self::Configuration(_) => FailureKind::Configuration,
            Self::Storage(_) => FailureKind::Internal,
        }
    }

    /// HTTP status code when the platform answered.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Unauthorized(_) => Some(401),
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Shorthand for `kind() == FailureKind::Unauthorized`.
    #[must_use]
    pub const fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized(_))
    }
}
