//! Core abstractions for authenticated, retrying platform clients.
//!
//! This crate provides the fundamental building blocks:
//! - `BdkError` - Failure taxonomy shared by every crate
//! - `BdkConfig` / `RetryConfig` - Serde-backed configuration values
//! - `AuthSession` / `AppAuthSession` - Live credentials
//! - Transport, clock, refresh and token storage traits

pub mod config;
pub mod error;
pub mod session;
pub mod traits;
pub mod transport;

pub use config::{BdkConfig, ConfigError, RetryConfig};
pub use error::{BdkError, FailureKind};
pub use session::{AppAuthSession, AuthSession, SessionTokens};
pub use traits::{Clock, SessionRefresher, SystemClock, TokenRepository};
pub use transport::{ApiClient, ApiRequest, ApiResponse, HttpMethod};
