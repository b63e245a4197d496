//! HTTP transport for the platform client.
//!
//! Provides:
//! - `ReqwestApiClient` - `ApiClient` over reqwest, with optional client
//!   certificate for certificate-based authentication

pub mod client;

pub use client::ReqwestApiClient;
