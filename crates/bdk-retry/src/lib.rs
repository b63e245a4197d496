//! Retry-with-recovery engine and pagination helpers.
//!
//! Provides:
//! - `RetryPolicy` - Backoff settings plus failure-kind to action rules
//! - `RetryWithRecovery` - Runs one remote call under a policy and an optional session
//! - `fetch_page` / `stream_all` - Fixed-page and lazily streamed retrieval

pub mod pagination;
pub mod retry;

#[cfg(test)]
pub(crate) mod testing;

pub use pagination::{Page, PaginationAttribute, StreamPaginationAttribute, fetch_page, stream_all};
pub use retry::{RecoveryAction, RecoveryRule, RetryPolicy, RetryWithRecovery};
