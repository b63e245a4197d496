//! Fixed-page and streamed retrieval over offset/limit endpoints.
//!
//! Every page is fetched through [`RetryWithRecovery::execute_authenticated`],
//! so a transient failure in the middle of a stream is retried in place
//! instead of restarting from offset 0.

use std::{future::Future, sync::Arc};

use bdk_core::{BdkError, SessionTokens};
use futures::{
    StreamExt,
    stream::{self, BoxStream},
};

use crate::RetryWithRecovery;

/// Default page size of a single fetch.
pub const DEFAULT_LIMIT: u32 = 50;
/// Default page size used while streaming.
pub const DEFAULT_CHUNK_SIZE: u32 = 50;
/// Default cap on the number of streamed items.
pub const DEFAULT_TOTAL_SIZE: u32 = 100;

/// Offset and size of one page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaginationAttribute {
    pub offset: u32,
    pub limit: u32,
}

impl PaginationAttribute {
    #[must_use]
    pub const fn new(offset: u32, limit: u32) -> Self {
        Self { offset, limit }
    }
}

impl Default for PaginationAttribute {
    fn default() -> Self {
        Self::new(0, DEFAULT_LIMIT)
    }
}

/// Page size and optional item cap of a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamPaginationAttribute {
    pub chunk_size: u32,
    /// `None` streams until the source is exhausted.
    pub total_size: Option<u32>,
}

impl StreamPaginationAttribute {
    #[must_use]
    pub const fn new(chunk_size: u32, total_size: u32) -> Self {
        Self {
            chunk_size,
            total_size: Some(total_size),
        }
    }

    /// Stream every item the source has.
    #[must_use]
    pub const fn unbounded(chunk_size: u32) -> Self {
        Self {
            chunk_size,
            total_size: None,
        }
    }

    /// Size of the next page after `fetched` items, `None` once the cap is hit.
    fn next_limit(&self, fetched: u32) -> Option<u32> {
        let limit = match self.total_size {
            Some(total) => self.chunk_size.min(total.saturating_sub(fetched)),
            None => self.chunk_size,
        };
        (limit > 0).then_some(limit)
    }
}

impl Default for StreamPaginationAttribute {
    fn default() -> Self {
        Self::new(DEFAULT_CHUNK_SIZE, DEFAULT_TOTAL_SIZE)
    }
}

/// One page returned by an endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Explicit continuation flag, for endpoints that expose one.
    pub has_more: Option<bool>,
}

impl<T> Page<T> {
    #[must_use]
    pub const fn new(items: Vec<T>, has_more: Option<bool>) -> Self {
        Self { items, has_more }
    }
}

impl<T> From<Vec<T>> for Page<T> {
    fn from(items: Vec<T>) -> Self {
        Self::new(items, None)
    }
}

/// Fetch exactly one page, using [`PaginationAttribute::default`] when
/// `attribute` is `None`.
///
/// # Errors
/// Returns the failure surfaced by the retry engine.
pub async fn fetch_page<T, F, Fut>(
    retry: &RetryWithRecovery,
    name: &str,
    attribute: Option<PaginationAttribute>,
    mut fetch: F,
) -> Result<Vec<T>, BdkError>
where
    F: FnMut(Arc<SessionTokens>, PaginationAttribute) -> Fut,
    Fut: Future<Output = Result<Page<T>, BdkError>>,
{
    let attribute = attribute.unwrap_or_default();
    let page = retry
        .execute_authenticated(name, |tokens| fetch(tokens, attribute))
        .await?;
    Ok(page.items)
}

struct Cursor<F> {
    retry: RetryWithRecovery,
    fetch: F,
    attribute: StreamPaginationAttribute,
    offset: u32,
    fetched: u32,
    done: bool,
}

/// Lazily stream every item, one page per `chunk_size`.
///
/// The stream ends after a short page, after a page flagged
/// `has_more == Some(false)`, once `total_size` items were produced, or right
/// after yielding an error. It cannot be restarted; request a new one to read
/// from the beginning again.
pub fn stream_all<T, F, Fut>(
    retry: RetryWithRecovery,
    name: &'static str,
    attribute: StreamPaginationAttribute,
    fetch: F,
) -> BoxStream<'static, Result<T, BdkError>>
where
    T: Send + 'static,
    F: FnMut(Arc<SessionTokens>, PaginationAttribute) -> Fut + Send + 'static,
    Fut: Future<Output = Result<Page<T>, BdkError>> + Send + 'static,
{
    let cursor = Cursor {
        retry,
        fetch,
        attribute,
        offset: 0,
        fetched: 0,
        done: false,
    };

    stream::unfold(cursor, move |mut cursor| async move {
        if cursor.done {
            return None;
        }
        let limit = cursor.attribute.next_limit(cursor.fetched)?;
        let request = PaginationAttribute::new(cursor.offset, limit);

        let fetch = &mut cursor.fetch;
        let result = cursor
            .retry
            .execute_authenticated(name, |tokens| fetch(tokens, request))
            .await;

        match result {
            Ok(mut page) => {
                // A source may answer with more than it was asked for.
                page.items.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
                let count = u32::try_from(page.items.len()).unwrap_or(u32::MAX);
                cursor.fetched = cursor.fetched.saturating_add(count);
                cursor.offset = cursor.offset.saturating_add(limit);
                cursor.done = count < limit || page.has_more == Some(false);

                tracing::debug!(operation = name, offset = request.offset, count, "fetched page");
                let items: Vec<_> = page.items.into_iter().map(Ok).collect();
                Some((items, cursor))
            }
            Err(err) => {
                cursor.done = true;
                Some((vec![Err(err)], cursor))
            }
        }
    })
    .flat_map(stream::iter)
    .boxed()
}
