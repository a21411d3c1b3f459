//! Template retrieval boundary.
//!
//! The only asynchronous step in the system. A [`Fetcher`] turns a URL into
//! template text on some later turn; everything else runs synchronously.

use std::cell::RefCell;
use std::collections::HashMap;

use futures::future::{self, FutureExt, LocalBoxFuture};

use crate::error::FetchError;

/// Future returned by a fetch.
pub type FetchFuture = LocalBoxFuture<'static, Result<String, FetchError>>;

/// Retrieves template text by URL.
///
/// Calling `fetch` issues the request; the returned future resolves with the
/// body. Implementations decide what a non-success response means and report
/// it as [`FetchError::Status`].
pub trait Fetcher {
    fn fetch(&self, url: &str) -> FetchFuture;
}

impl<F> Fetcher for F
where
    F: Fn(&str) -> FetchFuture,
{
    fn fetch(&self, url: &str) -> FetchFuture {
        self(url)
    }
}

/// Serves templates from an in-process map and records every request.
///
/// Useful for bundling templates into a binary and for tests that count
/// network round-trips.
#[derive(Debug, Default)]
pub struct MemoryFetcher {
    templates: RefCell<HashMap<String, String>>,
    requests: RefCell<Vec<String>>,
}

impl MemoryFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `markup` under `url`.
    pub fn insert(&self, url: impl Into<String>, markup: impl Into<String>) {
        self.templates.borrow_mut().insert(url.into(), markup.into());
    }

    /// Builder form of [`insert`](Self::insert).
    pub fn with(self, url: impl Into<String>, markup: impl Into<String>) -> Self {
        self.insert(url, markup);
        self
    }

    /// Every URL requested so far, in order.
    pub fn requests(&self) -> Vec<String> {
        self.requests.borrow().clone()
    }

    pub fn request_count(&self, url: &str) -> usize {
        self.requests.borrow().iter().filter(|u| *u == url).count()
    }
}

impl Fetcher for MemoryFetcher {
    fn fetch(&self, url: &str) -> FetchFuture {
        self.requests.borrow_mut().push(url.to_string());
        let result = self
            .templates
            .borrow()
            .get(url)
            .cloned()
            .ok_or_else(|| FetchError::NotFound {
                url: url.to_string(),
            });
        future::ready(result).boxed_local()
    }
}
