//! [`ExpandContext`] (the C original's `ExpandData`): the per-operation
//! context every placeholder expansion is evaluated against.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::media::Media;
use crate::operation::paging::{self, Paging};

/// The skip/count window an operation was called with.
#[derive(Debug, Clone, Copy, Default)]
pub struct OperationOptions {
    /// Number of leading results to skip.
    pub skip: i64,
    /// Number of results to return after the skip.
    pub count: i64,
}

/// Per-operation context shared by every sub-fetch spawned while evaluating
/// one top-level browse/search/resolve call.
///
/// Reference-counted ([`Clone`] is cheap — an `Arc` clone) so every
/// recursive [`crate::fetch::tree::FetchData`] evaluation and every
/// materialized [`crate::materialize::SendItem`] key fetch can hold one
/// without lifetime gymnastics (§3).
#[derive(Clone)]
pub struct ExpandContext {
    inner: Arc<Inner>,
}

struct Inner {
    source_id: String,
    media: Option<Media>,
    private_keys: HashMap<String, String>,
    search_text: String,
    options: OperationOptions,
    max_page_size: i64,
    buffers: Mutex<HashMap<String, String>>,
}

impl ExpandContext {
    /// Build a new context for one operation call.
    pub fn new(
        source_id: impl Into<String>,
        media: Option<Media>,
        private_keys: HashMap<String, String>,
        search_text: impl Into<String>,
        options: OperationOptions,
        max_page_size: i64,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                source_id: source_id.into(),
                media,
                private_keys,
                search_text: search_text.into(),
                options,
                max_page_size,
                buffers: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// The source id this context's operation was called on.
    pub fn source_id(&self) -> &str {
        &self.inner.source_id
    }

    /// The media the operation was called with, if any (resolve always has
    /// one; browse/search typically do not).
    pub fn media(&self) -> Option<&Media> {
        self.inner.media.as_ref()
    }

    /// The raw search text (empty outside of search operations).
    pub fn search_text(&self) -> &str {
        &self.inner.search_text
    }

    /// The caller-supplied skip/count window.
    pub fn options(&self) -> OperationOptions {
        self.inner.options
    }

    /// The page coordinates derived from skip/count/max_page_size (§6).
    pub fn paging(&self) -> Paging {
        paging::translate(
            self.inner.options.skip,
            self.inner.options.count,
            self.inner.max_page_size,
        )
    }

    /// Look up a private key under `"<source_id>::NAME"`, as `%priv:NAME%`
    /// requires (§4.A).
    pub fn private(&self, name: &str) -> Option<String> {
        let scoped = format!("{}::{}", self.inner.source_id, name);
        self.inner.private_keys.get(&scoped).cloned()
    }

    /// Look up a named capture buffer populated by an earlier `regexp`
    /// sub-node (§4.C REGEXP).
    pub fn buffer(&self, id: &str) -> Option<String> {
        self.inner.buffers.lock().unwrap().get(id).cloned()
    }

    /// Store a sub-regexp's captured output under `id`. Only non-null
    /// results are ever stored (§4.C: "null results are silently skipped").
    pub fn set_buffer(&self, id: impl Into<String>, value: impl Into<String>) {
        self.inner
            .buffers
            .lock()
            .unwrap()
            .insert(id.into(), value.into());
    }
}
