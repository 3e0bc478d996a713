//! Per-query postings caches.
//!
//! One [`PostingsCacheForStore`] is built per store per query execution and
//! discarded when the query completes. Its value is avoiding repeated
//! dictionary and postings-file I/O across the many row-range checks a
//! single query performs; it is never persisted and never shared across
//! queries.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::Result;
use crate::index::deserializer::GinIndexStoreDeserializer;
use crate::index::postings::GinIndexPostingsListPtr;
use crate::index::store::GinIndexStore;

/// Postings lists of one term, keyed by segment id.
pub type GinSegmentedPostingsListContainer = HashMap<u32, GinIndexPostingsListPtr>;

/// Resolved postings for the terms of one tokenized query string.
pub type GinPostingsCache = HashMap<String, GinSegmentedPostingsListContainer>;

pub type GinPostingsCachePtr = Arc<GinPostingsCache>;

/// Postings lists retrieved from one store for the query strings of a query.
pub struct PostingsCacheForStore {
    store: Arc<GinIndexStore>,
    cache: HashMap<String, GinPostingsCachePtr>,
}

impl PostingsCacheForStore {
    pub fn new(store: Arc<GinIndexStore>) -> PostingsCacheForStore {
        PostingsCacheForStore {
            store,
            cache: HashMap::new(),
        }
    }

    /// The store postings lists are retrieved from.
    pub fn store(&self) -> &Arc<GinIndexStore> {
        &self.store
    }

    /// Get the resolved postings for `query_string`. Returns `None` if the
    /// query string was never resolved against this store.
    pub fn get_postings(&self, query_string: &str) -> Option<GinPostingsCachePtr> {
        self.cache.get(query_string).cloned()
    }

    /// Get the resolved postings for `query_string`, resolving `terms`
    /// through a deserializer on first use.
    pub fn get_or_load(
        &mut self,
        query_string: &str,
        terms: &[String],
    ) -> Result<GinPostingsCachePtr> {
        if let Some(postings) = self.cache.get(query_string) {
            return Ok(postings.clone());
        }

        let mut deserializer = GinIndexStoreDeserializer::new(self.store.clone());
        let postings = Arc::new(deserializer.create_postings_cache_from_terms(terms)?);
        self.cache
            .insert(query_string.to_string(), postings.clone());

        Ok(postings)
    }
}
