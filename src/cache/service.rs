//! Application-facing cache service.
//!
//! Wires the gate to the typed stores and hands out per-category memoizer
//! views, the status surface, and the invalidator. Constructed once per
//! application context and shared by reference or clone.

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;

use metrics::counter;
use serde_json::Value;
use tracing::debug;

use crate::domain::entities::{
    FolderRecord, FolderTreeNode, PageRecord, PageTreeNode, VersionInfo,
};

use super::clear::CacheInvalidator;
use super::error::CacheError;
use super::gate::CacheGate;
use super::keys::Category;
use super::memo::{CacheStatus, MemoMap};
use super::store::CacheStore;

const METRIC_MEMO_BYPASS: &str = "ricordo_memo_bypass_total";

/// The cache engine's façade.
pub struct CacheService<E> {
    gate: CacheGate,
    store: Arc<CacheStore<E>>,
}

impl<E> CacheService<E>
where
    E: Send + Sync + 'static,
{
    pub fn new(gate: CacheGate) -> Self {
        Self::with_store(gate, Arc::new(CacheStore::new()))
    }

    pub fn with_store(gate: CacheGate, store: Arc<CacheStore<E>>) -> Self {
        Self { gate, store }
    }

    // ========================================================================
    // Memoizer views
    // ========================================================================

    pub fn pages(&self) -> Memoizer<'_, PageRecord, E> {
        self.view(self.store.pages())
    }

    pub fn folder_list(&self) -> Memoizer<'_, Vec<FolderRecord>, E> {
        self.view(self.store.folder_list())
    }

    pub fn folder_tree(&self) -> Memoizer<'_, Vec<FolderTreeNode>, E> {
        self.view(self.store.folder_tree())
    }

    pub fn page_folder_tree(&self) -> Memoizer<'_, Vec<PageTreeNode>, E> {
        self.view(self.store.page_folder_tree())
    }

    pub fn version(&self) -> Memoizer<'_, VersionInfo, E> {
        self.view(self.store.version())
    }

    /// Generic keyed values: registry lookups and other tagged blobs.
    pub fn keyed(&self) -> Memoizer<'_, Value, E> {
        self.view(self.store.keyed())
    }

    fn view<'a, T>(&'a self, map: &'a MemoMap<T, E>) -> Memoizer<'a, T, E> {
        Memoizer {
            gate: &self.gate,
            map,
        }
    }

    // ========================================================================
    // Status and invalidation surfaces
    // ========================================================================

    /// Freshness of `key` in `category`. Pure read; never computes.
    pub fn status(&self, category: Category, key: &str) -> Option<CacheStatus> {
        self.store.status(category, key)
    }

    /// The clear surface over this service's store.
    pub fn invalidate(&self) -> CacheInvalidator<E> {
        CacheInvalidator::new(self.gate.clone(), Arc::clone(&self.store))
    }

    pub fn gate(&self) -> &CacheGate {
        &self.gate
    }

    pub fn store(&self) -> &Arc<CacheStore<E>> {
        &self.store
    }
}

impl<E> Clone for CacheService<E> {
    fn clone(&self) -> Self {
        Self {
            gate: self.gate.clone(),
            store: Arc::clone(&self.store),
        }
    }
}

/// Gate-aware memoization view over one category.
pub struct Memoizer<'a, T, E> {
    gate: &'a CacheGate,
    map: &'a MemoMap<T, E>,
}

impl<T, E> Memoizer<'_, T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    /// Memoize an untagged computation. See [`Memoizer::memoize_tagged`].
    pub async fn memoize<F>(&self, key: &str, compute: F) -> Result<T, CacheError<E>>
    where
        F: Future<Output = Result<T, E>> + Send + 'static,
    {
        self.memoize_tagged(key, &[], compute).await
    }

    /// Look up `key`, or run `compute` once and cache its value under the
    /// given tags.
    ///
    /// With the gate disabled this degrades to a pass-through: `compute`
    /// runs on every call and the store is neither read nor written.
    pub async fn memoize_tagged<F>(
        &self,
        key: &str,
        tags: &[&str],
        compute: F,
    ) -> Result<T, CacheError<E>>
    where
        F: Future<Output = Result<T, E>> + Send + 'static,
    {
        if !self.gate.enabled() {
            counter!(METRIC_MEMO_BYPASS).increment(1);
            debug!(key, "Memoize bypassed, cache disabled");
            return compute.await.map_err(CacheError::compute);
        }
        let tags: HashSet<String> = tags.iter().map(|tag| (*tag).to_string()).collect();
        self.map.memoize(key, tags, compute).await
    }

    /// Freshness of `key`, if a settled entry exists.
    pub fn status(&self, key: &str) -> Option<CacheStatus> {
        self.map.status(key)
    }
}
