//! The clear surface: keyed, predicate, category, tag, and cascading
//! clears.
//!
//! Every operation checks the gate first (disabled means success with no
//! mutation) and runs inside a panic guard, so a misbehaving store or
//! comparison surfaces as a typed [`CacheError::ClearUnknown`] instead of
//! unwinding through the caller's pipeline.

use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::time::Instant;

use metrics::histogram;
use tracing::{debug, info};
use uuid::Uuid;

use super::error::CacheError;
use super::gate::CacheGate;
use super::keys::{self, Category};
use super::store::CacheStore;

const METRIC_CLEAR_MS: &str = "ricordo_clear_ms";

/// Result of a clear operation.
pub type ClearResult = Result<(), CacheError>;

/// Invalidation surface over a cache store.
pub struct CacheInvalidator<E> {
    gate: CacheGate,
    store: Arc<CacheStore<E>>,
}

impl<E> CacheInvalidator<E>
where
    E: Send + Sync + 'static,
{
    pub fn new(gate: CacheGate, store: Arc<CacheStore<E>>) -> Self {
        Self { gate, store }
    }

    /// Drop one page entry by id. An absent id is not an error.
    pub fn page_by_id(&self, id: Uuid) -> ClearResult {
        self.run("page_by_id", || {
            usize::from(self.store.pages().remove(&keys::page_key(id)))
        })
    }

    /// Drop every page entry whose stored slug matches.
    ///
    /// Slugs are a secondary attribute, so this scans the category rather
    /// than looking up a key.
    pub fn page_by_slug(&self, slug: &str) -> ClearResult {
        self.run("page_by_slug", || {
            self.store.pages().remove_matching(|page| page.slug == slug)
        })
    }

    /// Drop all pages and the collections derived from them: the folder
    /// tree, the page-folder tree, and the folder list.
    pub fn pages(&self) -> ClearResult {
        self.run("pages", || self.clear_with_dependents(Category::Pages))
    }

    /// Drop the folder tree and the page-folder tree derived from it.
    pub fn folder_tree(&self) -> ClearResult {
        self.run("folder_tree", || {
            self.clear_with_dependents(Category::FolderTree)
        })
    }

    /// Drop the flat folder listings.
    pub fn folder_list(&self) -> ClearResult {
        self.run("folder_list", || {
            self.clear_with_dependents(Category::FolderList)
        })
    }

    /// Drop the page-folder trees.
    pub fn page_folder_tree(&self) -> ClearResult {
        self.run("page_folder_tree", || {
            self.clear_with_dependents(Category::PageFolderTree)
        })
    }

    /// Drop the cached latest-version lookup.
    pub fn latest_version(&self) -> ClearResult {
        self.run("latest_version", || {
            self.clear_with_dependents(Category::Version)
        })
    }

    /// Drop one generic keyed entry.
    pub fn key(&self, key: &str) -> ClearResult {
        self.run("key", || usize::from(self.store.keyed().remove(key)))
    }

    /// Drop a whole category and its dependents.
    pub fn category(&self, category: Category) -> ClearResult {
        self.run(category.as_str(), || self.clear_with_dependents(category))
    }

    /// Drop, in every category, each entry carrying `tag`.
    pub fn tag(&self, tag: &str) -> ClearResult {
        self.run("tag", || self.store.clear_tagged(tag))
    }

    fn clear_with_dependents(&self, category: Category) -> usize {
        let mut removed = self.store.clear_category(category);
        for dependent in category.dependents() {
            removed += self.store.clear_category(*dependent);
        }
        removed
    }

    /// Gate-check, panic-guard, and report one clear operation.
    fn run(&self, operation: &'static str, clear: impl FnOnce() -> usize) -> ClearResult {
        if !self.gate.enabled() {
            debug!(operation, "Clear skipped, cache disabled");
            return Ok(());
        }

        let started_at = Instant::now();
        let removed = catch_unwind(AssertUnwindSafe(clear))
            .map_err(|panic| CacheError::clear_unknown(operation, panic_cause(panic.as_ref())))?;
        histogram!(METRIC_CLEAR_MS, "operation" => operation)
            .record(started_at.elapsed().as_secs_f64() * 1000.0);

        info!(operation, removed, "Cache cleared");
        Ok(())
    }
}

impl<E> Clone for CacheInvalidator<E> {
    fn clone(&self) -> Self {
        Self {
            gate: self.gate.clone(),
            store: Arc::clone(&self.store),
        }
    }
}

fn panic_cause(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
