//! Ricordo cache engine.
//!
//! Memoizes expensive asynchronous computations keyed by string, with:
//!
//! - **Stampede protection**: at most one concurrent computation per key;
//!   simultaneous callers join a single shared computation.
//! - **Typed categories**: pages, folder list, folder tree, page-folder
//!   tree, version, plus a generic keyed store for tagged JSON values.
//! - **Invalidation** by key, by predicate, by category, or by tag, with
//!   cascading clears between derived collections.
//! - **A configuration gate**: when disabled, every operation bypasses the
//!   store entirely.

mod clear;
mod error;
mod gate;
mod keys;
mod lock;
mod memo;
mod service;
mod store;

pub use clear::{CacheInvalidator, ClearResult};
pub use error::CacheError;
pub use gate::{CacheGate, ConfigReadError, FileSource, GateSource, StaticSource};
pub use keys::{
    Category, folder_list_key, folder_tree_key, latest_version_key, module_key,
    page_folder_tree_key, page_key,
};
pub use memo::{CacheEntry, CacheStatus, MemoMap};
pub use service::{CacheService, Memoizer};
pub use store::CacheStore;
