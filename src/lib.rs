//! Ricordo: an in-process memoization and invalidation cache for content
//! platforms.
//!
//! Sits between expensive computations (database reads, external registry
//! fetches) and their callers. Computations are memoized per string key
//! with at-most-one concurrent computation per key; entries report their
//! freshness; invalidation works by key, by predicate, by category, or by
//! tag, with cascading clears between derived collections; and a
//! configuration gate can switch the whole store off, turning every
//! operation into a pass-through.
//!
//! ## Example
//!
//! ```ignore
//! use ricordo::cache::{CacheGate, CacheService, Category};
//!
//! let cache: CacheService<RegistryError> = CacheService::new(CacheGate::fixed(true));
//!
//! // First call computes and stores; later calls hit the cache, and
//! // simultaneous callers join the same fetch.
//! let metadata = cache
//!     .keyed()
//!     .memoize_tagged("pkg:react@latest", &["npm"], fetch_npm("react", "latest"))
//!     .await?;
//!
//! let freshness = cache.status(Category::Keyed, "pkg:react@latest");
//!
//! // Drop every npm lookup at once.
//! cache.invalidate().tag("npm")?;
//! ```

pub mod cache;
pub mod config;
pub mod domain;
