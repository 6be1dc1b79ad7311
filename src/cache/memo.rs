//! Single-flight memoization map.
//!
//! One `MemoMap` backs each cache category. It keeps two maps per
//! category: settled entries, and in-flight markers for computations that
//! have started but not finished. Concurrent callers for a missing key all
//! join one shared computation, so a key is computed at most once at a
//! time no matter how many callers race for it.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use metrics::counter;
use time::OffsetDateTime;
use tracing::debug;

use super::error::CacheError;
use super::lock::lock_slots;

const METRIC_MEMO_HIT: &str = "ricordo_memo_hit_total";
const METRIC_MEMO_MISS: &str = "ricordo_memo_miss_total";
const METRIC_MEMO_JOIN: &str = "ricordo_memo_join_total";

/// A settled cache slot.
#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    value: T,
    last_updated_at: OffsetDateTime,
    tags: HashSet<String>,
}

impl<T> CacheEntry<T> {
    pub fn value(&self) -> &T {
        &self.value
    }

    pub fn last_updated_at(&self) -> OffsetDateTime {
        self.last_updated_at
    }

    pub fn tags(&self) -> &HashSet<String> {
        &self.tags
    }
}

/// Freshness report for a settled slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStatus {
    pub last_updated_at: OffsetDateTime,
}

type SharedCompute<T, E> = Shared<BoxFuture<'static, Result<T, CacheError<E>>>>;

/// Marker for a computation that has started but not settled.
///
/// The ticket orders the marker against clears: a clear drops the marker,
/// and a settling computation whose ticket no longer matches discards its
/// result instead of storing it.
struct InFlight<T, E> {
    ticket: u64,
    tags: HashSet<String>,
    compute: SharedCompute<T, E>,
}

struct Slots<T, E> {
    entries: HashMap<String, CacheEntry<T>>,
    in_flight: HashMap<String, InFlight<T, E>>,
}

impl<T, E> Default for Slots<T, E> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
            in_flight: HashMap::new(),
        }
    }
}

/// Keyed store with stampede protection.
pub struct MemoMap<T, E> {
    slots: Arc<Mutex<Slots<T, E>>>,
    tickets: AtomicU64,
    category: &'static str,
}

impl<T, E> MemoMap<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    pub fn new(category: &'static str) -> Self {
        Self {
            slots: Arc::new(Mutex::new(Slots::default())),
            tickets: AtomicU64::new(0),
            category,
        }
    }

    /// Look up `key`, or run `compute` once and cache its value.
    ///
    /// A hit returns the stored value without touching `compute`. A miss
    /// with a computation already in flight joins it and receives its
    /// eventual value or error. Otherwise this call starts the
    /// computation; on success the value is stored with the given tags, on
    /// failure nothing is stored and the next caller retries from scratch.
    pub async fn memoize<F>(
        &self,
        key: &str,
        tags: HashSet<String>,
        compute: F,
    ) -> Result<T, CacheError<E>>
    where
        F: Future<Output = Result<T, E>> + Send + 'static,
    {
        let shared = {
            let mut slots = lock_slots(&self.slots, self.category, "memoize");
            if let Some(entry) = slots.entries.get(key) {
                counter!(METRIC_MEMO_HIT, "category" => self.category).increment(1);
                return Ok(entry.value.clone());
            }
            if let Some(flight) = slots.in_flight.get(key) {
                counter!(METRIC_MEMO_JOIN, "category" => self.category).increment(1);
                debug!(category = self.category, key, "Joined in-flight computation");
                flight.compute.clone()
            } else {
                counter!(METRIC_MEMO_MISS, "category" => self.category).increment(1);
                let ticket = self.tickets.fetch_add(1, Ordering::Relaxed);
                let shared = self.launch(key.to_string(), ticket, compute);
                slots.in_flight.insert(
                    key.to_string(),
                    InFlight {
                        ticket,
                        tags,
                        compute: shared.clone(),
                    },
                );
                shared
            }
        };
        shared.await
    }

    /// Start the shared computation for a missing key.
    ///
    /// The computation is spawned so it runs to completion even if every
    /// waiting caller cancels. The settle step re-checks the registered
    /// ticket: if a clear dropped the marker in the meantime, the result
    /// is returned to callers but not stored.
    fn launch<F>(&self, key: String, ticket: u64, compute: F) -> SharedCompute<T, E>
    where
        F: Future<Output = Result<T, E>> + Send + 'static,
    {
        let slots = Arc::clone(&self.slots);
        let category = self.category;
        let shared = async move {
            match compute.await {
                Ok(value) => {
                    let mut slots = lock_slots(&slots, category, "settle");
                    if slots
                        .in_flight
                        .get(&key)
                        .is_some_and(|flight| flight.ticket == ticket)
                    {
                        if let Some(flight) = slots.in_flight.remove(&key) {
                            slots.entries.insert(
                                key,
                                CacheEntry {
                                    value: value.clone(),
                                    last_updated_at: OffsetDateTime::now_utc(),
                                    tags: flight.tags,
                                },
                            );
                        }
                    } else {
                        debug!(category, key = %key, "Discarded result settled after clear");
                    }
                    Ok(value)
                }
                Err(error) => {
                    let mut slots = lock_slots(&slots, category, "settle");
                    if slots
                        .in_flight
                        .get(&key)
                        .is_some_and(|flight| flight.ticket == ticket)
                    {
                        slots.in_flight.remove(&key);
                    }
                    Err(CacheError::compute(error))
                }
            }
        }
        .boxed()
        .shared();
        tokio::spawn(shared.clone());
        shared
    }

    /// Cloned value of a settled slot, if any.
    pub fn get(&self, key: &str) -> Option<T> {
        lock_slots(&self.slots, self.category, "get")
            .entries
            .get(key)
            .map(|entry| entry.value.clone())
    }

    /// Freshness of a settled slot. Never triggers computation; in-flight
    /// markers do not count.
    pub fn status(&self, key: &str) -> Option<CacheStatus> {
        lock_slots(&self.slots, self.category, "status")
            .entries
            .get(key)
            .map(|entry| CacheStatus {
                last_updated_at: entry.last_updated_at,
            })
    }

    /// Remove one key's entry and in-flight marker.
    ///
    /// Returns whether a settled entry was removed. An absent key is not
    /// an error.
    pub fn remove(&self, key: &str) -> bool {
        let mut slots = lock_slots(&self.slots, self.category, "remove");
        slots.in_flight.remove(key);
        slots.entries.remove(key).is_some()
    }

    /// Remove every entry whose value matches `predicate`.
    ///
    /// All in-flight markers are discarded too: an unsettled computation
    /// has no value to match yet, so it is treated as potentially
    /// affected.
    pub fn remove_matching(&self, predicate: impl Fn(&T) -> bool) -> usize {
        let mut slots = lock_slots(&self.slots, self.category, "remove_matching");
        let before = slots.entries.len();
        slots.entries.retain(|_, entry| !predicate(&entry.value));
        slots.in_flight.clear();
        before - slots.entries.len()
    }

    /// Remove entries and markers carrying `tag`.
    pub fn remove_tagged(&self, tag: &str) -> usize {
        let mut slots = lock_slots(&self.slots, self.category, "remove_tagged");
        let before = slots.entries.len();
        slots.entries.retain(|_, entry| !entry.tags.contains(tag));
        slots.in_flight.retain(|_, flight| !flight.tags.contains(tag));
        before - slots.entries.len()
    }

    /// Remove every entry and marker. Returns the settled-entry count.
    ///
    /// Runs under the slot lock, so no reader observes a partially
    /// cleared category.
    pub fn clear(&self) -> usize {
        let mut slots = lock_slots(&self.slots, self.category, "clear");
        let removed = slots.entries.len();
        slots.entries.clear();
        slots.in_flight.clear();
        removed
    }

    /// Number of settled entries.
    pub fn len(&self) -> usize {
        lock_slots(&self.slots, self.category, "len").entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[cfg(test)]
    fn in_flight_len(&self) -> usize {
        lock_slots(&self.slots, self.category, "in_flight_len")
            .in_flight
            .len()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    use thiserror::Error;

    use super::*;

    #[derive(Debug, Error, PartialEq)]
    #[error("backend unavailable")]
    struct BackendError;

    fn no_tags() -> HashSet<String> {
        HashSet::new()
    }

    fn tags(values: &[&str]) -> HashSet<String> {
        values.iter().map(|value| (*value).to_string()).collect()
    }

    #[tokio::test]
    async fn second_call_returns_cached_value_without_recompute() {
        let map: MemoMap<String, BackendError> = MemoMap::new("test");
        let calls = Arc::new(AtomicUsize::new(0));

        for _ in 0..2 {
            let calls = Arc::clone(&calls);
            let value = map
                .memoize("greeting", no_tags(), async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok("hello".to_string())
                })
                .await
                .expect("computation succeeds");
            assert_eq!(value, "hello");
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(map.len(), 1);
        assert_eq!(map.in_flight_len(), 0);
    }

    #[tokio::test]
    async fn concurrent_callers_share_one_computation() {
        let map: Arc<MemoMap<u32, BackendError>> = Arc::new(MemoMap::new("test"));
        let calls = Arc::new(AtomicUsize::new(0));
        let barrier = Arc::new(tokio::sync::Barrier::new(8));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let map = Arc::clone(&map);
            let calls = Arc::clone(&calls);
            let barrier = Arc::clone(&barrier);
            handles.push(tokio::spawn(async move {
                barrier.wait().await;
                map.memoize("answer", no_tags(), async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(100)).await;
                    Ok(42)
                })
                .await
            }));
        }

        for handle in handles {
            let value = handle.await.expect("task").expect("computation");
            assert_eq!(value, 42);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failure_propagates_to_all_joiners_and_caches_nothing() {
        let map: Arc<MemoMap<u32, BackendError>> = Arc::new(MemoMap::new("test"));
        let barrier = Arc::new(tokio::sync::Barrier::new(2));

        let mut handles = Vec::new();
        for _ in 0..2 {
            let map = Arc::clone(&map);
            let barrier = Arc::clone(&barrier);
            handles.push(tokio::spawn(async move {
                barrier.wait().await;
                map.memoize("flaky", no_tags(), async move {
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    Err(BackendError)
                })
                .await
            }));
        }

        let mut causes = Vec::new();
        for handle in handles {
            let error = handle.await.expect("task").expect_err("computation fails");
            let CacheError::Compute(cause) = error else {
                panic!("expected compute error");
            };
            causes.push(cause);
        }
        // Both joiners see the same shared failure.
        assert!(Arc::ptr_eq(&causes[0], &causes[1]));

        assert_eq!(map.len(), 0);
        assert_eq!(map.in_flight_len(), 0);
        assert!(map.status("flaky").is_none());
    }

    #[tokio::test]
    async fn failed_key_retries_from_scratch() {
        let map: MemoMap<u32, BackendError> = MemoMap::new("test");

        let error = map
            .memoize("retry", no_tags(), async { Err(BackendError) })
            .await
            .expect_err("first computation fails");
        assert_eq!(error.compute_cause(), Some(&BackendError));

        let value = map
            .memoize("retry", no_tags(), async { Ok(7) })
            .await
            .expect("second computation succeeds");
        assert_eq!(value, 7);
    }

    #[tokio::test]
    async fn clear_during_flight_discards_the_settling_result() {
        let map: Arc<MemoMap<u32, BackendError>> = Arc::new(MemoMap::new("test"));
        let (release, gate) = tokio::sync::oneshot::channel::<()>();

        let caller = {
            let map = Arc::clone(&map);
            tokio::spawn(async move {
                map.memoize("racy", no_tags(), async move {
                    let _ = gate.await;
                    Ok(99)
                })
                .await
            })
        };

        // Let the caller register its in-flight marker, then clear.
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(map.in_flight_len(), 1);
        assert!(!map.remove("racy"));
        assert_eq!(map.in_flight_len(), 0);

        release.send(()).expect("release computation");
        let value = caller.await.expect("task").expect("computation");
        assert_eq!(value, 99);

        // The clear won: the settled result was not stored.
        assert_eq!(map.len(), 0);
        assert!(map.status("racy").is_none());
    }

    #[tokio::test]
    async fn abandoned_computation_still_populates_the_map() {
        let map: Arc<MemoMap<u32, BackendError>> = Arc::new(MemoMap::new("test"));

        let caller = {
            let map = Arc::clone(&map);
            tokio::spawn(async move {
                map.memoize("slow", no_tags(), async move {
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    Ok(13)
                })
                .await
            })
        };

        tokio::time::sleep(Duration::from_millis(10)).await;
        caller.abort();

        // The spawned computation outlives its caller and settles the slot.
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(map.get("slow"), Some(13));
        assert_eq!(map.in_flight_len(), 0);
    }

    #[tokio::test]
    async fn tags_are_recorded_on_the_entry() {
        let map: MemoMap<u32, BackendError> = MemoMap::new("test");

        map.memoize("tagged", tags(&["npm", "registry"]), async { Ok(1) })
            .await
            .expect("computation");

        assert_eq!(map.remove_tagged("npm"), 1);
        assert!(map.is_empty());
    }

    #[tokio::test]
    async fn remove_tagged_leaves_other_tags_alone() {
        let map: MemoMap<u32, BackendError> = MemoMap::new("test");

        map.memoize("a", tags(&["npm"]), async { Ok(1) })
            .await
            .expect("computation");
        map.memoize("b", tags(&["git"]), async { Ok(2) })
            .await
            .expect("computation");

        assert_eq!(map.remove_tagged("npm"), 1);
        assert_eq!(map.get("b"), Some(2));
    }

    #[tokio::test]
    async fn remove_matching_removes_only_matching_values() {
        let map: MemoMap<u32, BackendError> = MemoMap::new("test");

        for (key, value) in [("a", 1), ("b", 1), ("c", 2)] {
            map.memoize(key, no_tags(), async move { Ok(value) })
                .await
                .expect("computation");
        }

        assert_eq!(map.remove_matching(|value| *value == 1), 2);
        assert_eq!(map.len(), 1);
        assert_eq!(map.get("c"), Some(2));
    }

    #[tokio::test]
    async fn status_reports_a_plausible_timestamp() {
        let map: MemoMap<u32, BackendError> = MemoMap::new("test");

        let before = OffsetDateTime::now_utc();
        map.memoize("stamped", no_tags(), async { Ok(5) })
            .await
            .expect("computation");
        let after = OffsetDateTime::now_utc();

        let status = map.status("stamped").expect("status present");
        assert!(status.last_updated_at >= before);
        assert!(status.last_updated_at <= after);
    }

    #[tokio::test]
    async fn status_is_none_for_unknown_and_cleared_keys() {
        let map: MemoMap<u32, BackendError> = MemoMap::new("test");
        assert!(map.status("never-requested").is_none());

        map.memoize("present", no_tags(), async { Ok(1) })
            .await
            .expect("computation");
        assert!(map.status("present").is_some());

        map.clear();
        assert!(map.status("present").is_none());
    }
}
