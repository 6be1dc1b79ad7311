use std::sync::{Mutex, MutexGuard};

use tracing::warn;

/// Acquire a category's slot mutex, recovering from poisoning.
///
/// A panic in another holder leaves the slot maps structurally valid
/// (entries are inserted and removed wholesale, never mutated in place),
/// so the inner value is still usable.
pub(crate) fn lock_slots<'a, T>(
    lock: &'a Mutex<T>,
    category: &'static str,
    op: &'static str,
) -> MutexGuard<'a, T> {
    match lock.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            warn!(
                category,
                op,
                result = "poisoned_recovered",
                "Recovered from poisoned cache slot lock"
            );
            poisoned.into_inner()
        }
    }
}
