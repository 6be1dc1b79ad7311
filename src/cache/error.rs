//! Cache error taxonomy.

use std::convert::Infallible;
use std::sync::Arc;

use thiserror::Error;

use super::gate::ConfigReadError;

/// Errors surfaced by cache operations.
///
/// `E` is the compute supplier's error type; operations that never run a
/// computation (the clear surface) use the `Infallible` default, which
/// statically rules the `Compute` variant out.
#[derive(Debug, Error)]
pub enum CacheError<E = Infallible> {
    /// The gate's configuration source could not be read.
    ///
    /// Cache operations themselves fail closed on gate errors and never
    /// return this variant; it exists so callers reading the gate directly
    /// via [`CacheGate::read`](super::CacheGate::read) can fold the failure
    /// into their cache-typed results.
    #[error(transparent)]
    ConfigRead(#[from] ConfigReadError),

    /// A memoized computation failed. Its result is never cached.
    ///
    /// The supplier's error is shared behind an `Arc` because one failure
    /// fans out to every caller joined to the computation.
    #[error("memoized computation failed: {0}")]
    Compute(Arc<E>),

    /// A clear operation failed unexpectedly.
    #[error("cache clear `{operation}` failed: {cause}")]
    ClearUnknown {
        operation: &'static str,
        cause: String,
    },
}

impl<E> CacheError<E> {
    pub fn compute(error: E) -> Self {
        Self::Compute(Arc::new(error))
    }

    pub fn clear_unknown(operation: &'static str, cause: impl Into<String>) -> Self {
        Self::ClearUnknown {
            operation,
            cause: cause.into(),
        }
    }

    /// The supplier error, when this is a compute failure.
    pub fn compute_cause(&self) -> Option<&E> {
        match self {
            Self::Compute(error) => Some(error.as_ref()),
            _ => None,
        }
    }
}

// A settled computation hands the same outcome to every joined caller, so
// the error must be cloneable without requiring `E: Clone`.
impl<E> Clone for CacheError<E> {
    fn clone(&self) -> Self {
        match self {
            Self::ConfigRead(error) => Self::ConfigRead(error.clone()),
            Self::Compute(error) => Self::Compute(Arc::clone(error)),
            Self::ClearUnknown { operation, cause } => Self::ClearUnknown {
                operation: *operation,
                cause: cause.clone(),
            },
        }
    }
}
