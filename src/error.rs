//! Error types for the order-processing core.
//!
//! Two layers live here:
//! - [`ResilienceError`] describes how a guarded remote call ended (timed out, short-circuited,
//!   or failed on its own).
//! - [`ShopError`] is the caller-facing taxonomy. Every storage, cache, or remote failure is
//!   translated into one of its variants before it leaves a service operation.
use std::fmt;
use std::time::Duration;

/// Outcome of a call made through a circuit breaker and timeout.
#[derive(Debug, Clone)]
pub enum ResilienceError<E> {
    /// The operation exceeded the timeout duration
    Timeout { elapsed: Duration, timeout: Duration },
    /// The circuit breaker is open
    CircuitOpen { failure_count: usize, open_duration: Duration },
    /// The underlying operation failed
    Inner(E),
}

impl<E: fmt::Display> fmt::Display for ResilienceError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout { elapsed, timeout } => {
                write!(f, "operation timed out after {:?} (limit: {:?})", elapsed, timeout)
            }
            Self::CircuitOpen { failure_count, open_duration } => {
                write!(
                    f,
                    "circuit breaker open ({} failures, open for {:?})",
                    failure_count, open_duration
                )
            }
            Self::Inner(e) => write!(f, "{}", e),
        }
    }
}

impl<E: std::error::Error + 'static> std::error::Error for ResilienceError<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Inner(e) => Some(e),
            _ => None,
        }
    }
}

impl<E> ResilienceError<E> {
    /// Check if this error is due to timeout
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Check if this error is due to circuit breaker
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, Self::CircuitOpen { .. })
    }

    /// Check if this error wraps an inner error.
    pub fn is_inner(&self) -> bool {
        matches!(self, Self::Inner(_))
    }

    /// Get the inner error if this is an Inner variant
    pub fn into_inner(self) -> Option<E> {
        match self {
            Self::Inner(e) => Some(e),
            _ => None,
        }
    }
}

/// Failure reported by a storage or cache collaborator.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The backend could not be reached or did not answer.
    #[error("store unavailable: {0}")]
    Unavailable(String),
    /// The backend answered but refused the write.
    #[error("store rejected write: {0}")]
    Rejected(String),
}

/// Errors surfaced to callers of the product, inventory, and order services.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ShopError {
    /// The caller's token bucket is empty.
    #[error("rate limit exceeded for '{identity}', retry in {retry_after:?}")]
    RateLimitExceeded {
        /// Identity whose bucket was empty.
        identity: String,
        /// Time until the next refill boundary.
        retry_after: Duration,
    },
    /// The rate profile for the caller could not be loaded or created.
    #[error("rate limiter unavailable: {0}")]
    RateLimiterUnavailable(String),
    /// The stock-quote dependency is short-circuited or failed.
    #[error("can't reach inventory, try again later: {0}")]
    InventoryUnreachable(String),
    /// At least one line item cannot be covered by available stock.
    #[error("product '{sku}' is out of stock (requested {requested}, available {available})")]
    ProductNotInStock {
        /// First SKU that failed admission.
        sku: String,
        /// Quantity asked for on the order.
        requested: u32,
        /// Quantity the quote reported; zero when the SKU was absent.
        available: u32,
    },
    /// The order request is structurally unusable.
    #[error("invalid order: {0}")]
    InvalidOrder(String),
    /// No order exists with this id.
    #[error("order {0} not found")]
    OrderNotFound(u64),
    /// The catalogue is empty.
    #[error("no products found")]
    ProductNotFound,
    /// Persisting the order failed; nothing was stored.
    #[error("error while saving the order: {0}")]
    OrderNotSaved(String),
    /// Persisting the inventory record failed.
    #[error("error while saving the inventory: {0}")]
    InventoryNotSaved(String),
    /// Persisting the product failed.
    #[error("error while saving the product: {0}")]
    ProductNotSaved(String),
    /// A read against storage failed.
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),
}

impl ShopError {
    /// Whether a caller may reasonably resubmit the same request later.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::RateLimitExceeded { .. }
                | Self::RateLimiterUnavailable(_)
                | Self::InventoryUnreachable(_)
                | Self::StorageUnavailable(_)
                | Self::OrderNotSaved(_)
                | Self::InventoryNotSaved(_)
                | Self::ProductNotSaved(_)
        )
    }
}
