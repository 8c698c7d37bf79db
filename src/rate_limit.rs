//! Per-identity rate limiting.
//!
//! - [`TokenBucket`]: interval-refilled bucket; the state every admitted call spends from.
//! - [`ProfileStore`]: persistent home of each identity's [`RateProfile`](crate::model::RateProfile).
//! - [`RateLimitRegistry`]: resolves an identity to its shared bucket, sourcing the rate from
//!   cache, then storage, then the service default.

use std::time::Duration;

pub mod bucket;
pub mod registry;
pub mod store;

pub use bucket::TokenBucket;
pub use registry::RateLimitRegistry;
pub use store::{InMemoryProfileStore, ProfileStore};

use crate::error::StoreError;

/// Length of one refill interval.
pub const REFILL_INTERVAL: Duration = Duration::from_secs(60);

/// The decision returned by a bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// The request is allowed to proceed.
    Allowed {
        /// Tokens left after this acquisition.
        remaining: u64,
    },
    /// The request is denied.
    Denied {
        /// Time until the next refill boundary.
        wait: Duration,
    },
}

impl Decision {
    /// Helper to check if allowed.
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allowed { .. })
    }
}

/// Errors from resolving or administering rate profiles.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum RateLimitError {
    /// The profile store failed.
    #[error("rate profile store: {0}")]
    Store(#[from] StoreError),
    /// A profile carried a zero rate.
    #[error("invalid rate {rate} for '{identity}': must be > 0")]
    InvalidRate {
        /// Identity the rate belongs to.
        identity: String,
        /// Rejected value.
        rate: u32,
    },
}
