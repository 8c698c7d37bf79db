//! Caller-facing operations of the order, inventory, and product services.
//!
//! Every operation is rate limited per identity before it does anything else. Each service
//! owns its own [`RateLimitRegistry`], so an identity's order budget and inventory budget are
//! independent.

use crate::error::ShopError;
use crate::rate_limit::{Decision, RateLimitRegistry};
use tracing::{error, info, warn};

pub mod inventory;
pub mod order;
pub mod product;

pub use inventory::InventoryService;
pub use order::OrderService;
pub use product::ProductService;

/// Spend one token from `identity`'s bucket or fail with the matching [`ShopError`].
pub(crate) async fn admit(
    limiter: &RateLimitRegistry,
    identity: &str,
    operation: &'static str,
) -> Result<(), ShopError> {
    let bucket = limiter.resolve(identity).await.map_err(|e| {
        error!(service = limiter.service(), identity, operation, error = %e, "rate limiter unavailable");
        ShopError::RateLimiterUnavailable(e.to_string())
    })?;

    match bucket.try_acquire(1) {
        Decision::Allowed { remaining } => {
            info!(service = limiter.service(), identity, operation, remaining, "token available, call admitted");
            Ok(())
        }
        Decision::Denied { wait } => {
            warn!(
                service = limiter.service(),
                identity,
                operation,
                retry_after_ms = u64::try_from(wait.as_millis()).unwrap_or(u64::MAX),
                "rate limit exceeded"
            );
            Err(ShopError::RateLimitExceeded { identity: identity.to_string(), retry_after: wait })
        }
    }
}
