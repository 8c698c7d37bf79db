//! Batched stock quotes from the inventory service, guarded by a circuit breaker and timeout.
//!
//! [`StockQuoteClient`] is the raw remote contract. [`GuardedQuoteClient`] is what the order
//! service calls: one quote per order, bounded in time, short-circuited while the inventory
//! dependency is unhealthy, and translated into [`ShopError::InventoryUnreachable`] whenever
//! no quote can be had.

use crate::circuit_breaker::CircuitBreaker;
use crate::error::{ResilienceError, ShopError};
use crate::model::{SkuAvailability, StockQuote};
use crate::service::InventoryService;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Failure of a raw stock-quote call.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum QuoteError {
    /// The inventory side could not be reached or could not read its storage.
    #[error("inventory unavailable: {0}")]
    Unavailable(String),
    /// The inventory side refused the call.
    #[error("inventory refused the quote: {0}")]
    Rejected(String),
}

/// Remote endpoint answering "how much of each of these SKUs is in stock".
#[async_trait]
pub trait StockQuoteClient: Send + Sync + std::fmt::Debug {
    /// Availability rows for the requested SKUs. SKUs with no stock record may be omitted.
    async fn quote(&self, sku_codes: &[String]) -> Result<Vec<SkuAvailability>, QuoteError>;
}

/// In-process client that asks the inventory service directly, as the order service's own
/// identity.
#[derive(Debug, Clone)]
pub struct InventoryQuoteClient {
    inventory: InventoryService,
    caller: String,
}

impl InventoryQuoteClient {
    pub fn new(inventory: InventoryService, caller: impl Into<String>) -> Self {
        Self { inventory, caller: caller.into() }
    }
}

#[async_trait]
impl StockQuoteClient for InventoryQuoteClient {
    async fn quote(&self, sku_codes: &[String]) -> Result<Vec<SkuAvailability>, QuoteError> {
        self.inventory.quantity_in_stock(&self.caller, sku_codes).await.map_err(|e| match e {
            ShopError::RateLimitExceeded { .. } => QuoteError::Rejected(e.to_string()),
            other => QuoteError::Unavailable(other.to_string()),
        })
    }
}

/// Stock-quote client wrapped in a timeout and circuit breaker.
#[derive(Debug, Clone)]
pub struct GuardedQuoteClient {
    client: Arc<dyn StockQuoteClient>,
    breaker: CircuitBreaker,
    timeout: Duration,
}

impl GuardedQuoteClient {
    pub fn new(client: Arc<dyn StockQuoteClient>, breaker: CircuitBreaker, timeout: Duration) -> Self {
        Self { client, breaker, timeout }
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    /// Quote every SKU in one round trip.
    ///
    /// Errors, timeouts, and open-circuit rejections all end in the fallback; a timed-out or
    /// failed call also counts toward opening the breaker.
    pub async fn quote(&self, sku_codes: &[String]) -> Result<StockQuote, ShopError> {
        let client = &self.client;
        let timeout = self.timeout;
        let result = self
            .breaker
            .execute(|| async move {
                let start = Instant::now();
                match tokio::time::timeout(timeout, client.quote(sku_codes)).await {
                    Ok(Ok(rows)) => Ok(rows),
                    Ok(Err(e)) => Err(ResilienceError::Inner(e)),
                    Err(_) => Err(ResilienceError::Timeout { elapsed: start.elapsed(), timeout }),
                }
            })
            .await;

        match result {
            Ok(rows) => {
                debug!(breaker = %self.breaker.name(), skus = sku_codes.len(), "inventory reachable");
                Ok(rows.into_iter().collect())
            }
            Err(cause) => Err(self.fallback(sku_codes, cause)),
        }
    }

    fn fallback(&self, sku_codes: &[String], cause: ResilienceError<QuoteError>) -> ShopError {
        warn!(
            breaker = %self.breaker.name(),
            skus = ?sku_codes,
            circuit_open = cause.is_circuit_open(),
            timed_out = cause.is_timeout(),
            error = %cause,
            "can't reach inventory; fallback taken"
        );
        ShopError::InventoryUnreachable(cause.to_string())
    }
}
