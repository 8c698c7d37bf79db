#![forbid(unsafe_code)]
#![cfg_attr(not(test), deny(clippy::all))]

//! # shopit
//!
//! Order-processing core for a small product / inventory / order pipeline.
//!
//! ## Features
//!
//! - **Per-identity rate limiting** with interval-refilled token buckets whose rates are
//!   loaded lazily from a profile store and cached
//! - **Circuit-breaker guarded stock quotes**: one batched, time-bounded inventory call per
//!   order, short-circuited while the dependency is failing
//! - **All-or-nothing order admission** over every line item
//! - **Inventory upserts** that accumulate stock per SKU without lost updates
//!
//! ## Quick Start
//!
//! ```rust
//! use shopit::{LineItemRequest, ManualClock, OrderRequest, Shop, ShopConfig, ShopError};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), ShopError> {
//!     let shop = Shop::in_memory(&ShopConfig::default(), Arc::new(ManualClock::new()))
//!         .expect("default config is valid");
//!
//!     shop.inventory.add_stock("warehouse", "PEN-BLUE", 10).await?;
//!
//!     let request = OrderRequest::new(vec![LineItemRequest::new("PEN-BLUE", 5, 120)]);
//!     let order_id = shop.orders.place_order("alice", &request).await?;
//!     let order = shop.orders.get_order_details("alice", order_id).await?;
//!     assert_eq!(order.line_items.len(), 1);
//!     Ok(())
//! }
//! ```

pub mod admission;
pub mod cache;
pub mod circuit_breaker;
pub mod circuit_breaker_registry;
pub mod clock;
pub mod config;
pub mod error;
pub mod model;
pub mod rate_limit;
pub mod service;
pub mod shop;
pub mod stock_quote;
pub mod store;

// Re-exports
pub use admission::{Admission, OrderAdmissionPolicy};
pub use cache::{InMemoryCache, SharedCache};
pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerError, CircuitState};
pub use circuit_breaker_registry::{BreakerRegistry, BreakerRegistryError};
pub use clock::{Clock, ManualClock, MonotonicClock};
pub use config::{BreakerSettings, ConfigError, RateLimitSettings, ShopConfig};
pub use error::{ResilienceError, ShopError, StoreError};
pub use model::{
    InventoryRecord, LineItemRequest, OrderLineItem, OrderRecord, OrderRequest, ProductRecord,
    ProductRequest, RateProfile, SkuAvailability, StockQuote,
};
pub use rate_limit::{Decision, RateLimitError, RateLimitRegistry, TokenBucket};
pub use service::{InventoryService, OrderService, ProductService};
pub use shop::{Shop, INVENTORY_BREAKER};
pub use stock_quote::{GuardedQuoteClient, InventoryQuoteClient, QuoteError, StockQuoteClient};
pub use store::{
    InMemoryInventoryStore, InMemoryOrderStore, InMemoryProductStore, InventoryStore, OrderStore,
    ProductStore,
};
