//! Wiring for the three services over in-memory collaborators.

use crate::cache::InMemoryCache;
use crate::circuit_breaker_registry::BreakerRegistry;
use crate::clock::Clock;
use crate::config::{ConfigError, ShopConfig};
use crate::model::{OrderRecord, ProductRecord, RateProfile};
use crate::rate_limit::{InMemoryProfileStore, RateLimitRegistry};
use crate::service::{InventoryService, OrderService, ProductService};
use crate::stock_quote::{GuardedQuoteClient, InventoryQuoteClient};
use crate::store::{InMemoryInventoryStore, InMemoryOrderStore, InMemoryProductStore};
use std::num::NonZeroU32;
use std::sync::Arc;

/// Name of the breaker guarding the order service's stock quotes.
pub const INVENTORY_BREAKER: &str = "inventory-call";

/// A fully wired order-processing pipeline.
#[derive(Debug, Clone)]
pub struct Shop {
    pub orders: OrderService,
    pub inventory: InventoryService,
    pub products: ProductService,
    breakers: BreakerRegistry,
}

impl Shop {
    /// Build every service over fresh in-memory stores and caches.
    pub fn in_memory(config: &ShopConfig, clock: Arc<dyn Clock>) -> Result<Self, ConfigError> {
        config.validate()?;

        let inventory = InventoryService::new(
            limiter("inventory", config.inventory_rate()?, "tpsInventoryCache", &clock),
            Arc::new(InMemoryInventoryStore::new()),
        );

        let breakers = BreakerRegistry::new();
        let breaker = breakers.get_or_create(INVENTORY_BREAKER, config.breaker_config()?, clock.clone());
        let quotes = GuardedQuoteClient::new(
            Arc::new(InventoryQuoteClient::new(inventory.clone(), config.order_service_identity.clone())),
            breaker,
            config.quote_timeout(),
        );

        let orders = OrderService::new(
            limiter("order", config.order_rate()?, "tpsOrderCache", &clock),
            quotes,
            Arc::new(InMemoryOrderStore::new()),
            Arc::new(InMemoryCache::<u64, OrderRecord>::new("orders")),
        );

        let products = ProductService::new(
            limiter("product", config.product_rate()?, "tpsProductCache", &clock),
            Arc::new(InMemoryProductStore::new()),
            Arc::new(InMemoryCache::<String, Vec<ProductRecord>>::new("products")),
        );

        Ok(Self { orders, inventory, products, breakers })
    }

    /// Named circuit breakers, for inspection and operator control.
    pub fn breakers(&self) -> &BreakerRegistry {
        &self.breakers
    }
}

fn limiter(
    service: &str,
    default_rate: NonZeroU32,
    cache_name: &str,
    clock: &Arc<dyn Clock>,
) -> Arc<RateLimitRegistry> {
    Arc::new(RateLimitRegistry::new(
        service,
        default_rate,
        Arc::new(InMemoryProfileStore::new()),
        Arc::new(InMemoryCache::<String, RateProfile>::new(cache_name)),
        clock.clone(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit_breaker::CircuitState;
    use crate::clock::ManualClock;

    #[test]
    fn registers_the_inventory_breaker() {
        let shop = Shop::in_memory(&ShopConfig::default(), Arc::new(ManualClock::new())).unwrap();
        assert_eq!(
            shop.breakers().snapshot(),
            vec![(INVENTORY_BREAKER.to_string(), CircuitState::Closed)]
        );
        assert_eq!(shop.orders.limiter().default_rate().get(), 10);
        assert_eq!(shop.products.limiter().default_rate().get(), 15);
        assert_eq!(shop.inventory.limiter().service(), "inventory");
    }

    #[test]
    fn rejects_invalid_config() {
        let config = ShopConfig { quote_timeout_ms: 0, ..ShopConfig::default() };
        assert!(Shop::in_memory(&config, Arc::new(ManualClock::new())).is_err());
    }
}
