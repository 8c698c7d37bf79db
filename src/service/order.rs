//! Order service: placement and order reads.

use crate::admission::{Admission, OrderAdmissionPolicy};
use crate::cache::SharedCache;
use crate::error::ShopError;
use crate::model::{OrderRecord, OrderRequest};
use crate::rate_limit::RateLimitRegistry;
use crate::service::admit;
use crate::stock_quote::GuardedQuoteClient;
use crate::store::OrderStore;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone)]
pub struct OrderService {
    limiter: Arc<RateLimitRegistry>,
    quotes: GuardedQuoteClient,
    policy: OrderAdmissionPolicy,
    orders: Arc<dyn OrderStore>,
    cache: Arc<dyn SharedCache<u64, OrderRecord>>,
}

impl OrderService {
    pub fn new(
        limiter: Arc<RateLimitRegistry>,
        quotes: GuardedQuoteClient,
        orders: Arc<dyn OrderStore>,
        cache: Arc<dyn SharedCache<u64, OrderRecord>>,
    ) -> Self {
        Self { limiter, quotes, policy: OrderAdmissionPolicy, orders, cache }
    }

    pub fn limiter(&self) -> &Arc<RateLimitRegistry> {
        &self.limiter
    }

    /// Place an order and return its id.
    ///
    /// Runs rate limit, validation, one batched stock quote, admission, then a single save.
    /// Nothing is persisted unless every step before the save succeeded.
    pub async fn place_order(&self, identity: &str, request: &OrderRequest) -> Result<u64, ShopError> {
        admit(&self.limiter, identity, "placeOrder").await?;
        validate(request)?;

        let skus = request.distinct_skus();
        let quote = self.quotes.quote(&skus).await?;

        if let Admission::Rejected { sku, requested, available } =
            self.policy.decide(&request.line_items, &quote)
        {
            warn!(identity, sku = %sku, requested, available, "product(s) out of stock; order rejected");
            return Err(ShopError::ProductNotInStock { sku, requested, available });
        }

        let record = OrderRecord::from_request(request);
        let order_number = record.order_number.clone();
        let saved = self.orders.save(record).await.map_err(|e| {
            error!(identity, order_number = %order_number, error = %e, "error while saving the order");
            ShopError::OrderNotSaved(e.to_string())
        })?;
        let id = saved
            .id
            .ok_or_else(|| ShopError::OrderNotSaved("store assigned no id".to_string()))?;

        info!(identity, order_id = id, order_number = %order_number, lines = request.line_items.len(), "order placed");
        Ok(id)
    }

    /// Fetch a placed order, memoised in the shared cache by id.
    pub async fn get_order_details(&self, identity: &str, order_id: u64) -> Result<OrderRecord, ShopError> {
        admit(&self.limiter, identity, "getOrderDetails").await?;

        match self.cache.get(&order_id).await {
            Ok(Some(order)) => {
                debug!(order_id, "order served from cache");
                return Ok(order);
            }
            Ok(None) => {}
            Err(e) => warn!(order_id, error = %e, "order cache read failed; falling back to store"),
        }

        let order = self
            .orders
            .find_by_id(order_id)
            .await
            .map_err(|e| {
                error!(order_id, error = %e, "order lookup failed");
                ShopError::StorageUnavailable(e.to_string())
            })?
            .ok_or_else(|| {
                info!(order_id, "order not found");
                ShopError::OrderNotFound(order_id)
            })?;

        if let Err(e) = self.cache.put(order_id, order.clone()).await {
            warn!(order_id, error = %e, "order cache write failed");
        }
        Ok(order)
    }
}

fn validate(request: &OrderRequest) -> Result<(), ShopError> {
    if request.line_items.is_empty() {
        return Err(ShopError::InvalidOrder("order has no line items".to_string()));
    }
    if let Some(item) = request.line_items.iter().find(|item| item.sku_code.trim().is_empty()) {
        return Err(ShopError::InvalidOrder(format!(
            "line item with quantity {} has no sku code",
            item.quantity
        )));
    }
    if let Some(item) = request.line_items.iter().find(|item| item.quantity == 0) {
        return Err(ShopError::InvalidOrder(format!(
            "line item '{}' has zero quantity",
            item.sku_code
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{FailingCache, InMemoryCache};
    use crate::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};
    use crate::clock::ManualClock;
    use crate::error::StoreError;
    use crate::model::{LineItemRequest, RateProfile, SkuAvailability};
    use crate::rate_limit::{InMemoryProfileStore, ProfileStore};
    use crate::stock_quote::{QuoteError, StockQuoteClient};
    use crate::store::InMemoryOrderStore;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::num::NonZeroU32;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Debug, Default)]
    struct FixedQuotes {
        stock: HashMap<String, u32>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl StockQuoteClient for FixedQuotes {
        async fn quote(&self, sku_codes: &[String]) -> Result<Vec<SkuAvailability>, QuoteError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(sku_codes
                .iter()
                .filter_map(|sku| {
                    self.stock.get(sku).map(|qty| SkuAvailability {
                        id: None,
                        sku_code: sku.clone(),
                        available_quantity: *qty,
                    })
                })
                .collect())
        }
    }

    #[derive(Debug, Default)]
    struct CountingOrderStore {
        inner: InMemoryOrderStore,
        finds: AtomicUsize,
        fail_saves: bool,
        fail_finds: bool,
    }

    #[async_trait]
    impl OrderStore for CountingOrderStore {
        async fn save(&self, order: OrderRecord) -> Result<OrderRecord, StoreError> {
            if self.fail_saves {
                return Err(StoreError::Unavailable("orders db down".into()));
            }
            self.inner.save(order).await
        }

        async fn find_by_id(&self, id: u64) -> Result<Option<OrderRecord>, StoreError> {
            self.finds.fetch_add(1, Ordering::SeqCst);
            if self.fail_finds {
                return Err(StoreError::Unavailable("orders db down".into()));
            }
            self.inner.find_by_id(id).await
        }
    }

    #[derive(Debug)]
    struct DownProfiles;

    #[async_trait]
    impl ProfileStore for DownProfiles {
        async fn find_rate_profile(&self, _: &str) -> Result<Option<RateProfile>, StoreError> {
            Err(StoreError::Unavailable("profile db down".into()))
        }

        async fn save_rate_profile(&self, _: RateProfile) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("profile db down".into()))
        }
    }

    fn service(stock: &[(&str, u32)], orders: Arc<CountingOrderStore>) -> (OrderService, Arc<FixedQuotes>) {
        build(
            stock,
            orders,
            Arc::new(InMemoryCache::<u64, OrderRecord>::new("orders")),
            Arc::new(InMemoryProfileStore::new()),
        )
    }

    fn build(
        stock: &[(&str, u32)],
        orders: Arc<CountingOrderStore>,
        cache: Arc<dyn SharedCache<u64, OrderRecord>>,
        profiles: Arc<dyn ProfileStore>,
    ) -> (OrderService, Arc<FixedQuotes>) {
        let quotes = Arc::new(FixedQuotes {
            stock: stock.iter().map(|(s, q)| (s.to_string(), *q)).collect(),
            ..Default::default()
        });
        let clock = Arc::new(ManualClock::new());
        let breaker = CircuitBreaker::new(
            "inventory-call",
            CircuitBreakerConfig::new(5, Duration::from_secs(10), 1).unwrap(),
        )
        .with_clock(clock.clone());
        let limiter = Arc::new(RateLimitRegistry::new(
            "order",
            NonZeroU32::new(100).unwrap(),
            profiles,
            Arc::new(InMemoryCache::<String, RateProfile>::new("tpsOrderCache")),
            clock,
        ));
        let service = OrderService::new(
            limiter,
            GuardedQuoteClient::new(quotes.clone(), breaker, Duration::from_secs(3)),
            orders,
            cache,
        );
        (service, quotes)
    }

    fn order(items: &[(&str, u32)]) -> OrderRequest {
        OrderRequest::new(items.iter().map(|(sku, qty)| LineItemRequest::new(*sku, *qty, 100)).collect())
    }

    #[tokio::test]
    async fn places_order_when_stock_covers_it() {
        let orders = Arc::new(CountingOrderStore::default());
        let (service, quotes) = service(&[("A", 10), ("B", 2)], orders.clone());

        let id = service.place_order("alice", &order(&[("A", 5), ("B", 2), ("A", 1)])).await.unwrap();
        assert_eq!(quotes.calls.load(Ordering::SeqCst), 1, "one batched quote per order");

        let stored = orders.inner.find_by_id(id).await.unwrap().unwrap();
        assert_eq!(stored.line_items.len(), 3);
        assert_eq!(stored.line_items[0].sku_code, "A");
        assert_eq!(stored.line_items[0].quantity, 5);
    }

    #[tokio::test]
    async fn insufficient_stock_rejects_without_persisting() {
        let orders = Arc::new(CountingOrderStore::default());
        let (service, _) = service(&[("A", 3)], orders.clone());

        let err = service.place_order("alice", &order(&[("A", 5)])).await.unwrap_err();
        assert_eq!(err, ShopError::ProductNotInStock { sku: "A".into(), requested: 5, available: 3 });
        assert!(orders.inner.is_empty());
    }

    #[tokio::test]
    async fn invalid_orders_never_reach_inventory() {
        let orders = Arc::new(CountingOrderStore::default());
        let (service, quotes) = service(&[("A", 3)], orders);

        for request in [order(&[]), order(&[("A", 0)]), order(&[(" ", 1)])] {
            let err = service.place_order("alice", &request).await.unwrap_err();
            assert!(matches!(err, ShopError::InvalidOrder(_)), "got {err:?}");
        }
        assert_eq!(quotes.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn save_failure_becomes_order_not_saved() {
        let orders = Arc::new(CountingOrderStore { fail_saves: true, ..Default::default() });
        let (service, _) = service(&[("A", 3)], orders.clone());

        let err = service.place_order("alice", &order(&[("A", 1)])).await.unwrap_err();
        assert!(matches!(err, ShopError::OrderNotSaved(_)));
        assert!(orders.inner.is_empty());
    }

    #[tokio::test]
    async fn order_details_are_memoised() {
        let orders = Arc::new(CountingOrderStore::default());
        let (service, _) = service(&[("A", 3)], orders.clone());
        let id = service.place_order("alice", &order(&[("A", 1)])).await.unwrap();

        let first = service.get_order_details("alice", id).await.unwrap();
        let second = service.get_order_details("alice", id).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first.id, Some(id));
        assert_eq!(orders.finds.load(Ordering::SeqCst), 1);

        assert_eq!(
            service.get_order_details("alice", 999).await.unwrap_err(),
            ShopError::OrderNotFound(999)
        );
    }

    #[tokio::test]
    async fn order_reads_bypass_a_failing_cache() {
        let orders = Arc::new(CountingOrderStore::default());
        let (service, _) =
            build(&[("A", 3)], orders.clone(), Arc::new(FailingCache), Arc::new(InMemoryProfileStore::new()));
        let id = service.place_order("alice", &order(&[("A", 1)])).await.unwrap();

        for _ in 0..2 {
            assert_eq!(service.get_order_details("alice", id).await.unwrap().id, Some(id));
        }
        assert_eq!(orders.finds.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn order_lookup_failure_is_storage_unavailable() {
        let orders = Arc::new(CountingOrderStore { fail_finds: true, ..Default::default() });
        let (service, _) = service(&[("A", 3)], orders);

        assert!(matches!(
            service.get_order_details("alice", 1).await,
            Err(ShopError::StorageUnavailable(msg)) if msg.contains("orders db down")
        ));
    }

    #[tokio::test]
    async fn unreachable_profile_store_blocks_placement() {
        let orders = Arc::new(CountingOrderStore::default());
        let (service, quotes) = build(
            &[("A", 3)],
            orders.clone(),
            Arc::new(InMemoryCache::<u64, OrderRecord>::new("orders")),
            Arc::new(DownProfiles),
        );

        let err = service.place_order("alice", &order(&[("A", 1)])).await.unwrap_err();
        assert!(matches!(err, ShopError::RateLimiterUnavailable(_)), "got {err:?}");
        assert_eq!(quotes.calls.load(Ordering::SeqCst), 0);
        assert!(orders.inner.is_empty());
    }
}
