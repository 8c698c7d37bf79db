#![allow(missing_docs)]

mod common;

use common::{shop, skus};
use shopit::{
    CircuitState, LineItemRequest, OrderRequest, RateLimitSettings, ShopConfig, ShopError,
    INVENTORY_BREAKER,
};
use std::time::Duration;

fn order(items: &[(&str, u32)]) -> OrderRequest {
    OrderRequest::new(items.iter().map(|(sku, qty)| LineItemRequest::new(*sku, *qty, 250)).collect())
}

#[tokio::test]
async fn order_covered_by_stock_is_placed_and_readable() {
    let (shop, _) = shop(ShopConfig::default());
    shop.inventory.add_stock("warehouse", "A", 10).await.unwrap();

    let id = shop.orders.place_order("alice", &order(&[("A", 5)])).await.unwrap();
    let details = shop.orders.get_order_details("alice", id).await.unwrap();

    assert_eq!(details.id, Some(id));
    assert_eq!(details.line_items.len(), 1);
    assert_eq!(details.line_items[0].sku_code, "A");
    assert_eq!(details.line_items[0].quantity, 5);
    assert_eq!(details.line_items[0].unit_price, 250);
    assert!(!details.order_number.is_empty());
}

#[tokio::test]
async fn short_stock_rejects_and_persists_nothing() {
    let (shop, _) = shop(ShopConfig::default());
    shop.inventory.add_stock("warehouse", "A", 3).await.unwrap();

    let err = shop.orders.place_order("alice", &order(&[("A", 5)])).await.unwrap_err();
    assert_eq!(err, ShopError::ProductNotInStock { sku: "A".into(), requested: 5, available: 3 });
    assert_eq!(shop.orders.get_order_details("alice", 1).await.unwrap_err(), ShopError::OrderNotFound(1));
}

#[tokio::test]
async fn one_uncovered_line_rejects_the_whole_order() {
    let (shop, _) = shop(ShopConfig::default());
    shop.inventory.add_stock("warehouse", "A", 10).await.unwrap();

    let err = shop.orders.place_order("alice", &order(&[("A", 1), ("UNKNOWN", 1)])).await.unwrap_err();
    assert_eq!(
        err,
        ShopError::ProductNotInStock { sku: "UNKNOWN".into(), requested: 1, available: 0 }
    );
}

#[tokio::test]
async fn add_stock_accumulates() {
    let (shop, _) = shop(ShopConfig::default());
    let first = shop.inventory.add_stock("warehouse", "X", 10).await.unwrap();
    let second = shop.inventory.add_stock("warehouse", "X", 5).await.unwrap();
    assert_eq!(first, second);

    let rows = shop.inventory.quantity_in_stock("warehouse", &skus(&["X", "Y"])).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].available_quantity, 15);
}

#[tokio::test]
async fn forced_open_breaker_short_circuits_without_calling_inventory() {
    let (shop, _) = shop(ShopConfig::default());
    shop.inventory.add_stock("warehouse", "A", 10).await.unwrap();
    shop.breakers().force_open(INVENTORY_BREAKER).unwrap();

    let err = shop.orders.place_order("alice", &order(&[("A", 1)])).await.unwrap_err();
    assert!(matches!(err, ShopError::InventoryUnreachable(_)), "got {err:?}");
    assert!(err.is_transient());

    // The inventory side never saw the order service's call.
    let bucket = shop.inventory.limiter().resolve("order-service").await.unwrap();
    assert_eq!(bucket.available_tokens(), 10);

    shop.breakers().reset(INVENTORY_BREAKER).unwrap();
    shop.orders.place_order("alice", &order(&[("A", 1)])).await.unwrap();
    assert_eq!(bucket.available_tokens(), 9);
}

#[tokio::test]
async fn exhausted_inventory_budget_opens_the_breaker_until_recovery() {
    let config = ShopConfig {
        rate_limits: RateLimitSettings { order: 100, ..RateLimitSettings::default() },
        ..ShopConfig::default()
    };
    let (shop, clock) = shop(config);
    shop.inventory.add_stock("warehouse", "A", 1_000).await.unwrap();

    // The order service gets 10 quotes a minute from the inventory side.
    for _ in 0..10 {
        shop.orders.place_order("alice", &order(&[("A", 1)])).await.unwrap();
    }
    for _ in 0..5 {
        let err = shop.orders.place_order("alice", &order(&[("A", 1)])).await.unwrap_err();
        assert!(matches!(err, ShopError::InventoryUnreachable(_)));
    }
    let breaker = shop.breakers().get(INVENTORY_BREAKER).unwrap();
    assert_eq!(breaker.state(), CircuitState::Open);

    // After the refill boundary and the recovery timeout, one probe closes it again.
    clock.advance(Duration::from_secs(60));
    shop.orders.place_order("alice", &order(&[("A", 1)])).await.unwrap();
    assert_eq!(breaker.state(), CircuitState::Closed);
}

#[tokio::test]
async fn order_budget_is_enforced_per_identity() {
    let (shop, clock) = shop(ShopConfig::default());
    shop.inventory.add_stock("warehouse", "A", 100).await.unwrap();

    for _ in 0..10 {
        shop.orders.place_order("alice", &order(&[("A", 1)])).await.unwrap();
    }
    match shop.orders.place_order("alice", &order(&[("A", 1)])).await.unwrap_err() {
        ShopError::RateLimitExceeded { identity, retry_after } => {
            assert_eq!(identity, "alice");
            assert!(retry_after <= Duration::from_secs(60));
        }
        other => panic!("expected RateLimitExceeded, got {other:?}"),
    }

    // Reads spend from the same order-service budget.
    assert!(matches!(
        shop.orders.get_order_details("alice", 1).await,
        Err(ShopError::RateLimitExceeded { .. })
    ));
    assert!(shop.orders.get_order_details("bob", 1).await.is_ok());

    clock.advance(Duration::from_secs(60));
    assert!(shop.orders.get_order_details("alice", 1).await.is_ok());
}

#[tokio::test]
async fn rate_updates_take_effect_on_live_buckets() {
    let (shop, _) = shop(ShopConfig::default());
    shop.inventory.add_stock("warehouse", "A", 100).await.unwrap();
    shop.orders.place_order("alice", &order(&[("A", 1)])).await.unwrap();

    // Nine tokens left; the new capacity clamps them to one.
    shop.orders.limiter().update_rate("alice", 1).await.unwrap();
    shop.orders.place_order("alice", &order(&[("A", 1)])).await.unwrap();
    assert!(matches!(
        shop.orders.place_order("alice", &order(&[("A", 1)])).await,
        Err(ShopError::RateLimitExceeded { .. })
    ));
}

#[tokio::test]
async fn json_config_drives_default_rates() {
    let config = ShopConfig::from_json_str(r#"{"rate_limits": {"inventory": 2}}"#).unwrap();
    let (shop, _) = shop(config);

    shop.inventory.add_stock("warehouse", "A", 1).await.unwrap();
    shop.inventory.add_stock("warehouse", "A", 1).await.unwrap();
    assert!(matches!(
        shop.inventory.add_stock("warehouse", "A", 1).await,
        Err(ShopError::RateLimitExceeded { .. })
    ));
}

#[tokio::test]
async fn product_catalogue_round_trip() {
    let (shop, _) = shop(ShopConfig::default());
    assert_eq!(shop.products.get_all_products("web").await.unwrap_err(), ShopError::ProductNotFound);

    let id = shop
        .products
        .add_product(
            "web",
            shopit::ProductRequest { name: "Notebook".into(), description: "A5".into(), price: 450 },
        )
        .await
        .unwrap();
    let all = shop.products.get_all_products("web").await.unwrap();
    assert_eq!(id, 100);
    assert_eq!(all[0].id, Some(100));
    assert_eq!(all[0].name, "Notebook");
}
