//! Records and request payloads shared by the services.
//!
//! Records carry `Option<u64>` ids: `None` until a store assigns one on first save.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// Per-identity request budget, persisted by the profile store and cached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateProfile {
    pub identity: String,
    pub tokens_per_minute: u32,
}

impl RateProfile {
    pub fn new(identity: impl Into<String>, tokens_per_minute: u32) -> Self {
        Self { identity: identity.into(), tokens_per_minute }
    }
}

/// One requested line on an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItemRequest {
    pub sku_code: String,
    pub quantity: u32,
    pub unit_price: u64,
}

impl LineItemRequest {
    pub fn new(sku_code: impl Into<String>, quantity: u32, unit_price: u64) -> Self {
        Self { sku_code: sku_code.into(), quantity, unit_price }
    }
}

/// Order placement payload.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OrderRequest {
    pub line_items: Vec<LineItemRequest>,
}

impl OrderRequest {
    pub fn new(line_items: Vec<LineItemRequest>) -> Self {
        Self { line_items }
    }

    /// Distinct SKUs on the order, sorted so the remote query is deterministic.
    pub fn distinct_skus(&self) -> Vec<String> {
        self.line_items
            .iter()
            .map(|item| item.sku_code.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

/// Availability of one SKU as reported by the inventory side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkuAvailability {
    pub id: Option<u64>,
    pub sku_code: String,
    pub available_quantity: u32,
}

/// Result of one batched stock query, indexed by SKU.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StockQuote {
    available: HashMap<String, u32>,
}

impl StockQuote {
    pub fn available(&self, sku_code: &str) -> Option<u32> {
        self.available.get(sku_code).copied()
    }

    pub fn len(&self) -> usize {
        self.available.len()
    }

    pub fn is_empty(&self) -> bool {
        self.available.is_empty()
    }
}

impl FromIterator<SkuAvailability> for StockQuote {
    fn from_iter<I: IntoIterator<Item = SkuAvailability>>(iter: I) -> Self {
        // One value per SKU; the first row wins.
        let mut available: HashMap<String, u32> = HashMap::new();
        for row in iter {
            available.entry(row.sku_code).or_insert(row.available_quantity);
        }
        Self { available }
    }
}

impl<'a> FromIterator<(&'a str, u32)> for StockQuote {
    fn from_iter<I: IntoIterator<Item = (&'a str, u32)>>(iter: I) -> Self {
        iter.into_iter()
            .map(|(sku, qty)| SkuAvailability {
                id: None,
                sku_code: sku.to_string(),
                available_quantity: qty,
            })
            .collect()
    }
}

/// A persisted order line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLineItem {
    pub sku_code: String,
    pub quantity: u32,
    pub unit_price: u64,
}

impl From<&LineItemRequest> for OrderLineItem {
    fn from(item: &LineItemRequest) -> Self {
        Self { sku_code: item.sku_code.clone(), quantity: item.quantity, unit_price: item.unit_price }
    }
}

/// A placed order. Immutable once stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRecord {
    pub id: Option<u64>,
    pub order_number: String,
    pub line_items: Vec<OrderLineItem>,
}

impl OrderRecord {
    /// Build an unsaved order with a fresh random order number.
    pub fn from_request(request: &OrderRequest) -> Self {
        Self {
            id: None,
            order_number: uuid::Uuid::new_v4().to_string(),
            line_items: request.line_items.iter().map(OrderLineItem::from).collect(),
        }
    }
}

/// Stock held for one SKU.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryRecord {
    pub id: Option<u64>,
    pub sku_code: String,
    pub quantity: u32,
}

impl From<&InventoryRecord> for SkuAvailability {
    fn from(record: &InventoryRecord) -> Self {
        Self {
            id: record.id,
            sku_code: record.sku_code.clone(),
            available_quantity: record.quantity,
        }
    }
}

/// Product creation payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductRequest {
    pub name: String,
    pub description: String,
    pub price: u64,
}

/// A catalogue entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductRecord {
    pub id: Option<u64>,
    pub name: String,
    pub description: String,
    pub price: u64,
}

impl From<ProductRequest> for ProductRecord {
    fn from(request: ProductRequest) -> Self {
        Self { id: None, name: request.name, description: request.description, price: request.price }
    }
}
