//! Storage contracts for orders, inventory, and products, with in-memory implementations.
//!
//! In-memory stores assign sequential ids on first save. A record saved with `Some(id)` is
//! overwritten in place.

use crate::error::StoreError;
use crate::model::{InventoryRecord, OrderRecord, ProductRecord};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, RwLock};

/// Persistent home of placed orders.
#[async_trait]
pub trait OrderStore: Send + Sync + std::fmt::Debug {
    /// Persist an order and return it with its id assigned.
    async fn save(&self, order: OrderRecord) -> Result<OrderRecord, StoreError>;

    async fn find_by_id(&self, id: u64) -> Result<Option<OrderRecord>, StoreError>;
}

/// Stock levels keyed by SKU. At most one record exists per SKU.
#[async_trait]
pub trait InventoryStore: Send + Sync + std::fmt::Debug {
    async fn find_by_sku(&self, sku_code: &str) -> Result<Option<InventoryRecord>, StoreError>;

    /// One query for a whole set of SKUs. SKUs without a record are omitted, and a SKU
    /// requested twice yields one row.
    async fn find_by_skus(&self, sku_codes: &[String]) -> Result<Vec<InventoryRecord>, StoreError>;

    async fn save(&self, record: InventoryRecord) -> Result<InventoryRecord, StoreError>;
}

/// The product catalogue.
#[async_trait]
pub trait ProductStore: Send + Sync + std::fmt::Debug {
    async fn save(&self, product: ProductRecord) -> Result<ProductRecord, StoreError>;

    /// Every product, ordered by id.
    async fn find_all(&self) -> Result<Vec<ProductRecord>, StoreError>;
}

#[derive(Debug)]
struct Table<T> {
    next_id: u64,
    rows: BTreeMap<u64, T>,
}

impl<T> Table<T> {
    fn starting_at(first_id: u64) -> Self {
        Self { next_id: first_id, rows: BTreeMap::new() }
    }

    fn assign(&mut self, id: Option<u64>) -> u64 {
        match id {
            Some(id) => id,
            None => {
                let id = self.next_id;
                self.next_id += 1;
                id
            }
        }
    }
}

/// In-memory order table.
#[derive(Debug, Clone)]
pub struct InMemoryOrderStore {
    table: Arc<RwLock<Table<OrderRecord>>>,
}

impl Default for InMemoryOrderStore {
    fn default() -> Self {
        Self { table: Arc::new(RwLock::new(Table::starting_at(1))) }
    }
}

impl InMemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.table.read().unwrap_or_else(|e| e.into_inner()).rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn save(&self, mut order: OrderRecord) -> Result<OrderRecord, StoreError> {
        let mut table = self.table.write().unwrap_or_else(|e| e.into_inner());
        let id = table.assign(order.id);
        order.id = Some(id);
        table.rows.insert(id, order.clone());
        Ok(order)
    }

    async fn find_by_id(&self, id: u64) -> Result<Option<OrderRecord>, StoreError> {
        Ok(self.table.read().unwrap_or_else(|e| e.into_inner()).rows.get(&id).cloned())
    }
}

/// In-memory inventory table with a SKU index.
#[derive(Debug, Clone)]
pub struct InMemoryInventoryStore {
    inner: Arc<RwLock<InventoryTable>>,
}

#[derive(Debug)]
struct InventoryTable {
    table: Table<InventoryRecord>,
    by_sku: HashMap<String, u64>,
}

impl Default for InMemoryInventoryStore {
    fn default() -> Self {
        Self {
            inner: Arc::new(RwLock::new(InventoryTable {
                table: Table::starting_at(1),
                by_sku: HashMap::new(),
            })),
        }
    }
}

impl InMemoryInventoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.inner.read().unwrap_or_else(|e| e.into_inner()).table.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl InventoryStore for InMemoryInventoryStore {
    async fn find_by_sku(&self, sku_code: &str) -> Result<Option<InventoryRecord>, StoreError> {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        Ok(inner.by_sku.get(sku_code).and_then(|id| inner.table.rows.get(id)).cloned())
    }

    async fn find_by_skus(&self, sku_codes: &[String]) -> Result<Vec<InventoryRecord>, StoreError> {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        let mut seen = HashSet::new();
        Ok(sku_codes
            .iter()
            .filter(|sku| seen.insert(*sku))
            .filter_map(|sku| inner.by_sku.get(sku))
            .filter_map(|id| inner.table.rows.get(id))
            .cloned()
            .collect())
    }

    async fn save(&self, mut record: InventoryRecord) -> Result<InventoryRecord, StoreError> {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        if record.id.is_none() {
            record.id = inner.by_sku.get(&record.sku_code).copied();
        }
        let id = inner.table.assign(record.id);
        record.id = Some(id);
        inner.by_sku.insert(record.sku_code.clone(), id);
        inner.table.rows.insert(id, record.clone());
        Ok(record)
    }
}

/// In-memory product catalogue. Ids start at 100.
#[derive(Debug, Clone)]
pub struct InMemoryProductStore {
    table: Arc<RwLock<Table<ProductRecord>>>,
}

impl Default for InMemoryProductStore {
    fn default() -> Self {
        Self { table: Arc::new(RwLock::new(Table::starting_at(100))) }
    }
}

impl InMemoryProductStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProductStore for InMemoryProductStore {
    async fn save(&self, mut product: ProductRecord) -> Result<ProductRecord, StoreError> {
        let mut table = self.table.write().unwrap_or_else(|e| e.into_inner());
        let id = table.assign(product.id);
        product.id = Some(id);
        table.rows.insert(id, product.clone());
        Ok(product)
    }

    async fn find_all(&self) -> Result<Vec<ProductRecord>, StoreError> {
        Ok(self.table.read().unwrap_or_else(|e| e.into_inner()).rows.values().cloned().collect())
    }
}
