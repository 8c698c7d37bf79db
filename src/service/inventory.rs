//! Inventory service: stock replenishment and availability reads.

use crate::error::ShopError;
use crate::model::{InventoryRecord, SkuAvailability};
use crate::rate_limit::RateLimitRegistry;
use crate::service::admit;
use crate::store::InventoryStore;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{error, info};

/// One async mutex per SKU so read-modify-write upserts on the same SKU run one at a time.
/// Entries exist only while some upsert holds or waits on them.
#[derive(Debug, Default)]
struct SkuLocks {
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl SkuLocks {
    fn for_sku(&self, sku_code: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        locks.entry(sku_code.to_string()).or_default().clone()
    }

    /// Drop the map entry once the caller's handle is the last one outside the map.
    fn release(&self, sku_code: &str, lock: Arc<tokio::sync::Mutex<()>>) {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        // Handles are only cloned under this mutex, so the count is stable here.
        if Arc::strong_count(&lock) == 2 {
            locks.remove(sku_code);
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.locks.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

#[derive(Debug, Clone)]
pub struct InventoryService {
    limiter: Arc<RateLimitRegistry>,
    store: Arc<dyn InventoryStore>,
    sku_locks: Arc<SkuLocks>,
}

impl InventoryService {
    pub fn new(limiter: Arc<RateLimitRegistry>, store: Arc<dyn InventoryStore>) -> Self {
        Self { limiter, store, sku_locks: Arc::new(SkuLocks::default()) }
    }

    pub fn limiter(&self) -> &Arc<RateLimitRegistry> {
        &self.limiter
    }

    /// Add `quantity` units of `sku_code` to stock and return the inventory record's id.
    pub async fn add_stock(
        &self,
        identity: &str,
        sku_code: &str,
        quantity: u32,
    ) -> Result<u64, ShopError> {
        admit(&self.limiter, identity, "addStock").await?;
        self.upsert(sku_code, quantity).await
    }

    /// Availability for each requested SKU that has a stock record, in one storage query.
    pub async fn quantity_in_stock(
        &self,
        identity: &str,
        sku_codes: &[String],
    ) -> Result<Vec<SkuAvailability>, ShopError> {
        admit(&self.limiter, identity, "quantityInStock").await?;
        let records = self.store.find_by_skus(sku_codes).await.map_err(|e| {
            error!(skus = ?sku_codes, error = %e, "inventory lookup failed");
            ShopError::StorageUnavailable(e.to_string())
        })?;
        Ok(records.iter().map(SkuAvailability::from).collect())
    }

    async fn upsert(&self, sku_code: &str, quantity: u32) -> Result<u64, ShopError> {
        let lock = self.sku_locks.for_sku(sku_code);
        let result = {
            let _held = lock.lock().await;
            self.accumulate(sku_code, quantity).await
        };
        self.sku_locks.release(sku_code, lock);
        result
    }

    /// Accumulate into the existing record for the SKU, or create one. Caller holds the SKU lock.
    async fn accumulate(&self, sku_code: &str, quantity: u32) -> Result<u64, ShopError> {
        let existing = self.store.find_by_sku(sku_code).await.map_err(|e| {
            error!(sku = sku_code, error = %e, "inventory lookup before upsert failed");
            ShopError::InventoryNotSaved(e.to_string())
        })?;

        let record = match existing {
            Some(mut record) => {
                let previous = record.quantity;
                record.quantity = previous.checked_add(quantity).ok_or_else(|| {
                    error!(sku = sku_code, previous, quantity, "inventory quantity overflow");
                    ShopError::InventoryNotSaved(format!(
                        "quantity for '{sku_code}' would exceed {}",
                        u32::MAX
                    ))
                })?;
                info!(sku = sku_code, previous, added = quantity, total = record.quantity, "inventory accumulated");
                record
            }
            None => {
                info!(sku = sku_code, quantity, "inventory record created");
                InventoryRecord { id: None, sku_code: sku_code.to_string(), quantity }
            }
        };

        let saved = self.store.save(record).await.map_err(|e| {
            error!(sku = sku_code, error = %e, "error while saving the inventory");
            ShopError::InventoryNotSaved(e.to_string())
        })?;
        saved
            .id
            .ok_or_else(|| ShopError::InventoryNotSaved("store assigned no id".to_string()))
    }
}
