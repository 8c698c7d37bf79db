//! Product catalogue service.

use crate::cache::SharedCache;
use crate::error::ShopError;
use crate::model::{ProductRecord, ProductRequest};
use crate::rate_limit::RateLimitRegistry;
use crate::service::admit;
use crate::store::ProductStore;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Cache key under which the whole catalogue is memoised.
pub const CATALOGUE_KEY: &str = "products";

#[derive(Debug, Clone)]
pub struct ProductService {
    limiter: Arc<RateLimitRegistry>,
    store: Arc<dyn ProductStore>,
    cache: Arc<dyn SharedCache<String, Vec<ProductRecord>>>,
}

impl ProductService {
    pub fn new(
        limiter: Arc<RateLimitRegistry>,
        store: Arc<dyn ProductStore>,
        cache: Arc<dyn SharedCache<String, Vec<ProductRecord>>>,
    ) -> Self {
        Self { limiter, store, cache }
    }

    pub fn limiter(&self) -> &Arc<RateLimitRegistry> {
        &self.limiter
    }

    /// Add a product to the catalogue and return its id.
    pub async fn add_product(&self, identity: &str, request: ProductRequest) -> Result<u64, ShopError> {
        admit(&self.limiter, identity, "addProduct").await?;

        let name = request.name.clone();
        let saved = self.store.save(ProductRecord::from(request)).await.map_err(|e| {
            error!(identity, product = %name, error = %e, "error while saving the product");
            ShopError::ProductNotSaved(e.to_string())
        })?;
        let id = saved
            .id
            .ok_or_else(|| ShopError::ProductNotSaved("store assigned no id".to_string()))?;

        if let Err(e) = self.cache.invalidate(&CATALOGUE_KEY.to_string()).await {
            warn!(error = %e, "product catalogue cache invalidation failed");
        }
        info!(identity, product_id = id, product = %name, "product added");
        Ok(id)
    }

    /// The whole catalogue. An empty catalogue is reported as [`ShopError::ProductNotFound`].
    pub async fn get_all_products(&self, identity: &str) -> Result<Vec<ProductRecord>, ShopError> {
        admit(&self.limiter, identity, "getAllProducts").await?;

        let key = CATALOGUE_KEY.to_string();
        match self.cache.get(&key).await {
            Ok(Some(products)) => {
                debug!(count = products.len(), "catalogue served from cache");
                return Ok(products);
            }
            Ok(None) => {}
            Err(e) => warn!(error = %e, "catalogue cache read failed; falling back to store"),
        }

        let products = self.store.find_all().await.map_err(|e| {
            error!(error = %e, "catalogue lookup failed");
            ShopError::StorageUnavailable(e.to_string())
        })?;
        if products.is_empty() {
            return Err(ShopError::ProductNotFound);
        }
        if let Err(e) = self.cache.put(key, products.clone()).await {
            warn!(error = %e, "catalogue cache write failed");
        }
        Ok(products)
    }
}
