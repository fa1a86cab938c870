//! Product catalog cache.
//!
//! Wraps an [`InventoryStore`] with a `moka` cache. Operations read fresh
//! rows for preflight ([`ProductCatalog::load_fresh`]), write through
//! [`ProductCatalog::write_colors`] which updates the cache optimistically,
//! and call [`ProductCatalog::invalidate_all`] once they finish.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use tracing::debug;

use bodega_core::ProductId;

use super::store::{InventoryStore, StoreError};
use crate::models::product::{Product, ProductColor};

/// Default time-to-live for cached products.
pub const DEFAULT_CATALOG_TTL: Duration = Duration::from_secs(300);

/// Cached, injectable view of the product catalog.
#[derive(Clone)]
pub struct ProductCatalog {
    store: Arc<dyn InventoryStore>,
    cache: Cache<ProductId, Product>,
}

impl ProductCatalog {
    /// Create a catalog over `store` with the given cache TTL.
    #[must_use]
    pub fn new(store: Arc<dyn InventoryStore>, ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(10_000)
            .time_to_live(ttl)
            .build();

        Self { store, cache }
    }

    /// Read one product, from cache when possible.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the store read fails.
    pub async fn product(&self, id: ProductId) -> Result<Option<Product>, StoreError> {
        if let Some(product) = self.cache.get(&id).await {
            return Ok(Some(product));
        }

        let product = self.store.get_products(&[id]).await?.into_iter().next();
        if let Some(product) = &product {
            self.cache.insert(id, product.clone()).await;
        }
        Ok(product)
    }

    /// Read every product from the store and refresh the cache with them.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the store read fails.
    pub async fn products(&self) -> Result<Vec<Product>, StoreError> {
        let products = self.store.list_products().await?;
        for product in &products {
            self.cache.insert(product.id, product.clone()).await;
        }
        Ok(products)
    }

    /// Read the given products straight from the store, bypassing the cache.
    ///
    /// Used by preflight so validation never runs against stale stock.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the store read fails.
    pub async fn load_fresh(
        &self,
        ids: &[ProductId],
    ) -> Result<HashMap<ProductId, Product>, StoreError> {
        let mut unique = ids.to_vec();
        unique.sort_unstable();
        unique.dedup();

        let products = self.store.get_products(&unique).await?;
        let mut by_id = HashMap::with_capacity(products.len());
        for product in products {
            self.cache.insert(product.id, product.clone()).await;
            by_id.insert(product.id, product);
        }

        debug!(requested = unique.len(), found = by_id.len(), "Loaded products");
        Ok(by_id)
    }

    /// Persist a product's color list and update the cached copy without
    /// refetching.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the store update fails; the cached copy is
    /// evicted in that case.
    pub async fn write_colors(&self, product: &Product) -> Result<(), StoreError> {
        self.write(product.id, &product.colors).await?;
        self.cache.insert(product.id, product.clone()).await;
        Ok(())
    }

    /// Persist a raw color list (used for rollback to a snapshot).
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the store update fails.
    pub async fn restore_colors(
        &self,
        id: ProductId,
        colors: &[ProductColor],
    ) -> Result<(), StoreError> {
        self.write(id, colors).await?;
        self.cache.invalidate(&id).await;
        Ok(())
    }

    /// Drop every cached product.
    pub fn invalidate_all(&self) {
        self.cache.invalidate_all();
    }

    async fn write(&self, id: ProductId, colors: &[ProductColor]) -> Result<(), StoreError> {
        match self.store.update_colors(id, colors).await {
            Ok(()) => Ok(()),
            Err(e) => {
                self.cache.invalidate(&id).await;
                Err(e)
            }
        }
    }
}
