//! Database operations for catalog products and their per-color stock.

use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::PgPool;
use sqlx::types::Json;

use bodega_core::ProductId;

use super::RepositoryError;
use crate::models::product::{Product, ProductColor};
use crate::services::inventory::{InventoryStore, StoreError};

// =============================================================================
// Internal Row Types
// =============================================================================

/// Internal row type for product queries.
#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    id: i32,
    name: String,
    model: String,
    category: String,
    price: Decimal,
    cost: Decimal,
    colors: Json<Vec<ProductColor>>,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Self {
            id: ProductId::new(row.id),
            name: row.name,
            model: row.model,
            category: row.category,
            price: row.price,
            cost: row.cost,
            colors: row.colors.0,
        }
    }
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for product reads and color/stock updates.
#[derive(Clone)]
pub struct ProductRepository {
    pool: PgPool,
}

impl ProductRepository {
    /// Create a new product repository.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// List every product, ordered by id.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self) -> Result<Vec<Product>, RepositoryError> {
        let rows = sqlx::query_as::<_, ProductRow>(
            r"
            SELECT id, name, model, category, price, cost, colors
            FROM bodega.products
            ORDER BY id ASC
            ",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Fetch the products with the given ids. Unknown ids are absent from
    /// the result.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_many(&self, ids: &[ProductId]) -> Result<Vec<Product>, RepositoryError> {
        let ids: Vec<i32> = ids.iter().map(ProductId::as_i32).collect();

        let rows = sqlx::query_as::<_, ProductRow>(
            r"
            SELECT id, name, model, category, price, cost, colors
            FROM bodega.products
            WHERE id = ANY($1)
            ORDER BY id ASC
            ",
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Replace a product's color list (and with it, its stock counts).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product no longer exists,
    /// or `RepositoryError::Database` if the update fails.
    pub async fn update_colors(
        &self,
        id: ProductId,
        colors: &[ProductColor],
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE bodega.products
            SET colors = $2, updated_at = NOW()
            WHERE id = $1
            ",
        )
        .bind(id)
        .bind(Json(colors))
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(format!("product {id}")));
        }

        Ok(())
    }
}

#[async_trait]
impl InventoryStore for ProductRepository {
    async fn list_products(&self) -> Result<Vec<Product>, StoreError> {
        Ok(self.list().await?)
    }

    async fn get_products(&self, ids: &[ProductId]) -> Result<Vec<Product>, StoreError> {
        Ok(self.get_many(ids).await?)
    }

    async fn update_colors(&self, id: ProductId, colors: &[ProductColor]) -> Result<(), StoreError> {
        Ok(Self::update_colors(self, id, colors).await?)
    }
}
