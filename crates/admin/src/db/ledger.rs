//! Database operations for the stock ledger.
//!
//! Bulk inserts are a single multi-row `INSERT` so they are all-or-nothing.
//! Batched updates run inside one transaction for the same reason.

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use bodega_core::{LedgerEntryId, PedidoId};

use super::RepositoryError;
use crate::models::ledger::{LedgerEntry, LedgerEntryUpdate};
use crate::services::inventory::{PrivilegedLedger, StockLedger, StoreError};

const ENTRY_COLUMNS: &str = "id, pedido_id, product_id, product_name, product_model, color_name, \
     quantity_added, cost, price, created_at, tombstoned_at";

fn uuids(ids: &[LedgerEntryId]) -> Vec<Uuid> {
    ids.iter().map(LedgerEntryId::as_uuid).collect()
}

/// Repository for stock ledger rows.
#[derive(Clone)]
pub struct LedgerRepository {
    pool: PgPool,
}

impl LedgerRepository {
    /// Create a new ledger repository.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert all entries in one statement.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails; in that case
    /// no row was written.
    pub async fn insert_all(&self, entries: &[LedgerEntry]) -> Result<(), RepositoryError> {
        if entries.is_empty() {
            return Ok(());
        }

        let mut builder: QueryBuilder<'_, Postgres> =
            QueryBuilder::new(format!("INSERT INTO bodega.stock_ledger ({ENTRY_COLUMNS}) "));
        builder.push_values(entries, |mut row, entry| {
            row.push_bind(entry.id)
                .push_bind(entry.pedido_id)
                .push_bind(entry.product_id)
                .push_bind(&entry.product_name)
                .push_bind(&entry.product_model)
                .push_bind(&entry.color_name)
                .push_bind(entry.quantity_added)
                .push_bind(entry.cost)
                .push_bind(entry.price)
                .push_bind(entry.created_at)
                .push_bind(entry.tombstoned_at);
        });

        builder.build().execute(&self.pool).await?;
        Ok(())
    }

    /// Fetch rows by id.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find_by_ids(
        &self,
        ids: &[LedgerEntryId],
    ) -> Result<Vec<LedgerEntry>, RepositoryError> {
        let entries = sqlx::query_as::<_, LedgerEntry>(&format!(
            "SELECT {ENTRY_COLUMNS} FROM bodega.stock_ledger \
             WHERE id = ANY($1) ORDER BY created_at ASC, id ASC"
        ))
        .bind(uuids(ids))
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }

    /// Fetch every row of one pedido, tombstoned rows included.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find_by_pedido(
        &self,
        pedido_id: PedidoId,
    ) -> Result<Vec<LedgerEntry>, RepositoryError> {
        let entries = sqlx::query_as::<_, LedgerEntry>(&format!(
            "SELECT {ENTRY_COLUMNS} FROM bodega.stock_ledger \
             WHERE pedido_id = $1 ORDER BY created_at ASC, id ASC"
        ))
        .bind(pedido_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }

    /// Fetch every row, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self) -> Result<Vec<LedgerEntry>, RepositoryError> {
        let entries = sqlx::query_as::<_, LedgerEntry>(&format!(
            "SELECT {ENTRY_COLUMNS} FROM bodega.stock_ledger ORDER BY created_at DESC, id ASC"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }

    /// Apply a batch of quantity/cost changes atomically.
    ///
    /// Tombstoned rows are not updatable.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if any row is missing or
    /// tombstoned (nothing is written), or `RepositoryError::Database` if a
    /// statement fails.
    pub async fn update_all(&self, updates: &[LedgerEntryUpdate]) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        for update in updates.iter().filter(|u| !u.is_empty()) {
            let result = sqlx::query(
                r"
                UPDATE bodega.stock_ledger
                SET quantity_added = COALESCE($2, quantity_added),
                    cost = COALESCE($3, cost)
                WHERE id = $1 AND tombstoned_at IS NULL
                ",
            )
            .bind(update.id)
            .bind(update.quantity_added)
            .bind(update.cost)
            .execute(&mut *tx)
            .await?;

            if result.rows_affected() == 0 {
                // Dropping the transaction rolls back earlier statements.
                return Err(RepositoryError::NotFound(format!(
                    "ledger entry {}",
                    update.id
                )));
            }
        }

        tx.commit().await?;
        Ok(())
    }

    /// Hard-delete rows by id. Returns the number of rows removed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the statement fails.
    pub async fn delete_by_ids(&self, ids: &[LedgerEntryId]) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM bodega.stock_ledger WHERE id = ANY($1)")
            .bind(uuids(ids))
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    /// Hard-delete rows by id, restricted to one pedido.
    ///
    /// Backs the privileged deletion endpoint, which must not remove rows
    /// of other pedidos even if handed their ids.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the statement fails.
    pub async fn delete_in_pedido(
        &self,
        pedido_id: PedidoId,
        ids: &[LedgerEntryId],
    ) -> Result<u64, RepositoryError> {
        let result =
            sqlx::query("DELETE FROM bodega.stock_ledger WHERE pedido_id = $1 AND id = ANY($2)")
                .bind(pedido_id)
                .bind(uuids(ids))
                .execute(&self.pool)
                .await?;

        Ok(result.rows_affected())
    }

    /// Hard-delete every row of a pedido.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the statement fails.
    pub async fn delete_by_pedido(&self, pedido_id: PedidoId) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM bodega.stock_ledger WHERE pedido_id = $1")
            .bind(pedido_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    /// Soft-delete rows matching the pedido or any of the ids.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the statement fails.
    pub async fn tombstone(
        &self,
        pedido_id: PedidoId,
        ids: &[LedgerEntryId],
    ) -> Result<u64, RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE bodega.stock_ledger
            SET quantity_added = 0, tombstoned_at = NOW()
            WHERE (pedido_id = $1 OR id = ANY($2)) AND tombstoned_at IS NULL
            ",
        )
        .bind(pedido_id)
        .bind(uuids(ids))
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}

#[async_trait]
impl StockLedger for LedgerRepository {
    async fn insert_entries(&self, entries: &[LedgerEntry]) -> Result<(), StoreError> {
        Ok(self.insert_all(entries).await?)
    }

    async fn entries_by_ids(&self, ids: &[LedgerEntryId]) -> Result<Vec<LedgerEntry>, StoreError> {
        Ok(self.find_by_ids(ids).await?)
    }

    async fn entries_for_pedido(&self, pedido_id: PedidoId) -> Result<Vec<LedgerEntry>, StoreError> {
        Ok(self.find_by_pedido(pedido_id).await?)
    }

    async fn list_entries(&self) -> Result<Vec<LedgerEntry>, StoreError> {
        Ok(self.list().await?)
    }

    async fn update_entries(&self, updates: &[LedgerEntryUpdate]) -> Result<(), StoreError> {
        Ok(self.update_all(updates).await?)
    }

    async fn delete_by_ids(&self, ids: &[LedgerEntryId]) -> Result<u64, StoreError> {
        Ok(Self::delete_by_ids(self, ids).await?)
    }

    async fn delete_by_pedido(&self, pedido_id: PedidoId) -> Result<u64, StoreError> {
        Ok(Self::delete_by_pedido(self, pedido_id).await?)
    }

    async fn tombstone(&self, pedido_id: PedidoId, ids: &[LedgerEntryId]) -> Result<u64, StoreError> {
        Ok(Self::tombstone(self, pedido_id, ids).await?)
    }
}

/// Server side of the privileged deletion endpoint.
#[async_trait]
impl PrivilegedLedger for LedgerRepository {
    async fn delete_entries(
        &self,
        pedido_id: PedidoId,
        ids: &[LedgerEntryId],
    ) -> Result<u64, StoreError> {
        Ok(self.delete_in_pedido(pedido_id, ids).await?)
    }
}
