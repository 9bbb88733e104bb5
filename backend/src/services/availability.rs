//! Availability of stock for new outgoing transfers

use shared::availability::{self, available_for};
use shared::types::Quantity;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{BatchAvailability, ProductAvailability};
use crate::services::ledger::LedgerReader;

/// Availability service for querying transferable stock
#[derive(Clone)]
pub struct AvailabilityService {
    db: PgPool,
}

/// Both availability views of one warehouse, computed from the same reads
#[derive(Debug, Clone, Default)]
pub struct AvailabilitySnapshot {
    pub batches: Vec<BatchAvailability>,
    pub products: Vec<ProductAvailability>,
}

impl AvailabilitySnapshot {
    pub fn available(&self, product_id: Uuid, batch_number: Option<&str>) -> Quantity {
        available_for(&self.batches, &self.products, product_id, batch_number)
    }

    pub fn batch(&self, product_id: Uuid, batch_number: &str) -> Option<&BatchAvailability> {
        self.batches
            .iter()
            .find(|b| b.product_id == product_id && b.batch_number == batch_number)
    }
}

impl AvailabilityService {
    /// Create a new AvailabilityService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Batch-tracked stock available at a warehouse
    pub async fn get_available_batches(
        &self,
        warehouse_id: Uuid,
    ) -> AppResult<Vec<BatchAvailability>> {
        let mut conn = self.db.acquire().await?;
        ensure_warehouse(&mut conn, warehouse_id, "Warehouse").await?;
        Self::batches(&mut conn, warehouse_id).await
    }

    /// Generic stock available at a warehouse
    pub async fn get_warehouse_inventory(
        &self,
        warehouse_id: Uuid,
    ) -> AppResult<Vec<ProductAvailability>> {
        let mut conn = self.db.acquire().await?;
        ensure_warehouse(&mut conn, warehouse_id, "Warehouse").await?;
        Self::products(&mut conn, warehouse_id).await
    }

    pub async fn batches(
        conn: &mut PgConnection,
        warehouse_id: Uuid,
    ) -> AppResult<Vec<BatchAvailability>> {
        let entries = LedgerReader::batch_entries(conn, warehouse_id).await?;
        let reservations = LedgerReader::reservations(conn, warehouse_id).await?;
        Ok(availability::batch_availability(&entries, &reservations))
    }

    pub async fn products(
        conn: &mut PgConnection,
        warehouse_id: Uuid,
    ) -> AppResult<Vec<ProductAvailability>> {
        let stock = LedgerReader::stock(conn, warehouse_id).await?;
        let reservations = LedgerReader::reservations(conn, warehouse_id).await?;
        Ok(availability::product_availability(&stock, &reservations))
    }

    /// Compute both views on the given connection.
    ///
    /// Inside a transaction that already holds the reservation locks for the
    /// keys being checked, the result cannot be invalidated by a concurrent
    /// initiation before commit.
    pub async fn snapshot(
        conn: &mut PgConnection,
        warehouse_id: Uuid,
    ) -> AppResult<AvailabilitySnapshot> {
        let entries = LedgerReader::batch_entries(conn, warehouse_id).await?;
        let stock = LedgerReader::stock(conn, warehouse_id).await?;
        let reservations = LedgerReader::reservations(conn, warehouse_id).await?;

        Ok(AvailabilitySnapshot {
            batches: availability::batch_availability(&entries, &reservations),
            products: availability::product_availability(&stock, &reservations),
        })
    }
}

/// Fail with NotFound unless the warehouse exists
pub async fn ensure_warehouse(
    conn: &mut PgConnection,
    warehouse_id: Uuid,
    label: &str,
) -> AppResult<()> {
    let exists = sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM warehouses WHERE id = $1)")
        .bind(warehouse_id)
        .fetch_one(&mut *conn)
        .await?;

    if !exists {
        return Err(AppError::NotFound(label.to_string()));
    }
    Ok(())
}
