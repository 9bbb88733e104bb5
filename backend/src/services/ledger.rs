//! Read access to the stock ledger and on-hand inventory

use sqlx::PgConnection;
use uuid::Uuid;

use crate::error::AppResult;
use crate::models::{
    convert_rows, InventoryItem, InventoryItemRow, LedgerEntry, LedgerRow, Reservation,
    ReservationRow, TransferStatus,
};

/// Reader over the append-only inventory ledger and the stores derived from it.
///
/// All reads take a connection so they can run inside the caller's
/// transaction.
pub struct LedgerReader;

impl LedgerReader {
    /// Batch-tagged ledger entries for a warehouse
    pub async fn batch_entries(
        conn: &mut PgConnection,
        warehouse_id: Uuid,
    ) -> AppResult<Vec<LedgerEntry>> {
        let rows = sqlx::query_as::<_, LedgerRow>(
            r#"
            SELECT id, warehouse_id, product_id, direction, quantity, batch_number,
                   expiry_date, unit_price, created_at
            FROM inventory_transactions
            WHERE warehouse_id = $1 AND batch_number IS NOT NULL
            ORDER BY created_at
            "#,
        )
        .bind(warehouse_id)
        .fetch_all(&mut *conn)
        .await?;

        convert_rows(rows)
    }

    /// On-hand stock records for a warehouse
    pub async fn stock(conn: &mut PgConnection, warehouse_id: Uuid) -> AppResult<Vec<InventoryItem>> {
        let rows = sqlx::query_as::<_, InventoryItemRow>(
            r#"
            SELECT id, product_id, warehouse_id, quantity, updated_at
            FROM inventory_items
            WHERE warehouse_id = $1
            "#,
        )
        .bind(warehouse_id)
        .fetch_all(&mut *conn)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Lines of outgoing transfers from a warehouse that still hold stock
    pub async fn reservations(
        conn: &mut PgConnection,
        warehouse_id: Uuid,
    ) -> AppResult<Vec<Reservation>> {
        let rows = sqlx::query_as::<_, ReservationRow>(
            r#"
            SELECT ti.product_id, ti.batch_number,
                   (ti.quantity_sent - ti.quantity_returned) AS quantity
            FROM transfer_items ti
            JOIN transfers t ON t.id = ti.transfer_id
            WHERE t.source_warehouse_id = $1 AND t.status = ANY($2)
            "#,
        )
        .bind(warehouse_id)
        .bind(TransferStatus::reserving_labels())
        .fetch_all(&mut *conn)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }
}
