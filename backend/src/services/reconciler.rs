//! Inventory reconciliation for received transfer lines

use shared::types::Quantity;
use sqlx::PgConnection;
use uuid::Uuid;

use crate::error::AppResult;
use crate::models::{InventoryItem, InventoryItemRow};

/// Applies received quantities to the destination warehouse's stock record
pub struct InventoryReconciler;

impl InventoryReconciler {
    /// Add `quantity` to the stock of a product at a warehouse, creating the
    /// record if the warehouse has never held the product.
    ///
    /// The upsert takes the row lock on (product, warehouse), so concurrent
    /// credits serialize instead of overwriting each other. The lock is held
    /// until the caller's transaction ends.
    pub async fn credit(
        conn: &mut PgConnection,
        warehouse_id: Uuid,
        product_id: Uuid,
        quantity: Quantity,
    ) -> AppResult<InventoryItem> {
        let row = sqlx::query_as::<_, InventoryItemRow>(
            r#"
            INSERT INTO inventory_items (product_id, warehouse_id, quantity, updated_at)
            VALUES ($1, $2, $3, NOW())
            ON CONFLICT (product_id, warehouse_id)
            DO UPDATE SET quantity = inventory_items.quantity + EXCLUDED.quantity,
                          updated_at = NOW()
            RETURNING id, product_id, warehouse_id, quantity, updated_at
            "#,
        )
        .bind(product_id)
        .bind(warehouse_id)
        .bind(quantity)
        .fetch_one(&mut *conn)
        .await?;

        tracing::debug!(
            %warehouse_id,
            %product_id,
            credited = quantity,
            on_hand = row.quantity,
            "inventory reconciled"
        );

        Ok(row.into())
    }
}
