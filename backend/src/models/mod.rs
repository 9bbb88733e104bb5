//! Database models for the warehouse transfer backend
//!
//! Re-exports models from the shared crate and adds the row types the
//! services decode from Postgres. Status columns are stored as text and are
//! parsed into the closed enums when a row is converted.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::FromRow;
use uuid::Uuid;

use crate::error::{AppError, AppResult};

pub use shared::models::*;

/// Columns selected for every transfer query
pub const TRANSFER_COLUMNS: &str = "id, transfer_number, source_warehouse_id, target_warehouse_id, \
     status, notes, initiated_by, initiated_at, courier_name, tracking_number, dispatched_at, \
     received_by, received_at, receipt_notes, return_courier_name, return_tracking_number, \
     return_dispatched_at, cancellation_notes, cancelled_at";

/// Columns selected for every transfer item query
pub const TRANSFER_ITEM_COLUMNS: &str = "id, transfer_id, product_id, batch_number, expiry_date, \
     unit_price, currency, quantity_sent, quantity_received, quantity_rejected, quantity_disposed, \
     quantity_returned, status, rejection_reason, disposal_reason, condition_notes";

/// Columns selected for every transfer log query
pub const TRANSFER_LOG_COLUMNS: &str = "id, transfer_id, item_id, action, actor_id, \
     previous_status, new_status, details, notes, created_at";

#[derive(Debug, FromRow)]
pub struct TransferRow {
    pub id: Uuid,
    pub transfer_number: String,
    pub source_warehouse_id: Uuid,
    pub target_warehouse_id: Uuid,
    pub status: String,
    pub notes: Option<String>,
    pub initiated_by: Uuid,
    pub initiated_at: DateTime<Utc>,
    pub courier_name: Option<String>,
    pub tracking_number: Option<String>,
    pub dispatched_at: Option<DateTime<Utc>>,
    pub received_by: Option<Uuid>,
    pub received_at: Option<DateTime<Utc>>,
    pub receipt_notes: Option<String>,
    pub return_courier_name: Option<String>,
    pub return_tracking_number: Option<String>,
    pub return_dispatched_at: Option<DateTime<Utc>>,
    pub cancellation_notes: Option<String>,
    pub cancelled_at: Option<DateTime<Utc>>,
}

impl TryFrom<TransferRow> for Transfer {
    type Error = AppError;

    fn try_from(row: TransferRow) -> AppResult<Self> {
        Ok(Transfer {
            id: row.id,
            transfer_number: row.transfer_number,
            source_warehouse_id: row.source_warehouse_id,
            target_warehouse_id: row.target_warehouse_id,
            status: row.status.parse().map_err(corrupt_row)?,
            notes: row.notes,
            initiated_by: row.initiated_by,
            initiated_at: row.initiated_at,
            courier_name: row.courier_name,
            tracking_number: row.tracking_number,
            dispatched_at: row.dispatched_at,
            received_by: row.received_by,
            received_at: row.received_at,
            receipt_notes: row.receipt_notes,
            return_courier_name: row.return_courier_name,
            return_tracking_number: row.return_tracking_number,
            return_dispatched_at: row.return_dispatched_at,
            cancellation_notes: row.cancellation_notes,
            cancelled_at: row.cancelled_at,
        })
    }
}

#[derive(Debug, FromRow)]
pub struct TransferItemRow {
    pub id: Uuid,
    pub transfer_id: Uuid,
    pub product_id: Uuid,
    pub batch_number: Option<String>,
    pub expiry_date: Option<NaiveDate>,
    pub unit_price: Decimal,
    pub currency: String,
    pub quantity_sent: i64,
    pub quantity_received: i64,
    pub quantity_rejected: i64,
    pub quantity_disposed: i64,
    pub quantity_returned: i64,
    pub status: String,
    pub rejection_reason: Option<String>,
    pub disposal_reason: Option<String>,
    pub condition_notes: Option<String>,
}

impl TryFrom<TransferItemRow> for TransferItem {
    type Error = AppError;

    fn try_from(row: TransferItemRow) -> AppResult<Self> {
        Ok(TransferItem {
            id: row.id,
            transfer_id: row.transfer_id,
            product_id: row.product_id,
            batch_number: row.batch_number,
            expiry_date: row.expiry_date,
            unit_price: row.unit_price,
            currency: row.currency,
            quantity_sent: row.quantity_sent,
            quantity_received: row.quantity_received,
            quantity_rejected: row.quantity_rejected,
            quantity_disposed: row.quantity_disposed,
            quantity_returned: row.quantity_returned,
            status: row.status.parse().map_err(corrupt_row)?,
            rejection_reason: row.rejection_reason,
            disposal_reason: row.disposal_reason,
            condition_notes: row.condition_notes,
        })
    }
}

#[derive(Debug, FromRow)]
pub struct TransferLogRow {
    pub id: Uuid,
    pub transfer_id: Uuid,
    pub item_id: Option<Uuid>,
    pub action: String,
    pub actor_id: Uuid,
    pub previous_status: Option<String>,
    pub new_status: Option<String>,
    pub details: serde_json::Value,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<TransferLogRow> for TransferLog {
    type Error = AppError;

    fn try_from(row: TransferLogRow) -> AppResult<Self> {
        Ok(TransferLog {
            id: row.id,
            transfer_id: row.transfer_id,
            item_id: row.item_id,
            action: row.action.parse().map_err(corrupt_row)?,
            actor_id: row.actor_id,
            previous_status: row.previous_status,
            new_status: row.new_status,
            details: row.details,
            notes: row.notes,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, FromRow)]
pub struct LedgerRow {
    pub id: Uuid,
    pub warehouse_id: Uuid,
    pub product_id: Uuid,
    pub direction: String,
    pub quantity: i64,
    pub batch_number: Option<String>,
    pub expiry_date: Option<NaiveDate>,
    pub unit_price: Option<Decimal>,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<LedgerRow> for LedgerEntry {
    type Error = AppError;

    fn try_from(row: LedgerRow) -> AppResult<Self> {
        let direction = LedgerDirection::from_str(&row.direction).ok_or_else(|| {
            AppError::Internal(format!("unknown ledger direction '{}'", row.direction))
        })?;

        Ok(LedgerEntry {
            id: row.id,
            warehouse_id: row.warehouse_id,
            product_id: row.product_id,
            direction,
            quantity: row.quantity,
            batch_number: row.batch_number,
            expiry_date: row.expiry_date,
            unit_price: row.unit_price,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, FromRow)]
pub struct InventoryItemRow {
    pub id: Uuid,
    pub product_id: Uuid,
    pub warehouse_id: Uuid,
    pub quantity: i64,
    pub updated_at: DateTime<Utc>,
}

impl From<InventoryItemRow> for InventoryItem {
    fn from(row: InventoryItemRow) -> Self {
        InventoryItem {
            id: row.id,
            product_id: row.product_id,
            warehouse_id: row.warehouse_id,
            quantity: row.quantity,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, FromRow)]
pub struct ReservationRow {
    pub product_id: Uuid,
    pub batch_number: Option<String>,
    pub quantity: i64,
}

impl From<ReservationRow> for Reservation {
    fn from(row: ReservationRow) -> Self {
        Reservation {
            product_id: row.product_id,
            batch_number: row.batch_number,
            quantity: row.quantity,
        }
    }
}

/// Convert a list of rows, failing on the first row that does not decode
pub fn convert_rows<R, T>(rows: Vec<R>) -> AppResult<Vec<T>>
where
    T: TryFrom<R, Error = AppError>,
{
    rows.into_iter().map(T::try_from).collect()
}

fn corrupt_row(err: UnknownStatus) -> AppError {
    AppError::Internal(format!("corrupt row: {}", err))
}
