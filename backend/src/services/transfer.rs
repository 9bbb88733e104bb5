//! Inter-warehouse transfer lifecycle
//!
//! Every state-changing operation runs in a single database transaction that
//! locks the transfer row first, checks the move against
//! [`TransferStatus::can_transition_to`], and only then writes. A failure at
//! any point drops the transaction and nothing becomes visible.

use std::collections::BTreeSet;

use chrono::{Datelike, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;
use shared::receipt::{apply_receipt, select_returns, ItemReceipt};
use shared::types::{Quantity, StockKey, DEFAULT_CURRENCY};
use shared::validation::{check_stock, requested_by_key, validate_new_transfer, TransferRuleError};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;
use validator::Validate;

use crate::config::TransferSettings;
use crate::error::{AppError, AppResult};
use crate::middleware::AuthUser;
use crate::models::{
    convert_rows, generate_transfer_number, ItemStatus, Transfer, TransferAction, TransferDetail,
    TransferItem, TransferItemRow, TransferRow, TransferStatus, TransferTotals,
    TRANSFER_COLUMNS, TRANSFER_ITEM_COLUMNS,
};
use crate::services::audit::{ActivityEntry, ActivityLog, AuditLogWriter, NewTransferLog};
use crate::services::availability::{ensure_warehouse, AvailabilityService};
use crate::services::reconciler::InventoryReconciler;

/// Transfer service driving the transfer state machine
#[derive(Clone)]
pub struct TransferService {
    db: PgPool,
    settings: TransferSettings,
}

/// Input for initiating a transfer
#[derive(Debug, Deserialize, Validate)]
pub struct InitiateTransferInput {
    pub source_warehouse_id: Uuid,
    pub target_warehouse_id: Uuid,
    #[validate]
    pub items: Vec<TransferItemInput>,
    #[validate(length(max = 200))]
    pub courier_name: Option<String>,
    pub notes: Option<String>,
}

/// One line of a new transfer
#[derive(Debug, Deserialize, Validate)]
pub struct TransferItemInput {
    pub product_id: Uuid,
    #[validate(length(min = 1, max = 100))]
    pub batch_number: Option<String>,
    pub expiry_date: Option<NaiveDate>,
    pub unit_price: Option<Decimal>,
    #[validate(length(equal = 3, message = "Currency must be a 3-letter code"))]
    pub currency: Option<String>,
    pub quantity_sent: Quantity,
}

/// Input for dispatching a transfer
#[derive(Debug, Default, Deserialize, Validate)]
pub struct DispatchTransferInput {
    #[validate(length(max = 200))]
    pub courier_name: Option<String>,
    #[validate(length(max = 200))]
    pub tracking_number: Option<String>,
}

/// Input for receiving a transfer
#[derive(Debug, Deserialize)]
pub struct ReceiveTransferInput {
    pub items: Vec<ItemReceipt>,
    pub receipt_notes: Option<String>,
}

/// Input for cancelling a transfer
#[derive(Debug, Deserialize, Validate)]
pub struct CancelTransferInput {
    #[validate(length(min = 1, message = "A cancellation reason is required"))]
    pub reason: String,
}

/// Input for sending rejected lines back to the source warehouse
#[derive(Debug, Default, Deserialize, Validate)]
pub struct InitiateReturnInput {
    #[validate(length(max = 200))]
    pub courier_name: Option<String>,
    #[validate(length(max = 200))]
    pub tracking_number: Option<String>,
}

/// Filter for listing transfers
#[derive(Debug, Default, Deserialize)]
pub struct TransferFilter {
    pub status: Option<TransferStatus>,
    /// Matches either the source or the target warehouse
    pub warehouse_id: Option<Uuid>,
}

impl TransferService {
    /// Create a new TransferService instance
    pub fn new(db: PgPool, settings: TransferSettings) -> Self {
        Self { db, settings }
    }

    /// List transfers, newest first
    pub async fn list_transfers(&self, filter: TransferFilter) -> AppResult<Vec<Transfer>> {
        let rows = sqlx::query_as::<_, TransferRow>(&format!(
            r#"
            SELECT {}
            FROM transfers
            WHERE ($1::text IS NULL OR status = $1)
              AND ($2::uuid IS NULL OR source_warehouse_id = $2 OR target_warehouse_id = $2)
            ORDER BY initiated_at DESC
            "#,
            TRANSFER_COLUMNS
        ))
        .bind(filter.status.map(|s| s.as_str()))
        .bind(filter.warehouse_id)
        .fetch_all(&self.db)
        .await?;

        convert_rows(rows)
    }

    /// Get a transfer with its lines, audit trail and totals
    pub async fn get_transfer_detail(&self, transfer_id: Uuid) -> AppResult<TransferDetail> {
        let mut conn = self.db.acquire().await?;

        let row = sqlx::query_as::<_, TransferRow>(&format!(
            "SELECT {} FROM transfers WHERE id = $1",
            TRANSFER_COLUMNS
        ))
        .bind(transfer_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::NotFound("Transfer".to_string()))?;

        let transfer = Transfer::try_from(row)?;
        let items = Self::fetch_items(&mut conn, transfer_id, false).await?;
        let logs = AuditLogWriter::history(&mut conn, transfer_id).await?;
        let totals = TransferTotals::from_items(&items);

        Ok(TransferDetail {
            transfer,
            items,
            logs,
            totals,
        })
    }

    /// Initiate a transfer, reserving its quantities at the source warehouse
    pub async fn initiate_transfer(
        &self,
        user: &AuthUser,
        input: InitiateTransferInput,
    ) -> AppResult<Transfer> {
        let quantities: Vec<Quantity> = input.items.iter().map(|i| i.quantity_sent).collect();
        validate_new_transfer(input.source_warehouse_id, input.target_warehouse_id, &quantities)?;
        input.validate()?;

        let requested = requested_by_key(
            input.source_warehouse_id,
            input
                .items
                .iter()
                .map(|i| (i.product_id, i.batch_number.as_deref(), i.quantity_sent)),
        )?;
        let total_quantity = requested
            .iter()
            .try_fold(0 as Quantity, |acc, (key, q)| {
                acc.checked_add(*q).ok_or(TransferRuleError::QuantityOverflow {
                    product_id: key.product_id,
                })
            })?;

        let mut tx = self.db.begin().await?;

        ensure_warehouse(&mut tx, input.source_warehouse_id, "Source warehouse").await?;
        ensure_warehouse(&mut tx, input.target_warehouse_id, "Target warehouse").await?;
        ensure_products(&mut tx, input.items.iter().map(|i| i.product_id)).await?;

        // Product-level keys are locked too, since generic availability counts
        // batch-tagged lines of the same product.
        let mut lock_keys: BTreeSet<StockKey> = requested.keys().cloned().collect();
        for key in requested.keys() {
            lock_keys.insert(StockKey::new(key.warehouse_id, key.product_id, None));
        }
        for key in &lock_keys {
            acquire_stock_lock(&mut tx, key).await?;
        }

        let snapshot = AvailabilityService::snapshot(&mut tx, input.source_warehouse_id).await?;
        for (key, quantity) in &requested {
            let batch = key.batch_number.as_deref();
            check_stock(key.product_id, batch, *quantity, snapshot.available(key.product_id, batch))?;
        }

        let sequence: i64 = sqlx::query_scalar("SELECT nextval('transfer_number_seq')")
            .fetch_one(&mut *tx)
            .await?;
        let transfer_number =
            generate_transfer_number(&self.settings.number_prefix, Utc::now().year(), sequence);

        let row = sqlx::query_as::<_, TransferRow>(&format!(
            r#"
            INSERT INTO transfers (
                transfer_number, source_warehouse_id, target_warehouse_id, status,
                notes, initiated_by, initiated_at, courier_name
            )
            VALUES ($1, $2, $3, $4, $5, $6, NOW(), $7)
            RETURNING {}
            "#,
            TRANSFER_COLUMNS
        ))
        .bind(&transfer_number)
        .bind(input.source_warehouse_id)
        .bind(input.target_warehouse_id)
        .bind(TransferStatus::Initiated.as_str())
        .bind(&input.notes)
        .bind(user.user_id)
        .bind(&input.courier_name)
        .fetch_one(&mut *tx)
        .await?;
        let transfer = Transfer::try_from(row)?;

        for item in &input.items {
            let reference = item
                .batch_number
                .as_deref()
                .and_then(|batch| snapshot.batch(item.product_id, batch));

            sqlx::query(
                r#"
                INSERT INTO transfer_items (
                    transfer_id, product_id, batch_number, expiry_date, unit_price, currency,
                    quantity_sent, status
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                "#,
            )
            .bind(transfer.id)
            .bind(item.product_id)
            .bind(&item.batch_number)
            .bind(item.expiry_date.or_else(|| reference.and_then(|b| b.expiry_date)))
            .bind(
                item.unit_price
                    .or_else(|| reference.and_then(|b| b.reference_unit_price))
                    .unwrap_or(Decimal::ZERO),
            )
            .bind(item.currency.as_deref().unwrap_or(DEFAULT_CURRENCY))
            .bind(item.quantity_sent)
            .bind(ItemStatus::Pending.as_str())
            .execute(&mut *tx)
            .await?;
        }

        AuditLogWriter::append(
            &mut tx,
            NewTransferLog::new(transfer.id, TransferAction::TransferInitiated, user.user_id)
                .status_change(None, TransferStatus::Initiated.as_str())
                .details(json!({
                    "transfer_number": transfer.transfer_number,
                    "source_warehouse_id": transfer.source_warehouse_id,
                    "target_warehouse_id": transfer.target_warehouse_id,
                    "item_count": input.items.len(),
                    "total_quantity": total_quantity,
                }))
                .notes(input.notes.clone()),
        )
        .await?;

        ActivityLog::record(
            &mut tx,
            ActivityEntry {
                organization_id: user.organization_id,
                user_id: user.user_id,
                action: "create",
                entity_type: "transfer",
                entity_id: transfer.id,
                description: format!(
                    "Initiated transfer {} ({} items)",
                    transfer.transfer_number,
                    input.items.len()
                ),
            },
        )
        .await?;

        tx.commit().await?;

        tracing::info!(
            transfer_id = %transfer.id,
            transfer_number = %transfer.transfer_number,
            items = input.items.len(),
            total_quantity,
            "transfer initiated"
        );

        Ok(transfer)
    }

    /// Hand an initiated transfer to the courier
    pub async fn dispatch_transfer(
        &self,
        user: &AuthUser,
        transfer_id: Uuid,
        input: DispatchTransferInput,
    ) -> AppResult<Transfer> {
        input.validate()?;

        let mut tx = self.db.begin().await?;
        let current = Self::lock_transfer(&mut tx, transfer_id).await?;
        ensure_transition(&current, TransferStatus::InTransit)?;

        let row = sqlx::query_as::<_, TransferRow>(&format!(
            r#"
            UPDATE transfers
            SET status = $1, dispatched_at = NOW(),
                courier_name = COALESCE($2, courier_name),
                tracking_number = COALESCE($3, tracking_number)
            WHERE id = $4
            RETURNING {}
            "#,
            TRANSFER_COLUMNS
        ))
        .bind(TransferStatus::InTransit.as_str())
        .bind(&input.courier_name)
        .bind(&input.tracking_number)
        .bind(transfer_id)
        .fetch_one(&mut *tx)
        .await?;
        let transfer = Transfer::try_from(row)?;

        AuditLogWriter::append(
            &mut tx,
            NewTransferLog::new(transfer_id, TransferAction::TransferDispatched, user.user_id)
                .status_change(Some(current.status.as_str()), transfer.status.as_str())
                .details(json!({
                    "courier_name": transfer.courier_name,
                    "tracking_number": transfer.tracking_number,
                })),
        )
        .await?;

        tx.commit().await?;

        tracing::info!(%transfer_id, transfer_number = %transfer.transfer_number, "transfer dispatched");

        Ok(transfer)
    }

    /// Record the receiver's report and credit accepted stock to the target
    /// warehouse.
    ///
    /// Serialization failures and deadlocks replay the whole transaction up to
    /// the configured number of times.
    pub async fn receive_transfer(
        &self,
        user: &AuthUser,
        transfer_id: Uuid,
        input: ReceiveTransferInput,
    ) -> AppResult<Transfer> {
        let mut attempt: u32 = 0;
        loop {
            match self.try_receive(user, transfer_id, &input).await {
                Err(err) if err.is_retryable() => {
                    if attempt >= self.settings.max_receive_retries {
                        tracing::error!(%transfer_id, attempts = attempt + 1, error = %err, "receive gave up");
                        return Err(AppError::ReconciliationConflict(format!(
                            "transfer {} could not be received after {} attempts",
                            transfer_id,
                            attempt + 1
                        )));
                    }
                    attempt += 1;
                    tracing::warn!(%transfer_id, attempt, error = %err, "receive conflicted, retrying");
                }
                result => return result,
            }
        }
    }

    async fn try_receive(
        &self,
        user: &AuthUser,
        transfer_id: Uuid,
        input: &ReceiveTransferInput,
    ) -> AppResult<Transfer> {
        let mut tx = self.db.begin().await?;
        let current = Self::lock_transfer(&mut tx, transfer_id).await?;
        let mut items = Self::fetch_items(&mut tx, transfer_id, true).await?;

        let summary = apply_receipt(&mut items, &input.items)?;
        let (totals, new_status) = (summary.totals, summary.status);
        ensure_transition(&current, new_status)?;

        for (item, change) in items.iter().zip(&summary.changes) {
            sqlx::query(
                r#"
                UPDATE transfer_items
                SET quantity_received = $1, quantity_rejected = $2, quantity_disposed = $3,
                    status = $4, rejection_reason = $5, disposal_reason = $6, condition_notes = $7
                WHERE id = $8
                "#,
            )
            .bind(item.quantity_received)
            .bind(item.quantity_rejected)
            .bind(item.quantity_disposed)
            .bind(item.status.as_str())
            .bind(&item.rejection_reason)
            .bind(&item.disposal_reason)
            .bind(&item.condition_notes)
            .bind(item.id)
            .execute(&mut *tx)
            .await?;

            if let Some(action) = change.audit_action {
                let notes = match action {
                    TransferAction::ItemDisposed => item.disposal_reason.clone(),
                    _ => item.rejection_reason.clone(),
                };

                AuditLogWriter::append(
                    &mut tx,
                    NewTransferLog::new(transfer_id, action, user.user_id)
                        .item(item.id)
                        .status_change(Some(change.previous_status.as_str()), item.status.as_str())
                        .details(json!({
                            "product_id": item.product_id,
                            "batch_number": item.batch_number,
                            "quantity_sent": item.quantity_sent,
                            "quantity_received": item.quantity_received,
                            "quantity_rejected": item.quantity_rejected,
                            "quantity_disposed": item.quantity_disposed,
                            "rejection_reason": item.rejection_reason,
                            "disposal_reason": item.disposal_reason,
                            "condition_notes": item.condition_notes,
                        }))
                        .notes(notes),
                )
                .await?;
            }
        }

        let row = sqlx::query_as::<_, TransferRow>(&format!(
            r#"
            UPDATE transfers
            SET status = $1, received_by = $2, received_at = NOW(), receipt_notes = $3
            WHERE id = $4
            RETURNING {}
            "#,
            TRANSFER_COLUMNS
        ))
        .bind(new_status.as_str())
        .bind(user.user_id)
        .bind(&input.receipt_notes)
        .bind(transfer_id)
        .fetch_one(&mut *tx)
        .await?;
        let transfer = Transfer::try_from(row)?;

        AuditLogWriter::append(
            &mut tx,
            NewTransferLog::new(transfer_id, TransferAction::TransferReceived, user.user_id)
                .status_change(Some(current.status.as_str()), new_status.as_str())
                .details(json!({
                    "total_sent": totals.sent,
                    "total_received": totals.received,
                    "total_rejected": totals.rejected,
                    "total_disposed": totals.disposed,
                }))
                .notes(input.receipt_notes.clone()),
        )
        .await?;

        // Items are ordered by product, so concurrent receipts lock stock rows
        // in the same order.
        for item in items.iter().filter(|i| i.quantity_received > 0) {
            InventoryReconciler::credit(
                &mut tx,
                transfer.target_warehouse_id,
                item.product_id,
                item.quantity_received,
            )
            .await?;
        }

        tx.commit().await?;

        tracing::info!(
            %transfer_id,
            transfer_number = %transfer.transfer_number,
            status = %new_status,
            received = totals.received,
            rejected = totals.rejected,
            disposed = totals.disposed,
            "transfer received"
        );

        Ok(transfer)
    }

    /// Cancel an in-flight transfer, releasing its reservation
    pub async fn cancel_transfer(
        &self,
        user: &AuthUser,
        transfer_id: Uuid,
        input: CancelTransferInput,
    ) -> AppResult<Transfer> {
        input.validate()?;
        if input.reason.trim().is_empty() {
            return Err(AppError::Validation {
                field: "reason".to_string(),
                message: "A cancellation reason is required".to_string(),
            });
        }

        let mut tx = self.db.begin().await?;
        let current = Self::lock_transfer(&mut tx, transfer_id).await?;
        ensure_transition(&current, TransferStatus::Cancelled)?;

        let row = sqlx::query_as::<_, TransferRow>(&format!(
            r#"
            UPDATE transfers
            SET status = $1, cancellation_notes = $2, cancelled_at = NOW()
            WHERE id = $3
            RETURNING {}
            "#,
            TRANSFER_COLUMNS
        ))
        .bind(TransferStatus::Cancelled.as_str())
        .bind(&input.reason)
        .bind(transfer_id)
        .fetch_one(&mut *tx)
        .await?;
        let transfer = Transfer::try_from(row)?;

        AuditLogWriter::append(
            &mut tx,
            NewTransferLog::new(transfer_id, TransferAction::TransferCancelled, user.user_id)
                .status_change(Some(current.status.as_str()), transfer.status.as_str())
                .details(json!({ "reason": input.reason }))
                .notes(Some(input.reason.clone())),
        )
        .await?;

        tx.commit().await?;

        tracing::info!(
            %transfer_id,
            transfer_number = %transfer.transfer_number,
            previous = %current.status,
            "transfer cancelled"
        );

        Ok(transfer)
    }

    /// Send rejected lines back to the source warehouse
    pub async fn initiate_return(
        &self,
        user: &AuthUser,
        transfer_id: Uuid,
        input: InitiateReturnInput,
    ) -> AppResult<Transfer> {
        input.validate()?;

        let mut tx = self.db.begin().await?;
        let current = Self::lock_transfer(&mut tx, transfer_id).await?;
        ensure_transition(&current, TransferStatus::Returned)?;

        let mut items = Self::fetch_items(&mut tx, transfer_id, true).await?;
        let returned = select_returns(&mut items)?;

        let mut total_returned: Quantity = 0;
        for item in items.iter().filter(|i| returned.contains(&i.id)) {
            sqlx::query(
                r#"
                UPDATE transfer_items
                SET status = $1, quantity_returned = $2
                WHERE id = $3
                "#,
            )
            .bind(item.status.as_str())
            .bind(item.quantity_returned)
            .bind(item.id)
            .execute(&mut *tx)
            .await?;

            total_returned += item.quantity_returned;
        }

        let row = sqlx::query_as::<_, TransferRow>(&format!(
            r#"
            UPDATE transfers
            SET status = $1, return_dispatched_at = NOW(),
                return_courier_name = $2, return_tracking_number = $3
            WHERE id = $4
            RETURNING {}
            "#,
            TRANSFER_COLUMNS
        ))
        .bind(TransferStatus::Returned.as_str())
        .bind(&input.courier_name)
        .bind(&input.tracking_number)
        .bind(transfer_id)
        .fetch_one(&mut *tx)
        .await?;
        let transfer = Transfer::try_from(row)?;

        AuditLogWriter::append(
            &mut tx,
            NewTransferLog::new(transfer_id, TransferAction::ReturnInitiated, user.user_id)
                .status_change(Some(current.status.as_str()), transfer.status.as_str())
                .details(json!({
                    "returned_items": returned,
                    "total_returned": total_returned,
                    "courier_name": input.courier_name,
                    "tracking_number": input.tracking_number,
                })),
        )
        .await?;

        tx.commit().await?;

        tracing::info!(
            %transfer_id,
            transfer_number = %transfer.transfer_number,
            items = returned.len(),
            total_returned,
            "return initiated"
        );

        Ok(transfer)
    }

    /// Load a transfer and hold its row lock for the rest of the transaction
    async fn lock_transfer(conn: &mut PgConnection, transfer_id: Uuid) -> AppResult<Transfer> {
        let row = sqlx::query_as::<_, TransferRow>(&format!(
            "SELECT {} FROM transfers WHERE id = $1 FOR UPDATE",
            TRANSFER_COLUMNS
        ))
        .bind(transfer_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::NotFound("Transfer".to_string()))?;

        Transfer::try_from(row)
    }

    async fn fetch_items(
        conn: &mut PgConnection,
        transfer_id: Uuid,
        for_update: bool,
    ) -> AppResult<Vec<TransferItem>> {
        let rows = sqlx::query_as::<_, TransferItemRow>(&format!(
            "SELECT {} FROM transfer_items WHERE transfer_id = $1 ORDER BY product_id, id{}",
            TRANSFER_ITEM_COLUMNS,
            if for_update { " FOR UPDATE" } else { "" }
        ))
        .bind(transfer_id)
        .fetch_all(&mut *conn)
        .await?;

        convert_rows(rows)
    }
}

/// Reject a move the transfer state machine does not allow
fn ensure_transition(transfer: &Transfer, next: TransferStatus) -> AppResult<()> {
    if transfer.status.can_transition_to(next) {
        Ok(())
    } else {
        Err(AppError::InvalidStateTransition(format!(
            "transfer {} cannot move from {} to {}",
            transfer.transfer_number, transfer.status, next
        )))
    }
}

/// Transaction-scoped advisory lock on a stock key
async fn acquire_stock_lock(conn: &mut PgConnection, key: &StockKey) -> AppResult<()> {
    sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
        .bind(key.lock_key())
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Fail with NotFound naming the first product that does not exist
async fn ensure_products(
    conn: &mut PgConnection,
    product_ids: impl Iterator<Item = Uuid>,
) -> AppResult<()> {
    let wanted: BTreeSet<Uuid> = product_ids.collect();
    let ids: Vec<Uuid> = wanted.iter().copied().collect();

    let found: BTreeSet<Uuid> = sqlx::query_scalar::<_, Uuid>("SELECT id FROM products WHERE id = ANY($1)")
        .bind(ids)
        .fetch_all(&mut *conn)
        .await?
        .into_iter()
        .collect();

    match wanted.difference(&found).next() {
        Some(missing) => Err(AppError::NotFound(format!("Product {}", missing))),
        None => Ok(()),
    }
}
