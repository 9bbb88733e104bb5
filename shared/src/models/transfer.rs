//! Inter-warehouse transfer models and the transfer state machine

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::TransferLog;
use crate::types::Quantity;

/// Lifecycle status of a transfer
///
/// ```text
/// initiated -> in_transit -> received | partial_received | rejected -> returned
/// initiated | in_transit -> cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferStatus {
    Initiated,
    InTransit,
    Received,
    PartialReceived,
    Rejected,
    Returned,
    Cancelled,
}

impl TransferStatus {
    pub const ALL: [TransferStatus; 7] = [
        TransferStatus::Initiated,
        TransferStatus::InTransit,
        TransferStatus::Received,
        TransferStatus::PartialReceived,
        TransferStatus::Rejected,
        TransferStatus::Returned,
        TransferStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TransferStatus::Initiated => "initiated",
            TransferStatus::InTransit => "in_transit",
            TransferStatus::Received => "received",
            TransferStatus::PartialReceived => "partial_received",
            TransferStatus::Rejected => "rejected",
            TransferStatus::Returned => "returned",
            TransferStatus::Cancelled => "cancelled",
        }
    }

    /// The single transition table for transfers.
    pub fn can_transition_to(&self, next: TransferStatus) -> bool {
        use TransferStatus::*;

        matches!(
            (self, next),
            (Initiated, InTransit)
                | (Initiated, Cancelled)
                | (InTransit, Received)
                | (InTransit, PartialReceived)
                | (InTransit, Rejected)
                | (InTransit, Cancelled)
                | (Received, Returned)
                | (PartialReceived, Returned)
                | (Rejected, Returned)
        )
    }

    /// Whether a transfer in this status holds stock at its source warehouse
    pub fn is_reserving(&self) -> bool {
        matches!(self, TransferStatus::Initiated | TransferStatus::InTransit)
    }

    /// Statuses that hold a reservation, as stored in the database
    pub fn reserving_labels() -> Vec<String> {
        Self::ALL
            .iter()
            .filter(|s| s.is_reserving())
            .map(|s| s.as_str().to_string())
            .collect()
    }

    pub fn is_terminal(&self) -> bool {
        !Self::ALL.iter().any(|next| self.can_transition_to(*next))
    }
}

impl fmt::Display for TransferStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransferStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| UnknownStatus(s.to_string()))
    }
}

/// Outcome classification of a single transfer line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    Pending,
    Accepted,
    PartialAccepted,
    Rejected,
    Disposed,
    Returned,
}

impl ItemStatus {
    pub const ALL: [ItemStatus; 6] = [
        ItemStatus::Pending,
        ItemStatus::Accepted,
        ItemStatus::PartialAccepted,
        ItemStatus::Rejected,
        ItemStatus::Disposed,
        ItemStatus::Returned,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ItemStatus::Pending => "pending",
            ItemStatus::Accepted => "accepted",
            ItemStatus::PartialAccepted => "partial_accepted",
            ItemStatus::Rejected => "rejected",
            ItemStatus::Disposed => "disposed",
            ItemStatus::Returned => "returned",
        }
    }
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ItemStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| UnknownStatus(s.to_string()))
    }
}

/// A status label read from storage that no enum variant matches
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown status '{0}'")]
pub struct UnknownStatus(pub String);

/// One physical shipment between two warehouses
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transfer {
    pub id: Uuid,
    /// Human-readable number (e.g., "TRF-2024-00042")
    pub transfer_number: String,
    pub source_warehouse_id: Uuid,
    pub target_warehouse_id: Uuid,
    pub status: TransferStatus,
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

/// One product line within a transfer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferItem {
    pub id: Uuid,
    pub transfer_id: Uuid,
    pub product_id: Uuid,
    pub batch_number: Option<String>,
    pub expiry_date: Option<NaiveDate>,
    pub unit_price: Decimal,
    pub currency: String,
    pub quantity_sent: Quantity,
    pub quantity_received: Quantity,
    pub quantity_rejected: Quantity,
    pub quantity_disposed: Quantity,
    pub quantity_returned: Quantity,
    pub status: ItemStatus,
    pub rejection_reason: Option<String>,
    pub disposal_reason: Option<String>,
    pub condition_notes: Option<String>,
}

/// Aggregate quantities across the lines of a transfer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferTotals {
    pub sent: Quantity,
    pub received: Quantity,
    pub rejected: Quantity,
    pub disposed: Quantity,
    pub returned: Quantity,
}

impl TransferTotals {
    pub fn from_items<'a>(items: impl IntoIterator<Item = &'a TransferItem>) -> Self {
        items.into_iter().fold(Self::default(), |acc, item| Self {
            sent: acc.sent + item.quantity_sent,
            received: acc.received + item.quantity_received,
            rejected: acc.rejected + item.quantity_rejected,
            disposed: acc.disposed + item.quantity_disposed,
            returned: acc.returned + item.quantity_returned,
        })
    }
}

/// Transfer with its lines, audit trail and computed totals
#[derive(Debug, Clone, Serialize)]
pub struct TransferDetail {
    #[serde(flatten)]
    pub transfer: Transfer,
    pub items: Vec<TransferItem>,
    pub logs: Vec<TransferLog>,
    pub totals: TransferTotals,
}

/// Generate a transfer number
pub fn generate_transfer_number(prefix: &str, year: i32, sequence: i64) -> String {
    format!("{}-{}-{:05}", prefix, year, sequence)
}
