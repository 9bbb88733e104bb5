//! Warehouse stock models

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::Quantity;

/// Direction of a ledger entry relative to its warehouse
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LedgerDirection {
    In,
    Out,
}

impl LedgerDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            LedgerDirection::In => "in",
            LedgerDirection::Out => "out",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "in" => Some(LedgerDirection::In),
            "out" => Some(LedgerDirection::Out),
            _ => None,
        }
    }
}

/// Immutable record of stock entering or leaving a warehouse
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: Uuid,
    pub warehouse_id: Uuid,
    pub product_id: Uuid,
    pub direction: LedgerDirection,
    pub quantity: Quantity,
    pub batch_number: Option<String>,
    pub expiry_date: Option<NaiveDate>,
    pub unit_price: Option<Decimal>,
    pub created_at: DateTime<Utc>,
}

/// On-hand stock of a product at a warehouse
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryItem {
    pub id: Uuid,
    pub product_id: Uuid,
    pub warehouse_id: Uuid,
    pub quantity: Quantity,
    pub updated_at: DateTime<Utc>,
}

/// Quantity held by one line of an in-flight outgoing transfer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    pub product_id: Uuid,
    pub batch_number: Option<String>,
    pub quantity: Quantity,
}

/// Batch-tracked stock that can be put on a new transfer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchAvailability {
    pub batch_number: String,
    pub product_id: Uuid,
    pub available_quantity: Quantity,
    pub expiry_date: Option<NaiveDate>,
    pub reference_unit_price: Option<Decimal>,
}

/// Generic stock of a product that can be put on a new transfer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductAvailability {
    pub product_id: Uuid,
    pub on_hand_quantity: Quantity,
    pub reserved_quantity: Quantity,
    pub available_quantity: Quantity,
}
