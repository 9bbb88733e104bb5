//! Validation rules for transfers
//!
//! These checks are pure so the backend can run them before touching the
//! database and the same rules can be exercised in tests.

use std::collections::BTreeMap;

use thiserror::Error;
use uuid::Uuid;

use crate::models::TransferItem;
use crate::receipt::ItemOutcome;
use crate::types::{Quantity, StockKey, MAX_LINE_QUANTITY};

/// A transfer rule was violated by the caller's input
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransferRuleError {
    #[error("Source and target warehouse must differ")]
    SameWarehouse,

    #[error("A transfer needs at least one item")]
    NoItems,

    #[error("Quantity sent must be positive, got {0}")]
    NonPositiveQuantity(Quantity),

    #[error("Quantity sent ({requested}) exceeds the per-line limit of {max}")]
    QuantityTooLarge { requested: Quantity, max: Quantity },

    #[error("Requested quantities for product {product_id} cannot be added up")]
    QuantityOverflow { product_id: Uuid },

    #[error("Batch number cannot be blank")]
    BlankBatchNumber,

    #[error("Quantity '{field}' cannot be negative")]
    NegativeQuantity { field: &'static str },

    #[error("Received, rejected and disposed ({accounted}) exceed quantity sent ({sent})")]
    OverAccounted { accounted: Quantity, sent: Quantity },

    #[error("Quantity returned ({returned}) exceeds quantity rejected ({rejected})")]
    OverReturned { returned: Quantity, rejected: Quantity },

    #[error("Requested {requested} of product {product_id} but only {available} available")]
    InsufficientStock {
        product_id: Uuid,
        batch_number: Option<String>,
        requested: Quantity,
        available: Quantity,
    },

    #[error("Item {0} is not part of this transfer")]
    UnknownItem(Uuid),

    #[error("Item {0} reported more than once")]
    DuplicateItem(Uuid),

    #[error("No rejected items to return")]
    NothingToReturn,
}

impl TransferRuleError {
    /// Input field the violation refers to
    pub fn field(&self) -> &'static str {
        match self {
            TransferRuleError::SameWarehouse => "target_warehouse_id",
            TransferRuleError::NoItems => "items",
            TransferRuleError::NonPositiveQuantity(_) => "quantity_sent",
            TransferRuleError::QuantityTooLarge { .. } => "quantity_sent",
            TransferRuleError::QuantityOverflow { .. } => "quantity_sent",
            TransferRuleError::BlankBatchNumber => "batch_number",
            TransferRuleError::NegativeQuantity { field } => *field,
            TransferRuleError::OverAccounted { .. } => "quantity_received",
            TransferRuleError::OverReturned { .. } => "quantity_returned",
            TransferRuleError::InsufficientStock { .. } => "quantity_sent",
            TransferRuleError::UnknownItem(_) => "item_id",
            TransferRuleError::DuplicateItem(_) => "items",
            TransferRuleError::NothingToReturn => "items",
        }
    }
}

/// Validate the header and lines of a new transfer
pub fn validate_new_transfer(
    source_warehouse_id: Uuid,
    target_warehouse_id: Uuid,
    quantities: &[Quantity],
) -> Result<(), TransferRuleError> {
    if source_warehouse_id == target_warehouse_id {
        return Err(TransferRuleError::SameWarehouse);
    }
    if quantities.is_empty() {
        return Err(TransferRuleError::NoItems);
    }
    if let Some(bad) = quantities.iter().find(|q| **q <= 0) {
        return Err(TransferRuleError::NonPositiveQuantity(*bad));
    }
    if let Some(big) = quantities.iter().find(|q| **q > MAX_LINE_QUANTITY) {
        return Err(TransferRuleError::QuantityTooLarge {
            requested: *big,
            max: MAX_LINE_QUANTITY,
        });
    }
    Ok(())
}

/// Sum requested quantities per stock key at the source warehouse.
///
/// Lines naming the same (product, batch) are added together. A blank batch
/// number is refused rather than being confused with untagged stock.
pub fn requested_by_key<'a>(
    source_warehouse_id: Uuid,
    lines: impl IntoIterator<Item = (Uuid, Option<&'a str>, Quantity)>,
) -> Result<BTreeMap<StockKey, Quantity>, TransferRuleError> {
    let mut requested: BTreeMap<StockKey, Quantity> = BTreeMap::new();

    for (product_id, batch_number, quantity) in lines {
        if batch_number.is_some_and(|b| b.trim().is_empty()) {
            return Err(TransferRuleError::BlankBatchNumber);
        }
        let key = StockKey::new(source_warehouse_id, product_id, batch_number.map(str::to_string));
        let total = requested.entry(key).or_default();
        *total = total
            .checked_add(quantity)
            .ok_or(TransferRuleError::QuantityOverflow { product_id })?;
    }

    Ok(requested)
}

/// Validate the receiver's report for one line
pub fn validate_item_outcome(
    quantity_sent: Quantity,
    outcome: &ItemOutcome,
) -> Result<(), TransferRuleError> {
    for (field, value) in [
        ("quantity_received", outcome.received),
        ("quantity_rejected", outcome.rejected),
        ("quantity_disposed", outcome.disposed),
    ] {
        if value < 0 {
            return Err(TransferRuleError::NegativeQuantity { field });
        }
    }
    match outcome.accounted() {
        Some(accounted) if accounted <= quantity_sent => Ok(()),
        accounted => Err(TransferRuleError::OverAccounted {
            accounted: accounted.unwrap_or(Quantity::MAX),
            sent: quantity_sent,
        }),
    }
}

/// Check both quantity invariants of a stored line
pub fn validate_item_invariants(item: &TransferItem) -> Result<(), TransferRuleError> {
    let outcome = ItemOutcome {
        received: item.quantity_received,
        rejected: item.quantity_rejected,
        disposed: item.quantity_disposed,
    };
    validate_item_outcome(item.quantity_sent, &outcome)?;

    if item.quantity_returned < 0 {
        return Err(TransferRuleError::NegativeQuantity {
            field: "quantity_returned",
        });
    }
    if item.quantity_returned > item.quantity_rejected {
        return Err(TransferRuleError::OverReturned {
            returned: item.quantity_returned,
            rejected: item.quantity_rejected,
        });
    }
    Ok(())
}

/// Check a requested quantity against what is available for its key
pub fn check_stock(
    product_id: Uuid,
    batch_number: Option<&str>,
    requested: Quantity,
    available: Quantity,
) -> Result<(), TransferRuleError> {
    if requested > available {
        return Err(TransferRuleError::InsufficientStock {
            product_id,
            batch_number: batch_number.map(str::to_string),
            requested,
            available,
        });
    }
    Ok(())
}
