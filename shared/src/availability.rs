//! Stock availability derived from the ledger, on-hand stock and reservations
//!
//! Availability is recomputed on every call and never cached. Reservations are
//! the lines of outgoing transfers whose status is still reserving (see
//! [`TransferStatus::is_reserving`](crate::models::TransferStatus::is_reserving));
//! callers are expected to supply only those.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::models::{
    BatchAvailability, InventoryItem, LedgerDirection, LedgerEntry, ProductAvailability,
    Reservation,
};
use crate::types::Quantity;

/// Running totals for one (batch, product) key
#[derive(Debug, Default)]
struct BatchAccumulator {
    inbound: Quantity,
    outbound: Quantity,
    reserved: Quantity,
    expiry_date: Option<NaiveDate>,
    /// Latest inbound price and when it was recorded
    unit_price: Option<(DateTime<Utc>, Decimal)>,
}

/// Per-batch availability for one warehouse.
///
/// Only ledger entries tagged with a batch number take part. The expiry date is
/// the earliest one seen on an inbound entry and the reference price is the
/// most recent inbound unit price. Keys that end up non-positive are dropped.
pub fn batch_availability(
    entries: &[LedgerEntry],
    reservations: &[Reservation],
) -> Vec<BatchAvailability> {
    let mut totals: BTreeMap<(String, Uuid), BatchAccumulator> = BTreeMap::new();

    for entry in entries {
        let Some(batch) = entry.batch_number.as_ref() else {
            continue;
        };
        let acc = totals.entry((batch.clone(), entry.product_id)).or_default();

        match entry.direction {
            LedgerDirection::In => {
                acc.inbound += entry.quantity;
                acc.expiry_date = match (acc.expiry_date, entry.expiry_date) {
                    (Some(current), Some(new)) => Some(current.min(new)),
                    (current, new) => current.or(new),
                };
                if let Some(price) = entry.unit_price {
                    let newer = acc
                        .unit_price
                        .map_or(true, |(seen_at, _)| entry.created_at >= seen_at);
                    if newer {
                        acc.unit_price = Some((entry.created_at, price));
                    }
                }
            }
            LedgerDirection::Out => acc.outbound += entry.quantity,
        }
    }

    for reservation in reservations {
        let Some(batch) = reservation.batch_number.as_ref() else {
            continue;
        };
        if let Some(acc) = totals.get_mut(&(batch.clone(), reservation.product_id)) {
            acc.reserved += reservation.quantity;
        }
    }

    totals
        .into_iter()
        .filter_map(|((batch_number, product_id), acc)| {
            let available = acc.inbound - acc.outbound - acc.reserved;
            (available > 0).then(|| BatchAvailability {
                batch_number,
                product_id,
                available_quantity: available,
                expiry_date: acc.expiry_date,
                reference_unit_price: acc.unit_price.map(|(_, price)| price),
            })
        })
        .collect()
}

/// Per-product availability of generic stock for one warehouse.
///
/// Every in-flight line of a product counts against its on-hand quantity,
/// batch-tagged or not. Results are floored at zero and zero entries dropped.
pub fn product_availability(
    stock: &[InventoryItem],
    reservations: &[Reservation],
) -> Vec<ProductAvailability> {
    let mut reserved: HashMap<Uuid, Quantity> = HashMap::new();
    for reservation in reservations {
        *reserved.entry(reservation.product_id).or_default() += reservation.quantity;
    }

    let mut on_hand: BTreeMap<Uuid, Quantity> = BTreeMap::new();
    for item in stock {
        *on_hand.entry(item.product_id).or_default() += item.quantity;
    }

    on_hand
        .into_iter()
        .filter_map(|(product_id, on_hand_quantity)| {
            let reserved_quantity = reserved.get(&product_id).copied().unwrap_or(0);
            let available = (on_hand_quantity - reserved_quantity).max(0);
            (available > 0).then_some(ProductAvailability {
                product_id,
                on_hand_quantity,
                reserved_quantity,
                available_quantity: available,
            })
        })
        .collect()
}

/// Available quantity for one product line, batch-tagged or not
pub fn available_for(
    batches: &[BatchAvailability],
    products: &[ProductAvailability],
    product_id: Uuid,
    batch_number: Option<&str>,
) -> Quantity {
    match batch_number {
        Some(batch) => batches
            .iter()
            .find(|b| b.product_id == product_id && b.batch_number == batch)
            .map_or(0, |b| b.available_quantity),
        None => products
            .iter()
            .find(|p| p.product_id == product_id)
            .map_or(0, |p| p.available_quantity),
    }
}
