//! Availability and reservation tests
//!
//! Tests for stock availability including:
//! - Reservations held by in-flight transfers
//! - Release of stock on cancellation and after receipt
//! - No overselling across sequential transfer requests
//! - Stock lock key ordering

use chrono::Utc;
use proptest::prelude::*;
use shared::availability::{available_for, batch_availability, product_availability};
use shared::models::{
    InventoryItem, LedgerDirection, LedgerEntry, Reservation, TransferStatus,
};
use shared::validation::{check_stock, TransferRuleError};
use shared::{Quantity, StockKey};
use uuid::Uuid;

fn inbound(warehouse_id: Uuid, product_id: Uuid, batch: &str, quantity: Quantity) -> LedgerEntry {
    LedgerEntry {
        id: Uuid::new_v4(),
        warehouse_id,
        product_id,
        direction: LedgerDirection::In,
        quantity,
        batch_number: Some(batch.to_string()),
        expiry_date: None,
        unit_price: None,
        created_at: Utc::now(),
    }
}

fn on_hand(warehouse_id: Uuid, product_id: Uuid, quantity: Quantity) -> InventoryItem {
    InventoryItem {
        id: Uuid::new_v4(),
        product_id,
        warehouse_id,
        quantity,
        updated_at: Utc::now(),
    }
}

/// An outgoing transfer line together with the status of its transfer
struct OutgoingLine {
    status: TransferStatus,
    product_id: Uuid,
    batch_number: Option<String>,
    quantity: Quantity,
}

/// Test rows standing in for the ledger query, filtered by the same status
/// labels the query binds
fn reservations(lines: &[OutgoingLine]) -> Vec<Reservation> {
    let labels = TransferStatus::reserving_labels();
    lines
        .iter()
        .filter(|l| labels.iter().any(|label| label == l.status.as_str()))
        .map(|l| Reservation {
            product_id: l.product_id,
            batch_number: l.batch_number.clone(),
            quantity: l.quantity,
        })
        .collect()
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;

    /// 100 on hand, 40 on an initiated transfer
    #[test]
    fn test_initiated_transfer_reserves_stock() {
        let warehouse = Uuid::new_v4();
        let product = Uuid::new_v4();
        let stock = vec![on_hand(warehouse, product, 100)];
        let lines = vec![OutgoingLine {
            status: TransferStatus::Initiated,
            product_id: product,
            batch_number: None,
            quantity: 40,
        }];

        let products = product_availability(&stock, &reservations(&lines));

        assert_eq!(products.len(), 1);
        assert_eq!(products[0].on_hand_quantity, 100);
        assert_eq!(products[0].reserved_quantity, 40);
        assert_eq!(available_for(&[], &products, product, None), 60);
    }

    #[test]
    fn test_cancel_releases_reservation() {
        let warehouse = Uuid::new_v4();
        let product = Uuid::new_v4();
        let stock = vec![on_hand(warehouse, product, 100)];
        let mut lines = vec![OutgoingLine {
            status: TransferStatus::InTransit,
            product_id: product,
            batch_number: None,
            quantity: 40,
        }];

        let before = product_availability(&stock, &reservations(&lines));
        assert_eq!(available_for(&[], &before, product, None), 60);

        assert!(lines[0].status.can_transition_to(TransferStatus::Cancelled));
        lines[0].status = TransferStatus::Cancelled;

        let after = product_availability(&stock, &reservations(&lines));
        assert_eq!(available_for(&[], &after, product, None), 100);
    }

    #[test]
    fn test_received_transfers_no_longer_reserve() {
        for status in [
            TransferStatus::Received,
            TransferStatus::PartialReceived,
            TransferStatus::Rejected,
            TransferStatus::Returned,
            TransferStatus::Cancelled,
        ] {
            let line = OutgoingLine {
                status,
                product_id: Uuid::new_v4(),
                batch_number: Some("B-001".to_string()),
                quantity: 10,
            };
            assert!(reservations(&[line]).is_empty(), "{} should not reserve", status);
        }
    }

    #[test]
    fn test_batch_reservation() {
        let warehouse = Uuid::new_v4();
        let product = Uuid::new_v4();
        let entries = vec![inbound(warehouse, product, "B-001", 30)];
        let lines = vec![OutgoingLine {
            status: TransferStatus::Initiated,
            product_id: product,
            batch_number: Some("B-001".to_string()),
            quantity: 12,
        }];

        let batches = batch_availability(&entries, &reservations(&lines));

        assert_eq!(available_for(&batches, &[], product, Some("B-001")), 18);
        assert_eq!(available_for(&batches, &[], product, Some("B-002")), 0);
    }

    /// Batch-tagged lines also hold generic stock of the product
    #[test]
    fn test_batch_lines_count_against_product_stock() {
        let warehouse = Uuid::new_v4();
        let product = Uuid::new_v4();
        let stock = vec![on_hand(warehouse, product, 50)];
        let lines = vec![OutgoingLine {
            status: TransferStatus::Initiated,
            product_id: product,
            batch_number: Some("B-001".to_string()),
            quantity: 20,
        }];

        let products = product_availability(&stock, &reservations(&lines));

        assert_eq!(available_for(&[], &products, product, None), 30);
    }

    #[test]
    fn test_second_request_sees_first_reservation() {
        let warehouse = Uuid::new_v4();
        let product = Uuid::new_v4();
        let stock = vec![on_hand(warehouse, product, 50)];
        let mut lines = Vec::new();

        let first = product_availability(&stock, &reservations(&lines));
        assert!(check_stock(product, None, 30, available_for(&[], &first, product, None)).is_ok());
        lines.push(OutgoingLine {
            status: TransferStatus::Initiated,
            product_id: product,
            batch_number: None,
            quantity: 30,
        });

        let second = product_availability(&stock, &reservations(&lines));
        let err = check_stock(product, None, 30, available_for(&[], &second, product, None))
            .unwrap_err();

        assert_eq!(
            err,
            TransferRuleError::InsufficientStock {
                product_id: product,
                batch_number: None,
                requested: 30,
                available: 20,
            }
        );
    }

    #[test]
    fn test_lock_keys_sort_stably() {
        let warehouse = Uuid::new_v4();
        let product = Uuid::new_v4();
        let mut keys = vec![
            StockKey::new(warehouse, product, Some("B-002".to_string())),
            StockKey::new(warehouse, product, None),
            StockKey::new(warehouse, product, Some("B-001".to_string())),
        ];
        keys.sort();

        assert_eq!(keys[0].batch_number, None);
        assert_eq!(keys[1].batch_number.as_deref(), Some("B-001"));
        assert!(keys[2].lock_key().ends_with(":B-002"));
    }
}

// ============================================================================
// Property-Based Tests
// ============================================================================

#[cfg(test)]
mod property_tests {
    use super::*;

    fn status_strategy() -> impl Strategy<Value = TransferStatus> {
        prop::sample::select(TransferStatus::ALL.to_vec())
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Availability is never reported negative, however much is reserved
        #[test]
        fn prop_availability_never_negative(
            stock_qty in 0i64..1_000,
            reserved in prop::collection::vec(1i64..500, 0..8)
        ) {
            let warehouse = Uuid::new_v4();
            let product = Uuid::new_v4();
            let stock = vec![on_hand(warehouse, product, stock_qty)];
            let res: Vec<Reservation> = reserved
                .iter()
                .map(|q| Reservation { product_id: product, batch_number: None, quantity: *q })
                .collect();

            for p in product_availability(&stock, &res) {
                prop_assert!(p.available_quantity > 0);
                prop_assert!(p.available_quantity <= p.on_hand_quantity);
            }
            prop_assert!(available_for(&[], &product_availability(&stock, &res), product, None) >= 0);
        }

        /// Only initiated and in_transit lines reduce availability
        #[test]
        fn prop_only_reserving_statuses_count(
            statuses in prop::collection::vec(status_strategy(), 1..10),
            quantity in 1i64..20
        ) {
            let warehouse = Uuid::new_v4();
            let product = Uuid::new_v4();
            let stock = vec![on_hand(warehouse, product, 1_000)];
            let lines: Vec<OutgoingLine> = statuses
                .iter()
                .map(|status| OutgoingLine {
                    status: *status,
                    product_id: product,
                    batch_number: None,
                    quantity,
                })
                .collect();

            let in_flight = statuses.iter().filter(|s| s.is_reserving()).count() as Quantity;
            let products = product_availability(&stock, &reservations(&lines));

            prop_assert_eq!(
                available_for(&[], &products, product, None),
                1_000 - in_flight * quantity
            );
        }

        /// Sequential requests never reserve more than was on hand
        #[test]
        fn prop_no_oversell(
            stock_qty in 1i64..500,
            requests in prop::collection::vec(1i64..200, 1..15)
        ) {
            let warehouse = Uuid::new_v4();
            let product = Uuid::new_v4();
            let entries = vec![inbound(warehouse, product, "B-001", stock_qty)];
            let mut lines = Vec::new();

            for requested in requests {
                let batches = batch_availability(&entries, &reservations(&lines));
                let available = available_for(&batches, &[], product, Some("B-001"));
                if check_stock(product, Some("B-001"), requested, available).is_ok() {
                    lines.push(OutgoingLine {
                        status: TransferStatus::Initiated,
                        product_id: product,
                        batch_number: Some("B-001".to_string()),
                        quantity: requested,
                    });
                }
            }

            let total_reserved: Quantity = lines.iter().map(|l| l.quantity).sum();
            prop_assert!(total_reserved <= stock_qty);
        }
    }
}
