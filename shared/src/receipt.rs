//! Receipt outcome classification and application

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{ItemStatus, TransferAction, TransferItem, TransferStatus, TransferTotals};
use crate::types::Quantity;
use crate::validation::{validate_item_outcome, TransferRuleError};

/// Quantities reported by the receiver for one line
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemOutcome {
    pub received: Quantity,
    pub rejected: Quantity,
    pub disposed: Quantity,
}

impl ItemOutcome {
    /// Total the receiver accounted for, or `None` if it does not fit
    pub fn accounted(&self) -> Option<Quantity> {
        self.received
            .checked_add(self.rejected)?
            .checked_add(self.disposed)
    }
}

/// Classify a received line. Checks run in priority order: fully disposed,
/// fully rejected, fully accepted, partially accepted, otherwise pending.
pub fn classify_item(quantity_sent: Quantity, outcome: &ItemOutcome) -> ItemStatus {
    if outcome.disposed == quantity_sent {
        ItemStatus::Disposed
    } else if outcome.rejected == quantity_sent {
        ItemStatus::Rejected
    } else if outcome.received == quantity_sent {
        ItemStatus::Accepted
    } else if outcome.received > 0 {
        ItemStatus::PartialAccepted
    } else {
        ItemStatus::Pending
    }
}

/// Overall status of a transfer once every line has been classified
pub fn derive_transfer_status(totals: &TransferTotals) -> TransferStatus {
    if totals.received == 0 && (totals.rejected > 0 || totals.disposed > 0) {
        TransferStatus::Rejected
    } else if totals.received < totals.sent {
        TransferStatus::PartialReceived
    } else {
        TransferStatus::Received
    }
}

/// Receiver's report for one line. Quantities left out count as zero.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ItemReceipt {
    pub item_id: Uuid,
    #[serde(default)]
    pub quantity_received: Quantity,
    #[serde(default)]
    pub quantity_rejected: Quantity,
    #[serde(default)]
    pub quantity_disposed: Quantity,
    pub rejection_reason: Option<String>,
    pub disposal_reason: Option<String>,
    pub condition_notes: Option<String>,
}

impl ItemReceipt {
    pub fn outcome(&self) -> ItemOutcome {
        ItemOutcome {
            received: self.quantity_received,
            rejected: self.quantity_rejected,
            disposed: self.quantity_disposed,
        }
    }
}

/// What a receipt changed on one line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineChange {
    pub item_id: Uuid,
    pub previous_status: ItemStatus,
    /// Item-level audit action to record, if the line lost any stock
    pub audit_action: Option<TransferAction>,
}

/// Result of applying a full receipt to the lines of a transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiptSummary {
    pub totals: TransferTotals,
    pub status: TransferStatus,
    pub changes: Vec<LineChange>,
}

/// Audit action for a received line: disposal wins over rejection
pub fn item_audit_action(item: &TransferItem) -> Option<TransferAction> {
    if item.quantity_disposed > 0 {
        Some(TransferAction::ItemDisposed)
    } else if item.quantity_rejected > 0 {
        Some(TransferAction::ItemRejected)
    } else {
        None
    }
}

/// Apply the receiver's reports to the lines of a transfer.
///
/// Every report must name a line of the transfer, at most once. Lines with no
/// report get a zero outcome. Nothing is modified unless every report is valid.
pub fn apply_receipt(
    items: &mut [TransferItem],
    reports: &[ItemReceipt],
) -> Result<ReceiptSummary, TransferRuleError> {
    let mut by_item: HashMap<Uuid, &ItemReceipt> = HashMap::with_capacity(reports.len());
    for report in reports {
        if !items.iter().any(|i| i.id == report.item_id) {
            return Err(TransferRuleError::UnknownItem(report.item_id));
        }
        if by_item.insert(report.item_id, report).is_some() {
            return Err(TransferRuleError::DuplicateItem(report.item_id));
        }
    }

    for item in items.iter() {
        let outcome = by_item.get(&item.id).map_or_else(ItemOutcome::default, |r| r.outcome());
        validate_item_outcome(item.quantity_sent, &outcome)?;
    }

    let mut changes = Vec::with_capacity(items.len());
    for item in items.iter_mut() {
        let report = by_item.get(&item.id).copied();
        let outcome = report.map_or_else(ItemOutcome::default, ItemReceipt::outcome);
        let previous_status = item.status;

        item.quantity_received = outcome.received;
        item.quantity_rejected = outcome.rejected;
        item.quantity_disposed = outcome.disposed;
        item.status = classify_item(item.quantity_sent, &outcome);
        if let Some(report) = report {
            item.rejection_reason = report.rejection_reason.clone();
            item.disposal_reason = report.disposal_reason.clone();
            item.condition_notes = report.condition_notes.clone();
        }

        changes.push(LineChange {
            item_id: item.id,
            previous_status,
            audit_action: item_audit_action(item),
        });
    }

    let totals = TransferTotals::from_items(items.iter());
    Ok(ReceiptSummary {
        totals,
        status: derive_transfer_status(&totals),
        changes,
    })
}

/// Mark every rejected line as returned, sending back its whole rejected
/// quantity. Returns the ids of the lines that changed.
pub fn select_returns(items: &mut [TransferItem]) -> Result<Vec<Uuid>, TransferRuleError> {
    let mut returned = Vec::new();
    for item in items.iter_mut().filter(|i| i.status == ItemStatus::Rejected) {
        item.quantity_returned = item.quantity_rejected;
        item.status = ItemStatus::Returned;
        returned.push(item.id);
    }

    if returned.is_empty() {
        return Err(TransferRuleError::NothingToReturn);
    }
    Ok(returned)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(received: Quantity, rejected: Quantity, disposed: Quantity) -> ItemOutcome {
        ItemOutcome {
            received,
            rejected,
            disposed,
        }
    }

    #[test]
    fn test_classify_priority() {
        assert_eq!(classify_item(10, &outcome(0, 0, 10)), ItemStatus::Disposed);
        assert_eq!(classify_item(10, &outcome(0, 10, 0)), ItemStatus::Rejected);
        assert_eq!(classify_item(10, &outcome(10, 0, 0)), ItemStatus::Accepted);
        assert_eq!(classify_item(10, &outcome(6, 4, 0)), ItemStatus::PartialAccepted);
        assert_eq!(classify_item(10, &outcome(0, 4, 3)), ItemStatus::Pending);
        assert_eq!(classify_item(10, &outcome(0, 0, 0)), ItemStatus::Pending);
    }

    #[test]
    fn test_transfer_status_all_rejected() {
        let totals = TransferTotals {
            sent: 5,
            rejected: 5,
            ..Default::default()
        };
        assert_eq!(derive_transfer_status(&totals), TransferStatus::Rejected);
    }

    #[test]
    fn test_transfer_status_partial() {
        let totals = TransferTotals {
            sent: 10,
            received: 6,
            rejected: 4,
            ..Default::default()
        };
        assert_eq!(derive_transfer_status(&totals), TransferStatus::PartialReceived);
    }

    #[test]
    fn test_transfer_status_nothing_reported_is_partial() {
        let totals = TransferTotals {
            sent: 10,
            ..Default::default()
        };
        assert_eq!(derive_transfer_status(&totals), TransferStatus::PartialReceived);
    }

    #[test]
    fn test_transfer_status_full() {
        let totals = TransferTotals {
            sent: 40,
            received: 40,
            ..Default::default()
        };
        assert_eq!(derive_transfer_status(&totals), TransferStatus::Received);
    }

    fn line(sent: Quantity) -> TransferItem {
        TransferItem {
            id: Uuid::new_v4(),
            transfer_id: Uuid::nil(),
            product_id: Uuid::new_v4(),
            batch_number: None,
            expiry_date: None,
            unit_price: rust_decimal::Decimal::ZERO,
            currency: "THB".to_string(),
            quantity_sent: sent,
            quantity_received: 0,
            quantity_rejected: 0,
            quantity_disposed: 0,
            quantity_returned: 0,
            status: ItemStatus::Pending,
            rejection_reason: None,
            disposal_reason: None,
            condition_notes: None,
        }
    }

    fn report(item_id: Uuid, received: Quantity, rejected: Quantity, disposed: Quantity) -> ItemReceipt {
        ItemReceipt {
            item_id,
            quantity_received: received,
            quantity_rejected: rejected,
            quantity_disposed: disposed,
            ..Default::default()
        }
    }

    #[test]
    fn test_apply_receipt_partial() {
        let mut items = vec![line(10)];
        let mut r = report(items[0].id, 6, 4, 0);
        r.rejection_reason = Some("crushed".to_string());

        let summary = apply_receipt(&mut items, &[r]).unwrap();

        assert_eq!(summary.status, TransferStatus::PartialReceived);
        assert_eq!(items[0].status, ItemStatus::PartialAccepted);
        assert_eq!(items[0].rejection_reason.as_deref(), Some("crushed"));
        assert_eq!(summary.changes[0].previous_status, ItemStatus::Pending);
        assert_eq!(summary.changes[0].audit_action, Some(TransferAction::ItemRejected));
    }

    #[test]
    fn test_apply_receipt_omitted_line_stays_pending() {
        let mut items = vec![line(4), line(6)];
        let r = report(items[0].id, 4, 0, 0);

        let summary = apply_receipt(&mut items, &[r]).unwrap();

        assert_eq!(items[0].status, ItemStatus::Accepted);
        assert_eq!(items[1].status, ItemStatus::Pending);
        assert_eq!(items[1].quantity_received, 0);
        assert_eq!(summary.totals.received, 4);
        assert_eq!(summary.status, TransferStatus::PartialReceived);
        assert!(summary.changes.iter().all(|c| c.audit_action.is_none()));
    }

    #[test]
    fn test_apply_receipt_duplicate_report() {
        let mut items = vec![line(10)];
        let id = items[0].id;

        let err = apply_receipt(&mut items, &[report(id, 5, 0, 0), report(id, 5, 0, 0)]).unwrap_err();

        assert_eq!(err, TransferRuleError::DuplicateItem(id));
        assert_eq!(items[0].quantity_received, 0);
    }

    #[test]
    fn test_apply_receipt_unknown_item() {
        let mut items = vec![line(10)];
        let stranger = Uuid::new_v4();

        assert_eq!(
            apply_receipt(&mut items, &[report(stranger, 1, 0, 0)]),
            Err(TransferRuleError::UnknownItem(stranger))
        );
    }

    #[test]
    fn test_apply_receipt_invalid_line_leaves_all_untouched() {
        let mut items = vec![line(4), line(10)];
        let reports = [report(items[0].id, 4, 0, 0), report(items[1].id, 8, 3, 0)];

        assert!(matches!(
            apply_receipt(&mut items, &reports),
            Err(TransferRuleError::OverAccounted { accounted: 11, sent: 10 })
        ));
        assert_eq!(items[0].status, ItemStatus::Pending);
        assert_eq!(items[0].quantity_received, 0);
    }

    #[test]
    fn test_item_audit_action_disposal_wins() {
        let mut item = line(10);
        item.quantity_rejected = 3;
        item.quantity_disposed = 2;
        assert_eq!(item_audit_action(&item), Some(TransferAction::ItemDisposed));

        item.quantity_disposed = 0;
        assert_eq!(item_audit_action(&item), Some(TransferAction::ItemRejected));

        item.quantity_rejected = 0;
        assert_eq!(item_audit_action(&item), None);
    }

    #[test]
    fn test_select_returns_rejected_lines() {
        let mut items = vec![line(5), line(3)];
        let reports = [report(items[0].id, 0, 5, 0), report(items[1].id, 3, 0, 0)];
        apply_receipt(&mut items, &reports).unwrap();

        let returned = select_returns(&mut items).unwrap();

        assert_eq!(returned, vec![items[0].id]);
        assert_eq!(items[0].status, ItemStatus::Returned);
        assert_eq!(items[0].quantity_returned, 5);
        assert_eq!(items[1].status, ItemStatus::Accepted);
        assert_eq!(items[1].quantity_returned, 0);
    }

    #[test]
    fn test_select_returns_needs_rejected_line() {
        let mut items = vec![line(5)];
        let id = items[0].id;
        apply_receipt(&mut items, &[report(id, 3, 2, 0)]).unwrap();

        // partially accepted lines are not sent back
        assert_eq!(select_returns(&mut items), Err(TransferRuleError::NothingToReturn));
        assert_eq!(items[0].quantity_returned, 0);
    }
}
