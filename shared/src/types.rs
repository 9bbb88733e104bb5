//! Common types used across the platform

use serde::{Deserialize, Serialize};

/// Whole units of a product
pub type Quantity = i64;

/// Largest quantity a single transfer line may carry
pub const MAX_LINE_QUANTITY: Quantity = 1_000_000_000;

/// Currency used when a line does not specify one
pub const DEFAULT_CURRENCY: &str = "THB";

/// Stock key used for availability checks and reservation locks
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StockKey {
    pub warehouse_id: uuid::Uuid,
    pub product_id: uuid::Uuid,
    pub batch_number: Option<String>,
}

impl StockKey {
    pub fn new(warehouse_id: uuid::Uuid, product_id: uuid::Uuid, batch_number: Option<String>) -> Self {
        Self {
            warehouse_id,
            product_id,
            batch_number,
        }
    }

    /// Stable textual form, used as the advisory lock key
    pub fn lock_key(&self) -> String {
        format!(
            "stock:{}:{}:{}",
            self.warehouse_id,
            self.product_id,
            self.batch_number.as_deref().unwrap_or("")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_lock_key_distinguishes_batches() {
        let warehouse = Uuid::new_v4();
        let product = Uuid::new_v4();

        let plain = StockKey::new(warehouse, product, None);
        let batched = StockKey::new(warehouse, product, Some("B-001".to_string()));

        assert_ne!(plain.lock_key(), batched.lock_key());
        assert!(batched.lock_key().ends_with(":B-001"));
    }

    #[test]
    fn test_keys_sort_deterministically() {
        let warehouse = Uuid::new_v4();
        let product = Uuid::new_v4();
        let mut keys = vec![
            StockKey::new(warehouse, product, Some("B".to_string())),
            StockKey::new(warehouse, product, None),
            StockKey::new(warehouse, product, Some("A".to_string())),
        ];
        keys.sort();

        assert_eq!(keys[0].batch_number, None);
        assert_eq!(keys[1].batch_number.as_deref(), Some("A"));
    }
}
