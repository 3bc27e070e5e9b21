//! Stock ledger arithmetic: on-hand/reserved counters plus the audit
//! transaction types appended alongside every quantity change.

use serde::Serialize;
use uuid::Uuid;

use crate::error::{EngineError, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, sqlx::Type)]
#[sqlx(type_name = "inventory_txn_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum InventoryTxnType {
    Inbound,
    Outbound,
    Adjustment,
}

/// One counter row per product variant.
#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
pub struct StockLevel {
    pub product_variant_id: Uuid,
    pub quantity_on_hand: i32,
    pub quantity_reserved: i32,
}

impl StockLevel {
    /// Derived, never persisted independently.
    pub fn quantity_available(&self) -> i32 {
        self.quantity_on_hand - self.quantity_reserved
    }

    /// Accepted return goods go back to saleable inventory.
    pub fn receive_return(&mut self, quantity: i32) -> Result<()> {
        if quantity <= 0 {
            return Err(EngineError::Validation(
                "return quantity must be positive".to_string(),
            ));
        }
        self.quantity_on_hand += quantity;
        Ok(())
    }

    /// Replacement units leave on-hand stock; insufficient availability is a
    /// conflict, never a silent backorder.
    pub fn issue_replacement(&mut self, quantity: i32) -> Result<()> {
        if quantity <= 0 {
            return Err(EngineError::Validation(
                "replacement quantity must be positive".to_string(),
            ));
        }
        let available = self.quantity_available();
        if available < quantity {
            return Err(EngineError::Conflict(format!(
                "insufficient stock for variant {}: available {}, required {}",
                self.product_variant_id, available, quantity
            )));
        }
        self.quantity_on_hand -= quantity;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn level(on_hand: i32, reserved: i32) -> StockLevel {
        StockLevel {
            product_variant_id: Uuid::new_v4(),
            quantity_on_hand: on_hand,
            quantity_reserved: reserved,
        }
    }

    #[test]
    fn available_is_on_hand_minus_reserved() {
        assert_eq!(level(10, 4).quantity_available(), 6);
    }

    #[test]
    fn returned_goods_increase_on_hand() {
        let mut s = level(3, 0);
        s.receive_return(2).unwrap();
        assert_eq!(s.quantity_on_hand, 5);
    }

    #[test]
    fn replacement_decrements_on_hand() {
        let mut s = level(5, 1);
        s.issue_replacement(4).unwrap();
        assert_eq!(s.quantity_on_hand, 1);
    }

    #[test]
    fn replacement_refused_when_available_short() {
        // available = 1 (2 on hand, 1 reserved), order line wants 2
        let mut s = level(2, 1);
        let err = s.issue_replacement(2).unwrap_err();
        assert!(matches!(err, EngineError::Conflict(_)));
        // refusal mutates nothing
        assert_eq!(s.quantity_on_hand, 2);
        assert_eq!(s.quantity_reserved, 1);
    }

    #[test]
    fn non_positive_quantities_are_rejected() {
        let mut s = level(5, 0);
        assert!(s.receive_return(0).is_err());
        assert!(s.issue_replacement(-1).is_err());
    }
}
