//! Refund ledger types and the cumulative-refund cap.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::error::{EngineError, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, sqlx::Type)]
#[sqlx(type_name = "refund_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RefundStatus {
    Pending,
    Approved,
    Completed,
    Rejected,
}

impl RefundStatus {
    /// Rejected refunds release their slice of the cap; everything else
    /// counts against it.
    pub fn counts_against_cap(self) -> bool {
        !matches!(self, Self::Rejected)
    }
}

/// Payment row; immutable once completed. Amounts are minor units.
#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
pub struct Payment {
    pub id: Uuid,
    pub order_id: Uuid,
    pub amount: i64,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
pub struct Refund {
    pub id: Uuid,
    pub payment_id: Uuid,
    pub ticket_id: Option<Uuid>,
    pub amount: i64,
    pub status: RefundStatus,
    pub created_at: DateTime<Utc>,
}

impl Payment {
    /// Enforces `already_refunded + requested <= amount`. `already_refunded`
    /// must be the sum over non-rejected refunds read under the payment row
    /// lock, so concurrent contenders serialize on this check.
    pub fn check_refund_cap(&self, already_refunded: i64, requested: i64) -> Result<()> {
        if requested <= 0 {
            return Err(EngineError::Validation(
                "refund amount must be positive".to_string(),
            ));
        }
        if already_refunded + requested > self.amount {
            return Err(EngineError::Conflict(format!(
                "refund of {} exceeds remaining refundable amount {} on payment {}",
                requested,
                self.amount - already_refunded,
                self.id
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payment(amount: i64) -> Payment {
        Payment {
            id: Uuid::new_v4(),
            order_id: Uuid::new_v4(),
            amount,
            status: "completed".into(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn cap_allows_up_to_payment_amount() {
        let p = payment(10_000);
        assert!(p.check_refund_cap(0, 10_000).is_ok());
        assert!(p.check_refund_cap(4_000, 6_000).is_ok());
    }

    #[test]
    fn cap_rejects_overdraw() {
        let p = payment(10_000);
        let err = p.check_refund_cap(4_000, 6_001).unwrap_err();
        assert!(matches!(err, EngineError::Conflict(_)));
    }

    #[test]
    fn two_contenders_cannot_both_fit() {
        // Serialized view of the concurrency property: two tickets each ask
        // for 6_000 against a 10_000 payment. Whichever commits first wins;
        // the second check sees its total and fails.
        let p = payment(10_000);
        assert!(p.check_refund_cap(0, 6_000).is_ok());
        assert!(p.check_refund_cap(6_000, 6_000).is_err());
    }

    #[test]
    fn rejected_refunds_release_the_cap() {
        assert!(!RefundStatus::Rejected.counts_against_cap());
        assert!(RefundStatus::Pending.counts_against_cap());
        assert!(RefundStatus::Approved.counts_against_cap());
        assert!(RefundStatus::Completed.counts_against_cap());
    }

    #[test]
    fn non_positive_refunds_are_invalid() {
        let p = payment(1_000);
        assert!(matches!(
            p.check_refund_cap(0, 0),
            Err(EngineError::Validation(_))
        ));
    }
}
