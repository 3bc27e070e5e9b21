//! Ticket state machine: claim types, resolution types, statuses and the
//! transitions the five commands are allowed to make.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::error::{EngineError, Result};

/// Customer-declared category of an after-sales request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "claim_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ClaimType {
    Return,
    Warranty,
    Refund,
}

impl ClaimType {
    /// Compatibility matrix applied at approval time.
    pub fn allows(self, resolution: ResolutionType) -> bool {
        matches!(
            (self, resolution),
            (ClaimType::Refund, ResolutionType::RefundOnly)
                | (ClaimType::Return, ResolutionType::ReturnAndRefund)
                | (ClaimType::Warranty, ResolutionType::WarrantyRepair)
                | (ClaimType::Warranty, ResolutionType::WarrantyReplace)
        )
    }
}

impl fmt::Display for ClaimType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Return => write!(f, "return"),
            Self::Warranty => write!(f, "warranty"),
            Self::Refund => write!(f, "refund"),
        }
    }
}

/// Staff-chosen execution path for an approved ticket.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "resolution_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ResolutionType {
    RefundOnly,
    ReturnAndRefund,
    WarrantyRepair,
    WarrantyReplace,
}

impl ResolutionType {
    /// RefundOnly settles synchronously at approval; every other path routes
    /// through physical receipt and inspection.
    pub fn requires_goods_handling(self) -> bool {
        !matches!(self, Self::RefundOnly)
    }
}

impl fmt::Display for ResolutionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RefundOnly => write!(f, "refund_only"),
            Self::ReturnAndRefund => write!(f, "return_and_refund"),
            Self::WarrantyRepair => write!(f, "warranty_repair"),
            Self::WarrantyReplace => write!(f, "warranty_replace"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "ticket_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    Pending,
    InProgress,
    Resolved,
    Rejected,
    Closed,
}

impl TicketStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Resolved | Self::Rejected | Self::Closed)
    }

    /// Open tickets block a duplicate claim for the same order/item/type.
    pub fn is_open(self) -> bool {
        !self.is_terminal()
    }
}

impl fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::InProgress => write!(f, "in_progress"),
            Self::Resolved => write!(f, "resolved"),
            Self::Rejected => write!(f, "rejected"),
            Self::Closed => write!(f, "closed"),
        }
    }
}

/// Durable ticket record as stored in `aftersales_tickets`.
#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
pub struct Ticket {
    pub id: Uuid,
    pub ticket_number: String,
    pub order_id: Uuid,
    /// None means the claim covers the whole order.
    pub order_item_id: Option<Uuid>,
    pub customer_id: Uuid,
    pub assigned_staff_id: Option<Uuid>,
    pub claim_type: ClaimType,
    pub status: TicketStatus,
    pub reason: String,
    pub requested_action: Option<String>,
    pub refund_amount: Option<i64>,
    pub evidence_required: bool,
    pub policy_violation: Option<String>,
    pub resolution_type: Option<ResolutionType>,
    pub staff_notes: Option<String>,
    pub received_at: Option<DateTime<Utc>>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Ticket {
    /// Guard every mutating command runs first: terminal tickets are frozen.
    pub fn ensure_status(&self, expected: &[TicketStatus], operation: &str) -> Result<()> {
        if self.status.is_terminal() {
            return Err(EngineError::InvalidState(format!(
                "ticket {} is {} and can no longer be modified",
                self.ticket_number, self.status
            )));
        }
        if !expected.contains(&self.status) {
            return Err(EngineError::InvalidState(format!(
                "ticket {} is {}; {} requires {}",
                self.ticket_number,
                self.status,
                operation,
                expected
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(" or ")
            )));
        }
        Ok(())
    }

    /// Validates the approval-time pairing of claim and resolution.
    pub fn ensure_compatible(&self, resolution: ResolutionType) -> Result<()> {
        if self.claim_type.allows(resolution) {
            Ok(())
        } else {
            Err(EngineError::IncompatibleResolution {
                claim: self.claim_type,
                resolution,
            })
        }
    }

    /// Preconditions shared by Receive and Inspect: an in-progress ticket on a
    /// goods-handling resolution path.
    pub fn ensure_goods_handling(&self, operation: &str) -> Result<ResolutionType> {
        self.ensure_status(&[TicketStatus::InProgress], operation)?;
        let resolution = self.resolution_type.ok_or_else(|| {
            EngineError::InvalidState(format!(
                "ticket {} has no resolution type assigned",
                self.ticket_number
            ))
        })?;
        if !resolution.requires_goods_handling() {
            return Err(EngineError::InvalidState(format!(
                "ticket {} resolves by refund only; {} does not apply",
                self.ticket_number, operation
            )));
        }
        Ok(resolution)
    }

    /// Receive gate: physical receipt can be recorded only once.
    pub fn ensure_not_received(&self) -> Result<()> {
        if self.received_at.is_some() {
            return Err(EngineError::InvalidState(format!(
                "goods for ticket {} were already received",
                self.ticket_number
            )));
        }
        Ok(())
    }

    /// Inspect gate: refuses to run until Receive has recorded receipt.
    pub fn ensure_received(&self) -> Result<()> {
        if self.received_at.is_none() {
            return Err(EngineError::InvalidState(format!(
                "goods for ticket {} have not been received",
                self.ticket_number
            )));
        }
        Ok(())
    }
}

/// Attachment row owned by a ticket.
#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
pub struct TicketAttachment {
    pub id: Uuid,
    pub ticket_id: Uuid,
    pub file_name: String,
    pub url: String,
    pub extension: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ticket(status: TicketStatus, claim: ClaimType) -> Ticket {
        let now = Utc::now();
        Ticket {
            id: Uuid::new_v4(),
            ticket_number: "AS-00000001".into(),
            order_id: Uuid::new_v4(),
            order_item_id: None,
            customer_id: Uuid::new_v4(),
            assigned_staff_id: None,
            claim_type: claim,
            status,
            reason: "scratched lens".into(),
            requested_action: None,
            refund_amount: None,
            evidence_required: false,
            policy_violation: None,
            resolution_type: None,
            staff_notes: None,
            received_at: None,
            resolved_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn compatibility_matrix_is_exact() {
        use ClaimType::*;
        use ResolutionType::*;
        let allowed = [
            (Refund, RefundOnly),
            (Return, ReturnAndRefund),
            (Warranty, WarrantyRepair),
            (Warranty, WarrantyReplace),
        ];
        for claim in [Return, Warranty, Refund] {
            for resolution in [RefundOnly, ReturnAndRefund, WarrantyRepair, WarrantyReplace] {
                assert_eq!(
                    claim.allows(resolution),
                    allowed.contains(&(claim, resolution)),
                    "{claim} / {resolution}"
                );
            }
        }
    }

    #[test]
    fn incompatible_pairing_names_both_values() {
        let t = ticket(TicketStatus::Pending, ClaimType::Refund);
        let err = t.ensure_compatible(ResolutionType::WarrantyRepair).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("warranty_repair"), "{msg}");
        assert!(msg.contains("refund"), "{msg}");
    }

    #[test]
    fn terminal_tickets_reject_every_mutation() {
        for status in [TicketStatus::Resolved, TicketStatus::Rejected, TicketStatus::Closed] {
            let t = ticket(status, ClaimType::Return);
            for expected in [
                &[TicketStatus::Pending][..],
                &[TicketStatus::InProgress][..],
                &[TicketStatus::Pending, TicketStatus::InProgress][..],
            ] {
                let err = t.ensure_status(expected, "approve").unwrap_err();
                assert!(matches!(err, EngineError::InvalidState(_)));
            }
        }
    }

    #[test]
    fn wrong_but_open_status_names_the_requirement() {
        let t = ticket(TicketStatus::InProgress, ClaimType::Return);
        let err = t.ensure_status(&[TicketStatus::Pending], "approve").unwrap_err();
        assert!(err.to_string().contains("approve requires pending"));
    }

    #[test]
    fn goods_handling_guard_excludes_refund_only() {
        let mut t = ticket(TicketStatus::InProgress, ClaimType::Refund);
        t.resolution_type = Some(ResolutionType::RefundOnly);
        assert!(t.ensure_goods_handling("receive").is_err());

        let mut t = ticket(TicketStatus::InProgress, ClaimType::Warranty);
        t.resolution_type = Some(ResolutionType::WarrantyReplace);
        assert_eq!(
            t.ensure_goods_handling("receive").unwrap(),
            ResolutionType::WarrantyReplace
        );
    }

    #[test]
    fn goods_handling_requires_a_resolution_type() {
        let t = ticket(TicketStatus::InProgress, ClaimType::Warranty);
        assert!(t.ensure_goods_handling("inspect").is_err());
    }

    #[test]
    fn receipt_can_be_recorded_only_once() {
        let mut t = ticket(TicketStatus::InProgress, ClaimType::Return);
        t.resolution_type = Some(ResolutionType::ReturnAndRefund);
        t.ensure_goods_handling("receive").unwrap();
        t.ensure_not_received().unwrap();

        t.received_at = Some(Utc::now());
        let err = t.ensure_not_received().unwrap_err();
        assert!(matches!(err, EngineError::InvalidState(_)));
        assert!(err.to_string().contains("already received"), "{err}");
    }

    #[test]
    fn inspection_requires_receipt_on_every_resolution_path() {
        for (claim, resolution) in [
            (ClaimType::Return, ResolutionType::ReturnAndRefund),
            (ClaimType::Warranty, ResolutionType::WarrantyRepair),
            (ClaimType::Warranty, ResolutionType::WarrantyReplace),
        ] {
            let mut t = ticket(TicketStatus::InProgress, claim);
            t.resolution_type = Some(resolution);
            let err = t.ensure_received().unwrap_err();
            assert!(err.to_string().contains("have not been received"), "{err}");

            t.received_at = Some(Utc::now());
            t.ensure_received().unwrap();
        }
    }

    #[test]
    fn open_statuses() {
        assert!(TicketStatus::Pending.is_open());
        assert!(TicketStatus::InProgress.is_open());
        assert!(!TicketStatus::Resolved.is_open());
        assert!(!TicketStatus::Closed.is_open());
    }
}
