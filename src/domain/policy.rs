//! Policy evaluation: decides at submission time whether a claim falls inside
//! the configured return/warranty/refund window.

use chrono::{DateTime, Months, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::domain::ticket::ClaimType;

/// Active policy row for one claim type, immutable once superseded.
#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
pub struct PolicyConfiguration {
    pub id: Uuid,
    pub claim_type: ClaimType,
    pub return_window_days: i32,
    pub warranty_months: i32,
    pub refunds_allowed: bool,
    pub customized_refundable: bool,
    pub evidence_required: bool,
    pub effective_from: DateTime<Utc>,
    pub effective_to: Option<DateTime<Utc>>,
}

impl PolicyConfiguration {
    /// Returns the violation text if the claim breaches this policy, `None`
    /// when the claim is admissible. A violation does not abort submission;
    /// the ticket is created in a rejected state carrying this text.
    pub fn evaluate(
        &self,
        claim: ClaimType,
        delivered_at: Option<DateTime<Utc>>,
        customized: bool,
        now: DateTime<Utc>,
    ) -> Option<String> {
        match claim {
            ClaimType::Return => {
                let delivered = match delivered_at {
                    Some(d) => d,
                    None => return Some(Self::UNVERIFIED_DELIVERY.to_string()),
                };
                let window = chrono::Duration::days(self.return_window_days as i64);
                if now - delivered > window {
                    Some(format!(
                        "Return window of {} day(s) has expired.",
                        self.return_window_days
                    ))
                } else {
                    None
                }
            }
            ClaimType::Warranty => {
                let delivered = match delivered_at {
                    Some(d) => d,
                    None => return Some(Self::UNVERIFIED_DELIVERY.to_string()),
                };
                let expiry = delivered
                    .checked_add_months(Months::new(self.warranty_months as u32))
                    .unwrap_or(delivered);
                if now > expiry {
                    Some(format!(
                        "Warranty period of {} month(s) has expired.",
                        self.warranty_months
                    ))
                } else {
                    None
                }
            }
            ClaimType::Refund => {
                if !self.refunds_allowed {
                    Some("Refunds are not permitted under the current policy.".to_string())
                } else if customized && !self.customized_refundable {
                    Some(
                        "Customized or prescription items are not refundable.".to_string(),
                    )
                } else {
                    None
                }
            }
        }
    }

    const UNVERIFIED_DELIVERY: &'static str =
        "Delivery of the order could not be verified.";
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn policy(claim: ClaimType) -> PolicyConfiguration {
        PolicyConfiguration {
            id: Uuid::new_v4(),
            claim_type: claim,
            return_window_days: 7,
            warranty_months: 24,
            refunds_allowed: true,
            customized_refundable: false,
            evidence_required: false,
            effective_from: Utc::now() - Duration::days(365),
            effective_to: None,
        }
    }

    #[test]
    fn return_outside_window_is_rejected_with_exact_text() {
        let p = policy(ClaimType::Return);
        let now = Utc::now();
        let delivered = now - Duration::days(10);
        assert_eq!(
            p.evaluate(ClaimType::Return, Some(delivered), false, now),
            Some("Return window of 7 day(s) has expired.".to_string())
        );
    }

    #[test]
    fn return_inside_window_passes() {
        let p = policy(ClaimType::Return);
        let now = Utc::now();
        assert_eq!(
            p.evaluate(ClaimType::Return, Some(now - Duration::days(6)), false, now),
            None
        );
        // Boundary: exactly at the window edge is still admissible.
        assert_eq!(
            p.evaluate(ClaimType::Return, Some(now - Duration::days(7)), false, now),
            None
        );
    }

    #[test]
    fn unverifiable_delivery_violates_return_and_warranty() {
        let p = policy(ClaimType::Return);
        let now = Utc::now();
        assert!(p.evaluate(ClaimType::Return, None, false, now).is_some());
        assert!(p.evaluate(ClaimType::Warranty, None, false, now).is_some());
    }

    #[test]
    fn warranty_window_uses_calendar_months() {
        let p = policy(ClaimType::Warranty);
        let now = Utc::now();
        let inside = now - Duration::days(30 * 23);
        let outside = now - Duration::days(31 * 25);
        assert_eq!(p.evaluate(ClaimType::Warranty, Some(inside), false, now), None);
        assert_eq!(
            p.evaluate(ClaimType::Warranty, Some(outside), false, now),
            Some("Warranty period of 24 month(s) has expired.".to_string())
        );
    }

    #[test]
    fn refund_policy_checks_do_not_need_delivery_date() {
        let p = policy(ClaimType::Refund);
        let now = Utc::now();
        assert_eq!(p.evaluate(ClaimType::Refund, None, false, now), None);
    }

    #[test]
    fn disallowed_refunds_and_customized_goods() {
        let mut p = policy(ClaimType::Refund);
        let now = Utc::now();
        assert!(p.evaluate(ClaimType::Refund, None, true, now).is_some());

        p.customized_refundable = true;
        assert_eq!(p.evaluate(ClaimType::Refund, None, true, now), None);

        p.refunds_allowed = false;
        assert_eq!(
            p.evaluate(ClaimType::Refund, None, false, now),
            Some("Refunds are not permitted under the current policy.".to_string())
        );
    }
}
