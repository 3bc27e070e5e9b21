//! Active policy lookup. Policy rows are immutable once superseded, so this
//! is a snapshot read with no lock.

use sqlx::{Postgres, Transaction};

use crate::domain::policy::PolicyConfiguration;
use crate::domain::ticket::ClaimType;
use crate::error::Result;

/// The single active, non-deleted policy row for a claim type whose effective
/// range covers the current instant.
pub async fn active_policy(
    tx: &mut Transaction<'_, Postgres>,
    claim: ClaimType,
) -> Result<Option<PolicyConfiguration>> {
    let policy = sqlx::query_as::<_, PolicyConfiguration>(
        "SELECT id, claim_type, return_window_days, warranty_months,
                refunds_allowed, customized_refundable, evidence_required,
                effective_from, effective_to
         FROM aftersales_policies
         WHERE claim_type = $1
           AND active
           AND deleted_at IS NULL
           AND effective_from <= NOW()
           AND (effective_to IS NULL OR effective_to > NOW())
         ORDER BY effective_from DESC
         LIMIT 1",
    )
    .bind(claim)
    .fetch_optional(&mut **tx)
    .await?;
    Ok(policy)
}
