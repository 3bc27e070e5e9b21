//! Engine error taxonomy and HTTP mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

use crate::domain::ticket::{ClaimType, ResolutionType};

#[derive(Debug, Error)]
pub enum EngineError {
    /// A referenced record does not exist.
    #[error("{0} not found")]
    NotFound(&'static str),

    /// The operation is not permitted from the ticket's current status.
    #[error("{0}")]
    InvalidState(String),

    /// Resolution type incompatible with the ticket's claim type.
    #[error("resolution type {resolution} is not valid for a {claim} claim")]
    IncompatibleResolution {
        claim: ClaimType,
        resolution: ResolutionType,
    },

    /// Duplicate open ticket, refund cap exceeded, missing or insufficient stock.
    #[error("{0}")]
    Conflict(String),

    /// No active policy configuration for the claim type.
    #[error("no active after-sales policy for {0} claims")]
    PolicyUnavailable(ClaimType),

    /// Malformed or incomplete request input.
    #[error("{0}")]
    Validation(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl EngineError {
    /// Stable machine-readable code carried in error responses.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "NOT_FOUND",
            Self::InvalidState(_) => "INVALID_STATE",
            Self::IncompatibleResolution { .. } => "INCOMPATIBLE_RESOLUTION",
            Self::Conflict(_) => "CONFLICT",
            Self::PolicyUnavailable(_) => "POLICY_UNAVAILABLE",
            Self::Validation(_) => "VALIDATION",
            Self::Database(_) => "DATABASE",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::InvalidState(_) | Self::IncompatibleResolution { .. } | Self::Validation(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::PolicyUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for EngineError {
    fn into_response(self) -> Response {
        let status = self.status();
        // Storage errors are logged in full but never leaked to clients.
        let message = match &self {
            Self::Database(e) => {
                tracing::error!(error = %e, "storage failure");
                "internal storage error".to_string()
            }
            other => other.to_string(),
        };
        let body = Json(serde_json::json!({
            "error": message,
            "code": self.code(),
        }));
        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_follow_taxonomy() {
        assert_eq!(EngineError::NotFound("ticket").status(), StatusCode::NOT_FOUND);
        assert_eq!(
            EngineError::Conflict("x".into()).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            EngineError::PolicyUnavailable(ClaimType::Return).status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            EngineError::IncompatibleResolution {
                claim: ClaimType::Refund,
                resolution: ResolutionType::WarrantyRepair,
            }
            .status(),
            StatusCode::BAD_REQUEST
        );
    }
}
