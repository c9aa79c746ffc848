//! HTTP mapping of domain errors

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::domain::DomainError;

impl DomainError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            DomainError::NotFound(_) => StatusCode::NOT_FOUND,
            DomainError::Validation(_) => StatusCode::BAD_REQUEST,
            DomainError::Conflict(_) | DomainError::InvalidState(_) => StatusCode::CONFLICT,
            DomainError::InsufficientStock { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            DomainError::External(_) => StatusCode::BAD_GATEWAY,
            DomainError::Database(_) | DomainError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for DomainError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let body = match &self {
            DomainError::InsufficientStock {
                product_id,
                sku,
                available,
                requested,
            } => json!({
                "error": self.to_string(),
                "product_id": product_id,
                "sku": sku,
                "available": available,
                "requested": requested,
            }),
            DomainError::Database(_) | DomainError::Internal(_) => {
                tracing::error!("Request failed: {}", self);
                json!({ "error": "Internal server error" })
            }
            _ => json!({ "error": self.to_string() }),
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            DomainError::not_found("Product", "p-1").status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            DomainError::InvalidState("done".into()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            DomainError::InsufficientStock {
                product_id: "p".into(),
                sku: "S".into(),
                available: 1,
                requested: 2,
            }
            .status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }
}
