//! Mapping of vault errors onto HTTP responses

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::error;

use credvault_core::VaultError;

/// Error returned by API handlers
#[derive(Debug)]
pub enum ApiError {
    Vault(VaultError),
    /// Reveal of a missing or inactive credential
    Unavailable,
}

impl From<VaultError> for ApiError {
    fn from(e: VaultError) -> Self {
        Self::Vault(e)
    }
}

pub fn status_for(e: &VaultError) -> StatusCode {
    match e {
        VaultError::NotFound(_) => StatusCode::NOT_FOUND,
        VaultError::ValidationFailed(_) => StatusCode::UNPROCESSABLE_ENTITY,
        VaultError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            Self::Unavailable => (
                StatusCode::NOT_FOUND,
                Json(json!({
                    "error": "unavailable",
                    "message": "credential is missing or inactive",
                })),
            )
                .into_response(),
            Self::Vault(e) => {
                let status = status_for(&e);
                if status.is_server_error() {
                    error!("Request failed: {}", e);
                }
                (
                    status,
                    Json(json!({
                        "error": e.kind(),
                        "message": e.to_string(),
                    })),
                )
                    .into_response()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            status_for(&VaultError::NotFound("x".into())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_for(&VaultError::ValidationFailed("x".into())),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            status_for(&VaultError::DecodeFailed("x".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(status_for(&VaultError::Timeout(30)), StatusCode::GATEWAY_TIMEOUT);
    }
}
