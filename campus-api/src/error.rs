use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use campus_core::{IdentityError, StoreError};
use campus_order::{ErrorKind, OrderError};

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    AuthenticationError(String),
    #[error("{0}")]
    AuthorizationError(String),
    #[error("{0}")]
    ValidationError(String),
    #[error("{0}")]
    NotFoundError(String),
    #[error("{0}")]
    ConflictError(String),
    #[error("Rate limit exceeded")]
    RateLimited,
    #[error("{0}")]
    Unavailable(String),
    #[error("{0}")]
    InternalServerError(String),
}

impl AppError {
    pub fn forbidden() -> Self {
        AppError::AuthorizationError("You are not allowed to perform this action".to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::AuthenticationError(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::AuthorizationError(msg) => (StatusCode::FORBIDDEN, msg),
            AppError::ValidationError(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFoundError(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::ConflictError(msg) => (StatusCode::CONFLICT, msg),
            AppError::RateLimited => (StatusCode::TOO_MANY_REQUESTS, "Rate limit exceeded".to_string()),
            AppError::Unavailable(msg) => {
                tracing::error!("Service unavailable: {}", msg);
                (StatusCode::SERVICE_UNAVAILABLE, "Service temporarily unavailable".to_string())
            }
            AppError::InternalServerError(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error".to_string())
            }
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

impl From<OrderError> for AppError {
    fn from(err: OrderError) -> Self {
        let message = err.to_string();
        match err.kind() {
            ErrorKind::Validation => AppError::ValidationError(message),
            ErrorKind::NotFound => AppError::NotFoundError(message),
            ErrorKind::Conflict => AppError::ConflictError(message),
            ErrorKind::Infrastructure => match err {
                OrderError::Store(store) => store.into(),
                _ => AppError::InternalServerError(message),
            },
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Timeout | StoreError::Unavailable(_) => AppError::Unavailable(err.to_string()),
            StoreError::Conflict(_) => AppError::ConflictError(err.to_string()),
            StoreError::Backend(_) => AppError::InternalServerError(err.to_string()),
        }
    }
}

impl From<IdentityError> for AppError {
    fn from(err: IdentityError) -> Self {
        match err {
            IdentityError::Missing | IdentityError::Invalid(_) => {
                AppError::AuthenticationError(err.to_string())
            }
            IdentityError::Unavailable(_) => AppError::Unavailable(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn status_of(err: impl Into<AppError>) -> StatusCode {
        err.into().into_response().status()
    }

    #[test]
    fn test_order_errors_map_by_kind() {
        assert_eq!(status_of(OrderError::EmptySelection), StatusCode::BAD_REQUEST);
        assert_eq!(status_of(OrderError::StallNotFound(Uuid::nil())), StatusCode::NOT_FOUND);
        assert_eq!(status_of(OrderError::AlreadyConfirmed(Uuid::nil())), StatusCode::CONFLICT);
        assert_eq!(
            status_of(OrderError::Store(StoreError::Timeout)),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            status_of(OrderError::Store(StoreError::Backend("bad row".into()))),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_identity_errors_are_unauthorized() {
        assert_eq!(status_of(IdentityError::Missing), StatusCode::UNAUTHORIZED);
        assert_eq!(status_of(IdentityError::Invalid("expired".into())), StatusCode::UNAUTHORIZED);
    }
}
