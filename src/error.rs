//! Service error type with HTTP response mapping.
//!
//! Every handler returns `Result<_, Error>`; domain failures surface as 4xx
//! with a human-readable message, anything unexpected becomes a logged 500
//! with a generic body.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Malformed or unacceptable input.
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    /// Identity header missing or unknown.
    #[error("Authentication required")]
    Unauthorized,

    #[error("Access denied")]
    Forbidden,

    /// A stock line could not be satisfied; names the offending product.
    #[error("Not enough stock for {name}. Available: {available}, Requested: {requested}")]
    InsufficientStock {
        name: String,
        available: i32,
        requested: i32,
    },

    /// Attempt to mutate an order that is already cancelled.
    #[error("{0}")]
    TerminalState(String),

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

impl Error {
    pub fn not_found(what: &str) -> Self {
        Error::NotFound(format!("{what} not found"))
    }

    fn status(&self) -> StatusCode {
        match self {
            Error::Validation(_) | Error::InsufficientStock { .. } | Error::TerminalState(_) => {
                StatusCode::BAD_REQUEST
            }
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::Unauthorized => StatusCode::UNAUTHORIZED,
            Error::Forbidden => StatusCode::FORBIDDEN,
            Error::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            Error::Database(e) => {
                tracing::error!(error = %e, "database error");
                "Server error".to_string()
            }
            other => other.to_string(),
        };
        (status, Json(serde_json::json!({ "message": message }))).into_response()
    }
}

impl From<validator::ValidationErrors> for Error {
    fn from(errors: validator::ValidationErrors) -> Self {
        Error::Validation(errors.to_string())
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            Error::Validation("Cart is empty".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(Error::not_found("Order").status(), StatusCode::NOT_FOUND);
        assert_eq!(Error::Unauthorized.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(Error::Forbidden.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            Error::InsufficientStock {
                name: "Widget".into(),
                available: 0,
                requested: 1
            }
            .status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            Error::TerminalState("Cannot update status of a cancelled order".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            Error::Database(sqlx::Error::PoolClosed).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_insufficient_stock_message_names_product() {
        let err = Error::InsufficientStock {
            name: "productB".into(),
            available: 0,
            requested: 1,
        };
        assert_eq!(
            err.to_string(),
            "Not enough stock for productB. Available: 0, Requested: 1"
        );
    }
}
