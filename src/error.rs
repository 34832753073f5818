use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

/// User-facing error messages shared across handlers.
pub mod msg {
    pub const BUYER_IDENTITY_REQUIRED: &str = "buyer_identity is required";
    pub const BUYER_NOT_FOUND: &str = "Buyer not found";
    pub const BUYER_BANNED: &str = "Buyer account is suspended";
    pub const LINE_ITEMS_REQUIRED: &str = "At least one line item is required";
    pub const TOO_MANY_LINE_ITEMS: &str = "Too many line items in one checkout";
    pub const DUPLICATE_LINE_ITEM: &str = "Each file may appear only once per checkout";
    pub const FILE_NOT_FOUND: &str = "File not found";
    pub const FILE_NOT_PURCHASABLE: &str = "File is not available for purchase";
    pub const SELF_OWNED_FILE: &str = "You cannot purchase your own file";
    pub const MIXED_CURRENCIES: &str = "All line items must share one currency";
    pub const ZERO_TOTAL_CHECKOUT: &str = "Checkout total must be greater than zero";
    pub const ORDER_NOT_FOUND: &str = "Order not found";
    pub const GATEWAY_UNAVAILABLE: &str = "Payment gateway unavailable, please retry";
    pub const MISSING_SIGNATURE_HEADER: &str = "Missing signature header";
    pub const INVALID_SIGNATURE_HEADER: &str = "Invalid signature header";
    pub const INVALID_SIGNATURE_FORMAT: &str = "Invalid signature format";
    pub const INVALID_TIMESTAMP_IN_SIGNATURE: &str = "Invalid timestamp in signature";
    pub const INVALID_WEBHOOK_SECRET: &str = "Invalid webhook secret";
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Gateway unavailable: {0}")]
    GatewayUnavailable(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid request body: {0}")]
    JsonRejection(#[from] JsonRejection),

    #[error("Invalid path: {0}")]
    PathRejection(#[from] PathRejection),

    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, details) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "Not found", Some(msg.clone())),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "Bad request", Some(msg.clone())),
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized", None),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, "Forbidden", Some(msg.clone())),
            AppError::GatewayUnavailable(reason) => {
                tracing::warn!("Payment gateway unavailable: {}", reason);
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "Service unavailable",
                    Some(msg::GATEWAY_UNAVAILABLE.to_string()),
                )
            }
            AppError::Database(e) => {
                tracing::error!("Database error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error", None)
            }
            AppError::Pool(e) => {
                tracing::error!("Pool error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error", None)
            }
            AppError::Json(e) => {
                tracing::error!("JSON error: {}", e);
                (StatusCode::BAD_REQUEST, "Invalid JSON", Some(e.to_string()))
            }
            AppError::JsonRejection(rejection) => (
                StatusCode::BAD_REQUEST,
                "Invalid JSON",
                Some(rejection.body_text()),
            ),
            AppError::PathRejection(rejection) => (
                StatusCode::BAD_REQUEST,
                "Invalid path",
                Some(rejection.body_text()),
            ),
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error", None)
            }
        };

        let body = ErrorResponse {
            error: error.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

/// Converts `Option<T>` lookups into 404s.
pub trait OptionExt<T> {
    fn or_not_found(self, message: &str) -> Result<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn or_not_found(self, message: &str) -> Result<T> {
        self.ok_or_else(|| AppError::NotFound(message.to_string()))
    }
}
