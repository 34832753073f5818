use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};

use crate::db::AppState;
use crate::error::msg;
use crate::payments::{EventError, GatewayEvent, PaymentCompletion};

use super::accounts::apply_account_status;
use super::materialize::{MaterializeError, materialize};

/// What happened to one webhook delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookOutcome {
    /// A new order was created.
    Materialized { order_id: String },
    /// An earlier delivery already created the order.
    AlreadyMaterialized { order_id: String },
    /// Accepted without creating anything (account updates, integrity faults).
    Acknowledged(&'static str),
    /// Authentic event of a kind we don't handle.
    Ignored { kind: String },
    /// Not authenticated or not parseable. No side effects.
    Rejected(&'static str),
    /// Transient storage fault; the gateway should redeliver.
    RetryLater,
}

impl WebhookOutcome {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Materialized { .. }
            | Self::AlreadyMaterialized { .. }
            | Self::Acknowledged(_)
            | Self::Ignored { .. } => StatusCode::OK,
            Self::Rejected(_) => StatusCode::BAD_REQUEST,
            Self::RetryLater => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn message(&self) -> &'static str {
        match self {
            Self::Materialized { .. } => "Order created",
            Self::AlreadyMaterialized { .. } => "Already processed",
            Self::Acknowledged(reason) => *reason,
            Self::Ignored { .. } => "Event ignored",
            Self::Rejected(reason) => *reason,
            Self::RetryLater => "Temporary failure, retry later",
        }
    }
}

impl IntoResponse for WebhookOutcome {
    fn into_response(self) -> Response {
        (self.status_code(), self.message()).into_response()
    }
}

pub async fn handle_stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> WebhookOutcome {
    handle_webhook(&state, &headers, &body)
}

/// Verify, classify and act on one gateway delivery.
pub fn handle_webhook(state: &AppState, headers: &HeaderMap, body: &Bytes) -> WebhookOutcome {
    let gateway = state.gateway.as_ref();

    let signature = match headers.get(gateway.signature_header()) {
        Some(value) => match value.to_str() {
            Ok(s) => s,
            Err(_) => return WebhookOutcome::Rejected(msg::INVALID_SIGNATURE_HEADER),
        },
        None => return WebhookOutcome::Rejected(msg::MISSING_SIGNATURE_HEADER),
    };

    let event = match gateway.verify_event(body, signature) {
        Ok(event) => event,
        Err(EventError::Verification(reason)) => {
            tracing::warn!(
                "Rejected {} webhook with bad signature: {}",
                gateway.provider_name(),
                reason
            );
            return WebhookOutcome::Rejected("Invalid signature");
        }
        Err(EventError::Malformed(reason)) => {
            tracing::warn!("Unparseable {} webhook: {}", gateway.provider_name(), reason);
            return WebhookOutcome::Rejected("Invalid JSON");
        }
        Err(e @ EventError::MissingCorrelation { .. }) => {
            tracing::error!("Integrity fault in {} webhook: {}", gateway.provider_name(), e);
            return WebhookOutcome::Acknowledged("Missing correlation metadata");
        }
    };

    match event {
        GatewayEvent::PaymentCompleted(completion) => handle_payment_completed(state, &completion),
        GatewayEvent::AccountStatusChanged(status) => {
            let conn = match state.db.get() {
                Ok(conn) => conn,
                Err(e) => {
                    tracing::error!("DB connection error: {}", e);
                    return WebhookOutcome::RetryLater;
                }
            };
            match apply_account_status(&conn, &status) {
                Ok(true) => WebhookOutcome::Acknowledged("Seller account updated"),
                Ok(false) => WebhookOutcome::Acknowledged("Seller account not found"),
                Err(e) => {
                    tracing::error!("Failed to update seller account: {}", e);
                    WebhookOutcome::RetryLater
                }
            }
        }
        GatewayEvent::Other { kind } => {
            tracing::debug!("Ignoring {} event: {}", gateway.provider_name(), kind);
            WebhookOutcome::Ignored { kind }
        }
    }
}

fn handle_payment_completed(state: &AppState, completion: &PaymentCompletion) -> WebhookOutcome {
    let mut conn = match state.db.get() {
        Ok(conn) => conn,
        Err(e) => {
            tracing::error!("DB connection error: {}", e);
            return WebhookOutcome::RetryLater;
        }
    };

    match materialize(&mut conn, completion) {
        Ok(m) if m.created => WebhookOutcome::Materialized {
            order_id: m.order.id,
        },
        Ok(m) => {
            tracing::info!(
                "Duplicate completion for session {} (order {})",
                completion.payment_session_id,
                m.order.id
            );
            WebhookOutcome::AlreadyMaterialized {
                order_id: m.order.id,
            }
        }
        Err(e) if e.is_retryable() => {
            tracing::error!(
                "Materialization of session {} failed, requesting redelivery: {}",
                completion.payment_session_id,
                e
            );
            WebhookOutcome::RetryLater
        }
        Err(e) => {
            tracing::error!(
                "Integrity fault materializing session {}: {}",
                completion.payment_session_id,
                e
            );
            WebhookOutcome::Acknowledged(match e {
                MaterializeError::SnapshotMissing { .. } => "Cart snapshot not found",
                MaterializeError::BuyerMismatch { .. } => "Buyer does not match snapshot",
                MaterializeError::EmptySnapshot { .. } => "Cart snapshot is empty",
                MaterializeError::Storage(_) => "Storage error",
            })
        }
    }
}
