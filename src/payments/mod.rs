//! Hosted-checkout payment gateway adapter.
//!
//! The gateway is injected into [`AppState`](crate::db::AppState) as an
//! `Arc<dyn PaymentGateway>` built once at startup. Handlers never reach a
//! gateway client through globals.

mod stripe;

pub use stripe::*;

use async_trait::async_trait;
use thiserror::Error;

/// One line of a hosted-checkout page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionLineItem {
    pub name: String,
    pub description: String,
    /// Unit price in minor currency units
    pub unit_amount_cents: i64,
    pub currency: String,
    pub image_url: Option<String>,
}

/// Everything the gateway needs to open a hosted checkout.
#[derive(Debug, Clone)]
pub struct SessionRequest {
    /// Travels back on the completion event as the buyer correlation field
    pub buyer_id: String,
    /// Travels back on the completion event inside the metadata bag
    pub snapshot_id: String,
    pub line_items: Vec<SessionLineItem>,
}

/// Handle to a created hosted-checkout session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostedSession {
    pub session_id: String,
    pub checkout_url: String,
}

/// Correlation recovered from a payment-completed event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentCompletion {
    pub payment_session_id: String,
    pub buyer_id: String,
    pub snapshot_id: String,
    /// Amount the gateway says it charged. Informational only.
    pub amount_paid_cents: Option<i64>,
}

/// Connected-account onboarding state reported by the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountStatus {
    pub gateway_account_id: String,
    pub charges_enabled: bool,
    pub details_submitted: bool,
}

/// A verified, classified gateway event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayEvent {
    PaymentCompleted(PaymentCompletion),
    AccountStatusChanged(AccountStatus),
    /// Authentic but not relevant here
    Other { kind: String },
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("gateway request failed: {0}")]
    Transport(String),

    #[error("gateway returned {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("unexpected gateway response: {0}")]
    InvalidResponse(String),
}

/// Why an inbound event was not turned into a [`GatewayEvent`].
#[derive(Debug, Error)]
pub enum EventError {
    /// Signature header malformed, stale, or does not match the payload.
    #[error("signature verification failed: {0}")]
    Verification(String),

    /// Authentic payload that is not valid event JSON.
    #[error("malformed event payload: {0}")]
    Malformed(String),

    /// Authentic completion event without the correlation metadata we attach
    /// at session creation. Redelivery cannot fix it.
    #[error("event {event_kind} missing correlation: {missing}")]
    MissingCorrelation {
        event_kind: String,
        missing: &'static str,
    },
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Provider name for logging (e.g. "stripe")
    fn provider_name(&self) -> &'static str;

    /// Header carrying the event signature
    fn signature_header(&self) -> &'static str;

    /// Open a hosted checkout session.
    async fn create_session(&self, request: &SessionRequest) -> Result<HostedSession, GatewayError>;

    /// Authenticate the raw request body and classify the event.
    fn verify_event(&self, payload: &[u8], signature: &str) -> Result<GatewayEvent, EventError>;
}
