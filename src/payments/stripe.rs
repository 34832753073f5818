use std::time::Duration;

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use reqwest::Client;
use serde::Deserialize;
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::error::msg;
use crate::id::EntityType;

use super::{
    AccountStatus, EventError, GatewayError, GatewayEvent, HostedSession, PaymentCompletion,
    PaymentGateway, SessionRequest,
};

type HmacSha256 = Hmac<Sha256>;

/// Stripe credentials and redirect targets, loaded once from [`Config`](crate::config::Config).
#[derive(Debug, Clone)]
pub struct StripeConfig {
    pub secret_key: String,
    pub webhook_secret: String,
    /// API origin, overridable for stripe-mock or a recording proxy
    pub api_base: String,
    /// Where Stripe sends the buyer after paying. `{CHECKOUT_SESSION_ID}` is
    /// appended as the `session_id` query parameter.
    pub success_url: String,
    pub cancel_url: String,
}

#[derive(Debug, Deserialize)]
struct CreateCheckoutSessionResponse {
    id: String,
    url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct StripeClient {
    client: Client,
    config: StripeConfig,
}

impl StripeClient {
    /// Upper bound on a single Stripe API round trip.
    const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

    /// Maximum age of a webhook timestamp before it's rejected (in seconds).
    /// Stripe recommends 300 seconds (5 minutes).
    const WEBHOOK_TIMESTAMP_TOLERANCE_SECS: i64 = 300;

    /// Allowed clock skew for timestamps from the future.
    const WEBHOOK_FUTURE_SKEW_SECS: i64 = 60;

    pub fn new(config: StripeConfig) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .timeout(Self::REQUEST_TIMEOUT)
            .build()
            .map_err(|e| GatewayError::Transport(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { client, config })
    }

    fn success_url(&self) -> String {
        let separator = if self.config.success_url.contains('?') { '&' } else { '?' };
        format!(
            "{}{}session_id={{CHECKOUT_SESSION_ID}}",
            self.config.success_url, separator
        )
    }

    /// Form fields for `POST /v1/checkout/sessions`.
    pub fn checkout_form(&self, request: &SessionRequest) -> Vec<(String, String)> {
        let mut form: Vec<(String, String)> = vec![
            ("mode".into(), "payment".into()),
            ("success_url".into(), self.success_url()),
            ("cancel_url".into(), self.config.cancel_url.clone()),
            ("client_reference_id".into(), request.buyer_id.clone()),
            ("metadata[buyer_id]".into(), request.buyer_id.clone()),
            ("metadata[snapshot_id]".into(), request.snapshot_id.clone()),
        ];

        for (i, item) in request.line_items.iter().enumerate() {
            let prefix = format!("line_items[{}]", i);
            form.push((format!("{}[quantity]", prefix), "1".into()));
            form.push((format!("{}[price_data][currency]", prefix), item.currency.clone()));
            form.push((
                format!("{}[price_data][unit_amount]", prefix),
                item.unit_amount_cents.to_string(),
            ));
            form.push((
                format!("{}[price_data][product_data][name]", prefix),
                item.name.clone(),
            ));
            // Stripe rejects empty descriptions
            if !item.description.trim().is_empty() {
                form.push((
                    format!("{}[price_data][product_data][description]", prefix),
                    item.description.clone(),
                ));
            }
            if let Some(image) = &item.image_url {
                form.push((
                    format!("{}[price_data][product_data][images][0]", prefix),
                    image.clone(),
                ));
            }
        }

        form
    }

    pub async fn create_checkout_session(
        &self,
        request: &SessionRequest,
    ) -> Result<HostedSession, GatewayError> {
        let response = self
            .client
            .post(format!("{}/v1/checkout/sessions", self.config.api_base))
            .basic_auth(&self.config.secret_key, None::<&str>)
            .form(&self.checkout_form(request))
            .send()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let session: CreateCheckoutSessionResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::InvalidResponse(e.to_string()))?;

        let checkout_url = session
            .url
            .ok_or_else(|| GatewayError::InvalidResponse("session has no hosted URL".into()))?;

        Ok(HostedSession {
            session_id: session.id,
            checkout_url,
        })
    }

    pub fn verify_webhook_signature(&self, payload: &[u8], signature: &str) -> Result<bool, EventError> {
        self.verify_webhook_signature_at(payload, signature, chrono::Utc::now().timestamp())
    }

    /// Signature check against an explicit clock.
    ///
    /// Header format: `t=timestamp,v1=signature[,v1=signature...]`. Several
    /// `v1` entries appear while a webhook secret is being rolled.
    pub fn verify_webhook_signature_at(
        &self,
        payload: &[u8],
        signature: &str,
        now: i64,
    ) -> Result<bool, EventError> {
        let mut timestamp = None;
        let mut candidates = Vec::new();

        for part in signature.split(',') {
            let part = part.trim();
            if let Some(t) = part.strip_prefix("t=") {
                timestamp = Some(t);
            } else if let Some(s) = part.strip_prefix("v1=") {
                candidates.push(s);
            }
        }

        let timestamp_str = timestamp
            .ok_or_else(|| EventError::Verification(msg::INVALID_SIGNATURE_FORMAT.into()))?;
        if candidates.is_empty() {
            return Err(EventError::Verification(msg::INVALID_SIGNATURE_FORMAT.into()));
        }

        let timestamp: i64 = timestamp_str
            .parse()
            .map_err(|_| EventError::Verification(msg::INVALID_TIMESTAMP_IN_SIGNATURE.into()))?;

        let age = now - timestamp;
        if age > Self::WEBHOOK_TIMESTAMP_TOLERANCE_SECS {
            tracing::warn!(
                "Stripe webhook rejected: timestamp too old (age={}s, max={}s)",
                age,
                Self::WEBHOOK_TIMESTAMP_TOLERANCE_SECS
            );
            return Ok(false);
        }
        if age < -Self::WEBHOOK_FUTURE_SKEW_SECS {
            tracing::warn!("Stripe webhook rejected: timestamp in the future (age={}s)", age);
            return Ok(false);
        }

        let mut mac = HmacSha256::new_from_slice(self.config.webhook_secret.as_bytes())
            .map_err(|_| EventError::Verification(msg::INVALID_WEBHOOK_SECRET.into()))?;
        mac.update(timestamp_str.as_bytes());
        mac.update(b".");
        mac.update(payload);
        let expected = hex::encode(mac.finalize().into_bytes());
        let expected_bytes = expected.as_bytes();

        // Length is not secret (always 64 hex chars); the byte compare is constant-time.
        Ok(candidates.iter().any(|candidate| {
            candidate.len() == expected_bytes.len()
                && bool::from(expected_bytes.ct_eq(candidate.as_bytes()))
        }))
    }

    /// Classify an authenticated payload.
    pub fn parse_event(payload: &[u8]) -> Result<GatewayEvent, EventError> {
        let event: StripeWebhookEvent =
            serde_json::from_slice(payload).map_err(|e| EventError::Malformed(e.to_string()))?;

        match event.event_type.as_str() {
            "checkout.session.completed" | "checkout.session.async_payment_succeeded" => {
                parse_checkout_completed(&event)
            }
            "account.updated" => parse_account_updated(&event),
            _ => Ok(GatewayEvent::Other {
                kind: event.event_type,
            }),
        }
    }
}

#[async_trait]
impl PaymentGateway for StripeClient {
    fn provider_name(&self) -> &'static str {
        "stripe"
    }

    fn signature_header(&self) -> &'static str {
        "stripe-signature"
    }

    async fn create_session(&self, request: &SessionRequest) -> Result<HostedSession, GatewayError> {
        self.create_checkout_session(request).await
    }

    fn verify_event(&self, payload: &[u8], signature: &str) -> Result<GatewayEvent, EventError> {
        if !self.verify_webhook_signature(payload, signature)? {
            return Err(EventError::Verification("signature mismatch".into()));
        }
        Self::parse_event(payload)
    }
}

/// Generic Stripe webhook event - object is parsed based on event_type
#[derive(Debug, Deserialize)]
pub struct StripeWebhookEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: StripeEventData,
}

#[derive(Debug, Deserialize)]
pub struct StripeEventData {
    pub object: serde_json::Value,
}

// ============ checkout.session.completed ============

#[derive(Debug, Deserialize)]
pub struct StripeCheckoutSession {
    pub id: String,
    pub payment_status: String,
    pub client_reference_id: Option<String>,
    pub amount_total: Option<i64>,
    #[serde(default)]
    pub metadata: StripeCheckoutMetadata,
}

#[derive(Debug, Default, Deserialize)]
pub struct StripeCheckoutMetadata {
    pub buyer_id: Option<String>,
    pub snapshot_id: Option<String>,
}

// ============ account.updated ============

#[derive(Debug, Deserialize)]
pub struct StripeAccount {
    pub id: String,
    #[serde(default)]
    pub charges_enabled: bool,
    #[serde(default)]
    pub details_submitted: bool,
}

fn parse_checkout_completed(event: &StripeWebhookEvent) -> Result<GatewayEvent, EventError> {
    let session: StripeCheckoutSession = serde_json::from_value(event.data.object.clone())
        .map_err(|e| EventError::Malformed(format!("invalid checkout session: {}", e)))?;

    // Delayed payment methods complete the session before funds arrive; the
    // async_payment_succeeded event follows once they do.
    // A session fully covered by discounts completes as no_payment_required
    // and is as final as a paid one.
    if !matches!(session.payment_status.as_str(), "paid" | "no_payment_required") {
        return Ok(GatewayEvent::Other {
            kind: format!("{} ({})", event.event_type, session.payment_status),
        });
    }

    let buyer_id = session
        .client_reference_id
        .or(session.metadata.buyer_id)
        .ok_or_else(|| EventError::MissingCorrelation {
            event_kind: event.event_type.clone(),
            missing: "buyer_id",
        })?;
    let snapshot_id = session
        .metadata
        .snapshot_id
        .filter(|id| EntityType::CartSnapshot.matches(id))
        .ok_or_else(|| EventError::MissingCorrelation {
            event_kind: event.event_type.clone(),
            missing: "snapshot_id",
        })?;

    Ok(GatewayEvent::PaymentCompleted(PaymentCompletion {
        payment_session_id: session.id,
        buyer_id,
        snapshot_id,
        amount_paid_cents: session.amount_total,
    }))
}

fn parse_account_updated(event: &StripeWebhookEvent) -> Result<GatewayEvent, EventError> {
    let account: StripeAccount = serde_json::from_value(event.data.object.clone())
        .map_err(|e| EventError::Malformed(format!("invalid account: {}", e)))?;

    Ok(GatewayEvent::AccountStatusChanged(AccountStatus {
        gateway_account_id: account.id,
        charges_enabled: account.charges_enabled,
        details_submitted: account.details_submitted,
    }))
}
