use std::collections::HashSet;

use axum::extract::State;
use serde::{Deserialize, Serialize};

use crate::db::{AppState, queries};
use crate::error::{AppError, Result, msg};
use crate::extractors::Json;
use crate::models::{CartLineItem, CatalogFile};
use crate::payments::{GatewayError, SessionLineItem, SessionRequest};

use super::resolve_buyer;

/// Upper bound on line items in one checkout.
pub const MAX_LINE_ITEMS: usize = 100;

/// The client names files only. Prices, titles and blob keys come from the
/// catalog so the snapshot is authoritative.
#[derive(Debug, Deserialize)]
pub struct CheckoutRequest {
    pub buyer_identity: String,
    #[serde(default)]
    pub line_items: Vec<CheckoutLineItem>,
}

#[derive(Debug, Deserialize)]
pub struct CheckoutLineItem {
    pub file_id: String,
}

#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    pub session_id: String,
    pub checkout_url: String,
}

fn validate_shape(request: &CheckoutRequest) -> Result<()> {
    if request.buyer_identity.trim().is_empty() {
        return Err(AppError::BadRequest(msg::BUYER_IDENTITY_REQUIRED.into()));
    }
    if request.line_items.is_empty() {
        return Err(AppError::BadRequest(msg::LINE_ITEMS_REQUIRED.into()));
    }
    if request.line_items.len() > MAX_LINE_ITEMS {
        return Err(AppError::BadRequest(format!(
            "{} (max {})",
            msg::TOO_MANY_LINE_ITEMS,
            MAX_LINE_ITEMS
        )));
    }

    let mut seen = HashSet::with_capacity(request.line_items.len());
    for item in &request.line_items {
        if !seen.insert(item.file_id.as_str()) {
            return Err(AppError::BadRequest(format!(
                "{}: {}",
                msg::DUPLICATE_LINE_ITEM,
                item.file_id
            )));
        }
    }
    Ok(())
}

/// A file the buyer may purchase in this checkout.
fn purchasable_file(file: Option<CatalogFile>, file_id: &str, buyer_id: &str) -> Result<CatalogFile> {
    let file =
        file.ok_or_else(|| AppError::BadRequest(format!("{}: {}", msg::FILE_NOT_FOUND, file_id)))?;
    if !file.active {
        return Err(AppError::BadRequest(format!(
            "{}: {}",
            msg::FILE_NOT_PURCHASABLE,
            file_id
        )));
    }
    if file.seller_id == buyer_id {
        return Err(AppError::BadRequest(msg::SELF_OWNED_FILE.into()));
    }
    Ok(file)
}

/// Snapshot the requested files and open a hosted checkout for them.
///
/// Never creates an order. A gateway failure leaves an unreferenced snapshot
/// behind, which the snapshot purge eventually removes.
pub async fn create_checkout_session(
    state: &AppState,
    request: &CheckoutRequest,
) -> Result<CheckoutResponse> {
    validate_shape(request)?;

    // Connection is released before the gateway round trip.
    let (snapshot, files) = {
        let conn = state.db.get()?;

        let buyer = resolve_buyer(&conn, &request.buyer_identity)?;

        let mut files = Vec::with_capacity(request.line_items.len());
        for item in &request.line_items {
            let file = queries::get_file_by_id(&conn, &item.file_id)?;
            files.push(purchasable_file(file, &item.file_id, &buyer.id)?);
        }

        if files.iter().any(|f| f.currency != files[0].currency) {
            return Err(AppError::BadRequest(msg::MIXED_CURRENCIES.into()));
        }
        // Hosted checkout in payment mode can't collect a zero amount, and a
        // free session never reports itself as paid.
        if files.iter().all(|f| f.price_cents == 0) {
            return Err(AppError::BadRequest(msg::ZERO_TOTAL_CHECKOUT.into()));
        }

        let line_items: Vec<CartLineItem> = files
            .iter()
            .map(|f| CartLineItem {
                file_id: f.id.clone(),
                seller_id: f.seller_id.clone(),
                title: f.title.clone(),
                unit_price_cents: f.price_cents,
                currency: f.currency.clone(),
                file_key: f.file_key.clone(),
            })
            .collect();

        let snapshot = queries::create_cart_snapshot(&conn, &buyer.id, &line_items)?;
        (snapshot, files)
    };

    let session_request = SessionRequest {
        buyer_id: snapshot.buyer_id.clone(),
        snapshot_id: snapshot.id.clone(),
        line_items: files
            .into_iter()
            .map(|f| SessionLineItem {
                name: f.title,
                description: f.description,
                unit_amount_cents: f.price_cents,
                currency: f.currency,
                image_url: f.thumbnail_url,
            })
            .collect(),
    };

    let session = state
        .gateway
        .create_session(&session_request)
        .await
        .map_err(|e| {
            tracing::warn!(
                "{} session creation failed for snapshot {}: {}",
                state.gateway.provider_name(),
                snapshot.id,
                e
            );
            gateway_error(e)
        })?;

    tracing::info!(
        "Checkout session {} opened for buyer {} (snapshot {}, {} items, {} {})",
        session.session_id,
        snapshot.buyer_id,
        snapshot.id,
        snapshot.line_items.len(),
        snapshot.total_cents(),
        snapshot.currency().unwrap_or_default()
    );

    Ok(CheckoutResponse {
        session_id: session.session_id,
        checkout_url: session.checkout_url,
    })
}

/// Only faults a retry can fix are reported as unavailable. A 4xx means the
/// gateway refused what we sent.
fn gateway_error(e: GatewayError) -> AppError {
    match e {
        GatewayError::Rejected { status, .. } if (400..500).contains(&status) => {
            AppError::Internal(e.to_string())
        }
        _ => AppError::GatewayUnavailable(e.to_string()),
    }
}

pub async fn post_checkout(
    State(state): State<AppState>,
    Json(request): Json<CheckoutRequest>,
) -> Result<Json<CheckoutResponse>> {
    create_checkout_session(&state, &request).await.map(Json)
}
