mod cart;
mod checkout;
mod orders;
pub mod webhooks;

pub use cart::*;
pub use checkout::*;
pub use orders::*;

use axum::{
    Json, Router,
    routing::{delete, get, post},
};
use rusqlite::Connection;
use serde::Serialize;

use crate::db::{AppState, queries};
use crate::error::{AppError, OptionExt, Result, msg};
use crate::models::User;

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Look up the local buyer for an identity-provider subject.
/// Unknown identities are 404, banned buyers 403.
pub(crate) fn resolve_buyer(conn: &Connection, identity: &str) -> Result<User> {
    let buyer = queries::get_user_by_identity(conn, identity.trim())?
        .or_not_found(msg::BUYER_NOT_FOUND)?;
    if buyer.banned {
        return Err(AppError::Forbidden(msg::BUYER_BANNED.into()));
    }
    Ok(buyer)
}

/// Buyer-facing routes. Webhooks are mounted separately.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/checkout", post(post_checkout))
        .route("/checkout/{session_id}/order", get(get_order_for_session))
        .route("/cart", get(get_cart))
        .route("/cart/items", post(add_to_cart))
        .route("/cart/items/{file_id}", delete(remove_from_cart))
        .route("/orders", get(list_orders))
        .route("/orders/{order_id}/downloads", get(list_downloads))
}
