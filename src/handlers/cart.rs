use axum::extract::State;

use crate::db::{AppState, queries};
use crate::error::{AppError, OptionExt, Result, msg};
use crate::extractors::{BuyerIdentity, Json, Path};
use crate::models::{AddCartItem, CartView};

use super::resolve_buyer;

pub async fn get_cart(
    State(state): State<AppState>,
    BuyerIdentity(identity): BuyerIdentity,
) -> Result<Json<CartView>> {
    let conn = state.db.get()?;
    let buyer = resolve_buyer(&conn, &identity)?;
    let items = queries::list_cart_items(&conn, &buyer.id)?;
    Ok(Json(CartView::new(items)))
}

/// Adding a file already in the cart is a no-op.
pub async fn add_to_cart(
    State(state): State<AppState>,
    BuyerIdentity(identity): BuyerIdentity,
    Json(input): Json<AddCartItem>,
) -> Result<Json<CartView>> {
    let conn = state.db.get()?;
    let buyer = resolve_buyer(&conn, &identity)?;

    let file = queries::get_file_by_id(&conn, &input.file_id)?.or_not_found(msg::FILE_NOT_FOUND)?;
    if !file.active {
        return Err(AppError::BadRequest(msg::FILE_NOT_PURCHASABLE.into()));
    }
    if file.seller_id == buyer.id {
        return Err(AppError::BadRequest(msg::SELF_OWNED_FILE.into()));
    }

    if queries::add_cart_item(&conn, &buyer.id, &file.id)? {
        tracing::debug!("Buyer {} added {} to cart", buyer.id, file.id);
    }

    let items = queries::list_cart_items(&conn, &buyer.id)?;
    Ok(Json(CartView::new(items)))
}

/// Removing a file that isn't in the cart is a no-op.
pub async fn remove_from_cart(
    State(state): State<AppState>,
    BuyerIdentity(identity): BuyerIdentity,
    Path(file_id): Path<String>,
) -> Result<Json<CartView>> {
    let conn = state.db.get()?;
    let buyer = resolve_buyer(&conn, &identity)?;

    queries::remove_cart_item(&conn, &buyer.id, &file_id)?;

    let items = queries::list_cart_items(&conn, &buyer.id)?;
    Ok(Json(CartView::new(items)))
}
