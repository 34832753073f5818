use axum::extract::State;
use rusqlite::Connection;
use serde::Serialize;

use crate::db::{AppState, queries};
use crate::error::{AppError, OptionExt, Result, msg};
use crate::extractors::{BuyerIdentity, Json, Path};
use crate::models::{DownloadLink, Order, OrderStatus, OrderWithItems};

use super::resolve_buyer;

/// Order state seen by a buyer returning from the hosted checkout page.
///
/// The webhook may land after the redirect, so the client polls until the
/// order appears.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum SessionOrderResponse {
    Pending { status: &'static str },
    Ready(OrderWithItems),
}

fn with_items(conn: &Connection, order: Order) -> Result<OrderWithItems> {
    let items = queries::list_order_items(conn, &order.id)?;
    Ok(OrderWithItems { order, items })
}

/// Newest first.
pub async fn list_orders(
    State(state): State<AppState>,
    BuyerIdentity(identity): BuyerIdentity,
) -> Result<Json<Vec<OrderWithItems>>> {
    let conn = state.db.get()?;
    let buyer = resolve_buyer(&conn, &identity)?;

    let orders = queries::list_orders_for_buyer(&conn, &buyer.id)?
        .into_iter()
        .map(|order| with_items(&conn, order))
        .collect::<Result<Vec<_>>>()?;

    Ok(Json(orders))
}

pub async fn get_order_for_session(
    State(state): State<AppState>,
    BuyerIdentity(identity): BuyerIdentity,
    Path(session_id): Path<String>,
) -> Result<Json<SessionOrderResponse>> {
    let conn = state.db.get()?;
    let buyer = resolve_buyer(&conn, &identity)?;

    match queries::get_order_by_payment_session(&conn, &session_id)? {
        Some(order) if order.buyer_id == buyer.id => Ok(Json(SessionOrderResponse::Ready(
            with_items(&conn, order)?,
        ))),
        // Someone else's session is indistinguishable from an unknown one
        Some(_) => Err(AppError::NotFound(msg::ORDER_NOT_FOUND.into())),
        None => Ok(Json(SessionOrderResponse::Pending {
            status: OrderStatus::Pending.as_str(),
        })),
    }
}

/// Pre-signed links for every file in a paid order.
pub async fn list_downloads(
    State(state): State<AppState>,
    BuyerIdentity(identity): BuyerIdentity,
    Path(order_id): Path<String>,
) -> Result<Json<Vec<DownloadLink>>> {
    let conn = state.db.get()?;
    let buyer = resolve_buyer(&conn, &identity)?;

    let order = queries::get_order_by_id(&conn, &order_id)?
        .filter(|o| o.buyer_id == buyer.id)
        .or_not_found(msg::ORDER_NOT_FOUND)?;

    if order.status != OrderStatus::Paid {
        return Err(AppError::Forbidden(format!(
            "Order is {}, downloads are available once paid",
            order.status.as_str()
        )));
    }

    let links = queries::list_order_items(&conn, &order.id)?
        .into_iter()
        .map(|item| {
            Ok(DownloadLink {
                url: state.blobs.presign(&item.file_key)?,
                order_item_id: item.id,
                file_id: item.file_id,
                title: item.title,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(Json(links))
}
