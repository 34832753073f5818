//! Exactly-once conversion of a paid checkout into an order.
//!
//! Idempotency lives in the database: the unique index on
//! `orders.payment_session_id` decides which of several concurrent or repeated
//! deliveries creates the order. Everyone else gets the existing row back.

use rusqlite::{Connection, TransactionBehavior};
use thiserror::Error;

use crate::db::queries;
use crate::error::AppError;
use crate::models::{Order, OrderItem};
use crate::payments::PaymentCompletion;

#[derive(Debug)]
pub struct Materialization {
    pub order: Order,
    pub items: Vec<OrderItem>,
    /// False when an earlier delivery already created the order.
    pub created: bool,
}

#[derive(Debug, Error)]
pub enum MaterializeError {
    #[error("cart snapshot {snapshot_id} not found")]
    SnapshotMissing { snapshot_id: String },

    #[error("cart snapshot {snapshot_id} does not belong to buyer {buyer_id}")]
    BuyerMismatch {
        snapshot_id: String,
        buyer_id: String,
    },

    #[error("cart snapshot {snapshot_id} has no line items")]
    EmptySnapshot { snapshot_id: String },

    #[error("storage error: {0}")]
    Storage(#[from] AppError),
}

impl From<rusqlite::Error> for MaterializeError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Storage(AppError::Database(e))
    }
}

impl MaterializeError {
    /// Whether redelivering the same event could succeed.
    ///
    /// Only storage faults qualify; the integrity faults describe data that a
    /// retry will not change.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Storage(_))
    }
}

/// Create the order and its items for a completed payment, or return the one
/// that already exists for this payment session.
///
/// All inserts happen inside one IMMEDIATE transaction. The live cart is
/// drained afterwards, only by the call that created the order, and failures
/// there never affect the order.
pub fn materialize(
    conn: &mut Connection,
    completion: &PaymentCompletion,
) -> Result<Materialization, MaterializeError> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let Some(snapshot) = queries::get_cart_snapshot(&tx, &completion.snapshot_id)? else {
        // Snapshots are purged after a retention window; a late redelivery for
        // an order that already exists is still a duplicate, not a fault.
        if let Some(order) =
            queries::get_order_by_payment_session(&tx, &completion.payment_session_id)?
        {
            let items = queries::list_order_items(&tx, &order.id)?;
            return Ok(Materialization {
                order,
                items,
                created: false,
            });
        }
        return Err(MaterializeError::SnapshotMissing {
            snapshot_id: completion.snapshot_id.clone(),
        });
    };

    if snapshot.buyer_id != completion.buyer_id {
        return Err(MaterializeError::BuyerMismatch {
            snapshot_id: snapshot.id,
            buyer_id: completion.buyer_id.clone(),
        });
    }

    let Some(currency) = snapshot.currency().map(str::to_string) else {
        return Err(MaterializeError::EmptySnapshot {
            snapshot_id: snapshot.id,
        });
    };

    let total_cents = snapshot.total_cents();
    if let Some(paid) = completion.amount_paid_cents.filter(|&paid| paid != total_cents) {
        tracing::warn!(
            "Gateway amount {} differs from snapshot total {} for session {} (storing snapshot total)",
            paid,
            total_cents,
            completion.payment_session_id
        );
    }

    let Some(order) = queries::try_insert_paid_order(
        &tx,
        &completion.buyer_id,
        &completion.payment_session_id,
        &snapshot,
        &currency,
    )?
    else {
        let order = queries::get_order_by_payment_session(&tx, &completion.payment_session_id)?
            .ok_or_else(|| {
                AppError::Internal(format!(
                    "order for session {} conflicted but could not be loaded",
                    completion.payment_session_id
                ))
            })?;
        let items = queries::list_order_items(&tx, &order.id)?;
        return Ok(Materialization {
            order,
            items,
            created: false,
        });
    };

    let mut items = Vec::with_capacity(snapshot.line_items.len());
    for (position, line) in snapshot.line_items.iter().enumerate() {
        items.push(queries::create_order_item(
            &tx,
            &order.id,
            position,
            line,
            order.created_at,
        )?);
    }

    tx.commit()?;

    tracing::info!(
        "Materialized order {} ({} items, {} {}) for session {}",
        order.id,
        items.len(),
        order.total_cents,
        order.currency,
        order.payment_session_id
    );

    for line in &snapshot.line_items {
        if let Err(e) = queries::remove_cart_item(conn, &snapshot.buyer_id, &line.file_id) {
            tracing::warn!(
                "Failed to drain file {} from cart of buyer {}: {}",
                line.file_id,
                snapshot.buyer_id,
                e
            );
        }
    }

    Ok(Materialization {
        order,
        items,
        created: true,
    })
}
