use serde::Serialize;

use super::CartLineItem;

/// Immutable point-in-time copy of the line items a buyer is paying for.
///
/// Written once at checkout-session creation and read back by the order
/// materializer when the gateway confirms payment.
#[derive(Debug, Clone, Serialize)]
pub struct CartSnapshot {
    pub id: String,
    pub buyer_id: String,
    pub line_items: Vec<CartLineItem>,
    pub created_at: i64,
}

impl CartSnapshot {
    /// Authoritative amount owed for this snapshot (quantity is always 1).
    pub fn total_cents(&self) -> i64 {
        self.line_items.iter().map(|i| i.unit_price_cents).sum()
    }

    /// Currency of the snapshot. Checkout rejects mixed currencies, so the
    /// first item is representative.
    pub fn currency(&self) -> Option<&str> {
        self.line_items.first().map(|i| i.currency.as_str())
    }
}
