use serde::{Deserialize, Serialize};

/// One purchasable file in a buyer's cart, priced at the moment it was read.
///
/// This is also the unit stored inside a [`CartSnapshot`](super::CartSnapshot),
/// so field names are part of the persisted snapshot format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLineItem {
    pub file_id: String,
    pub seller_id: String,
    pub title: String,
    pub unit_price_cents: i64,
    pub currency: String,
    pub file_key: String,
}

#[derive(Debug, Deserialize)]
pub struct AddCartItem {
    pub file_id: String,
}

/// Buyer-facing cart line. Leaves out the blob key.
#[derive(Debug, Serialize)]
pub struct CartItemView {
    pub file_id: String,
    pub seller_id: String,
    pub title: String,
    pub unit_price_cents: i64,
    pub currency: String,
}

impl From<CartLineItem> for CartItemView {
    fn from(item: CartLineItem) -> Self {
        Self {
            file_id: item.file_id,
            seller_id: item.seller_id,
            title: item.title,
            unit_price_cents: item.unit_price_cents,
            currency: item.currency,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CartView {
    pub items: Vec<CartItemView>,
    pub subtotal_cents: i64,
}

impl CartView {
    pub fn new(items: Vec<CartLineItem>) -> Self {
        let subtotal_cents = items.iter().map(|i| i.unit_price_cents).sum();
        Self {
            items: items.into_iter().map(CartItemView::from).collect(),
            subtotal_cents,
        }
    }
}
