use serde::{Deserialize, Serialize};
use strum::EnumString;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Paid,
    Failed,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Paid => "paid",
            Self::Failed => "failed",
        }
    }
}

/// A completed purchase. At most one exists per payment session.
#[derive(Debug, Clone, Serialize)]
pub struct Order {
    pub id: String,
    pub buyer_id: String,
    pub payment_session_id: String,
    pub snapshot_id: String,
    /// Sum of the order's item prices, computed from the snapshot
    pub total_cents: i64,
    pub currency: String,
    pub status: OrderStatus,
    pub created_at: i64,
    pub updated_at: i64,
}

/// One purchased file. Immutable once written.
#[derive(Debug, Clone, Serialize)]
pub struct OrderItem {
    pub id: String,
    pub order_id: String,
    pub file_id: String,
    #[serde(skip_serializing)]
    pub file_key: String,
    pub title: String,
    pub unit_price_cents: i64,
    pub currency: String,
    pub seller_id: String,
    pub created_at: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderWithItems {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItem>,
}

/// Pre-signed link for downloading one purchased file.
#[derive(Debug, Clone, Serialize)]
pub struct DownloadLink {
    pub order_item_id: String,
    pub file_id: String,
    pub title: String,
    pub url: String,
}
