use serde::{Deserialize, Serialize};

/// A purchasable file listed by a seller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogFile {
    pub id: String,
    pub seller_id: String,
    pub title: String,
    pub description: String,
    /// Price in minor currency units
    pub price_cents: i64,
    /// Lowercase ISO currency code
    pub currency: String,
    /// Blob store key of the uploaded file (never exposed to buyers directly)
    #[serde(skip_serializing)]
    pub file_key: String,
    pub thumbnail_url: Option<String>,
    /// Inactive listings cannot be added to carts or checked out
    pub active: bool,
    pub created_at: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateFile {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub price_cents: i64,
    pub currency: String,
    pub file_key: String,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
}
