use serde::Serialize;

/// Payment gateway connected account backing a seller's payouts.
#[derive(Debug, Clone, Serialize)]
pub struct SellerAccount {
    pub user_id: String,
    /// Gateway account ID (Stripe: acct_xxx)
    pub gateway_account_id: String,
    pub charges_enabled: bool,
    pub details_submitted: bool,
    pub updated_at: i64,
}
