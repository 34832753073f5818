use serde::{Deserialize, Serialize};

/// Local mirror of an identity-provider subject.
///
/// `identity` is the opaque subject the identity provider hands us; it is
/// trusted as-is. The same record acts as buyer and (optionally) seller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub identity: String,
    pub email: String,
    pub display_name: String,
    /// Banned users cannot start checkouts
    pub banned: bool,
    pub created_at: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateUser {
    pub identity: String,
    pub email: String,
    pub display_name: String,
}
