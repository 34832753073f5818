//! Prefixed ID generation for marketplace entities.
//!
//! All IDs use an `fm_` brand prefix so they can never be confused with
//! payment gateway IDs (Stripe's `cs_`, `acct_`, `pi_`, etc.), which matters
//! because both kinds travel through webhook metadata side by side.
//!
//! Format: `fm_{entity}_{uuid_simple}` (32 hex chars, no hyphens)

use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityType {
    User,
    File,
    CartSnapshot,
    Order,
    OrderItem,
}

impl EntityType {
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::User => "fm_usr",
            Self::File => "fm_file",
            Self::CartSnapshot => "fm_snap",
            Self::Order => "fm_ord",
            Self::OrderItem => "fm_oi",
        }
    }

    pub fn gen_id(&self) -> String {
        format!("{}_{}", self.prefix(), Uuid::new_v4().as_simple())
    }

    /// True if `id` is a well-formed ID of this entity type.
    /// Cheap check to reject garbage before hitting the database.
    pub fn matches(&self, id: &str) -> bool {
        id.strip_prefix(self.prefix())
            .and_then(|rest| rest.strip_prefix('_'))
            .is_some_and(|hex| hex.len() == 32 && hex.chars().all(|c| c.is_ascii_hexdigit()))
    }
}
