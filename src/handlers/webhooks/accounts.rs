use rusqlite::Connection;

use crate::db::queries;
use crate::error::Result;
use crate::payments::AccountStatus;

/// Mirror the gateway's onboarding flags onto the linked seller account.
/// Returns false when no seller is linked to the account.
pub fn apply_account_status(conn: &Connection, status: &AccountStatus) -> Result<bool> {
    let updated = queries::update_seller_account_status(
        conn,
        &status.gateway_account_id,
        status.charges_enabled,
        status.details_submitted,
    )?;

    if updated {
        tracing::info!(
            "Seller account {} updated: charges_enabled={}, details_submitted={}",
            status.gateway_account_id,
            status.charges_enabled,
            status.details_submitted
        );
    } else {
        tracing::debug!(
            "No seller linked to gateway account {}, ignoring status change",
            status.gateway_account_id
        );
    }

    Ok(updated)
}
