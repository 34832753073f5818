mod accounts;
mod materialize;
mod receiver;

pub use accounts::apply_account_status;
pub use materialize::{Materialization, MaterializeError, materialize};
pub use receiver::{WebhookOutcome, handle_stripe_webhook, handle_webhook};

use axum::{Router, routing::post};

use crate::db::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/webhook/stripe", post(handle_stripe_webhook))
}
