//! filemart - checkout-to-order finalization for a digital-goods marketplace
//!
//! Snapshots carts, opens hosted checkout sessions with the payment gateway,
//! and turns payment webhooks into immutable orders exactly once.

pub mod config;
pub mod db;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod id;
pub mod models;
pub mod payments;
pub mod storage;
