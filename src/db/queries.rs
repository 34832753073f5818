use chrono::Utc;
use rusqlite::{Connection, params};

use crate::error::Result;
use crate::id::EntityType;
use crate::models::*;

use super::from_row::{
    CART_LINE_COLS, FILE_COLS, ORDER_COLS, ORDER_ITEM_COLS, SELLER_ACCOUNT_COLS, SNAPSHOT_COLS,
    USER_COLS, query_all, query_one,
};

fn now() -> i64 {
    Utc::now().timestamp()
}

// ============ Users ============

pub fn create_user(conn: &Connection, input: &CreateUser) -> Result<User> {
    let id = EntityType::User.gen_id();
    let now = now();
    let email = input.email.trim().to_lowercase();

    conn.execute(
        "INSERT INTO users (id, identity, email, display_name, banned, created_at)
         VALUES (?1, ?2, ?3, ?4, 0, ?5)",
        params![&id, &input.identity, &email, &input.display_name, now],
    )?;

    Ok(User {
        id,
        identity: input.identity.clone(),
        email,
        display_name: input.display_name.clone(),
        banned: false,
        created_at: now,
    })
}

pub fn get_user_by_id(conn: &Connection, id: &str) -> Result<Option<User>> {
    query_one(
        conn,
        &format!("SELECT {} FROM users WHERE id = ?1", USER_COLS),
        &[&id],
    )
}

/// Resolve an identity-provider subject to the local user record.
pub fn get_user_by_identity(conn: &Connection, identity: &str) -> Result<Option<User>> {
    query_one(
        conn,
        &format!("SELECT {} FROM users WHERE identity = ?1", USER_COLS),
        &[&identity],
    )
}

pub fn set_user_banned(conn: &Connection, id: &str, banned: bool) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE users SET banned = ?1 WHERE id = ?2",
        params![banned as i32, id],
    )?;
    Ok(affected > 0)
}

// ============ Seller Accounts ============

/// Link a seller to their gateway connected account (onboarding starts incomplete).
pub fn create_seller_account(
    conn: &Connection,
    user_id: &str,
    gateway_account_id: &str,
) -> Result<SellerAccount> {
    let now = now();
    conn.execute(
        "INSERT INTO seller_accounts (user_id, gateway_account_id, charges_enabled, details_submitted, updated_at)
         VALUES (?1, ?2, 0, 0, ?3)",
        params![user_id, gateway_account_id, now],
    )?;

    Ok(SellerAccount {
        user_id: user_id.to_string(),
        gateway_account_id: gateway_account_id.to_string(),
        charges_enabled: false,
        details_submitted: false,
        updated_at: now,
    })
}

pub fn get_seller_account_by_gateway_id(
    conn: &Connection,
    gateway_account_id: &str,
) -> Result<Option<SellerAccount>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM seller_accounts WHERE gateway_account_id = ?1",
            SELLER_ACCOUNT_COLS
        ),
        &[&gateway_account_id],
    )
}

/// Record the gateway's latest view of a connected account.
/// Returns false if no seller is linked to the account.
pub fn update_seller_account_status(
    conn: &Connection,
    gateway_account_id: &str,
    charges_enabled: bool,
    details_submitted: bool,
) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE seller_accounts
         SET charges_enabled = ?1, details_submitted = ?2, updated_at = ?3
         WHERE gateway_account_id = ?4",
        params![
            charges_enabled as i32,
            details_submitted as i32,
            now(),
            gateway_account_id
        ],
    )?;
    Ok(affected > 0)
}

// ============ Catalog ============

pub fn create_file(conn: &Connection, seller_id: &str, input: &CreateFile) -> Result<CatalogFile> {
    let id = EntityType::File.gen_id();
    let now = now();
    let currency = input.currency.trim().to_lowercase();

    conn.execute(
        "INSERT INTO files (id, seller_id, title, description, price_cents, currency, file_key, thumbnail_url, active, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 1, ?9)",
        params![
            &id,
            seller_id,
            &input.title,
            &input.description,
            input.price_cents,
            &currency,
            &input.file_key,
            &input.thumbnail_url,
            now
        ],
    )?;

    Ok(CatalogFile {
        id,
        seller_id: seller_id.to_string(),
        title: input.title.clone(),
        description: input.description.clone(),
        price_cents: input.price_cents,
        currency,
        file_key: input.file_key.clone(),
        thumbnail_url: input.thumbnail_url.clone(),
        active: true,
        created_at: now,
    })
}

pub fn get_file_by_id(conn: &Connection, id: &str) -> Result<Option<CatalogFile>> {
    query_one(
        conn,
        &format!("SELECT {} FROM files WHERE id = ?1", FILE_COLS),
        &[&id],
    )
}

pub fn set_file_active(conn: &Connection, id: &str, active: bool) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE files SET active = ?1 WHERE id = ?2",
        params![active as i32, id],
    )?;
    Ok(affected > 0)
}

// ============ Live Cart ============

/// Add a file to the buyer's cart. Returns false if it was already there.
pub fn add_cart_item(conn: &Connection, buyer_id: &str, file_id: &str) -> Result<bool> {
    let affected = conn.execute(
        "INSERT INTO cart_items (buyer_id, file_id, added_at) VALUES (?1, ?2, ?3)
         ON CONFLICT(buyer_id, file_id) DO NOTHING",
        params![buyer_id, file_id, now()],
    )?;
    Ok(affected > 0)
}

/// Remove a file from the buyer's cart. Returns false if it was not there.
pub fn remove_cart_item(conn: &Connection, buyer_id: &str, file_id: &str) -> Result<bool> {
    let affected = conn.execute(
        "DELETE FROM cart_items WHERE buyer_id = ?1 AND file_id = ?2",
        params![buyer_id, file_id],
    )?;
    Ok(affected > 0)
}

/// Current cart contents, oldest first, priced from the catalog.
pub fn list_cart_items(conn: &Connection, buyer_id: &str) -> Result<Vec<CartLineItem>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM cart_items c
             JOIN files f ON f.id = c.file_id
             WHERE c.buyer_id = ?1
             ORDER BY c.added_at, c.rowid",
            CART_LINE_COLS
        ),
        &[&buyer_id],
    )
}

// ============ Cart Snapshots ============

/// Persist an immutable copy of `line_items` (order preserved).
pub fn create_cart_snapshot(
    conn: &Connection,
    buyer_id: &str,
    line_items: &[CartLineItem],
) -> Result<CartSnapshot> {
    let id = EntityType::CartSnapshot.gen_id();
    let now = now();
    let encoded = serde_json::to_string(line_items)?;

    conn.execute(
        "INSERT INTO cart_snapshots (id, buyer_id, line_items, created_at)
         VALUES (?1, ?2, ?3, ?4)",
        params![&id, buyer_id, &encoded, now],
    )?;

    Ok(CartSnapshot {
        id,
        buyer_id: buyer_id.to_string(),
        line_items: line_items.to_vec(),
        created_at: now,
    })
}

pub fn get_cart_snapshot(conn: &Connection, id: &str) -> Result<Option<CartSnapshot>> {
    query_one(
        conn,
        &format!("SELECT {} FROM cart_snapshots WHERE id = ?1", SNAPSHOT_COLS),
        &[&id],
    )
}

/// Delete snapshots created before `cutoff` (consumed or abandoned).
/// Storage hygiene only; orders never depend on a snapshot after creation.
pub fn purge_stale_snapshots(conn: &Connection, cutoff: i64) -> Result<usize> {
    let deleted = conn.execute(
        "DELETE FROM cart_snapshots WHERE created_at < ?1",
        params![cutoff],
    )?;
    Ok(deleted)
}

// ============ Orders ============

/// Insert a paid order unless one already exists for the payment session.
///
/// Returns `None` when the unique constraint on `payment_session_id` already
/// holds a row; the caller treats that as "already materialized".
pub fn try_insert_paid_order(
    conn: &Connection,
    buyer_id: &str,
    payment_session_id: &str,
    snapshot: &CartSnapshot,
    currency: &str,
) -> Result<Option<Order>> {
    let id = EntityType::Order.gen_id();
    let now = now();
    let total_cents = snapshot.total_cents();

    let inserted = conn.execute(
        "INSERT INTO orders (id, buyer_id, payment_session_id, snapshot_id, total_cents, currency, status, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)
         ON CONFLICT(payment_session_id) DO NOTHING",
        params![
            &id,
            buyer_id,
            payment_session_id,
            &snapshot.id,
            total_cents,
            currency,
            OrderStatus::Paid.as_str(),
            now
        ],
    )?;

    if inserted == 0 {
        return Ok(None);
    }

    Ok(Some(Order {
        id,
        buyer_id: buyer_id.to_string(),
        payment_session_id: payment_session_id.to_string(),
        snapshot_id: snapshot.id.clone(),
        total_cents,
        currency: currency.to_string(),
        status: OrderStatus::Paid,
        created_at: now,
        updated_at: now,
    }))
}

pub fn create_order_item(
    conn: &Connection,
    order_id: &str,
    position: usize,
    item: &CartLineItem,
    created_at: i64,
) -> Result<OrderItem> {
    let id = EntityType::OrderItem.gen_id();

    conn.execute(
        "INSERT INTO order_items (id, order_id, file_id, file_key, title, unit_price_cents, currency, seller_id, position, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            &id,
            order_id,
            &item.file_id,
            &item.file_key,
            &item.title,
            item.unit_price_cents,
            &item.currency,
            &item.seller_id,
            position as i64,
            created_at
        ],
    )?;

    Ok(OrderItem {
        id,
        order_id: order_id.to_string(),
        file_id: item.file_id.clone(),
        file_key: item.file_key.clone(),
        title: item.title.clone(),
        unit_price_cents: item.unit_price_cents,
        currency: item.currency.clone(),
        seller_id: item.seller_id.clone(),
        created_at,
    })
}

pub fn get_order_by_id(conn: &Connection, id: &str) -> Result<Option<Order>> {
    query_one(
        conn,
        &format!("SELECT {} FROM orders WHERE id = ?1", ORDER_COLS),
        &[&id],
    )
}

pub fn get_order_by_payment_session(
    conn: &Connection,
    payment_session_id: &str,
) -> Result<Option<Order>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM orders WHERE payment_session_id = ?1",
            ORDER_COLS
        ),
        &[&payment_session_id],
    )
}

pub fn list_orders_for_buyer(conn: &Connection, buyer_id: &str) -> Result<Vec<Order>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM orders WHERE buyer_id = ?1 ORDER BY created_at DESC, rowid DESC",
            ORDER_COLS
        ),
        &[&buyer_id],
    )
}

/// Items of an order in snapshot order.
pub fn list_order_items(conn: &Connection, order_id: &str) -> Result<Vec<OrderItem>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM order_items WHERE order_id = ?1 ORDER BY position",
            ORDER_ITEM_COLS
        ),
        &[&order_id],
    )
}

/// Status is the only mutable column of an order.
pub fn update_order_status(conn: &Connection, id: &str, status: OrderStatus) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE orders SET status = ?1, updated_at = ?2 WHERE id = ?3",
        params![status.as_str(), now(), id],
    )?;
    Ok(affected > 0)
}
