//! Row mapping trait and helpers for reducing boilerplate in queries.

use rusqlite::{Connection, OptionalExtension, Row, ToSql};

use crate::models::*;

/// Parse a string column into an enum type, converting parse errors to rusqlite errors.
fn parse_enum<T: std::str::FromStr>(row: &Row, col: usize, col_name: &str) -> rusqlite::Result<T> {
    row.get::<_, String>(col)?.parse::<T>().map_err(|_| {
        rusqlite::Error::InvalidColumnType(col, col_name.to_string(), rusqlite::types::Type::Text)
    })
}

/// Trait for constructing a type from a database row.
pub trait FromRow: Sized {
    fn from_row(row: &Row) -> rusqlite::Result<Self>;
}

/// Query for a single optional result.
pub fn query_one<T: FromRow>(
    conn: &Connection,
    sql: &str,
    params: &[&dyn ToSql],
) -> crate::error::Result<Option<T>> {
    conn.query_row(sql, params, T::from_row)
        .optional()
        .map_err(Into::into)
}

/// Query for multiple results.
pub fn query_all<T: FromRow>(
    conn: &Connection,
    sql: &str,
    params: &[&dyn ToSql],
) -> crate::error::Result<Vec<T>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, T::from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

// ============ SQL SELECT Constants ============

pub const USER_COLS: &str = "id, identity, email, display_name, banned, created_at";

pub const SELLER_ACCOUNT_COLS: &str =
    "user_id, gateway_account_id, charges_enabled, details_submitted, updated_at";

pub const FILE_COLS: &str = "id, seller_id, title, description, price_cents, currency, file_key, thumbnail_url, active, created_at";

/// Live cart rows joined with the catalog (`c` = cart_items, `f` = files).
pub const CART_LINE_COLS: &str = "f.id, f.seller_id, f.title, f.price_cents, f.currency, f.file_key";

pub const SNAPSHOT_COLS: &str = "id, buyer_id, line_items, created_at";

pub const ORDER_COLS: &str = "id, buyer_id, payment_session_id, snapshot_id, total_cents, currency, status, created_at, updated_at";

pub const ORDER_ITEM_COLS: &str = "id, order_id, file_id, file_key, title, unit_price_cents, currency, seller_id, created_at";

// ============ FromRow Implementations ============

impl FromRow for User {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(User {
            id: row.get(0)?,
            identity: row.get(1)?,
            email: row.get(2)?,
            display_name: row.get(3)?,
            banned: row.get::<_, i32>(4)? != 0,
            created_at: row.get(5)?,
        })
    }
}

impl FromRow for SellerAccount {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(SellerAccount {
            user_id: row.get(0)?,
            gateway_account_id: row.get(1)?,
            charges_enabled: row.get::<_, i32>(2)? != 0,
            details_submitted: row.get::<_, i32>(3)? != 0,
            updated_at: row.get(4)?,
        })
    }
}

impl FromRow for CatalogFile {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(CatalogFile {
            id: row.get(0)?,
            seller_id: row.get(1)?,
            title: row.get(2)?,
            description: row.get(3)?,
            price_cents: row.get(4)?,
            currency: row.get(5)?,
            file_key: row.get(6)?,
            thumbnail_url: row.get(7)?,
            active: row.get::<_, i32>(8)? != 0,
            created_at: row.get(9)?,
        })
    }
}

impl FromRow for CartLineItem {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(CartLineItem {
            file_id: row.get(0)?,
            seller_id: row.get(1)?,
            title: row.get(2)?,
            unit_price_cents: row.get(3)?,
            currency: row.get(4)?,
            file_key: row.get(5)?,
        })
    }
}

impl FromRow for CartSnapshot {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        // A snapshot that no longer deserializes is corrupt; surface it as a
        // conversion error instead of treating it as empty.
        let raw: String = row.get(2)?;
        let line_items: Vec<CartLineItem> = serde_json::from_str(&raw).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(e))
        })?;
        Ok(CartSnapshot {
            id: row.get(0)?,
            buyer_id: row.get(1)?,
            line_items,
            created_at: row.get(3)?,
        })
    }
}

impl FromRow for Order {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Order {
            id: row.get(0)?,
            buyer_id: row.get(1)?,
            payment_session_id: row.get(2)?,
            snapshot_id: row.get(3)?,
            total_cents: row.get(4)?,
            currency: row.get(5)?,
            status: parse_enum(row, 6, "status")?,
            created_at: row.get(7)?,
            updated_at: row.get(8)?,
        })
    }
}

impl FromRow for OrderItem {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(OrderItem {
            id: row.get(0)?,
            order_id: row.get(1)?,
            file_id: row.get(2)?,
            file_key: row.get(3)?,
            title: row.get(4)?,
            unit_price_cents: row.get(5)?,
            currency: row.get(6)?,
            seller_id: row.get(7)?,
            created_at: row.get(8)?,
        })
    }
}
