use rusqlite::Connection;

/// Initialize the database schema. Safe to run on every startup.
pub fn init_db(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        -- Identity-provider subjects (buyers and sellers)
        CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            identity TEXT NOT NULL UNIQUE,
            email TEXT NOT NULL,
            display_name TEXT NOT NULL,
            banned INTEGER NOT NULL DEFAULT 0,
            created_at INTEGER NOT NULL
        );

        -- Gateway connected accounts for sellers
        CREATE TABLE IF NOT EXISTS seller_accounts (
            user_id TEXT PRIMARY KEY REFERENCES users(id) ON DELETE CASCADE,
            gateway_account_id TEXT NOT NULL UNIQUE,
            charges_enabled INTEGER NOT NULL DEFAULT 0,
            details_submitted INTEGER NOT NULL DEFAULT 0,
            updated_at INTEGER NOT NULL
        );

        -- Catalog of purchasable files
        CREATE TABLE IF NOT EXISTS files (
            id TEXT PRIMARY KEY,
            seller_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            title TEXT NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            price_cents INTEGER NOT NULL CHECK (price_cents >= 0),
            currency TEXT NOT NULL,
            file_key TEXT NOT NULL,
            thumbnail_url TEXT,
            active INTEGER NOT NULL DEFAULT 1,
            created_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_files_seller ON files(seller_id);

        -- Live carts: the only mutable rows touched by checkout
        CREATE TABLE IF NOT EXISTS cart_items (
            buyer_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            file_id TEXT NOT NULL REFERENCES files(id) ON DELETE CASCADE,
            added_at INTEGER NOT NULL,
            PRIMARY KEY (buyer_id, file_id)
        );

        -- Append-only cart snapshots taken at checkout-session creation.
        -- line_items is a JSON array of CartLineItem in checkout order.
        CREATE TABLE IF NOT EXISTS cart_snapshots (
            id TEXT PRIMARY KEY,
            buyer_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            line_items TEXT NOT NULL,
            created_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_cart_snapshots_created ON cart_snapshots(created_at);

        -- Orders: at most one per payment session, enforced by the UNIQUE constraint.
        -- snapshot_id has no foreign key: snapshots are purged, orders are not.
        CREATE TABLE IF NOT EXISTS orders (
            id TEXT PRIMARY KEY,
            buyer_id TEXT NOT NULL REFERENCES users(id),
            payment_session_id TEXT NOT NULL UNIQUE,
            snapshot_id TEXT NOT NULL,
            total_cents INTEGER NOT NULL,
            currency TEXT NOT NULL,
            status TEXT NOT NULL CHECK (status IN ('pending', 'paid', 'failed')),
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_orders_buyer ON orders(buyer_id, created_at);

        -- Order items: copied from the snapshot, immutable
        CREATE TABLE IF NOT EXISTS order_items (
            id TEXT PRIMARY KEY,
            order_id TEXT NOT NULL REFERENCES orders(id),
            file_id TEXT NOT NULL,
            file_key TEXT NOT NULL,
            title TEXT NOT NULL,
            unit_price_cents INTEGER NOT NULL,
            currency TEXT NOT NULL,
            seller_id TEXT NOT NULL,
            position INTEGER NOT NULL,
            created_at INTEGER NOT NULL,
            UNIQUE (order_id, file_id)
        );
        CREATE INDEX IF NOT EXISTS idx_order_items_order ON order_items(order_id, position);
        "#,
    )
}
