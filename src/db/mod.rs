mod from_row;
mod schema;
pub mod queries;

pub use schema::init_db;

use std::sync::Arc;
use std::time::Duration;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::payments::PaymentGateway;
use crate::storage::BlobStore;

pub type DbPool = Pool<SqliteConnectionManager>;

/// How long a connection waits on a locked database before giving up.
/// Concurrent webhook deliveries serialize on the write lock within this window.
pub const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Application state shared by all handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    /// Hosted-checkout gateway, constructed once at startup
    pub gateway: Arc<dyn PaymentGateway>,
    /// Produces pre-signed download links for purchased files
    pub blobs: Arc<dyn BlobStore>,
}

pub fn create_pool(database_path: &str) -> Result<DbPool, r2d2::Error> {
    let manager = SqliteConnectionManager::file(database_path).with_init(|conn| {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")
    });
    Pool::builder().max_size(10).build(manager)
}
