//! Test utilities and fixtures for filemart integration tests

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU16, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::Request;
use rusqlite::Connection;

pub use filemart::db::{AppState, DbPool, create_pool, init_db, queries};
pub use filemart::handlers;
pub use filemart::handlers::webhooks::{
    Materialization, MaterializeError, WebhookOutcome, materialize,
};
pub use filemart::models::*;
pub use filemart::payments::*;
pub use filemart::storage::SignedUrlStore;

pub const WEBHOOK_SECRET: &str = "whsec_test_secret";
pub const DOWNLOAD_SECRET: &str = "dl_test_secret";
pub const DOWNLOAD_BASE: &str = "https://dl.filemart.test";

/// Create an in-memory test database with schema initialized
pub fn setup_test_db() -> Connection {
    let conn = Connection::open_in_memory().expect("Failed to create in-memory database");
    init_db(&conn).expect("Failed to initialize schema");
    conn
}

/// File-backed database deleted on drop.
///
/// Pools need a real file: every in-memory connection is its own database.
pub struct TestDb {
    pub path: PathBuf,
}

impl TestDb {
    pub fn new() -> Self {
        let path = std::env::temp_dir().join(format!("filemart_test_{}.db", uuid::Uuid::new_v4()));
        let conn = Connection::open(&path).expect("Failed to create test db");
        init_db(&conn).expect("Failed to init schema");
        Self { path }
    }

    pub fn path_str(&self) -> &str {
        self.path.to_str().expect("temp path is UTF-8")
    }

    pub fn pool(&self) -> DbPool {
        create_pool(self.path_str()).expect("Failed to create pool")
    }

    pub fn open(&self) -> Connection {
        let conn = Connection::open(&self.path).expect("Failed to open test db");
        conn.busy_timeout(std::time::Duration::from_secs(5))
            .expect("Failed to set busy timeout");
        conn
    }
}

impl Drop for TestDb {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
        let path = self.path_str().to_string();
        let _ = std::fs::remove_file(format!("{}-wal", path));
        let _ = std::fs::remove_file(format!("{}-shm", path));
        let _ = std::fs::remove_file(format!("{}-journal", path));
    }
}

pub fn stripe_client() -> StripeClient {
    StripeClient::new(StripeConfig {
        secret_key: "sk_test_xxx".to_string(),
        webhook_secret: WEBHOOK_SECRET.to_string(),
        // Nothing listens here; tests never reach the real API
        api_base: "http://127.0.0.1:9".to_string(),
        success_url: "https://shop.filemart.test/checkout/success".to_string(),
        cancel_url: "https://shop.filemart.test/cart".to_string(),
    })
    .expect("Failed to build Stripe client")
}

/// Gateway double: records session requests and can be switched to fail.
/// Event verification is the real Stripe implementation.
pub struct FakeGateway {
    stripe: StripeClient,
    requests: Mutex<Vec<SessionRequest>>,
    fail: AtomicBool,
    reject_status: AtomicU16,
    counter: AtomicUsize,
}

impl FakeGateway {
    pub fn new() -> Self {
        Self {
            stripe: stripe_client(),
            requests: Mutex::new(Vec::new()),
            fail: AtomicBool::new(false),
            reject_status: AtomicU16::new(0),
            counter: AtomicUsize::new(0),
        }
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Answer session creation with this HTTP status (0 to stop)
    pub fn set_rejecting(&self, status: u16) {
        self.reject_status.store(status, Ordering::SeqCst);
    }

    pub fn requests(&self) -> Vec<SessionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    fn provider_name(&self) -> &'static str {
        "fake"
    }

    fn signature_header(&self) -> &'static str {
        self.stripe.signature_header()
    }

    async fn create_session(&self, request: &SessionRequest) -> Result<HostedSession, GatewayError> {
        self.requests.lock().unwrap().push(request.clone());
        if self.fail.load(Ordering::SeqCst) {
            return Err(GatewayError::Transport("connection refused".to_string()));
        }
        let status = self.reject_status.load(Ordering::SeqCst);
        if status != 0 {
            return Err(GatewayError::Rejected {
                status,
                body: r#"{"error":{"type":"invalid_request_error"}}"#.to_string(),
            });
        }
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        Ok(HostedSession {
            session_id: format!("cs_test_{}", n),
            checkout_url: format!("https://checkout.stripe.test/c/pay/cs_test_{}", n),
        })
    }

    fn verify_event(&self, payload: &[u8], signature: &str) -> Result<GatewayEvent, EventError> {
        self.stripe.verify_event(payload, signature)
    }
}

pub struct TestApp {
    pub state: AppState,
    pub gateway: Arc<FakeGateway>,
    pub db: TestDb,
}

impl TestApp {
    pub fn conn(&self) -> r2d2::PooledConnection<r2d2_sqlite::SqliteConnectionManager> {
        self.state.db.get().expect("Failed to get connection")
    }

    pub fn router(&self) -> Router {
        app_router(self.state.clone())
    }
}

pub fn test_app() -> TestApp {
    let db = TestDb::new();
    let gateway = Arc::new(FakeGateway::new());
    let state = AppState {
        db: db.pool(),
        gateway: gateway.clone(),
        blobs: Arc::new(SignedUrlStore::new(DOWNLOAD_BASE, DOWNLOAD_SECRET, 900)),
    };
    TestApp { state, gateway, db }
}

pub fn app_router(state: AppState) -> Router {
    Router::new()
        .merge(handlers::router())
        .merge(handlers::webhooks::router())
        .with_state(state)
}

/// Create a test user; identity doubles as the display name
pub fn create_test_user(conn: &Connection, identity: &str) -> User {
    let input = CreateUser {
        identity: identity.to_string(),
        email: format!("{}@filemart.test", identity.replace('|', "_")),
        display_name: identity.to_string(),
    };
    queries::create_user(conn, &input).expect("Failed to create test user")
}

/// Create an active catalog file
pub fn create_test_file(
    conn: &Connection,
    seller_id: &str,
    title: &str,
    price_cents: i64,
    currency: &str,
) -> CatalogFile {
    let input = CreateFile {
        title: title.to_string(),
        description: format!("{} description", title),
        price_cents,
        currency: currency.to_string(),
        file_key: format!("uploads/{}/{}.zip", seller_id, title.replace(' ', "_")),
        thumbnail_url: None,
    };
    queries::create_file(conn, seller_id, &input).expect("Failed to create test file")
}

/// Snapshot line item straight from a catalog file
pub fn line_item(file: &CatalogFile) -> CartLineItem {
    CartLineItem {
        file_id: file.id.clone(),
        seller_id: file.seller_id.clone(),
        title: file.title.clone(),
        unit_price_cents: file.price_cents,
        currency: file.currency.clone(),
        file_key: file.file_key.clone(),
    }
}

pub fn completion(
    payment_session_id: &str,
    snapshot: &CartSnapshot,
    amount_paid_cents: Option<i64>,
) -> PaymentCompletion {
    PaymentCompletion {
        payment_session_id: payment_session_id.to_string(),
        buyer_id: snapshot.buyer_id.clone(),
        snapshot_id: snapshot.id.clone(),
        amount_paid_cents,
    }
}

pub fn count_rows(conn: &Connection, table: &str) -> i64 {
    conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
        row.get(0)
    })
    .expect("Failed to count rows")
}

// ============ Webhook payloads ============

pub fn current_timestamp() -> String {
    chrono::Utc::now().timestamp().to_string()
}

pub fn compute_stripe_signature(payload: &[u8], secret: &str, timestamp: &str) -> String {
    use hmac::{Hmac, Mac};
    use sha2::Sha256;

    type HmacSha256 = Hmac<Sha256>;

    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(timestamp.as_bytes());
    mac.update(b".");
    mac.update(payload);
    hex::encode(mac.finalize().into_bytes())
}

/// `Stripe-Signature` header value for `payload`, signed now.
pub fn stripe_signature_header(payload: &[u8]) -> String {
    let timestamp = current_timestamp();
    let signature = compute_stripe_signature(payload, WEBHOOK_SECRET, &timestamp);
    format!("t={},v1={}", timestamp, signature)
}

pub fn checkout_completed_payload(
    session_id: &str,
    buyer_id: &str,
    snapshot_id: &str,
    amount_total: i64,
) -> String {
    serde_json::json!({
        "id": "evt_test",
        "type": "checkout.session.completed",
        "data": {
            "object": {
                "id": session_id,
                "payment_status": "paid",
                "client_reference_id": buyer_id,
                "amount_total": amount_total,
                "metadata": {
                    "buyer_id": buyer_id,
                    "snapshot_id": snapshot_id
                }
            }
        }
    })
    .to_string()
}

pub fn webhook_request(payload: &str, signature: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/webhook/stripe")
        .header("content-type", "application/json");
    if let Some(signature) = signature {
        builder = builder.header("stripe-signature", signature);
    }
    builder
        .body(Body::from(payload.to_string()))
        .expect("Failed to build request")
}

pub fn json_request(method: &str, uri: &str, identity: Option<&str>, body: Option<serde_json::Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(identity) = identity {
        builder = builder.header("x-buyer-identity", identity);
    }
    let body = match body {
        Some(json) => {
            builder = builder.header("content-type", "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };
    builder.body(body).expect("Failed to build request")
}

pub async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Failed to read body");
    serde_json::from_slice(&bytes).expect("Body is not JSON")
}
