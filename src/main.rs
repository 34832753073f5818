use axum::Router;
use clap::Parser;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use std::sync::Arc;
use std::time::Duration;

use filemart::config::Config;
use filemart::db::{AppState, create_pool, init_db, queries};
use filemart::handlers;
use filemart::models::{CreateFile, CreateUser};
use filemart::payments::StripeClient;
use filemart::storage::SignedUrlStore;

#[derive(Parser, Debug)]
#[command(name = "filemart")]
#[command(about = "Checkout-to-order finalization for a digital-goods marketplace")]
struct Cli {
    /// Seed the database with dev data (buyer, seller, catalog files, cart)
    #[arg(long)]
    seed: bool,

    /// Delete the database on exit (dev mode only, useful for fresh starts)
    #[arg(long)]
    ephemeral: bool,
}

fn seed_dev_data(state: &AppState) {
    let conn = state.db.get().expect("Failed to get db connection for seeding");

    if queries::get_user_by_identity(&conn, "dev|buyer")
        .expect("Failed to look up dev buyer")
        .is_some()
    {
        tracing::info!("Database already has data, skipping seed");
        return;
    }

    tracing::info!("============================================");
    tracing::info!("SEEDING DEV DATA");
    tracing::info!("============================================");

    let seller = queries::create_user(
        &conn,
        &CreateUser {
            identity: "dev|seller".to_string(),
            email: "seller@filemart.local".to_string(),
            display_name: "Dev Seller".to_string(),
        },
    )
    .expect("Failed to create dev seller");
    queries::create_seller_account(&conn, &seller.id, "acct_dev_seller")
        .expect("Failed to link dev seller account");

    let buyer = queries::create_user(
        &conn,
        &CreateUser {
            identity: "dev|buyer".to_string(),
            email: "buyer@filemart.local".to_string(),
            display_name: "Dev Buyer".to_string(),
        },
    )
    .expect("Failed to create dev buyer");

    let catalog = [
        ("Icon pack", "200 hand-drawn SVG icons", 999, "seed/icons.zip"),
        ("Display font", "OTF and WOFF2, four weights", 450, "seed/font.zip"),
    ];
    for (title, description, price_cents, file_key) in catalog {
        let file = queries::create_file(
            &conn,
            &seller.id,
            &CreateFile {
                title: title.to_string(),
                description: description.to_string(),
                price_cents,
                currency: "usd".to_string(),
                file_key: file_key.to_string(),
                thumbnail_url: None,
            },
        )
        .expect("Failed to create dev file");
        queries::add_cart_item(&conn, &buyer.id, &file.id).expect("Failed to fill dev cart");
        tracing::info!("File: {} ({}, {} cents)", file.title, file.id, file.price_cents);
    }

    tracing::info!("");
    tracing::info!("Seller identity: {} ({})", seller.identity, seller.id);
    tracing::info!("Buyer identity:  {} ({})", buyer.identity, buyer.id);
    tracing::info!("Send X-Buyer-Identity: {} to act as the buyer", buyer.identity);
    tracing::info!("============================================");
}

/// Spawns a background task that periodically purges old cart snapshots.
/// Snapshots are only read while their payment session is open, so anything
/// past the retention window is consumed or abandoned.
fn spawn_cleanup_task(state: AppState, retention_days: i64) {
    tokio::spawn(async move {
        let interval = Duration::from_secs(60 * 60); // 1 hour

        loop {
            tokio::time::sleep(interval).await;

            let cutoff = chrono::Utc::now().timestamp() - retention_days * 86_400;
            match state.db.get() {
                Ok(conn) => match queries::purge_stale_snapshots(&conn, cutoff) {
                    Ok(count) => {
                        if count > 0 {
                            tracing::debug!("Purged {} stale cart snapshots", count);
                        }
                    }
                    Err(e) => {
                        tracing::warn!("Failed to purge cart snapshots: {}", e);
                    }
                },
                Err(e) => {
                    tracing::warn!("Failed to get db connection for cleanup: {}", e);
                }
            }
        }
    });

    tracing::info!(
        "Snapshot cleanup task started (hourly, retention {} days)",
        retention_days
    );
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "filemart=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();

    if config.dev_mode {
        tracing::info!("Running in DEVELOPMENT mode");
    }

    let missing = config.missing_secrets();
    if !missing.is_empty() {
        if config.dev_mode {
            tracing::warn!("Missing secrets (dev mode, continuing): {}", missing.join(", "));
        } else {
            tracing::error!("Missing required configuration: {}", missing.join(", "));
            std::process::exit(1);
        }
    }

    let db_pool = create_pool(&config.database_path).expect("Failed to create database pool");

    {
        let conn = db_pool.get().expect("Failed to get connection");
        init_db(&conn).expect("Failed to initialize database");
    }

    let stripe = StripeClient::new(config.stripe.clone()).expect("Failed to build Stripe client");
    let blobs = SignedUrlStore::new(
        &config.download_base_url,
        &config.download_signing_secret,
        config.download_url_ttl_secs,
    );

    let state = AppState {
        db: db_pool,
        gateway: Arc::new(stripe),
        blobs: Arc::new(blobs),
    };

    if cli.seed {
        if !config.dev_mode {
            tracing::warn!("--seed flag ignored: not in dev mode (set FILEMART_ENV=dev)");
        } else {
            seed_dev_data(&state);
        }
    }

    // 0 = keep snapshots forever
    if config.snapshot_retention_days > 0 {
        spawn_cleanup_task(state.clone(), config.snapshot_retention_days);
    }

    let app = Router::new()
        .merge(handlers::router())
        // Webhook endpoints (gateway signature auth)
        .merge(handlers::webhooks::router())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind to address");

    let cleanup_on_exit = cli.ephemeral && config.dev_mode;
    let db_path = config.database_path.clone();

    if cleanup_on_exit {
        tracing::info!("EPHEMERAL MODE: database will be deleted on exit");
    }

    tracing::info!("filemart listening on {} ({})", addr, config.base_url);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Failed to start server");

    if cleanup_on_exit {
        tracing::info!("Cleaning up ephemeral database...");
        if let Err(e) = std::fs::remove_file(&db_path) {
            tracing::warn!("Failed to remove {}: {}", db_path, e);
        } else {
            tracing::info!("Removed {}", db_path);
        }
        let _ = std::fs::remove_file(format!("{}-wal", db_path));
        let _ = std::fs::remove_file(format!("{}-shm", db_path));
        tracing::info!("Ephemeral cleanup complete");
    }
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
    tracing::info!("Shutdown signal received, stopping server...");
}
