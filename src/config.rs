use std::env;

use crate::payments::StripeConfig;

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_path: String,
    pub base_url: String,
    pub dev_mode: bool,
    pub stripe: StripeConfig,
    pub download_base_url: String,
    pub download_signing_secret: String,
    pub download_url_ttl_secs: i64,
    /// Days a cart snapshot is kept. 0 disables purging.
    pub snapshot_retention_days: i64,
}

fn env_or(key: &str, default: impl Into<String>) -> String {
    env::var(key).unwrap_or_else(|_| default.into())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let dev_mode = env::var("FILEMART_ENV")
            .map(|v| v == "dev" || v == "development")
            .unwrap_or(false);

        let host = env_or("HOST", "127.0.0.1");
        let port: u16 = env_parse("PORT", 3000);

        let base_url = env::var("BASE_URL")
            .unwrap_or_else(|_| format!("http://{}:{}", host, port));

        let stripe = StripeConfig {
            secret_key: env_or("STRIPE_SECRET_KEY", ""),
            webhook_secret: env_or("STRIPE_WEBHOOK_SECRET", ""),
            api_base: env_or("STRIPE_API_BASE", "https://api.stripe.com"),
            success_url: env::var("CHECKOUT_SUCCESS_URL")
                .unwrap_or_else(|_| format!("{}/checkout/success", base_url)),
            cancel_url: env::var("CHECKOUT_CANCEL_URL")
                .unwrap_or_else(|_| format!("{}/cart", base_url)),
        };

        let download_base_url = env::var("DOWNLOAD_BASE_URL")
            .unwrap_or_else(|_| format!("{}/downloads", base_url));

        Self {
            host,
            port,
            database_path: env_or("DATABASE_PATH", "filemart.db"),
            base_url,
            dev_mode,
            stripe,
            download_base_url,
            download_signing_secret: env_or("DOWNLOAD_SIGNING_SECRET", ""),
            download_url_ttl_secs: env_parse("DOWNLOAD_URL_TTL_SECS", 900),
            snapshot_retention_days: env_parse("SNAPSHOT_RETENTION_DAYS", 30),
        }
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Secrets that must be set outside dev mode.
    pub fn missing_secrets(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.stripe.secret_key.is_empty() {
            missing.push("STRIPE_SECRET_KEY");
        }
        if self.stripe.webhook_secret.is_empty() {
            missing.push("STRIPE_WEBHOOK_SECRET");
        }
        if self.download_signing_secret.is_empty() {
            missing.push("DOWNLOAD_SIGNING_SECRET");
        }
        missing
    }
}
