use anyhow::{Context, Result, bail};
use std::env;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifierKind {
    Log,
    Outbox,
}

#[derive(Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub server_addr: String,
    pub access_token_ttl: usize,
    pub refresh_token_ttl: usize,

    // Rate limiting
    pub rate_login_per_min: u32,
    pub rate_refresh_per_min: u32,
    pub rate_protected_per_min: u32,

    pub api_prefix: String,

    /// Public URL of the web app; links in notifications start here.
    pub app_base_url: String,
    pub currency_symbol: String,

    pub log_dir: String,
    pub log_level: tracing::Level,

    pub notifier: NotifierKind,
    pub feed_capacity: usize,
    pub run_migrations: bool,
}

fn required(key: &str) -> Result<String> {
    env::var(key).with_context(|| format!("{} must be set", key))
}

fn parsed<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("{} has an invalid value '{}': {}", key, raw, e)),
        Err(_) => Ok(default),
    }
}

fn text(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let notifier = match text("NOTIFIER", "log").to_lowercase().as_str() {
            "log" => NotifierKind::Log,
            "outbox" => NotifierKind::Outbox,
            other => bail!("NOTIFIER must be 'log' or 'outbox', got '{}'", other),
        };

        Ok(Self {
            server_addr: required("SERVER_ADDR")?,
            database_url: required("DATABASE_URL")?,
            jwt_secret: required("JWT_SECRET")?,
            access_token_ttl: parsed("ACCESS_TOKEN_TTL", 900)?, // 15 min
            refresh_token_ttl: parsed("REFRESH_TOKEN_TTL", 604800)?, // 7 days

            rate_login_per_min: parsed("RATE_LOGIN_PER_MIN", 60)?,
            rate_refresh_per_min: parsed("RATE_REFRESH_PER_MIN", 30)?,
            rate_protected_per_min: parsed("RATE_PROTECTED_PER_MIN", 1000)?,

            api_prefix: text("API_PREFIX", "/api"),
            app_base_url: text("APP_BASE_URL", "http://localhost:3000"),
            currency_symbol: text("CURRENCY_SYMBOL", "$"),

            log_dir: text("LOG_DIR", "logs"),
            log_level: parsed("LOG_LEVEL", tracing::Level::DEBUG)?,

            notifier,
            feed_capacity: parsed("FEED_CAPACITY", 256)?,
            run_migrations: parsed("RUN_MIGRATIONS", true)?,
        })
    }
}

#[cfg(test)]
impl Config {
    pub fn for_tests() -> Self {
        Self {
            database_url: "mysql://nobody@127.0.0.1:1/none".into(),
            jwt_secret: "test-secret".into(),
            server_addr: "127.0.0.1:0".into(),
            access_token_ttl: 900,
            refresh_token_ttl: 3600,
            rate_login_per_min: 60,
            rate_refresh_per_min: 30,
            rate_protected_per_min: 1000,
            api_prefix: "/api".into(),
            app_base_url: "https://hr.example.com".into(),
            currency_symbol: "$".into(),
            log_dir: "logs".into(),
            log_level: tracing::Level::DEBUG,
            notifier: NotifierKind::Log,
            feed_capacity: 16,
            run_migrations: false,
        }
    }
}
