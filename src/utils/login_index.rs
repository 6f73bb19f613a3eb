//! Fast lookups for "is this login already taken?".
//!
//! Cuckoo filter answers the negative case without touching the database,
//! the moka cache answers the positive case, the `users` table decides the
//! rest. Logins are employee emails, compared lower-cased.

use anyhow::{Result, anyhow};
use autoscale_cuckoo_filter::CuckooFilter;
use futures_util::TryStreamExt;
use moka::future::Cache;
use once_cell::sync::Lazy;
use sqlx::MySqlPool;
use std::sync::RwLock;
use std::time::Duration;
use tracing::info;

use crate::error::{AppError, db_error};

const FILTER_CAPACITY: usize = 100_000;
const FALSE_POSITIVE_RATE: f64 = 0.001;

static LOGIN_FILTER: Lazy<RwLock<CuckooFilter<String>>> =
    Lazy::new(|| RwLock::new(CuckooFilter::new(FILTER_CAPACITY, FALSE_POSITIVE_RATE)));

static TAKEN_CACHE: Lazy<Cache<String, ()>> = Lazy::new(|| {
    Cache::builder()
        .max_capacity(500_000)
        .time_to_live(Duration::from_secs(86400))
        .build()
});

#[inline]
pub fn normalize(login: &str) -> String {
    login.trim().to_lowercase()
}

/// False positives possible; a poisoned filter answers "maybe".
pub fn might_exist(login: &str) -> bool {
    let login = normalize(login);
    LOGIN_FILTER
        .read()
        .map(|f| f.contains(&login))
        .unwrap_or(true)
}

pub async fn record_taken(login: &str) {
    let login = normalize(login);
    if let Ok(mut filter) = LOGIN_FILTER.write() {
        filter.add(&login);
    }
    TAKEN_CACHE.insert(login, ()).await;
}

/// Forget a login whose account was removed.
pub async fn release(login: &str) {
    let login = normalize(login);
    if let Ok(mut filter) = LOGIN_FILTER.write() {
        filter.remove(&login);
    }
    TAKEN_CACHE.invalidate(&login).await;
}

pub async fn is_available(pool: &MySqlPool, login: &str) -> Result<bool, AppError> {
    let login = normalize(login);

    if !might_exist(&login) {
        return Ok(true);
    }

    if TAKEN_CACHE.get(&login).await.is_some() {
        return Ok(false);
    }

    let exists = sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(SELECT 1 FROM users WHERE username = ? LIMIT 1)",
    )
    .bind(&login)
    .fetch_one(pool)
    .await
    .map_err(db_error("Failed to check login availability"))?;

    if exists {
        TAKEN_CACHE.insert(login, ()).await;
    }

    Ok(!exists)
}

/// Loads every login into the filter and recently active ones into the cache.
pub async fn warmup(pool: &MySqlPool, recent_days: u32, batch_size: usize) -> Result<()> {
    let mut rows = sqlx::query_as::<_, (String, bool)>(
        r#"
        SELECT username,
               COALESCE(last_login_at >= NOW() - INTERVAL ? DAY, FALSE) AS recent
        FROM users
        "#,
    )
    .bind(recent_days)
    .fetch(pool);

    let mut batch = Vec::with_capacity(batch_size);
    let (mut total, mut cached) = (0usize, 0usize);

    while let Some((username, recent)) = rows
        .try_next()
        .await
        .map_err(|e| anyhow!("login row fetch failed: {}", e))?
    {
        let login = normalize(&username);
        if recent {
            TAKEN_CACHE.insert(login.clone(), ()).await;
            cached += 1;
        }
        batch.push(login);
        total += 1;

        if batch.len() >= batch_size {
            add_batch(&batch);
            batch.clear();
        }
    }

    if !batch.is_empty() {
        add_batch(&batch);
    }

    info!(total, cached, recent_days, "Login index warmup complete");
    Ok(())
}

fn add_batch(logins: &[String]) {
    if let Ok(mut filter) = LOGIN_FILTER.write() {
        for login in logins {
            filter.add(login);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_case_and_whitespace() {
        assert_eq!(normalize("  Jane.Roe@Company.COM "), "jane.roe@company.com");
    }

    #[actix_web::test]
    async fn recorded_logins_might_exist_until_released() {
        let login = "index-test-1@company.com";
        assert!(!might_exist(login));

        record_taken("Index-Test-1@Company.com").await;
        assert!(might_exist(login));

        release(login).await;
        assert!(!might_exist(login));
    }

    #[actix_web::test]
    async fn unseen_login_is_available_without_database() {
        let pool = sqlx::MySqlPool::connect_lazy("mysql://nobody@127.0.0.1:1/none").unwrap();
        assert!(is_available(&pool, "never-seen-login@company.com").await.unwrap());
    }

    #[actix_web::test]
    async fn cached_login_is_taken_without_database() {
        let pool = sqlx::MySqlPool::connect_lazy("mysql://nobody@127.0.0.1:1/none").unwrap();
        record_taken("index-test-2@company.com").await;

        assert!(!is_available(&pool, "index-test-2@company.com").await.unwrap());
    }
}
