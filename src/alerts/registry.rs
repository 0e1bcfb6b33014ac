use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::collections::HashMap;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::config::DatabaseConfig;
use crate::models::{Alert, DealFiring, NewAlert};
use crate::utils::error::{AppError, Result};

const ALERT_COLUMNS: &str = "id, keyword, product_title, product_url, product_site, min_discount, method, contact, \
     created_at, fired, last_fired_at, last_fired_snapshot, version";

/// File behind a `sqlite:` URL, or `None` for in-memory databases.
fn database_path(url: &str) -> Option<PathBuf> {
    let rest = url
        .strip_prefix("sqlite://")
        .or_else(|| url.strip_prefix("sqlite:"))?;
    let path = rest.split('?').next().unwrap_or_default();
    if path.is_empty() || path == ":memory:" {
        None
    } else {
        Some(PathBuf::from(path))
    }
}

/// Durable store of alert subscriptions.
///
/// Every write is committed before the call returns. Firing state is kept
/// per listing and only changed through [`AlertRegistry::claim_firing`], a
/// compare-and-swap on the listing's firing `version`.
#[derive(Clone)]
pub struct AlertRegistry {
    pool: SqlitePool,
}

impl AlertRegistry {
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(&config.url)?.create_if_missing(true);

        if let Some(parent) = database_path(&config.url).as_deref().and_then(|p| p.parent()) {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout))
            .connect_with(options)
            .await?;

        tracing::info!(url = %config.url, "Connected to alert database");
        Self::from_pool(pool).await
    }

    /// A private in-memory database. A single never-recycled connection
    /// keeps the data alive for the registry's lifetime.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;
        Self::from_pool(pool).await
    }

    pub async fn from_pool(pool: SqlitePool) -> Result<Self> {
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn create(&self, new_alert: NewAlert) -> Result<Alert> {
        if new_alert.contact.trim().is_empty() {
            return Err(AppError::validation("Contact is required"));
        }
        if let Some(min) = new_alert.min_discount {
            if !(0..=100).contains(&min) {
                return Err(AppError::validation("Discount threshold must be between 0 and 100"));
            }
        }

        let mut new_alert = new_alert;
        if new_alert.keyword.trim().is_empty() {
            new_alert.keyword = new_alert.product.title.clone();
        }
        let alert = Alert::new(new_alert);
        if alert.keyword.is_empty() && alert.product_url.is_none() {
            return Err(AppError::validation("An alert needs a keyword or a product URL"));
        }

        sqlx::query(&format!(
            "INSERT INTO alerts ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            ALERT_COLUMNS
        ))
        .bind(&alert.id)
        .bind(&alert.keyword)
        .bind(&alert.product_title)
        .bind(&alert.product_url)
        .bind(alert.product_site)
        .bind(alert.min_discount)
        .bind(alert.method)
        .bind(&alert.contact)
        .bind(alert.created_at)
        .bind(alert.fired)
        .bind(alert.last_fired_at)
        .bind(&alert.last_fired_snapshot)
        .bind(alert.version)
        .execute(&self.pool)
        .await?;

        tracing::info!(alert_id = %alert.id, keyword = %alert.keyword, method = %alert.method, "Alert created");
        Ok(alert)
    }

    /// All alerts, oldest first.
    pub async fn list(&self) -> Result<Vec<Alert>> {
        let alerts = sqlx::query_as::<_, Alert>(&format!(
            "SELECT {} FROM alerts ORDER BY created_at ASC, rowid ASC",
            ALERT_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(alerts)
    }

    pub async fn get(&self, id: &str) -> Result<Option<Alert>> {
        let alert = sqlx::query_as::<_, Alert>(&format!("SELECT {} FROM alerts WHERE id = ?", ALERT_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(alert)
    }

    /// Delete by id, along with its firing history. Returns how many alerts
    /// went away; unknown ids are not an error.
    pub async fn delete(&self, id: &str) -> Result<u64> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM alert_firings WHERE alert_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let deleted = sqlx::query("DELETE FROM alerts WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        tx.commit().await?;

        tracing::info!(alert_id = %id, deleted, "Alert delete");
        Ok(deleted)
    }

    /// Last firing of every listing this alert has notified about, keyed by
    /// [`crate::models::Product::deal_key`].
    pub async fn firings(&self, alert_id: &str) -> Result<HashMap<String, DealFiring>> {
        let rows = sqlx::query_as::<_, DealFiring>(
            "SELECT alert_id, deal_key, snapshot, fired_at, version FROM alert_firings WHERE alert_id = ?",
        )
        .bind(alert_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|f| (f.deal_key.clone(), f)).collect())
    }

    /// Record that `snapshot` of one listing is being notified.
    ///
    /// `expected_version` is the listing's firing version as last read, or
    /// `None` if it had never fired. Returns `false` when another writer got
    /// there first or the alert is gone. A successful claim also updates the
    /// alert's own firing summary.
    pub async fn claim_firing(
        &self,
        alert_id: &str,
        deal_key: &str,
        expected_version: Option<i64>,
        snapshot: &str,
        at: DateTime<Utc>,
    ) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        let claimed = match expected_version {
            None => sqlx::query(
                "INSERT OR IGNORE INTO alert_firings (alert_id, deal_key, snapshot, fired_at, version) \
                 SELECT ?, ?, ?, ?, 1 WHERE EXISTS (SELECT 1 FROM alerts WHERE id = ?)",
            )
            .bind(alert_id)
            .bind(deal_key)
            .bind(snapshot)
            .bind(at)
            .bind(alert_id),
            Some(version) => sqlx::query(
                "UPDATE alert_firings SET snapshot = ?, fired_at = ?, version = version + 1 \
                 WHERE alert_id = ? AND deal_key = ? AND version = ?",
            )
            .bind(snapshot)
            .bind(at)
            .bind(alert_id)
            .bind(deal_key)
            .bind(version),
        }
        .execute(&mut *tx)
        .await?
        .rows_affected()
            == 1;

        if claimed {
            sqlx::query(
                "UPDATE alerts SET fired = 1, last_fired_at = ?, last_fired_snapshot = ?, version = version + 1 \
                 WHERE id = ?",
            )
            .bind(at)
            .bind(snapshot)
            .bind(alert_id)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        Ok(claimed)
    }
}
