use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use snapshot::{Asset, SnapshotStore, StoreError, StoredSnapshot};
use sqlx::sqlite::{SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use tracing::{debug, info};

pub const INIT_SQL: &str = include_str!("../../../scripts/init_db.sql");

pub const REQUIRED_TABLES: [&str; 4] = ["runs", "incidents", "btc_info", "ether_info"];

const MEMORY_PREFIX: &str = "sqlite::memory:";

#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    pub async fn connect(path: &str) -> Result<Self> {
        // Every connection to `sqlite::memory:` opens its own database, so the
        // pool must hold on to exactly one.
        let options = if path.starts_with(MEMORY_PREFIX) {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(5)
        };
        let pool = options.connect(path).await?;
        run_init_sql(&pool).await?;
        Ok(Self { pool })
    }

    /// Records a daemon run along with the binary version and host it runs on.
    pub async fn insert_run(&self, run_id: &str, version: &str) -> Result<()> {
        let host = hostname::get()
            .unwrap_or_default()
            .to_string_lossy()
            .to_string();
        let ts_ms = Utc::now().timestamp_millis();
        sqlx::query(
            "INSERT OR REPLACE INTO runs (run_id, started_at_ms, version, host) \
             VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(run_id)
        .bind(ts_ms)
        .bind(version)
        .bind(host)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn log_incident(
        &self,
        run_id: &str,
        severity: &str,
        kind: &str,
        message: &str,
    ) -> Result<()> {
        let ts_ms = Utc::now().timestamp_millis();
        sqlx::query(
            "INSERT INTO incidents (run_id, ts_ms, severity, kind, message) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(run_id)
        .bind(ts_ms)
        .bind(severity)
        .bind(kind)
        .bind(message)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Names from [`REQUIRED_TABLES`] that the database does not have.
    pub async fn validate_required_tables(&self) -> Result<Vec<String>> {
        let present: Vec<String> =
            sqlx::query_scalar("SELECT name FROM sqlite_master WHERE type = 'table'")
                .fetch_all(&self.pool)
                .await?;
        Ok(REQUIRED_TABLES
            .iter()
            .filter(|table| !present.iter().any(|name| name == *table))
            .map(|table| table.to_string())
            .collect())
    }

    pub async fn run_version(&self, run_id: &str) -> Result<Option<String>> {
        let version = sqlx::query_scalar("SELECT version FROM runs WHERE run_id = ?1")
            .bind(run_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(version)
    }

    pub async fn count_incidents(&self, run_id: &str, kind: &str) -> Result<i64> {
        let count =
            sqlx::query_scalar("SELECT COUNT(*) FROM incidents WHERE run_id = ?1 AND kind = ?2")
                .bind(run_id)
                .bind(kind)
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }
}

#[async_trait]
impl SnapshotStore for Store {
    async fn put(&self, snapshot: &StoredSnapshot) -> Result<(), StoreError> {
        let sql = format!(
            "INSERT INTO {} (day_ms, created_ms, created_at, payload_json) VALUES (?1, ?2, ?3, ?4)",
            snapshot.asset.table()
        );
        sqlx::query(&sql)
            .bind(snapshot.day_ms)
            .bind(snapshot.created_ms)
            .bind(snapshot.created_at.as_str())
            .bind(snapshot.payload.to_string())
            .execute(&self.pool)
            .await
            .map_err(StoreError::backend)?;
        debug!(
            asset = %snapshot.asset,
            day_ms = snapshot.day_ms,
            created_ms = snapshot.created_ms,
            "snapshot stored"
        );
        Ok(())
    }

    async fn query(
        &self,
        asset: Asset,
        day_ms: i64,
        created_after_ms: i64,
    ) -> Result<Vec<StoredSnapshot>, StoreError> {
        let sql = format!(
            "SELECT day_ms, created_ms, created_at, payload_json FROM {} \
             WHERE day_ms = ?1 AND created_ms > ?2 \
             ORDER BY created_ms DESC, rowid DESC",
            asset.table()
        );
        let rows = sqlx::query(&sql)
            .bind(day_ms)
            .bind(created_after_ms)
            .fetch_all(&self.pool)
            .await
            .map_err(StoreError::backend)?;
        rows.iter().map(|row| decode_row(asset, row)).collect()
    }
}

fn decode_row(asset: Asset, row: &SqliteRow) -> Result<StoredSnapshot, StoreError> {
    let payload_json: String = row.try_get("payload_json").map_err(StoreError::backend)?;
    let payload = serde_json::from_str(&payload_json)
        .map_err(|source| StoreError::Payload { asset, source })?;
    Ok(StoredSnapshot {
        asset,
        day_ms: row.try_get("day_ms").map_err(StoreError::backend)?,
        created_ms: row.try_get("created_ms").map_err(StoreError::backend)?,
        created_at: row.try_get("created_at").map_err(StoreError::backend)?,
        payload,
    })
}

pub async fn init_sqlite(path: &str) -> Result<Store> {
    let store = Store::connect(path).await?;
    info!(path = path, "sqlite initialized");
    Ok(store)
}

async fn run_init_sql(pool: &SqlitePool) -> Result<()> {
    for statement in INIT_SQL.split(';') {
        let trimmed = statement.trim();
        if trimmed.is_empty() {
            continue;
        }
        sqlx::query(trimmed).execute(pool).await?;
    }
    Ok(())
}
