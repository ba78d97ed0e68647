// SQLite-backed copy of the series buffers so history survives restarts.
// One row per sample; rows beyond a series' capacity are trimmed after each flush.

mod blob;

use crate::models::{Sample, SeriesKey};
use crate::series_store::PersistRecord;
use sqlx::Row;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;
use tracing::instrument;

pub struct HistoryRepo {
    pool: SqlitePool,
}

impl HistoryRepo {
    pub async fn connect(path: &str, max_pool_size: u32) -> anyhow::Result<Self> {
        if let Some(parent) = Path::new(path).parent() {
            std::fs::create_dir_all(parent)?;
        }
        let opts = SqliteConnectOptions::from_str(&format!("sqlite:{}", path))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .busy_timeout(std::time::Duration::from_secs(5))
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal);
        let pool = SqlitePoolOptions::new()
            .max_connections(max_pool_size)
            .connect_with(opts)
            .await?;
        Ok(Self { pool })
    }

    pub async fn init(&self) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS series_samples (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                series_key TEXT NOT NULL,
                ts INTEGER NOT NULL,
                fields BLOB NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_series_samples_key_ts ON series_samples(series_key, ts)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    #[instrument(skip(self, records), fields(repo = "history", operation = "save_samples", records_count = records.len()))]
    pub async fn save_samples(&self, records: &[PersistRecord]) -> anyhow::Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        let mut tx = self.pool.begin().await?;
        for r in records {
            let fields = blob::encode_fields(&r.sample.fields)?;
            sqlx::query("INSERT INTO series_samples (series_key, ts, fields) VALUES ($1, $2, $3)")
                .bind(r.key.to_string())
                .bind(r.sample.timestamp)
                .bind(&fields)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    /// Keep only the newest `capacity` rows of `key`. Returns rows deleted.
    #[instrument(skip(self), fields(repo = "history", operation = "trim_series"))]
    pub async fn trim_series(&self, key: &SeriesKey, capacity: usize) -> anyhow::Result<u64> {
        let r = sqlx::query(
            "DELETE FROM series_samples WHERE series_key = ?1 AND id NOT IN (
                SELECT id FROM series_samples WHERE series_key = ?1
                ORDER BY ts DESC, id DESC LIMIT ?2
            )",
        )
        .bind(key.to_string())
        .bind(capacity as i64)
        .execute(&self.pool)
        .await?;
        Ok(r.rows_affected())
    }

    /// Every persisted key. Rows with unparseable keys are skipped.
    pub async fn series_keys(&self) -> anyhow::Result<Vec<SeriesKey>> {
        let rows: Vec<String> =
            sqlx::query_scalar("SELECT DISTINCT series_key FROM series_samples ORDER BY series_key")
                .fetch_all(&self.pool)
                .await?;
        Ok(rows
            .into_iter()
            .filter_map(|k| match k.parse::<SeriesKey>() {
                Ok(key) => Some(key),
                Err(e) => {
                    tracing::debug!(error = %e, "unparseable series key, skipping");
                    None
                }
            })
            .collect())
    }

    /// Newest `limit` samples of `key`, oldest first.
    #[instrument(skip(self), fields(repo = "history", operation = "load_recent"))]
    pub async fn load_recent(&self, key: &SeriesKey, limit: usize) -> anyhow::Result<Vec<Sample>> {
        let rows = sqlx::query(
            "SELECT ts, fields FROM series_samples WHERE series_key = $1
             ORDER BY ts DESC, id DESC LIMIT $2",
        )
        .bind(key.to_string())
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let ts: i64 = row.try_get("ts")?;
            let fields: Vec<u8> = row.try_get("fields")?;
            if let Some(fields) = blob::decode_fields(&fields) {
                out.push(Sample::new(ts, fields));
            }
        }
        out.reverse();
        Ok(out)
    }

    pub async fn count(&self, key: &SeriesKey) -> anyhow::Result<i64> {
        let n = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM series_samples WHERE series_key = $1",
        )
        .bind(key.to_string())
        .fetch_one(&self.pool)
        .await?;
        Ok(n)
    }
}
