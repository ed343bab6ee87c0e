// SQLite round-robin store. One fixed-schema ring of samples per record (node or aggregate);
// each ring keeps at most `capacity` rows and only accepts strictly increasing timestamps.

mod schema;

use crate::error::TelemetryError;
use crate::models::FIELD_COUNT;
use crate::sink::RecordSink;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::Row;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use std::path::Path;
use std::str::FromStr;
use tracing::instrument;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordInfo {
    pub name: String,
    pub step_secs: i64,
    pub capacity: i64,
}

/// One stored row; `values` follow `models::FIELDS` order.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredSample {
    pub created_at: i64,
    pub values: [f64; FIELD_COUNT],
}

impl StoredSample {
    pub fn value(&self, column: &str) -> Option<f64> {
        crate::models::FIELDS
            .iter()
            .position(|f| f.column == column)
            .map(|i| self.values[i])
    }
}

/// Ratios computed by the store from raw slots.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DerivedSample {
    pub created_at: i64,
    pub proposer_delay_mean: Option<f64>,
    pub voter_delay_mean: Option<f64>,
    pub tx_delay_mean: Option<f64>,
    pub txblk_cfm_mean: Option<f64>,
    pub prop_fork: Option<f64>,
    pub voter_fork: Option<f64>,
}

pub struct RoundRobinStore {
    pool: SqlitePool,
    insert_sql: String,
    select_columns: String,
}

impl RoundRobinStore {
    pub async fn connect(path: &str) -> anyhow::Result<Self> {
        if let Some(parent) = Path::new(path).parent() {
            std::fs::create_dir_all(parent)?;
        }
        let opts = SqliteConnectOptions::from_str(&format!("sqlite:{}", path))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .busy_timeout(std::time::Duration::from_secs(5))
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal);
        let pool = SqlitePoolOptions::new().connect_with(opts).await?;
        Ok(Self {
            pool,
            insert_sql: schema::insert_sql(),
            select_columns: schema::select_columns(),
        })
    }

    pub async fn init(&self) -> anyhow::Result<()> {
        schema::init(&self.pool).await
    }

    /// Creates (or re-creates, dropping old samples) a record ring.
    #[instrument(skip(self), fields(repo = "store", operation = "create_record"))]
    pub async fn create_record(
        &self,
        name: &str,
        step_secs: u64,
        capacity: u32,
    ) -> anyhow::Result<()> {
        anyhow::ensure!(capacity > 0, "record {} capacity must be > 0", name);
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM samples WHERE record = $1")
            .bind(name)
            .execute(&mut *tx)
            .await?;
        sqlx::query("INSERT OR REPLACE INTO records (name, step_secs, capacity) VALUES ($1, $2, $3)")
            .bind(name)
            .bind(step_secs as i64)
            .bind(capacity as i64)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    pub async fn records(&self) -> Result<Vec<RecordInfo>, TelemetryError> {
        let rows = sqlx::query("SELECT name, step_secs, capacity FROM records ORDER BY name")
            .fetch_all(&self.pool)
            .await?;
        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(RecordInfo {
                name: row.try_get("name")?,
                step_secs: row.try_get("step_secs")?,
                capacity: row.try_get("capacity")?,
            });
        }
        Ok(out)
    }

    /// Appends one row at `at` (second granularity) and trims the ring to capacity.
    #[instrument(skip(self, values), fields(repo = "store", operation = "append"))]
    pub async fn append(
        &self,
        record: &str,
        at: DateTime<Utc>,
        values: &[f64],
    ) -> Result<(), TelemetryError> {
        if values.len() != FIELD_COUNT {
            return Err(TelemetryError::SchemaMismatch {
                expected: FIELD_COUNT,
                got: values.len(),
            });
        }
        let ts = at.timestamp();
        let mut tx = self.pool.begin().await?;

        let capacity: i64 = sqlx::query("SELECT capacity FROM records WHERE name = $1")
            .bind(record)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| TelemetryError::UnknownRecord(record.to_string()))?
            .try_get("capacity")?;

        let last: Option<i64> =
            sqlx::query("SELECT MAX(created_at) AS last FROM samples WHERE record = $1")
                .bind(record)
                .fetch_one(&mut *tx)
                .await?
                .try_get("last")?;
        if let Some(last) = last
            && ts <= last
        {
            return Err(TelemetryError::StaleUpdate {
                record: record.to_string(),
                at: ts,
                last,
            });
        }

        let mut insert = sqlx::query(&self.insert_sql).bind(record).bind(ts);
        for v in values {
            insert = insert.bind(*v);
        }
        insert.execute(&mut *tx).await?;

        sqlx::query(
            "DELETE FROM samples WHERE record = $1 AND id NOT IN
             (SELECT id FROM samples WHERE record = $1 ORDER BY created_at DESC LIMIT $2)",
        )
        .bind(record)
        .bind(capacity)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    pub async fn count(&self, record: &str) -> Result<u64, TelemetryError> {
        let n: i64 = sqlx::query("SELECT COUNT(*) AS n FROM samples WHERE record = $1")
            .bind(record)
            .fetch_one(&self.pool)
            .await?
            .try_get("n")?;
        Ok(n as u64)
    }

    /// Rows with `from_ts <= created_at <= to_ts` (unix seconds), ascending.
    pub async fn fetch(
        &self,
        record: &str,
        from_ts: i64,
        to_ts: i64,
    ) -> Result<Vec<StoredSample>, TelemetryError> {
        let rows = sqlx::query(&format!(
            "SELECT created_at, {} FROM samples WHERE record = $1 AND created_at >= $2 AND created_at <= $3 ORDER BY created_at ASC",
            self.select_columns
        ))
        .bind(record)
        .bind(from_ts)
        .bind(to_ts)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(parse_sample_row).collect()
    }

    /// Most recent `limit` rows, ascending.
    pub async fn recent(&self, record: &str, limit: u32) -> Result<Vec<StoredSample>, TelemetryError> {
        let rows = sqlx::query(&format!(
            "SELECT created_at, {} FROM samples WHERE record = $1 ORDER BY created_at DESC LIMIT $2",
            self.select_columns
        ))
        .bind(record)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        let mut out = rows
            .iter()
            .map(parse_sample_row)
            .collect::<Result<Vec<_>, _>>()?;
        out.reverse();
        Ok(out)
    }

    pub async fn fetch_derived(
        &self,
        record: &str,
        from_ts: i64,
        to_ts: i64,
    ) -> Result<Vec<DerivedSample>, TelemetryError> {
        let rows = sqlx::query(
            "SELECT created_at, proposer_delay_mean, voter_delay_mean, tx_delay_mean, txblk_cfm_mean, prop_fork, voter_fork
             FROM derived_samples WHERE record = $1 AND created_at >= $2 AND created_at <= $3 ORDER BY created_at ASC",
        )
        .bind(record)
        .bind(from_ts)
        .bind(to_ts)
        .fetch_all(&self.pool)
        .await?;
        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(DerivedSample {
                created_at: row.try_get("created_at")?,
                proposer_delay_mean: row.try_get("proposer_delay_mean")?,
                voter_delay_mean: row.try_get("voter_delay_mean")?,
                tx_delay_mean: row.try_get("tx_delay_mean")?,
                txblk_cfm_mean: row.try_get("txblk_cfm_mean")?,
                prop_fork: row.try_get("prop_fork")?,
                voter_fork: row.try_get("voter_fork")?,
            });
        }
        Ok(out)
    }
}

impl RecordSink for RoundRobinStore {
    async fn append(
        &self,
        record: &str,
        at: DateTime<Utc>,
        values: &[f64],
    ) -> Result<(), TelemetryError> {
        RoundRobinStore::append(self, record, at, values).await
    }
}

fn parse_sample_row(row: &SqliteRow) -> Result<StoredSample, TelemetryError> {
    let mut values = [0.0; FIELD_COUNT];
    for (i, field) in crate::models::FIELDS.iter().enumerate() {
        values[i] = row.try_get(field.column)?;
    }
    Ok(StoredSample {
        created_at: row.try_get("created_at")?,
        values,
    })
}
