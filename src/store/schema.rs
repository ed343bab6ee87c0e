// Fixed schema for the round-robin store: record registry, sample ring, derived-formula view.

use crate::models::FIELDS;
use sqlx::SqlitePool;

/// Store-side formulas over raw slots; NULL when the denominator is 0.
pub(super) const DERIVED: [(&str, &str); 6] = [
    (
        "proposer_delay_mean",
        "proposer_delay_sum / NULLIF(received_proposer, 0)",
    ),
    ("voter_delay_mean", "voter_delay_sum / NULLIF(received_voter, 0)"),
    ("tx_delay_mean", "tx_delay_sum / NULLIF(received_tx, 0)"),
    (
        "txblk_cfm_mean",
        "txblk_cfm_sum / NULLIF(confirmed_tx_blk, 0) / 1000.0",
    ),
    (
        "prop_fork",
        "(processed_proposer - prop_chain_depth) / NULLIF(processed_proposer, 0)",
    ),
    (
        "voter_fork",
        "(processed_voter - voter_chains_depth) / NULLIF(processed_voter, 0)",
    ),
];

pub(super) async fn init(pool: &SqlitePool) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS records (
            name TEXT PRIMARY KEY,
            step_secs INTEGER NOT NULL,
            capacity INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    let slots = FIELDS
        .iter()
        .map(|f| format!("{} REAL NOT NULL", f.column))
        .collect::<Vec<_>>()
        .join(",\n            ");
    sqlx::query(&format!(
        r#"
        CREATE TABLE IF NOT EXISTS samples (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            record TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            {slots}
        )
        "#
    ))
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_samples_record_created_at ON samples(record, created_at)",
    )
    .execute(pool)
    .await?;

    let derived = DERIVED
        .iter()
        .map(|(name, formula)| format!("{formula} AS {name}"))
        .collect::<Vec<_>>()
        .join(", ");
    sqlx::query(&format!(
        "CREATE VIEW IF NOT EXISTS derived_samples AS SELECT record, created_at, {derived} FROM samples"
    ))
    .execute(pool)
    .await?;

    Ok(())
}

pub(super) fn insert_sql() -> String {
    let columns = FIELDS
        .iter()
        .map(|f| f.column)
        .collect::<Vec<_>>()
        .join(", ");
    let params = (3..FIELDS.len() + 3)
        .map(|i| format!("${i}"))
        .collect::<Vec<_>>()
        .join(", ");
    format!("INSERT INTO samples (record, created_at, {columns}) VALUES ($1, $2, {params})")
}

pub(super) fn select_columns() -> String {
    FIELDS
        .iter()
        .map(|f| f.column)
        .collect::<Vec<_>>()
        .join(", ")
}
