// Runtime error taxonomy. None of these are fatal: callers log and skip the data point.

/// Errors from polling nodes and writing to the round-robin store.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    /// Node unreachable, timed out, or answered with a non-success status.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("decode error: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("persistence error: {0}")]
    Persistence(#[from] sqlx::Error),

    /// The store only accepts strictly increasing timestamps per record (second granularity).
    #[error("stale update for record {record}: timestamp {at} is not after {last}")]
    StaleUpdate { record: String, at: i64, last: i64 },

    #[error("unknown record: {0}")]
    UnknownRecord(String),

    #[error("schema mismatch: expected {expected} values, got {got}")]
    SchemaMismatch { expected: usize, got: usize },
}
