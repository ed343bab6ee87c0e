// Dump recent store rows as JSON, with the derived ratios alongside.
//
// Usage: cargo run --example dump_records -- [DB_PATH] [RECORD] [LIMIT]
//   DB_PATH  default: ./data/telematics.db
//   RECORD   default: average
//   LIMIT    default: 5

use telematics::aggregator::AGGREGATE_RECORD;
use telematics::models::FIELDS;
use telematics::store::RoundRobinStore;
use std::env;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = env::args().collect();
    let path = args
        .get(1)
        .map(String::as_str)
        .unwrap_or("./data/telematics.db");
    let record = args.get(2).map(String::as_str).unwrap_or(AGGREGATE_RECORD);
    let limit: u32 = args.get(3).and_then(|s| s.parse().ok()).unwrap_or(5);

    let store = RoundRobinStore::connect(path).await?;
    let samples = store.recent(record, limit).await?;
    let (Some(first), Some(last)) = (samples.first(), samples.last()) else {
        println!("[]");
        return Ok(());
    };
    let derived = store
        .fetch_derived(record, first.created_at, last.created_at)
        .await?;

    let rows = samples
        .iter()
        .map(|s| {
            let fields = FIELDS
                .iter()
                .zip(s.values)
                .map(|(f, v)| (f.column.to_string(), serde_json::json!(v)))
                .collect::<serde_json::Map<_, _>>();
            serde_json::json!({
                "createdAt": s.created_at,
                "fields": fields,
                "derived": derived.iter().find(|d| d.created_at == s.created_at),
            })
        })
        .collect::<Vec<_>>();
    println!("{}", serde_json::to_string_pretty(&rows)?);
    Ok(())
}
