// Shared test helpers
#![allow(dead_code)]

use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex};
use telematics::error::TelemetryError;
use telematics::models::{DisplayFrame, Report, Snapshot};
use telematics::sink::{DisplaySink, RecordSink};

pub const TEST_CONFIG: &str = r#"
[server]
port = 8081
host = "0.0.0.0"

[logger]
node_list = "nodes.txt"
interval_secs = 1
duration_secs = 3600
reference_node = "node_0"

[store]
path = "data/test.db"

[publishing]
broadcast_capacity = 10
terminal = false
"#;

pub fn confirmed(n: u64) -> Snapshot {
    Snapshot {
        confirmed_transactions: n,
        ..Snapshot::default()
    }
}

pub fn report(node: &str, data: Snapshot) -> Report {
    Report {
        node: node.to_string(),
        data,
    }
}

/// One appended row.
#[derive(Debug, Clone, PartialEq)]
pub struct Appended {
    pub record: String,
    pub at: DateTime<Utc>,
    pub values: Vec<f64>,
}

/// Record sink that keeps every append in memory.
#[derive(Default)]
pub struct CollectingSink {
    pub rows: Mutex<Vec<Appended>>,
}

impl CollectingSink {
    pub fn rows(&self) -> Vec<Appended> {
        self.rows.lock().unwrap().clone()
    }
}

impl RecordSink for CollectingSink {
    async fn append(
        &self,
        record: &str,
        at: DateTime<Utc>,
        values: &[f64],
    ) -> Result<(), TelemetryError> {
        self.rows.lock().unwrap().push(Appended {
            record: record.to_string(),
            at,
            values: values.to_vec(),
        });
        Ok(())
    }
}

/// Record sink that rejects every write.
pub struct FailingSink;

impl RecordSink for FailingSink {
    async fn append(
        &self,
        record: &str,
        _at: DateTime<Utc>,
        _values: &[f64],
    ) -> Result<(), TelemetryError> {
        Err(TelemetryError::UnknownRecord(record.to_string()))
    }
}

/// Display target that keeps every frame.
#[derive(Clone, Default)]
pub struct CollectingDisplay {
    pub frames: Arc<Mutex<Vec<DisplayFrame>>>,
}

impl CollectingDisplay {
    pub fn frames(&self) -> Vec<DisplayFrame> {
        self.frames.lock().unwrap().clone()
    }
}

impl DisplaySink for CollectingDisplay {
    fn render(&mut self, frame: &DisplayFrame) {
        self.frames.lock().unwrap().push(frame.clone());
    }
}
