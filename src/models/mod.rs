// Domain models: node snapshots, aggregates, experiment observations, display frames

mod aggregate;
mod display;
mod experiment;
mod snapshot;

pub use aggregate::AggregateSnapshot;
pub use display::{DisplayFrame, ExperimentView, Figure};
pub use experiment::{ExperimentSummary, PerfVector, ratio};
pub use snapshot::{FIELD_COUNT, FIELDS, Field, Fold, Report, Snapshot};
