// Library for tests to access modules

pub mod aggregator;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod models;
pub mod monitor;
pub mod node_list;
pub mod reducer;
pub mod routes;
pub mod sink;
pub mod store;
pub mod timeseries;
pub mod trigger;
pub mod version;
