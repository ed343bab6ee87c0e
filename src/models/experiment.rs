// Reference-node performance vector and the end-of-window summary

use serde::{Deserialize, Serialize};

use super::Snapshot;

/// Reference node counters observed at one aggregator tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerfVector {
    /// Seconds since the logger started, at the tick that observed these counters.
    pub elapsed_secs: f64,
    pub confirmed_tx: u64,
    pub confirmed_tx_blk: u64,
    pub processed_voter: u64,
    pub processed_proposer: u64,
    pub voter_len_sum: u64,
    pub proposer_len: u64,
    pub latency_sum: u64,
}

impl PerfVector {
    pub fn observe(elapsed_secs: f64, s: &Snapshot) -> Self {
        Self {
            elapsed_secs,
            confirmed_tx: s.confirmed_transactions,
            confirmed_tx_blk: s.confirmed_transaction_blocks,
            processed_voter: s.processed_voter_blocks,
            processed_proposer: s.processed_proposer_blocks,
            voter_len_sum: s.voter_main_chain_length_sum,
            proposer_len: s.proposer_main_chain_length,
            latency_sum: s.total_transaction_block_confirmation_latency,
        }
    }
}

/// Final statistics of a window that reached `Running` and saw a stop boundary.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExperimentSummary {
    pub duration_secs: f64,
    /// Mean transaction block confirmation latency (seconds).
    pub confirmation_latency_secs: Option<f64>,
    /// Confirmed transactions per second.
    pub throughput: Option<f64>,
    pub proposer_fork_rate: Option<f64>,
    pub voter_fork_rate: Option<f64>,
}

impl ExperimentSummary {
    /// `None` when the two observations are not separated in time.
    pub fn between(start: &PerfVector, stop: &PerfVector) -> Option<Self> {
        let duration_secs = stop.elapsed_secs - start.elapsed_secs;
        if duration_secs <= 0.0 {
            return None;
        }
        let diff = |a: u64, b: u64| a as f64 - b as f64;

        let latency_ms = ratio(
            diff(stop.latency_sum, start.latency_sum),
            diff(stop.confirmed_tx_blk, start.confirmed_tx_blk),
        );
        let proposer_forked = diff(stop.processed_proposer, stop.proposer_len)
            - diff(start.processed_proposer, start.proposer_len);
        let voter_forked = diff(stop.processed_voter, stop.voter_len_sum)
            - diff(start.processed_voter, start.voter_len_sum);

        Some(Self {
            duration_secs,
            confirmation_latency_secs: latency_ms.map(|ms| ms / 1000.0),
            throughput: ratio(diff(stop.confirmed_tx, start.confirmed_tx), duration_secs),
            proposer_fork_rate: ratio(
                proposer_forked,
                diff(stop.processed_proposer, start.processed_proposer),
            ),
            voter_fork_rate: ratio(
                voter_forked,
                diff(stop.processed_voter, start.processed_voter),
            ),
        })
    }
}

/// Division that reports "no data" instead of NaN/inf.
pub fn ratio(num: f64, den: f64) -> Option<f64> {
    if den == 0.0 {
        return None;
    }
    let r = num / den;
    r.is_finite().then_some(r)
}
