// Per-node telemetry snapshot and the field table shared by the store and the aggregator

use serde::{Deserialize, Serialize};

/// Number of counters/gauges in one snapshot (and columns in one store record).
pub const FIELD_COUNT: usize = 20;

/// How a field is folded across nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fold {
    /// Monotonic counters and cumulative sums.
    Sum,
    /// Per-node gauges and structural lengths.
    Mean,
}

#[derive(Debug, Clone, Copy)]
pub struct Field {
    /// Store column name.
    pub column: &'static str,
    pub fold: Fold,
}

const fn sum(column: &'static str) -> Field {
    Field {
        column,
        fold: Fold::Sum,
    }
}

const fn mean(column: &'static str) -> Field {
    Field {
        column,
        fold: Fold::Mean,
    }
}

/// Field table in `Snapshot::values` order.
pub const FIELDS: [Field; FIELD_COUNT] = [
    sum("generated_tx"),
    sum("confirmed_tx"),
    sum("deconfirmed_tx"),
    mean("queue_length"),
    sum("mined_proposer"),
    sum("mined_voter"),
    sum("mined_tx"),
    sum("proposer_delay_sum"),
    sum("voter_delay_sum"),
    sum("tx_delay_sum"),
    sum("received_proposer"),
    sum("received_voter"),
    sum("received_tx"),
    sum("confirmed_tx_blk"),
    sum("deconfirmed_tx_blk"),
    sum("txblk_cfm_sum"),
    mean("prop_chain_depth"),
    mean("voter_chains_depth"),
    sum("processed_proposer"),
    sum("processed_voter"),
];

/// One poll of a node's `/telematics/snapshot` endpoint. Absent fields decode as 0.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Snapshot {
    pub generated_transactions: u64,
    pub confirmed_transactions: u64,
    pub deconfirmed_transactions: u64,
    pub incoming_message_queue: u64,
    pub mined_proposer_blocks: u64,
    pub mined_voter_blocks: u64,
    pub mined_transaction_blocks: u64,
    pub total_proposer_block_delay: u64,
    pub total_voter_block_delay: u64,
    pub total_transaction_block_delay: u64,
    pub received_proposer_blocks: u64,
    pub received_voter_blocks: u64,
    pub received_transaction_blocks: u64,
    pub confirmed_transaction_blocks: u64,
    pub deconfirmed_transaction_blocks: u64,
    pub total_transaction_block_confirmation_latency: u64,
    pub proposer_main_chain_length: u64,
    pub voter_main_chain_length_sum: u64,
    pub processed_proposer_blocks: u64,
    pub processed_voter_blocks: u64,
}

impl Snapshot {
    /// Field values in `FIELDS` order.
    pub fn values(&self) -> [u64; FIELD_COUNT] {
        [
            self.generated_transactions,
            self.confirmed_transactions,
            self.deconfirmed_transactions,
            self.incoming_message_queue,
            self.mined_proposer_blocks,
            self.mined_voter_blocks,
            self.mined_transaction_blocks,
            self.total_proposer_block_delay,
            self.total_voter_block_delay,
            self.total_transaction_block_delay,
            self.received_proposer_blocks,
            self.received_voter_blocks,
            self.received_transaction_blocks,
            self.confirmed_transaction_blocks,
            self.deconfirmed_transaction_blocks,
            self.total_transaction_block_confirmation_latency,
            self.proposer_main_chain_length,
            self.voter_main_chain_length_sum,
            self.processed_proposer_blocks,
            self.processed_voter_blocks,
        ]
    }

    pub fn from_values(v: [u64; FIELD_COUNT]) -> Self {
        Self {
            generated_transactions: v[0],
            confirmed_transactions: v[1],
            deconfirmed_transactions: v[2],
            incoming_message_queue: v[3],
            mined_proposer_blocks: v[4],
            mined_voter_blocks: v[5],
            mined_transaction_blocks: v[6],
            total_proposer_block_delay: v[7],
            total_voter_block_delay: v[8],
            total_transaction_block_delay: v[9],
            received_proposer_blocks: v[10],
            received_voter_blocks: v[11],
            received_transaction_blocks: v[12],
            confirmed_transaction_blocks: v[13],
            deconfirmed_transaction_blocks: v[14],
            total_transaction_block_confirmation_latency: v[15],
            proposer_main_chain_length: v[16],
            voter_main_chain_length_sum: v[17],
            processed_proposer_blocks: v[18],
            processed_voter_blocks: v[19],
        }
    }

    /// Values as store slots.
    pub fn record_values(&self) -> [f64; FIELD_COUNT] {
        self.values().map(|v| v as f64)
    }
}

/// Unit passed from a node monitor to the aggregator.
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    pub node: String,
    pub data: Snapshot,
}
