// Live display figures, recomputed from cumulative aggregates on every tick.
// Ratios use raw totals for numerator and denominator, so the node count cancels out.

use crate::models::{AggregateSnapshot, Figure, ratio};

pub fn compute(
    current: &AggregateSnapshot,
    previous: &AggregateSnapshot,
    elapsed_secs: f64,
    interval_secs: f64,
) -> Vec<Figure> {
    let c = current.totals();
    let p = previous.totals();
    let f = |v: u64| v as f64;

    let rate = |key: &str, label: &str, cur: u64, prev: u64| Figure {
        key: key.into(),
        label: label.into(),
        overall: ratio(f(cur), elapsed_secs),
        window: ratio(f(cur) - f(prev), interval_secs),
    };
    let mean_of = |key: &str, label: &str, num: (u64, u64), den: (u64, u64), scale: f64| Figure {
        key: key.into(),
        label: label.into(),
        overall: ratio(f(num.0), f(den.0)).map(|v| v / scale),
        window: ratio(f(num.0) - f(num.1), f(den.0) - f(den.1)).map(|v| v / scale),
    };
    let fork = |key: &str, label: &str, processed: (u64, u64), main_chain: (u64, u64)| {
        let forked = |proc: u64, len: u64| f(proc) - f(len);
        Figure {
            key: key.into(),
            label: label.into(),
            overall: ratio(forked(processed.0, main_chain.0), f(processed.0)),
            window: ratio(
                forked(processed.0, main_chain.0) - forked(processed.1, main_chain.1),
                f(processed.0) - f(processed.1),
            ),
        }
    };

    let queue_now = f(c.incoming_message_queue) / current.nodes() as f64;
    let queue_prev = f(p.incoming_message_queue) / previous.nodes() as f64;

    vec![
        rate(
            "generated_tx",
            "Generated Transactions",
            c.generated_transactions,
            p.generated_transactions,
        ),
        rate(
            "confirmed_tx",
            "Confirmed Transactions",
            c.confirmed_transactions,
            p.confirmed_transactions,
        ),
        rate(
            "deconfirmed_tx",
            "Deconfirmed Transactions",
            c.deconfirmed_transactions,
            p.deconfirmed_transactions,
        ),
        rate(
            "confirmed_tx_blk",
            "Confirmed Transaction Blocks",
            c.confirmed_transaction_blocks,
            p.confirmed_transaction_blocks,
        ),
        rate(
            "deconfirmed_tx_blk",
            "Deconfirmed Transaction Blocks",
            c.deconfirmed_transaction_blocks,
            p.deconfirmed_transaction_blocks,
        ),
        Figure {
            key: "queue_length".into(),
            label: "Queue Length".into(),
            overall: Some(queue_now),
            window: ratio(queue_now - queue_prev, interval_secs),
        },
        rate(
            "mined_proposer",
            "Mining -    Proposer",
            c.mined_proposer_blocks,
            p.mined_proposer_blocks,
        ),
        rate(
            "mined_voter",
            "Mining -       Voter",
            c.mined_voter_blocks,
            p.mined_voter_blocks,
        ),
        rate(
            "mined_tx",
            "Mining - Transaction",
            c.mined_transaction_blocks,
            p.mined_transaction_blocks,
        ),
        mean_of(
            "proposer_delay_mean",
            "Delay -    Proposer",
            (c.total_proposer_block_delay, p.total_proposer_block_delay),
            (c.received_proposer_blocks, p.received_proposer_blocks),
            1.0,
        ),
        mean_of(
            "voter_delay_mean",
            "Delay -       Voter",
            (c.total_voter_block_delay, p.total_voter_block_delay),
            (c.received_voter_blocks, p.received_voter_blocks),
            1.0,
        ),
        mean_of(
            "tx_delay_mean",
            "Delay - Transaction",
            (
                c.total_transaction_block_delay,
                p.total_transaction_block_delay,
            ),
            (c.received_transaction_blocks, p.received_transaction_blocks),
            1.0,
        ),
        mean_of(
            "txblk_cfm_mean",
            "Confirmation -       Block",
            (
                c.total_transaction_block_confirmation_latency,
                p.total_transaction_block_confirmation_latency,
            ),
            (
                c.confirmed_transaction_blocks,
                p.confirmed_transaction_blocks,
            ),
            1000.0,
        ),
        fork(
            "prop_fork",
            "Forking -    Proposer",
            (c.processed_proposer_blocks, p.processed_proposer_blocks),
            (c.proposer_main_chain_length, p.proposer_main_chain_length),
        ),
        fork(
            "voter_fork",
            "Forking -       Voter",
            (c.processed_voter_blocks, p.processed_voter_blocks),
            (c.voter_main_chain_length_sum, p.voter_main_chain_length_sum),
        ),
    ]
}
