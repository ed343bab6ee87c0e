// Cross-node aggregate: raw per-field totals plus the contributing node count.

use super::snapshot::{FIELD_COUNT, FIELDS, Fold, Snapshot};

/// Elementwise fold of one snapshot per node. Built fresh on every tick, never persisted as-is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AggregateSnapshot {
    totals: Snapshot,
    nodes: usize,
}

impl AggregateSnapshot {
    /// Returns `None` when there are no snapshots to fold.
    pub fn from_snapshots<'a, I>(snapshots: I) -> Option<Self>
    where
        I: IntoIterator<Item = &'a Snapshot>,
    {
        let mut totals = [0u64; FIELD_COUNT];
        let mut nodes = 0usize;
        for s in snapshots {
            // Totals pin at u64::MAX rather than wrap.
            for (t, v) in totals.iter_mut().zip(s.values()) {
                *t = t.saturating_add(v);
            }
            nodes += 1;
        }
        if nodes == 0 {
            return None;
        }
        Some(Self {
            totals: Snapshot::from_values(totals),
            nodes,
        })
    }

    /// Per-field sums across nodes, regardless of fold rule.
    pub fn totals(&self) -> &Snapshot {
        &self.totals
    }

    pub fn nodes(&self) -> usize {
        self.nodes
    }

    /// Sum or mean per field, following `FIELDS`.
    pub fn folded(&self) -> [f64; FIELD_COUNT] {
        let n = self.nodes as f64;
        let mut out = self.totals.record_values();
        for (v, field) in out.iter_mut().zip(FIELDS.iter()) {
            if field.fold == Fold::Mean {
                *v /= n;
            }
        }
        out
    }
}
