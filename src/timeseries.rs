// Fixed-interval consolidation of an irregular sample stream.
//
// Boundaries are anchored at the first recorded timestamp: b_k = t_0 + k * interval (k >= 1).
// The point stamped at boundary b holds reducer(samples with t in (b - interval, b]).
// Intervals with no sample get a gap-fill point when a gap-fill is configured, otherwise no point.
// With a retention set, history older than the retention behind the newest point is dropped.

use chrono::{DateTime, TimeDelta, Utc};

use crate::reducer::{GapFill, Reducer};

/// Anything that can be recorded into and queried by time range.
pub trait Dataset {
    /// Consolidated points with `start < t <= end`.
    fn range(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> (&[DateTime<Utc>], &[f64]);
    fn record(&mut self, value: f64, at: DateTime<Utc>);
    fn name(&self) -> &str;
}

#[derive(Debug, Clone)]
pub struct TimeSeries {
    title: String,
    reducer: Reducer,
    interval: TimeDelta,
    gap_fill: Option<GapFill>,
    raw_times: Vec<DateTime<Utc>>,
    raw_values: Vec<f64>,
    times: Vec<DateTime<Utc>>,
    values: Vec<f64>,
    next_boundary: Option<DateTime<Utc>>,
    retention: Option<TimeDelta>,
}

impl TimeSeries {
    /// Panics if `interval` is not positive.
    pub fn new(title: impl Into<String>, reducer: Reducer, interval: TimeDelta) -> Self {
        assert!(
            interval > TimeDelta::zero(),
            "consolidation interval must be positive"
        );
        Self {
            title: title.into(),
            reducer,
            interval,
            gap_fill: None,
            raw_times: Vec::new(),
            raw_values: Vec::new(),
            times: Vec::new(),
            values: Vec::new(),
            next_boundary: None,
            retention: None,
        }
    }

    pub fn with_gap_fill(mut self, gap_fill: GapFill) -> Self {
        self.gap_fill = Some(gap_fill);
        self
    }

    /// Keeps at least `retention` of points behind the newest one. Older points go in batches,
    /// and gap-fill points that would fall outside the retention are never produced.
    pub fn with_retention(mut self, retention: TimeDelta) -> Self {
        self.retention = Some(retention);
        self
    }

    pub fn interval(&self) -> TimeDelta {
        self.interval
    }

    /// Number of consolidated points.
    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    /// Raw samples waiting for the next boundary.
    pub fn pending(&self) -> usize {
        self.raw_values.len()
    }

    pub fn next_boundary(&self) -> Option<DateTime<Utc>> {
        self.next_boundary
    }

    fn push_point(&mut self, at: DateTime<Utc>, value: f64) {
        self.times.push(at);
        self.values.push(value);
    }

    /// First boundary at or after `at`, counting whole intervals from `from`.
    fn boundary_at_or_after(&self, from: DateTime<Utc>, at: DateTime<Utc>) -> DateTime<Utc> {
        let nanos = |d: TimeDelta| {
            i128::from(d.num_seconds()) * 1_000_000_000 + i128::from(d.subsec_nanos())
        };
        let (gap, step) = (nanos(at - from), nanos(self.interval));
        let offset = ((gap + step - 1) / step).max(0) * step;
        TimeDelta::new(
            (offset / 1_000_000_000) as i64,
            (offset % 1_000_000_000) as u32,
        )
        .and_then(|d| from.checked_add_signed(d))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    fn trim(&mut self) {
        let (Some(retention), Some(newest)) = (self.retention, self.times.last()) else {
            return;
        };
        let horizon = *newest - retention;
        if self.times.first().is_some_and(|t| *t <= horizon - retention) {
            let keep_from = self.times.partition_point(|t| *t <= horizon);
            self.times.drain(..keep_from);
            self.values.drain(..keep_from);
        }
    }
}

impl Dataset for TimeSeries {
    fn range(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> (&[DateTime<Utc>], &[f64]) {
        let start_idx = self.times.partition_point(|t| *t <= start);
        let end_idx = self.times.partition_point(|t| *t <= end).max(start_idx);
        (
            &self.times[start_idx..end_idx],
            &self.values[start_idx..end_idx],
        )
    }

    fn record(&mut self, value: f64, at: DateTime<Utc>) {
        let next = *self.next_boundary.get_or_insert(at + self.interval);
        if at > next {
            // Only the very first sample leaves the buffer empty, and it never crosses.
            debug_assert!(!self.raw_values.is_empty());
            let reduced = (self.reducer)(&self.raw_values);
            self.push_point(next, reduced);
            self.raw_times.clear();
            self.raw_values.clear();

            let boundary = self.boundary_at_or_after(next, at);
            if let Some(fill) = self.gap_fill {
                let mut fill_at = next + self.interval;
                if let Some(retention) = self.retention {
                    fill_at = fill_at.max(self.boundary_at_or_after(next, boundary - retention));
                }
                while fill_at < boundary {
                    self.push_point(fill_at, fill());
                    fill_at += self.interval;
                }
            }
            self.next_boundary = Some(boundary);
            self.trim();
        }
        self.raw_times.push(at);
        self.raw_values.push(value);
    }

    fn name(&self) -> &str {
        &self.title
    }
}
