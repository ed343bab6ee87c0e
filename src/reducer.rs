// Sample reducers: fold a batch of raw samples into one consolidated value

/// Consolidation function applied to the raw samples of one interval.
pub type Reducer = fn(&[f64]) -> f64;

/// Synthetic value for an interval boundary with no observed sample.
pub type GapFill = fn() -> f64;

/// Arithmetic mean. Must not be called on an empty batch; `TimeSeries` never does.
pub fn mean(samples: &[f64]) -> f64 {
    debug_assert!(!samples.is_empty(), "mean of an empty sample batch");
    sum(samples) / samples.len() as f64
}

/// Arithmetic sum; 0 for an empty batch.
pub fn sum(samples: &[f64]) -> f64 {
    samples.iter().sum()
}

pub fn fill_zero() -> f64 {
    0.0
}
