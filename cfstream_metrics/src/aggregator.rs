use cfstream_core::Sample;

/// Reduces a window of buckets into the per-account gauge value.
pub struct MinutesViewedAggregator;

impl MinutesViewedAggregator {
    /// Mean minutes viewed per reported bucket.
    ///
    /// Returns `None` for an empty window so callers never publish a
    /// non-finite value.
    pub fn aggregate(samples: &[Sample]) -> Option<f64> {
        if samples.is_empty() {
            return None;
        }

        Some(Self::total(samples) as f64 / samples.len() as f64)
    }

    /// Widened so a window of provider-sized counts cannot overflow.
    pub fn total(samples: &[Sample]) -> u128 {
        samples.iter().map(|s| u128::from(s.minutes_viewed)).sum()
    }
}
