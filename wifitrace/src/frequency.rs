use crate::series::TimeSeries;
use crate::trace::WifiTrace;

/// Width of each frequency bucket.
pub const BUCKET_WIDTH: i64 = 2_500;

/// Latencies above this all share one open-ended bucket.
pub const OVERFLOW: i64 = 150_000;

/// Pools latencies from several series to compare their distributions.
#[derive(Debug, Default, Clone)]
pub struct TraceFrequency {
    rtt: Vec<i64>,
}

impl TraceFrequency {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_series(&mut self, series: &TimeSeries) {
        self.rtt.extend_from_slice(series.latencies());
    }

    /// Adds the round-trip time of every event in `trace`, measured or not.
    pub fn add_trace(&mut self, trace: &WifiTrace) {
        self.rtt.extend(trace.events().iter().map(|ev| ev.rtt));
    }

    pub fn len(&self) -> usize {
        self.rtt.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rtt.is_empty()
    }

    /// Partitions the pooled latencies into [`BUCKET_WIDTH`] ranges up to [`OVERFLOW`], and
    /// one overflow range above it. Empty ranges between two populated ones are reported.
    pub fn compute_frequencies(&self) -> Vec<FrequencyBucket> {
        let mut rtt = self.rtt.clone();
        rtt.sort_unstable();
        let total = rtt.len();
        let mut buckets = Vec::new();
        let mut limit = BUCKET_WIDTH;
        let mut range = format!("< {BUCKET_WIDTH}");
        let mut count = 0;
        for &x in &rtt {
            while x > limit {
                buckets.push(FrequencyBucket::new(std::mem::take(&mut range), count, total));
                count = 0;
                if x > OVERFLOW {
                    range = format!("> {OVERFLOW}");
                    limit = i64::MAX;
                } else {
                    range = format!("{limit}--{}", limit + BUCKET_WIDTH);
                    limit += BUCKET_WIDTH;
                }
            }
            count += 1;
        }
        if count > 0 {
            buckets.push(FrequencyBucket::new(range, count, total));
        }
        buckets
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct FrequencyBucket {
    pub range: String,
    pub count: usize,
    /// Fraction of all pooled samples.
    pub frq: f64,
    /// `log10(count)`, zero for empty ranges.
    pub l10_frq: f64,
}

impl FrequencyBucket {
    fn new(range: String, count: usize, total: usize) -> Self {
        Self {
            range,
            count,
            frq: count as f64 / total as f64,
            l10_frq: utils::log10_count(count),
        }
    }
}
