use std::io;

use crate::series::{Histogram, TimeSeries};

/// Side-by-side latency histograms of several series, padded to a common width.
#[derive(Debug, Clone)]
pub struct HistogramTable {
    step: i64,
    rows: Vec<Histogram>,
}

impl HistogramTable {
    pub fn new(step: i64) -> Self {
        Self {
            step,
            rows: Vec::new(),
        }
    }

    pub fn add_series(&mut self, series: &TimeSeries) {
        let hist = series.get_hist(self.step);
        log::debug!("{} has {} buckets", hist.name, hist.counts.len());
        self.rows.push(hist);
    }

    /// Number of bucket columns.
    pub fn width(&self) -> usize {
        self.rows.iter().map(|h| h.counts.len()).max().unwrap_or(0)
    }

    /// Column headers: `trace`, then the upper edge of each bucket.
    pub fn headers(&self) -> Vec<String> {
        std::iter::once("trace".to_string())
            .chain((1..=self.width() as i64).map(|i| (i * self.step).to_string()))
            .collect()
    }

    pub fn write_csv(&self, wtr: impl io::Write) -> csv::Result<()> {
        let width = self.width();
        let mut wtr = csv::Writer::from_writer(wtr);
        wtr.write_record(self.headers())?;
        for hist in &self.rows {
            let counts = hist
                .counts
                .iter()
                .copied()
                .chain(std::iter::repeat(0))
                .take(width)
                .map(|c| c.to_string());
            wtr.write_record(std::iter::once(hist.name.clone()).chain(counts))?;
        }
        wtr.flush()?;
        Ok(())
    }
}
