use log::{info, warn};
use utils::ParetoFit;

/// Number of doubling stages reported by [`TimeSeries::model_match`].
pub const MODEL_STAGES: usize = 10;

/// Starting step used when a series' own minimum is too small to be a useful base delay.
pub const MIN_MODEL_STEP: i64 = 400;

/// An ordered sequence of latency samples.
#[derive(Debug, Clone)]
pub struct TimeSeries {
    name: String,
    latency: Vec<i64>,
    stamp: Vec<i64>,
    min_latency: Option<i64>,
    max_latency: Option<i64>,
}

impl TimeSeries {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            latency: Vec::new(),
            stamp: Vec::new(),
            min_latency: None,
            max_latency: None,
        }
    }

    /// Appends a sample. Negative latencies are stored as-is.
    pub fn append(&mut self, latency: i64, stamp: i64) {
        self.min_latency = Some(self.min_latency.map_or(latency, |m| m.min(latency)));
        self.max_latency = Some(self.max_latency.map_or(latency, |m| m.max(latency)));
        self.latency.push(latency);
        self.stamp.push(stamp);
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.latency.len()
    }

    pub fn is_empty(&self) -> bool {
        self.latency.is_empty()
    }

    pub fn latencies(&self) -> &[i64] {
        &self.latency
    }

    pub fn min_latency(&self) -> Option<i64> {
        self.min_latency
    }

    pub fn max_latency(&self) -> Option<i64> {
        self.max_latency
    }

    pub fn stats(&self) -> SeriesStats {
        SeriesStats {
            series: self.name.clone(),
            n: self.len(),
            min: self.min_latency,
            max: self.max_latency,
        }
    }

    /// Iterates over `(send_time, recv_time, rtt)` rows.
    pub fn rows(&self) -> impl Iterator<Item = SeriesRow> + '_ {
        self.stamp
            .iter()
            .zip(self.latency.iter())
            .map(|(&send_time, &rtt)| SeriesRow {
                send_time,
                recv_time: send_time + rtt,
                rtt,
            })
    }

    /// Fits a Pareto distribution to the positive latencies, using the minimum latency as
    /// the scale.
    ///
    /// Returns `None` if the minimum latency is not positive or the fit is degenerate.
    pub fn pareto_eval(&self) -> Option<ParetoFit> {
        let x_m = self.min_latency.filter(|&m| m > 0)?;
        let samples = self.latency.iter().map(|&l| l as f64).collect::<Vec<_>>();
        match ParetoFit::from_samples(&samples, x_m as f64) {
            Ok(fit) => {
                info!(
                    "{}: n = {}, pareto alpha = {}, likelihood = {}",
                    self.name, fit.n, fit.alpha, fit.log_likelihood
                );
                Some(fit)
            }
            Err(e) => {
                warn!("{}: no Pareto fit: {e}", self.name);
                None
            }
        }
    }

    /// Builds the empirical retry model: for a doubling sequence of delay thresholds, the
    /// fraction of the surviving samples that are still late.
    ///
    /// With `step == None`, the series minimum is the starting step, raised to
    /// [`MIN_MODEL_STEP`] if smaller.
    pub fn model_match(&self, step: Option<i64>) -> StageModel {
        let mut step = match step.filter(|&s| s > 0) {
            Some(s) => s,
            None => {
                let min = self.min_latency.unwrap_or(0);
                if min < MIN_MODEL_STEP {
                    warn!("Min latency {min} too low, using {MIN_MODEL_STEP} instead.");
                    MIN_MODEL_STEP
                } else {
                    min
                }
            }
        };
        let mut model = StageModel {
            series: self.name.clone(),
            n: self.len(),
            step,
            drop_rates: [0.0; MODEL_STAGES],
        };
        let mut limit = step.saturating_mul(2);
        let mut remain = self.latency.clone();
        let mut stage = 0;
        while !remain.is_empty() {
            let before = remain.len();
            remain.retain(|&l| l >= limit);
            if stage == MODEL_STAGES {
                warn!(
                    "{}: {} samples still above {limit} after {MODEL_STAGES} stages",
                    self.name, before
                );
                break;
            }
            model.drop_rates[stage] = remain.len() as f64 / before as f64;
            stage += 1;
            step = step.saturating_mul(2);
            limit = limit.saturating_add(step);
        }
        model
    }

    /// Counts latencies in buckets of `step` width. Bucket `i` covers
    /// `[i * step, (i + 1) * step)`; negative latencies land in the first bucket.
    pub fn get_hist(&self, step: i64) -> Histogram {
        assert!(step > 0, "histogram step must be positive");
        let mut counts: Vec<u64> = Vec::new();
        for &l in &self.latency {
            let bucket = (l / step).max(0) as usize;
            if counts.len() <= bucket {
                counts.resize(bucket + 1, 0);
            }
            counts[bucket] += 1;
        }
        Histogram {
            name: self.name.clone(),
            counts,
        }
    }

    /// Replays the series through an RFC 9002 style RTT estimator, recording the estimator
    /// state at each sample and every sample that arrived after the probe timeout.
    pub fn sim_9002_rtt(&self) -> RttReplay {
        let mut replay = RttReplay::default();
        let mut samples = self.rows();
        let Some(first) = samples.next() else {
            return replay;
        };
        let latest = first.rtt as f64;
        let mut est = RttSample {
            send_time: first.send_time,
            recv_time: first.recv_time,
            min_rtt: first.rtt,
            smoothed_rtt: latest,
            rttvar: latest / 2.0,
            pto: 0.0,
        };
        est.pto = est.smoothed_rtt + 4.0 * est.rttvar;
        let mut pto_time = first.send_time as f64 + est.pto;
        replay.samples.push(est);
        for row in samples {
            let latest = row.rtt as f64;
            if est.pto < latest {
                replay.pto_events.push(PtoEvent {
                    pto_time,
                    pto: est.pto,
                });
            }
            est.min_rtt = est.min_rtt.min(row.rtt);
            est.smoothed_rtt = (7.0 * est.smoothed_rtt + latest) / 8.0;
            let rttvar_sample = (est.smoothed_rtt - latest).abs();
            est.rttvar = (3.0 * est.rttvar + rttvar_sample) / 4.0;
            est.pto = est.smoothed_rtt + 4.0 * est.rttvar;
            est.send_time = row.send_time;
            est.recv_time = row.recv_time;
            pto_time = row.send_time as f64 + est.pto;
            replay.samples.push(est);
        }
        replay
    }
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct SeriesStats {
    pub series: String,
    pub n: usize,
    pub min: Option<i64>,
    pub max: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SeriesRow {
    pub send_time: i64,
    pub recv_time: i64,
    pub rtt: i64,
}

/// Output of [`TimeSeries::model_match`].
#[derive(Debug, Clone, PartialEq)]
pub struct StageModel {
    pub series: String,
    /// Initial population.
    pub n: usize,
    /// Width of the first stage.
    pub step: i64,
    pub drop_rates: [f64; MODEL_STAGES],
}

/// Latency counts of one series; `counts[i]` covers `[i * step, (i + 1) * step)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Histogram {
    pub name: String,
    pub counts: Vec<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct RttSample {
    pub send_time: i64,
    pub recv_time: i64,
    pub min_rtt: i64,
    pub smoothed_rtt: f64,
    pub rttvar: f64,
    pub pto: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct PtoEvent {
    pub pto_time: f64,
    pub pto: f64,
}

#[derive(Debug, Clone, Default)]
pub struct RttReplay {
    pub samples: Vec<RttSample>,
    pub pto_events: Vec<PtoEvent>,
}
