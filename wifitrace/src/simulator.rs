//! A generative model of WiFi link-layer retries.
//!
//! Each packet is retried with exponential backoff: the first attempt costs the base delay,
//! and every failed attempt adds a timer twice as long as the previous one. The per-attempt
//! drop probabilities are the model's parameters, which can be compared directly with the
//! stage model extracted from captures by [`TimeSeries::model_match`].

use log::debug;
use rand::Rng;

use crate::series::TimeSeries;

/// Packets retried this many times or more arrive at the end of their last timer.
pub const JITTER_MAX_ATTEMPTS: usize = 7;

#[derive(Debug, Clone, PartialEq)]
pub struct WifiSimulator {
    base_delay: i64,
    drop_rates: Vec<f64>,
    limit: usize,
}

impl WifiSimulator {
    /// Creates a simulator with at most `limit` retries. `drop_rates[i]` is the probability
    /// that attempt `i` fails; missing entries up to `limit` are zero.
    pub fn new(base_delay: i64, mut drop_rates: Vec<f64>, limit: usize) -> Self {
        if drop_rates.len() < limit {
            drop_rates.resize(limit, 0.0);
        }
        Self {
            base_delay,
            drop_rates,
            limit,
        }
    }

    pub fn base_delay(&self) -> i64 {
        self.base_delay
    }

    pub fn drop_rates(&self) -> &[f64] {
        &self.drop_rates
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Simulates the delivery of one packet.
    pub fn draw<R: Rng + ?Sized>(&self, rng: &mut R) -> Draw {
        let mut delay = self.base_delay;
        let mut next_timer = delay.saturating_mul(2);
        let mut last_timer = delay;
        let mut attempts = 0;
        while attempts < self.limit {
            let r: f64 = rng.gen();
            if r >= self.drop_rates[attempts] {
                break;
            }
            last_timer = next_timer;
            delay = delay.saturating_add(next_timer);
            next_timer = next_timer.saturating_mul(2);
            attempts += 1;
        }
        // The packet arrives somewhere within its last wait window
        if attempts < JITTER_MAX_ATTEMPTS && last_timer > 0 {
            delay -= rng.gen_range(0..last_timer);
        }
        Draw { delay, attempts }
    }

    /// The delay of one simulated packet.
    pub fn model_draw<R: Rng + ?Sized>(&self, rng: &mut R) -> i64 {
        self.draw(rng).delay
    }

    /// Simulates a periodic probe flow over a single serialized link.
    ///
    /// Packets are delivered in order: a packet that would overtake its predecessor is held
    /// until the predecessor arrives. `max_delay` does not bound the draws.
    pub fn get_trace<R: Rng + ?Sized>(&self, spec: &TraceSpec, rng: &mut R) -> TimeSeries {
        let mut trace = TimeSeries::new(spec.name.clone());
        let mut send_time = 0;
        let mut recv_time = 0;
        let mut nr_above_max = 0;
        for _ in 0..spec.packet_count {
            let mut delay = self.model_draw(rng);
            if delay > spec.max_delay {
                nr_above_max += 1;
            }
            let received = send_time + delay;
            if received > recv_time {
                recv_time = received;
            } else {
                delay = recv_time - send_time;
            }
            trace.append(delay, send_time);
            send_time += spec.interval;
        }
        debug!(
            "{}: {nr_above_max} of {} draws above {}",
            spec.name, spec.packet_count, spec.max_delay
        );
        trace
    }
}

/// Outcome of [`WifiSimulator::draw`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Draw {
    pub delay: i64,
    /// Number of failed attempts before delivery.
    pub attempts: usize,
}

/// Parameters of a simulated probe flow.
#[derive(Debug, Clone, typed_builder::TypedBuilder)]
pub struct TraceSpec {
    #[builder(setter(into))]
    pub name: String,
    /// Time between two probes.
    #[builder(default = 20_000)]
    pub interval: i64,
    #[builder(default = 3_000)]
    pub packet_count: usize,
    /// Largest delay of interest, used to scale plots.
    #[builder(default = 250_000)]
    pub max_delay: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    use rand::prelude::*;

    const BASE: i64 = 800;

    #[test]
    fn pads_drop_rates_to_limit() {
        let sim = WifiSimulator::new(BASE, vec![0.5, 0.25], 8);
        assert_eq!(sim.drop_rates(), &[0.5, 0.25, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
        let sim = WifiSimulator::new(BASE, vec![0.5; 10], 8);
        assert_eq!(sim.drop_rates().len(), 10);
    }

    #[test]
    fn no_loss_means_single_attempt() {
        let mut rng = StdRng::seed_from_u64(0);
        let sim = WifiSimulator::new(BASE, vec![], 8);
        for _ in 0..10_000 {
            let draw = sim.draw(&mut rng);
            assert_eq!(draw.attempts, 0);
            assert!(draw.delay > 0 && draw.delay <= BASE, "{}", draw.delay);
        }
    }

    #[test]
    fn certain_first_loss_means_one_retry() {
        let mut rng = StdRng::seed_from_u64(1);
        let sim = WifiSimulator::new(BASE, vec![1.0, 0.0], 8);
        for _ in 0..10_000 {
            let draw = sim.draw(&mut rng);
            assert_eq!(draw.attempts, 1);
            assert!(draw.delay > BASE && draw.delay <= 3 * BASE, "{}", draw.delay);
        }
    }

    #[test]
    fn long_retry_chains_skip_jitter() {
        let mut rng = StdRng::seed_from_u64(2);
        let sim = WifiSimulator::new(BASE, vec![1.0; 7], 8);
        let draw = sim.draw(&mut rng);
        assert_eq!(draw.attempts, 7);
        assert_eq!(draw.delay, BASE * (1 + 2 + 4 + 8 + 16 + 32 + 64 + 128));

        let sim = WifiSimulator::new(BASE, vec![1.0; 8], 8);
        let draw = sim.draw(&mut rng);
        assert_eq!(draw.attempts, 8);
        assert_eq!(draw.delay, BASE * 511);
    }

    #[test]
    fn trace_is_delivered_in_order() {
        let mut rng = StdRng::seed_from_u64(3);
        let sim = WifiSimulator::new(BASE, vec![1.0, 0.99, 0.25, 0.5, 0.625, 0.8, 0.08], 8);
        let spec = TraceSpec::builder().name("sim_far").build();
        let trace = sim.get_trace(&spec, &mut rng);
        assert_eq!(trace.name(), "sim_far");
        assert_eq!(trace.len(), 3_000);
        let rows = trace.rows().collect::<Vec<_>>();
        for (i, pair) in rows.windows(2).enumerate() {
            assert_eq!(pair[1].send_time - pair[0].send_time, spec.interval);
            assert!(pair[1].recv_time >= pair[0].recv_time, "reordered at {i}");
        }
    }

    #[test]
    fn seeded_traces_are_reproducible() {
        let sim = WifiSimulator::new(BASE, vec![0.9, 0.3, 0.1], 8);
        let spec = TraceSpec::builder().name("s").packet_count(200).build();
        let a = sim.get_trace(&spec, &mut StdRng::seed_from_u64(7));
        let b = sim.get_trace(&spec, &mut StdRng::seed_from_u64(7));
        assert_eq!(a.latencies(), b.latencies());
    }

    #[test]
    fn stage_model_tracks_drop_rates() {
        // With a single retry stage, the late fraction at the first threshold approaches
        // the configured drop rate.
        let mut rng = StdRng::seed_from_u64(4);
        let sim = WifiSimulator::new(BASE, vec![0.3], 8);
        let spec = TraceSpec::builder()
            .name("s")
            .packet_count(20_000)
            .interval(1_000_000)
            .build();
        let model = sim.get_trace(&spec, &mut rng).model_match(Some(BASE / 2));
        assert!((model.drop_rates[0] - 0.3).abs() < 0.02, "{:?}", model.drop_rates);
    }
}
