use std::{io, path::Path};

use log::{info, warn};

use crate::event::{CaptureRow, EventError, TraceEvent};
use crate::series::TimeSeries;

/// Minimum spacing between the echoes of two kept events when filtering is enabled.
const ECHO_GAP: i64 = 1000;

/// The events of one probe capture.
#[derive(Debug, Default, Clone)]
pub struct WifiTrace {
    events: Vec<TraceEvent>,
    filtered: usize,
    failed: usize,
}

impl WifiTrace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a capture file. With `filtering`, echoes that follow the previous kept echo
    /// too closely are dropped.
    pub fn load_file(path: impl AsRef<Path>, filtering: bool) -> Result<Self, Error> {
        let path = path.as_ref();
        let rdr = reader_builder().from_path(path)?;
        let mut trace = Self::new();
        let nr_rows = trace.load(rdr, filtering)?;
        info!("Loaded {nr_rows} events from {}", path.display());
        info!(
            "Loaded {} events, filtered {}, failed {}",
            trace.events.len(),
            trace.filtered,
            trace.failed
        );
        Ok(trace)
    }

    pub fn from_reader(rdr: impl io::Read, filtering: bool) -> Result<Self, Error> {
        let mut trace = Self::new();
        trace.load(reader_builder().from_reader(rdr), filtering)?;
        Ok(trace)
    }

    /// Loads every row of `rdr`, returning the number of rows read. Rows that cannot be
    /// turned into events are reported and skipped.
    pub fn load<R: io::Read>(
        &mut self,
        mut rdr: csv::Reader<R>,
        filtering: bool,
    ) -> Result<usize, Error> {
        // A capture without a header row is unusable as a whole
        rdr.headers()?;
        let mut nr_rows = 0;
        for result in rdr.deserialize::<CaptureRow>() {
            nr_rows += 1;
            let ev_index = self.events.len();
            match result {
                Ok(row) => {
                    if let Err(e) = self.load_one(row, filtering) {
                        warn!("Cannot parse event {ev_index}: {e}");
                    }
                }
                Err(e) => {
                    self.failed += 1;
                    warn!("Cannot parse event {ev_index}: {e}");
                }
            }
        }
        Ok(nr_rows)
    }

    /// Adds one capture row. Returns whether the event was kept, or the reason the row was
    /// rejected; both outcomes are counted.
    pub fn load_one(&mut self, row: CaptureRow, filtering: bool) -> Result<bool, EventError> {
        let ev = match row.into_event() {
            Ok(ev) => ev,
            Err(e) => {
                self.failed += 1;
                return Err(e);
            }
        };
        let keep = match self.events.last() {
            None => true,
            Some(prev) => !filtering || ev.echo > prev.echo + ECHO_GAP,
        };
        if keep {
            self.events.push(ev);
        } else {
            self.filtered += 1;
        }
        Ok(keep)
    }

    pub fn events(&self) -> &[TraceEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Number of events dropped as duplicate echoes.
    pub fn filtered(&self) -> usize {
        self.filtered
    }

    /// Number of rows that could not be parsed.
    pub fn failed(&self) -> usize {
        self.failed
    }

    /// Smallest up and down delays over the measured events if the clock phase were
    /// `phase`, or `None` if no event has a round-trip time.
    pub fn min_up_down(&self, phase: i64) -> Option<PhaseBalance> {
        self.events
            .iter()
            .filter(|ev| ev.rtt > 0)
            .map(|ev| {
                let up_t = ev.up_at(phase);
                (up_t, ev.rtt - up_t)
            })
            .reduce(|(u1, d1), (u2, d2)| (u1.min(u2), d1.min(d2)))
            .map(|(min_up, min_down)| PhaseBalance {
                phase,
                min_up,
                min_down,
            })
    }

    // The capture tool only approximates the phase while probing. With the whole trace we
    // pick the phase for which min(up_t) ~= min(down_t), given
    //     up_t = (received - phase) - sent
    //     down_t = rtt - up_t
    /// Re-estimates the clock phase so that the minimum up and down delays are balanced.
    ///
    /// The new phase is applied to every event only if both minima stay strictly positive.
    /// Returns `None` when the trace has no measured event.
    pub fn tune_phase(&mut self) -> Option<PhaseTuning> {
        let before = self.min_up_down(self.events.first()?.phase)?;
        info!(
            "Before correction, phase: {}, min_up: {}, min_down: {}",
            before.phase, before.min_up, before.min_down
        );
        let phase = before.phase + (before.min_up - before.min_down).div_euclid(2);
        let after = self.min_up_down(phase)?;
        info!(
            "After correction, phase: {}, min_up: {}, min_down: {}",
            after.phase, after.min_up, after.min_down
        );
        let committed = after.min_up > 0 && after.min_down > 0;
        if committed {
            for ev in self.events.iter_mut() {
                ev.reset_phase(phase);
            }
        } else {
            warn!("Not resetting the phase.");
        }
        Some(PhaseTuning {
            before,
            after,
            committed,
        })
    }

    /// Splits the measured events into `{base_name}_up` and `{base_name}_down` series.
    pub fn get_up_down(&self, base_name: &str) -> (TimeSeries, TimeSeries) {
        let mut s_up = TimeSeries::new(format!("{base_name}_up"));
        let mut s_down = TimeSeries::new(format!("{base_name}_down"));
        for ev in self.events.iter().filter(|ev| ev.rtt > 0) {
            s_up.append(ev.up_t, ev.sent);
            s_down.append(ev.down_t, ev.received - ev.phase);
        }
        (s_up, s_down)
    }

    pub fn get_rtt_series(&self, base_name: &str) -> TimeSeries {
        let mut s_rtt = TimeSeries::new(format!("{base_name}_rtt"));
        for ev in self.events.iter().filter(|ev| ev.rtt > 0) {
            s_rtt.append(ev.rtt, ev.sent);
        }
        s_rtt
    }
}

fn reader_builder() -> csv::ReaderBuilder {
    let mut builder = csv::ReaderBuilder::new();
    builder.trim(csv::Trim::All).flexible(true);
    builder
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseBalance {
    pub phase: i64,
    pub min_up: i64,
    pub min_down: i64,
}

/// Result of [`WifiTrace::tune_phase`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseTuning {
    pub before: PhaseBalance,
    pub after: PhaseBalance,
    /// Whether the new phase was applied to the events.
    pub committed: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to read capture")]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Io(#[from] io::Error),
}
