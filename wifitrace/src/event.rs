/// One row of a probe capture, as found on disk.
///
/// Captures come from several versions of the probing tool, so every column is optional here
/// and validated in [`CaptureRow::into_event`].
#[derive(Debug, Default, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct CaptureRow {
    pub number: Option<i64>,
    pub sent: Option<i64>,
    pub received: Option<i64>,
    pub echo: Option<i64>,
    pub rtt: Option<i64>,
    pub up_t: Option<i64>,
    pub down_t: Option<i64>,
    pub phase: Option<i64>,
}

impl CaptureRow {
    pub fn into_event(self) -> Result<TraceEvent, EventError> {
        let req = |v: Option<i64>, name| v.ok_or(EventError::MissingField(name));
        // Same order as the legacy check: the layout-defining columns first
        let sent = req(self.sent, "sent")?;
        let down_t = req(self.down_t, "down_t")?;
        let echo = req(self.echo, "echo")?;
        Ok(TraceEvent::new(
            req(self.number, "number")?,
            sent,
            req(self.received, "received")?,
            echo,
            req(self.rtt, "rtt")?,
            req(self.up_t, "up_t")?,
            down_t,
            req(self.phase, "phase")?,
        ))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EventError {
    #[error("capture row has no `{0}` value")]
    MissingField(&'static str),
}

/// A single probe round trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TraceEvent {
    pub number: i64,
    pub sent: i64,
    pub received: i64,
    pub echo: i64,
    pub rtt: i64,
    pub up_t: i64,
    pub down_t: i64,
    pub phase: i64,
}

impl TraceEvent {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        number: i64,
        sent: i64,
        received: i64,
        echo: i64,
        rtt: i64,
        up_t: i64,
        down_t: i64,
        phase: i64,
    ) -> Self {
        let mut ev = Self {
            number,
            sent,
            received,
            echo,
            rtt,
            up_t,
            down_t,
            phase,
        };
        // Older captures stored the echo timestamp in the `down_t` column
        if echo == 0 && down_t > sent {
            ev.echo = down_t;
            ev.down_t = rtt - up_t;
        }
        ev
    }

    /// Recomputes the up/down split for a new clock phase.
    ///
    /// `up_t` is only refreshed for events that were received, and `down_t` only for events
    /// with a round-trip time; otherwise the previous values are kept.
    pub fn reset_phase(&mut self, phase: i64) {
        self.phase = phase;
        if self.received > 0 {
            self.up_t = (self.received - phase) - self.sent;
        }
        if self.rtt > 0 {
            self.down_t = self.rtt - self.up_t;
        }
    }

    /// `up_t` as it would be at `phase`, without modifying the event.
    pub(crate) fn up_at(&self, phase: i64) -> i64 {
        self.received - phase - self.sent
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_layout_moves_echo() {
        let ev = TraceEvent::new(1, 1000, 1400, 0, 900, 300, 1900, 100);
        assert_eq!(ev.echo, 1900);
        assert_eq!(ev.down_t, 600);
        assert_eq!(ev.up_t + ev.down_t, ev.rtt);
    }

    #[test]
    fn regular_layout_untouched() {
        let ev = TraceEvent::new(1, 1000, 1400, 1900, 900, 300, 600, 100);
        assert_eq!(ev.echo, 1900);
        assert_eq!(ev.down_t, 600);
    }

    #[test]
    fn reset_phase_keeps_split_consistent() {
        let mut events = vec![
            TraceEvent::new(0, 1000, 1500, 2000, 1000, 400, 600, 100),
            TraceEvent::new(1, 3000, 3900, 4200, 1200, 800, 400, 100),
            TraceEvent::new(2, 5000, 5200, 5700, 700, 100, 600, 100),
        ];
        for p in [-250, 0, 37, 100, 400] {
            for ev in events.iter_mut() {
                ev.reset_phase(p);
                assert_eq!(ev.phase, p);
                assert_eq!(ev.up_t + ev.down_t, ev.rtt);
            }
        }
        assert_eq!(events[0].up_t, 1500 - 400 - 1000);
    }

    #[test]
    fn reset_phase_leaves_stale_values() {
        // Lost probe: neither received nor measured
        let mut ev = TraceEvent::new(0, 1000, 0, 2000, 0, 400, 600, 100);
        ev.reset_phase(50);
        assert_eq!((ev.up_t, ev.down_t), (400, 600));

        // Received but no rtt: up_t moves, down_t does not
        let mut ev = TraceEvent::new(0, 1000, 1500, 2000, 0, 400, 600, 100);
        ev.reset_phase(50);
        assert_eq!((ev.up_t, ev.down_t), (450, 600));
    }

    #[test]
    fn missing_field_is_reported() {
        let row = CaptureRow {
            number: Some(3),
            sent: Some(10),
            received: Some(20),
            echo: None,
            rtt: Some(30),
            up_t: Some(10),
            down_t: Some(20),
            phase: Some(0),
        };
        let err = row.into_event().unwrap_err();
        assert!(matches!(err, EventError::MissingField("echo")));
        assert_eq!(err.to_string(), "capture row has no `echo` value");
    }
}
