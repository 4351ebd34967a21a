//! Queuing delays of media streams.

use std::{error::Error, path::Path};

use log::info;
use plotters::prelude::*;
use rustc_hash::FxHashMap;

/// One media frame from a media report. Other report columns are ignored.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct MediaRecord {
    pub stream: String,
    pub init_time: i64,
    pub recv_time: i64,
}

impl MediaRecord {
    pub fn delay(&self) -> i64 {
        self.recv_time - self.init_time
    }
}

pub fn load(path: impl AsRef<Path>) -> csv::Result<Vec<MediaRecord>> {
    csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)?
        .deserialize()
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueuePoint {
    /// Seconds.
    pub time_start: f64,
    pub delay: i64,
    pub queue: i64,
}

/// Frames of a report grouped per stream, in order of first appearance.
#[derive(Debug, Default)]
pub struct QueueDelays {
    pub min_delay: i64,
    pub streams: Vec<(String, Vec<QueuePoint>)>,
}

impl QueueDelays {
    pub fn new(records: &[MediaRecord]) -> Self {
        let Some(min) = records.iter().map(MediaRecord::delay).min() else {
            return Self::default();
        };
        let min_delay = min.div_euclid(1000) * 1000;
        info!("Min delay: {min_delay}");

        let mut index = FxHashMap::default();
        let mut streams: Vec<(String, Vec<QueuePoint>)> = Vec::new();
        for r in records {
            let i = *index.entry(r.stream.as_str()).or_insert_with(|| {
                streams.push((r.stream.clone(), Vec::new()));
                streams.len() - 1
            });
            let delay = r.delay();
            streams[i].1.push(QueuePoint {
                time_start: r.init_time as f64 / 1e6,
                delay,
                queue: delay - min_delay,
            });
        }
        Self { min_delay, streams }
    }

    pub fn plot(&self, path: &Path, title: &str) -> Result<(), Box<dyn Error>> {
        let points = || self.streams.iter().flat_map(|(_, p)| p);
        if points().next().is_none() {
            return Ok(());
        }
        let (x_min, x_max) = points()
            .map(|p| p.time_start)
            .fold((f64::MAX, f64::MIN), |(lo, hi), x| (lo.min(x), hi.max(x)));
        let y_max = points().map(|p| p.queue).max().unwrap_or(0).max(1) as f64;

        let root = BitMapBackend::new(path, (1024, 768)).into_drawing_area();
        root.fill(&WHITE)?;
        let mut chart = ChartBuilder::on(&root)
            .caption(title, ("sans-serif", 24))
            .margin(10)
            .x_label_area_size(40)
            .y_label_area_size(60)
            .build_cartesian_2d(x_min..x_max.max(x_min + 1.0), 0.0..y_max)?;
        chart
            .configure_mesh()
            .x_desc("time_start")
            .y_desc("queue")
            .draw()?;

        for (rank, (stream, points)) in self.streams.iter().enumerate() {
            let color = stream_color(rank, stream).mix(0.5);
            chart
                .draw_series(
                    points
                        .iter()
                        .map(|p| Circle::new((p.time_start, p.queue as f64), 2, color.filled())),
                )?
                .label(stream)
                .legend(move |(x, y)| Circle::new((x, y), 3, color.filled()));
        }
        chart
            .configure_series_labels()
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .position(SeriesLabelPosition::UpperRight)
            .draw()?;
        root.present()?;
        Ok(())
    }
}

const PALETTE: [RGBColor; 12] = [
    RGBColor(0, 0, 255),
    RGBColor(0, 128, 0),
    RGBColor(255, 165, 0),
    RGBColor(255, 0, 0),
    RGBColor(0, 255, 255),
    RGBColor(128, 128, 0),
    RGBColor(128, 0, 128),
    RGBColor(165, 42, 42),
    RGBColor(255, 192, 203),
    RGBColor(128, 128, 128),
    RGBColor(238, 130, 238),
    RGBColor(250, 128, 114),
];

/// Well-known streams keep a fixed colour, the others cycle through the palette.
fn stream_color(rank: usize, stream: &str) -> RGBColor {
    match stream {
        "a1" => PALETTE[0],
        "vlow" => PALETTE[1],
        "vmid" => PALETTE[2],
        _ => PALETTE[(rank + 4) % PALETTE.len()],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const REPORT: &str = "\
stream, init_time, recv_time, frame_size
a1, 1000000, 1012500, 100
vlow, 1020000, 1041000, 2000
a1, 1040000, 1052400, 100
vlow, 1060000, 1075000, 2000
";

    #[test]
    fn queue_relative_to_rounded_min() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("media.csv");
        std::fs::write(&path, REPORT)?;
        let records = load(&path)?;
        assert_eq!(records.len(), 4);

        let delays = QueueDelays::new(&records);
        assert_eq!(delays.min_delay, 12000);
        let names = delays.streams.iter().map(|(s, _)| s.as_str()).collect::<Vec<_>>();
        assert_eq!(names, vec!["a1", "vlow"]);
        let queues = delays.streams[1].1.iter().map(|p| p.queue).collect::<Vec<_>>();
        assert_eq!(queues, vec![9000, 3000]);
        assert_eq!(delays.streams[0].1[1].time_start, 1.04);
        Ok(())
    }

    #[test]
    fn empty_report() {
        let delays = QueueDelays::new(&[]);
        assert!(delays.streams.is_empty());
        assert_eq!(delays.min_delay, 0);
    }

    #[test]
    fn fixed_stream_colors() {
        assert_eq!(stream_color(3, "a1"), PALETTE[0]);
        assert_eq!(stream_color(0, "video"), PALETTE[4]);
        assert_eq!(stream_color(9, "video"), PALETTE[1]);
    }
}
