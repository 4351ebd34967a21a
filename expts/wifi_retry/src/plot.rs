//! Scatter plots of latency series.

use std::{error::Error, path::Path};

use plotters::prelude::*;
use wifitrace::series::{RttReplay, TimeSeries};

const ORANGE: RGBColor = RGBColor(255, 165, 0);
const SIZE: (u32, u32) = (1024, 768);

type PlotResult = Result<(), Box<dyn Error>>;

/// Plots `rtt` against `recv_time`, with the y axis clamped to `[0, y_max]`.
pub fn rtt_scatter(series: &TimeSeries, y_max: i64, path: &Path) -> PlotResult {
    draw(series, y_max, None, path)
}

/// Same as [`rtt_scatter`], overlaid with the minimum RTT and the probe timeouts of an
/// RFC 9002 estimator replayed over the series.
pub fn rtt_9002(series: &TimeSeries, y_max: i64, path: &Path) -> PlotResult {
    let replay = series.sim_9002_rtt();
    draw(series, y_max, Some(&replay), path)
}

fn draw(series: &TimeSeries, y_max: i64, replay: Option<&RttReplay>, path: &Path) -> PlotResult {
    if series.is_empty() {
        return Ok(());
    }
    let (x_min, x_max) = series
        .rows()
        .map(|r| r.recv_time as f64)
        .fold((f64::MAX, f64::MIN), |(lo, hi), x| (lo.min(x), hi.max(x)));
    let x_max = x_max.max(x_min + 1.0);

    let root = BitMapBackend::new(path, SIZE).into_drawing_area();
    root.fill(&WHITE)?;
    let mut chart = ChartBuilder::on(&root)
        .caption(series.name(), ("sans-serif", 24))
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(x_min..x_max, 0.0..y_max as f64)?;
    chart
        .configure_mesh()
        .x_desc("recv_time")
        .y_desc("rtt")
        .draw()?;

    chart.draw_series(
        series
            .rows()
            .map(|r| Cross::new((r.recv_time as f64, r.rtt as f64), 3, BLUE)),
    )?;

    if let Some(replay) = replay {
        chart.draw_series(replay.samples.iter().map(|s| {
            Circle::new(
                (s.recv_time as f64, s.min_rtt as f64),
                2,
                ORANGE.filled(),
            )
        }))?;
        chart
            .draw_series(
                replay
                    .pto_events
                    .iter()
                    .map(|p| Circle::new((p.pto_time, p.pto), 3, RED.filled())),
            )?
            .label("pto")
            .legend(|(x, y)| Circle::new((x, y), 3, RED.filled()));
        chart
            .configure_series_labels()
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .position(SeriesLabelPosition::UpperRight)
            .draw()?;
    }

    root.present()?;
    Ok(())
}
