use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::Context;
use log::{info, warn};
use rand::prelude::*;
use wifitrace::{
    frequency::TraceFrequency,
    histogram::HistogramTable,
    series::{TimeSeries, MODEL_STAGES},
    simulator::{TraceSpec, WifiSimulator},
    trace::WifiTrace,
};

use crate::{plot, scenario::SimScenario};

/// Compares captured WiFi probe delays with simulated retry/backoff traces.
#[derive(Debug, clap::Parser)]
pub struct Experiment {
    /// Directory receiving the CSV tables and plots.
    out_dir: PathBuf,
    /// Probe captures to analyse.
    files: Vec<PathBuf>,
    /// First stage width of the retry model, also the simulated base delay.
    #[clap(long, default_value_t = 800, value_parser = clap::value_parser!(i64).range(1..))]
    step: i64,
    /// Time between two simulated probes.
    #[clap(long, default_value_t = 20_000, value_parser = clap::value_parser!(i64).range(1..))]
    interval: i64,
    #[clap(long, default_value_t = 3_000)]
    sim_packets: usize,
    /// Top of the plots' latency axis.
    #[clap(long, default_value_t = 250_000)]
    max_delay: i64,
    /// Maximum number of simulated retries.
    #[clap(long, default_value_t = 8)]
    limit: usize,
    #[clap(long, default_value_t = 2_500, value_parser = clap::value_parser!(i64).range(1..))]
    hist_step: i64,
    #[clap(long, default_value_t = 0)]
    seed: u64,
    /// JSON file of scenarios replacing the stock far/mid/near set.
    #[clap(long)]
    scenarios: Option<PathBuf>,
    /// Keep duplicate echoes.
    #[clap(long)]
    no_filter: bool,
    #[clap(long)]
    no_plots: bool,
}

impl Experiment {
    pub fn run(&self) -> anyhow::Result<()> {
        fs::create_dir_all(&self.out_dir)?;
        let scenarios = match &self.scenarios {
            Some(path) => SimScenario::load(path)
                .with_context(|| format!("failed to load {}", path.display()))?,
            None => SimScenario::stock(),
        };

        let mut drop_wtr = csv::Writer::from_path(self.out_file("drop_rates.csv"))?;
        drop_wtr.write_record(drop_rate_headers())?;
        let mut summaries = Vec::new();
        let mut cumulative = TraceFrequency::new();
        let mut all_series = Vec::new();

        for file in &self.files {
            let base_name = base_name(file);
            info!("Processing {base_name} ({})", file.display());
            let trace = WifiTrace::load_file(file, !self.no_filter)
                .with_context(|| format!("failed to load {}", file.display()))?;
            let s_rtt = trace.get_rtt_series(&base_name);
            cumulative.add_series(&s_rtt);
            summaries.push(summarize(&s_rtt));
            if s_rtt.min_latency().is_some_and(|m| m > 0) {
                let model = s_rtt.model_match(Some(self.step));
                drop_wtr.write_record(drop_rate_record(
                    &model.series,
                    model.n,
                    model.step,
                    &model.drop_rates,
                ))?;
            } else {
                warn!("{base_name}: no positive latency, skipping the retry model");
            }
            all_series.push(s_rtt);
        }

        let mut rng = StdRng::seed_from_u64(self.seed);
        for scenario in &scenarios {
            let sim = WifiSimulator::new(self.step, scenario.drop_rates.clone(), self.limit);
            let spec = TraceSpec::builder()
                .name(scenario.name.as_str())
                .interval(self.interval)
                .packet_count(self.sim_packets)
                .max_delay(self.max_delay)
                .build();
            let s_sim = sim.get_trace(&spec, &mut rng);
            drop_wtr.write_record(drop_rate_record(
                s_sim.name(),
                s_sim.len(),
                self.step,
                &scenario.drop_rates,
            ))?;
            self.put_series(&s_sim)?;
            summaries.push(summarize(&s_sim));
            all_series.push(s_sim);
        }
        drop_wtr.flush()?;

        self.put_summaries(&summaries)?;
        self.put_frequencies(&cumulative)?;
        self.put_histograms(&all_series)?;
        if !self.no_plots {
            for series in &all_series {
                self.put_plots(series)?;
            }
        }
        Ok(())
    }

    fn put_series(&self, series: &TimeSeries) -> anyhow::Result<()> {
        let mut wtr = csv::Writer::from_path(self.out_file(&format!("{}.csv", series.name())))?;
        for row in series.rows() {
            wtr.serialize(row)?;
        }
        wtr.flush()?;
        Ok(())
    }

    fn put_summaries(&self, summaries: &[SeriesSummary]) -> anyhow::Result<()> {
        let mut wtr = csv::Writer::from_path(self.out_file("stats.csv"))?;
        for summary in summaries {
            wtr.serialize(summary)?;
        }
        wtr.flush()?;
        Ok(())
    }

    fn put_frequencies(&self, freq: &TraceFrequency) -> anyhow::Result<()> {
        let mut wtr = csv::Writer::from_path(self.out_file("cumulative.csv"))?;
        for bucket in freq.compute_frequencies() {
            wtr.serialize(bucket)?;
        }
        wtr.flush()?;
        Ok(())
    }

    fn put_histograms(&self, all_series: &[TimeSeries]) -> anyhow::Result<()> {
        let mut table = HistogramTable::new(self.hist_step);
        for series in all_series {
            table.add_series(series);
        }
        table.write_csv(fs::File::create(self.out_file("histograms.csv"))?)?;
        Ok(())
    }

    fn put_plots(&self, series: &TimeSeries) -> anyhow::Result<()> {
        let name = series.name();
        plot::rtt_scatter(series, self.max_delay, &self.out_file(&format!("{name}.png")))
            .map_err(|e| anyhow::anyhow!("failed to plot {name}: {e}"))?;
        plot::rtt_9002(series, self.max_delay, &self.out_file(&format!("{name}_9002.png")))
            .map_err(|e| anyhow::anyhow!("failed to plot {name}: {e}"))?;
        Ok(())
    }

    fn out_file(&self, name: &str) -> PathBuf {
        [self.out_dir.as_path(), name.as_ref()].into_iter().collect()
    }
}

/// Per-series statistics, one row of `stats.csv`.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct SeriesSummary {
    pub series: String,
    pub n: usize,
    pub min: Option<i64>,
    pub max: Option<i64>,
    pub alpha: f64,
    pub log_likelihood: f64,
}

fn summarize(series: &TimeSeries) -> SeriesSummary {
    let stats = series.stats();
    info!(
        "{}: {} samples, min latency {:?}, max latency {:?}",
        stats.series, stats.n, stats.min, stats.max
    );
    let fit = series.pareto_eval();
    SeriesSummary {
        series: stats.series,
        n: stats.n,
        min: stats.min,
        max: stats.max,
        alpha: fit.map_or(0.0, |f| f.alpha),
        log_likelihood: fit.map_or(0.0, |f| f.log_likelihood),
    }
}

fn base_name(file: &Path) -> String {
    let name = file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| file.display().to_string());
    match name.strip_suffix(".csv") {
        Some(stem) => stem.to_string(),
        None => name,
    }
}

fn drop_rate_headers() -> Vec<String> {
    ["series", "N", "min_t"]
        .into_iter()
        .map(String::from)
        .chain((1..=MODEL_STAGES).map(|i| format!("p{i}")))
        .collect()
}

fn drop_rate_record(series: &str, n: usize, step: i64, rates: &[f64]) -> Vec<String> {
    [series.to_string(), n.to_string(), step.to_string()]
        .into_iter()
        .chain(
            rates
                .iter()
                .chain(std::iter::repeat(&0.0))
                .take(MODEL_STAGES)
                .map(|r| r.to_string()),
        )
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::ffi::OsString;

    use clap::Parser;

    const CAPTURE: &str = "\
number,sent,received,echo,rtt,up_t,down_t,phase
0,0,500,1000,1000,500,500,0
1,20000,20600,21200,1200,600,600,0
2,40000,42500,45000,5000,2500,2500,0
3,60000,60450,60900,900,450,450,0
";

    #[test]
    fn base_name_strips_csv() {
        assert_eq!(base_name(Path::new("/tmp/run/cap_1.csv")), "cap_1");
        assert_eq!(base_name(Path::new("cap_2.txt")), "cap_2.txt");
    }

    #[test]
    fn rejects_non_positive_widths() {
        for flag in ["--step", "--interval", "--hist-step"] {
            let parsed = Experiment::try_parse_from(["wifi-retry", "out", flag, "0"]);
            assert!(parsed.is_err(), "{flag} 0 accepted");
        }
        let expt = Experiment::try_parse_from(["wifi-retry", "out", "--hist-step", "1"]).unwrap();
        assert_eq!(expt.hist_step, 1);
    }

    #[test]
    fn drop_rate_rows_are_padded() {
        let record = drop_rate_record("sim", 3000, 800, &[1.0, 0.625]);
        assert_eq!(record.join(","), "sim,3000,800,1,0.625,0,0,0,0,0,0,0,0");
        assert_eq!(
            drop_rate_headers().join(","),
            "series,N,min_t,p1,p2,p3,p4,p5,p6,p7,p8,p9,p10"
        );
    }

    #[test]
    fn writes_all_tables() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let capture = dir.path().join("cap.csv");
        fs::write(&capture, CAPTURE)?;
        let out = dir.path().join("out");
        let args: Vec<OsString> = vec![
            "wifi-retry".into(),
            out.clone().into(),
            capture.into(),
            "--sim-packets".into(),
            "50".into(),
            "--no-plots".into(),
        ];
        let expt = Experiment::try_parse_from(args)?;
        expt.run()?;

        let drop_rates = fs::read_to_string(out.join("drop_rates.csv"))?;
        let lines = drop_rates.lines().collect::<Vec<_>>();
        assert_eq!(lines.len(), 5);
        assert_eq!(lines[1], "cap_rtt,4,800,0.25,1,0,0,0,0,0,0,0,0");
        assert_eq!(lines[2], "sim_far,50,800,1,0.99,0.25,0.5,0.625,0.8,0.08,0,0,0");
        assert!(lines[4].starts_with("sim_near,50,800,"));

        let cumulative = fs::read_to_string(out.join("cumulative.csv"))?;
        let lines = cumulative.lines().collect::<Vec<_>>();
        assert_eq!(lines[0], "range,count,frq,l10_frq");
        assert!(lines[1].starts_with("< 2500,3,0.75,"));
        assert_eq!(lines[2], "2500--5000,1,0.25,0.0");

        let stats = fs::read_to_string(out.join("stats.csv"))?;
        assert!(stats.starts_with("series,n,min,max,alpha,log_likelihood\ncap_rtt,4,900,5000,"));

        let sim = fs::read_to_string(out.join("sim_mid.csv"))?;
        assert_eq!(sim.lines().next(), Some("send_time,recv_time,rtt"));
        assert_eq!(sim.lines().count(), 51);

        let histograms = fs::read_to_string(out.join("histograms.csv"))?;
        assert_eq!(histograms.lines().count(), 5);
        assert!(histograms.lines().nth(1).unwrap().starts_with("cap_rtt,3,0,1,"));
        Ok(())
    }
}
