pub mod extract;
pub mod media;

use std::{
    fs,
    io::{self, BufWriter},
    path::PathBuf,
};

use anyhow::Context;
use clap::{Parser, Subcommand};
use log::info;

use crate::{
    extract::{extract_rates, Collector},
    media::QueueDelays,
};

/// Utilities over simulator logs and media reports.
#[derive(Debug, Parser)]
pub struct Tool {
    #[clap(subcommand)]
    pub cmd: Cmd,
}

#[derive(Debug, Subcommand)]
pub enum Cmd {
    /// Extract the rate telemetry of a qlog into a CSV file.
    Rates { log: PathBuf, output: PathBuf },
    /// Concatenate the per-run summaries of a log directory, tagging each run.
    Collect {
        output: PathBuf,
        log_dir: PathBuf,
        /// File name prefixes of the pig war runs. Replaces the stock list.
        #[clap(long = "pig-prefix")]
        pig_prefixes: Vec<String>,
        /// File name prefixes of the chaotic runs. Replaces the stock list.
        #[clap(long = "chaos-prefix")]
        chaos_prefixes: Vec<String>,
    },
    /// Plot the queuing delays of a media report.
    MediaGraph {
        report: PathBuf,
        /// Defaults to the report path with a `png` extension.
        graph: Option<PathBuf>,
        #[clap(default_value = "Queuing delays")]
        title: String,
    },
    /// Evaluate the fixed-point log2 approximation.
    Log2Check,
}

impl Tool {
    pub fn run(&self) -> anyhow::Result<()> {
        match &self.cmd {
            Cmd::Rates { log, output } => {
                let file = fs::File::open(log).with_context(|| format!("opening {}", log.display()))?;
                let samples = extract_rates(io::BufReader::new(file))?;
                info!("{}: {} rate samples", log.display(), samples.len());
                if samples.len() > 1 {
                    let mut wtr = csv::Writer::from_path(output)?;
                    for sample in &samples {
                        wtr.serialize(sample)?;
                    }
                    wtr.flush()?;
                }
            }
            Cmd::Collect {
                output,
                log_dir,
                pig_prefixes,
                chaos_prefixes,
            } => {
                let mut collector = Collector::default();
                if !pig_prefixes.is_empty() {
                    collector.pig_prefixes = pig_prefixes.clone();
                }
                if !chaos_prefixes.is_empty() {
                    collector.chaos_prefixes = chaos_prefixes.clone();
                }
                let out = BufWriter::new(fs::File::create(output)?);
                let nr_lines = collector
                    .collect(log_dir, out)
                    .with_context(|| format!("collecting {}", log_dir.display()))?;
                info!("{nr_lines} lines written to {}", output.display());
            }
            Cmd::MediaGraph { report, graph, title } => {
                let records = media::load(report)
                    .with_context(|| format!("reading {}", report.display()))?;
                let delays = QueueDelays::new(&records);
                let graph = graph.clone().unwrap_or_else(|| report.with_extension("png"));
                delays
                    .plot(&graph, title)
                    .map_err(|e| anyhow::anyhow!("plotting {}: {e}", graph.display()))?;
            }
            Cmd::Log2Check => {
                let report = utils::log2::check();
                println!("min error {:.6} at {}", report.min_err.1, report.min_err.0);
                println!("max error {:.6} at {}", report.max_err.1, report.max_err.0);
                if report.non_monotonic.is_empty() {
                    println!("monotonic over 1..{}", utils::log2::ONE);
                } else {
                    println!("not monotonic at {:?}", report.non_monotonic);
                }
                for (&step, &log) in utils::log2::STEPS.iter().zip(utils::log2::LOGS.iter()) {
                    println!("{step}: {log} (exact {})", utils::log2::exact_step_log(step));
                }
            }
        }
        Ok(())
    }
}
