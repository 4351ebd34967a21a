use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use wifitrace::trace::WifiTrace;

/// Re-estimates the clock phase of a probe capture and rewrites its up/down split.
#[derive(Debug, Parser)]
struct Opt {
    file: PathBuf,
    /// Where to write the corrected capture (defaults to overwriting `file`).
    #[clap(long)]
    output: Option<PathBuf>,
    /// Drop duplicate echoes while loading.
    #[clap(long)]
    filter: bool,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let opt = Opt::parse();
    let mut trace = WifiTrace::load_file(&opt.file, opt.filter)
        .with_context(|| format!("failed to load {}", opt.file.display()))?;
    match trace.tune_phase() {
        Some(tuning) if tuning.committed => {
            log::info!("Phase set to {}", tuning.after.phase)
        }
        Some(_) => log::info!("Keeping phase {}", trace.events()[0].phase),
        None => anyhow::bail!("{} has no measured events", opt.file.display()),
    }
    let output = opt.output.unwrap_or(opt.file);
    let mut wtr = csv::Writer::from_path(&output)?;
    for ev in trace.events() {
        wtr.serialize(ev)?;
    }
    wtr.flush()?;
    Ok(())
}
