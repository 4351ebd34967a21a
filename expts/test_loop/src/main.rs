use std::path::PathBuf;

use clap::Parser;
use test_loop::{runner::CaseResult, TestRunner};

/// Runs simulator test cases up to N times each, or until they fail.
#[derive(Debug, Parser)]
struct Opt {
    /// Test case name; a trailing `*` selects every case with that prefix.
    test_name: String,
    /// Path of the simulator executable.
    #[clap(long, default_value_os_t = default_exe())]
    exe: PathBuf,
    /// Directory holding the test spec files.
    #[clap(long, default_value = "sim_specs")]
    specs: PathBuf,
    #[clap(long, default_value_t = 100)]
    repetitions: usize,
    /// Number of concurrent workers (defaults to the available parallelism).
    #[clap(long)]
    workers: Option<usize>,
}

fn default_exe() -> PathBuf {
    let name = if cfg!(windows) { "pico_sim.exe" } else { "pico_sim" };
    [".", name].into_iter().collect()
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let opt = Opt::parse();
    let test_name = opt.test_name.trim();
    println!("Executable: {}", opt.exe.display());
    println!("Sim path: {}", opt.specs.display());

    let runner = TestRunner::builder()
        .exe(opt.exe)
        .spec_dir(opt.specs)
        .repetitions(opt.repetitions)
        .build();
    let runner = match opt.workers {
        Some(workers) => TestRunner { workers, ..runner },
        None => runner,
    };
    runner.log_dir()?;
    let cases = runner.select(test_name)?;

    let summary = runner.run(&cases)?;
    for outcome in &summary.outcomes {
        match outcome.result {
            CaseResult::Passed => {
                println!("All {} trials of {} pass.", outcome.trials, outcome.name)
            }
            CaseResult::Failed { code } => println!(
                "{} returns {} after {} trials.",
                outcome.name,
                code.map_or_else(|| "no exit code".to_string(), |c| c.to_string()),
                outcome.trials
            ),
        }
    }
    if summary.failed() {
        anyhow::bail!(
            "{} of {} test cases failed",
            summary.nr_failed(),
            summary.outcomes.len()
        );
    }
    Ok(())
}
