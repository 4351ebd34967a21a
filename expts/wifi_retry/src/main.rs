use clap::Parser;
use wifi_retry::Experiment;

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let expt = Experiment::parse();
    expt.run()?;
    Ok(())
}
