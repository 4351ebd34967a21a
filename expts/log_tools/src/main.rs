use clap::Parser;
use log_tools::Tool;

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let tool = Tool::parse();
    tool.run()?;
    Ok(())
}
