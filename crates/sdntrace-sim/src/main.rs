use clap::Parser;
use sdntrace_sim::config::{Args, SimConfig};

mod app;

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let cfg = SimConfig::from(args)?;
    app::run_sdntrace_sim(&cfg)
}
