use crate::config::{ColorFieldConfig, LogFormat, LogSpanEvents};
use clap::Parser;
use std::time::Duration;

/// Trace flows across a simulated software-defined network
#[derive(Parser, Debug)]
#[command(name = "sdntrace-sim", author, version, about, long_about = None)]
pub struct Args {
    /// The simulation file to run
    #[arg(value_hint = clap::ValueHint::FilePath)]
    pub simulation: String,

    /// Config file
    #[arg(short = 'c', long, value_hint = clap::ValueHint::FilePath)]
    pub config_file: Option<String>,

    /// The Ethernet field which carries the switch color [default: dl_src]
    #[arg(value_enum, long)]
    pub color_field: Option<ColorFieldConfig>,

    /// The color prefix shared by all switches [default: ee:ee:ee:ee:ee:]
    #[arg(long)]
    pub color_value: Option<String>,

    /// The maximum number of traces to run at the same time [default: 10]
    #[arg(short = 'p', long)]
    pub parallel_traces: Option<usize>,

    /// The longest time to wait before looking for pending traces [default: 1s]
    #[arg(short = 'i', long, value_parser = parse_duration)]
    pub trace_interval: Option<Duration>,

    /// The time to wait for a probe to be echoed [default: 1s]
    #[arg(short = 'T', long, value_parser = parse_duration)]
    pub probe_timeout: Option<Duration>,

    /// The debug log format [default: pretty]
    #[arg(long)]
    pub log_format: Option<LogFormat>,

    /// The debug log filter [default: sdntrace=debug]
    #[arg(long)]
    pub log_filter: Option<String>,

    /// The debug log format [default: off]
    #[arg(long)]
    pub log_span_events: Option<LogSpanEvents>,

    /// Enable verbose debug logging
    #[arg(short = 'v', long, default_value_t = false)]
    pub verbose: bool,
}

fn parse_duration(value: &str) -> anyhow::Result<Duration> {
    Ok(humantime::parse_duration(value)?)
}
