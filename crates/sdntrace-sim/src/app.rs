use anyhow::Context;
use sdntrace_sim::config::{LogFormat, LogSpanEvents, SimConfig};
use sdntrace_sim::Simulation;
use std::sync::Arc;
use tracing_subscriber::fmt::format::FmtSpan;

/// Run the simulation and print the trace results as json.
///
/// Fails if any trace does not produce the outcome the simulation expects.
pub fn run_sdntrace_sim(cfg: &SimConfig) -> anyhow::Result<()> {
    configure_logging(cfg);
    let simulation = Arc::new(read_simulation(&cfg.simulation_file)?);
    let results = sdntrace_sim::simulate(&simulation, cfg)?;
    println!("{}", serde_json::to_string_pretty(&results)?);
    sdntrace_sim::verify(&simulation, &results)
}

fn read_simulation(path: &str) -> anyhow::Result<Simulation> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("simulation file not found: {path}"))?;
    toml::from_str(&contents).with_context(|| format!("invalid simulation file: {path}"))
}

/// Configure tracing with the requested format and filter.
///
/// Log output is written to stderr so it is never mixed with the results.
fn configure_logging(cfg: &SimConfig) {
    if cfg.verbose {
        let fmt_span = match cfg.log_span_events {
            LogSpanEvents::Off => FmtSpan::NONE,
            LogSpanEvents::Active => FmtSpan::ACTIVE,
            LogSpanEvents::Full => FmtSpan::FULL,
        };
        match cfg.log_format {
            LogFormat::Compact => {
                tracing_subscriber::fmt()
                    .with_writer(std::io::stderr)
                    .with_span_events(fmt_span)
                    .with_env_filter(&cfg.log_filter)
                    .compact()
                    .init();
            }
            LogFormat::Pretty => {
                tracing_subscriber::fmt()
                    .with_writer(std::io::stderr)
                    .with_span_events(fmt_span)
                    .with_env_filter(&cfg.log_filter)
                    .pretty()
                    .init();
            }
            LogFormat::Json => {
                tracing_subscriber::fmt()
                    .with_writer(std::io::stderr)
                    .with_span_events(fmt_span)
                    .with_env_filter(&cfg.log_filter)
                    .json()
                    .init();
            }
        }
    }
}
