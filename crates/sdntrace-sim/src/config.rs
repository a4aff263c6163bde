use anyhow::anyhow;
use clap::ValueEnum;
use sdntrace_core::{defaults, ColorField, MarkerPrefix};
use serde::Deserialize;
use std::time::Duration;

mod cmd;
mod constants;
mod file;

pub use cmd::Args;
pub use constants::{DEFAULT_LOG_FILTER, DEFAULT_LOG_FORMAT, DEFAULT_LOG_SPAN_EVENTS};
pub use file::{read_config_file, read_default_config_file, ConfigFile, ConfigSdntrace};

/// The Ethernet field which carries a switch color.
#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorFieldConfig {
    /// The Ethernet source address.
    #[value(name = "dl_src")]
    DlSrc,
    /// The Ethernet destination address.
    #[value(name = "dl_dst")]
    DlDst,
}

impl From<ColorField> for ColorFieldConfig {
    fn from(value: ColorField) -> Self {
        match value {
            ColorField::DlSrc => Self::DlSrc,
            ColorField::DlDst => Self::DlDst,
        }
    }
}

impl From<ColorFieldConfig> for ColorField {
    fn from(value: ColorFieldConfig) -> Self {
        match value {
            ColorFieldConfig::DlSrc => Self::DlSrc,
            ColorFieldConfig::DlDst => Self::DlDst,
        }
    }
}

/// How to format log data.
#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LogFormat {
    /// Display log data in a compact format.
    Compact,
    /// Display log data in a pretty format.
    Pretty,
    /// Display log data in a json format.
    Json,
}

/// How to log event spans.
#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LogSpanEvents {
    /// Do not display event spans.
    Off,
    /// Display enter and exit event spans.
    Active,
    /// Display all event spans.
    Full,
}

/// Fully parsed and validated configuration.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct SimConfig {
    pub simulation_file: String,
    pub marker: MarkerPrefix,
    pub parallel_traces: usize,
    pub trace_interval: Duration,
    pub probe_timeout: Duration,
    pub verbose: bool,
    pub log_format: LogFormat,
    pub log_filter: String,
    pub log_span_events: LogSpanEvents,
}

impl SimConfig {
    /// Build the configuration from the command line and the config file.
    ///
    /// The config file named by `--config-file` is used if given, otherwise
    /// the default config file is used if one exists.
    pub fn from(args: Args) -> anyhow::Result<Self> {
        let cfg_file = if let Some(cfg) = &args.config_file {
            file::read_config_file(cfg)?
        } else {
            file::read_default_config_file()?.unwrap_or_default()
        };
        Self::build_config(args, cfg_file)
    }

    fn build_config(args: Args, cfg_file: ConfigFile) -> anyhow::Result<Self> {
        let cfg_file_sdntrace = cfg_file.sdntrace.unwrap_or_default();
        let color_field = cfg_layer(
            args.color_field,
            cfg_file_sdntrace.color_field,
            ColorFieldConfig::from(defaults::DEFAULT_COLOR_FIELD),
        );
        let color_value = cfg_layer(
            args.color_value,
            cfg_file_sdntrace.color_value,
            String::from(defaults::DEFAULT_COLOR_VALUE),
        );
        let parallel_traces = cfg_layer(
            args.parallel_traces,
            cfg_file_sdntrace.parallel_traces,
            defaults::DEFAULT_PARALLEL_TRACES,
        );
        let trace_interval = cfg_layer(
            args.trace_interval,
            cfg_file_sdntrace.trace_interval,
            defaults::DEFAULT_TRACE_INTERVAL,
        );
        let probe_timeout = cfg_layer(
            args.probe_timeout,
            cfg_file_sdntrace.probe_timeout,
            defaults::DEFAULT_PROBE_TIMEOUT,
        );
        let log_format = cfg_layer(
            args.log_format,
            cfg_file_sdntrace.log_format,
            constants::DEFAULT_LOG_FORMAT,
        );
        let log_filter = cfg_layer(
            args.log_filter,
            cfg_file_sdntrace.log_filter,
            String::from(constants::DEFAULT_LOG_FILTER),
        );
        let log_span_events = cfg_layer(
            args.log_span_events,
            cfg_file_sdntrace.log_span_events,
            constants::DEFAULT_LOG_SPAN_EVENTS,
        );
        let marker = MarkerPrefix::new(ColorField::from(color_field), &color_value)
            .map_err(|err| anyhow!("invalid color-value `{color_value}`: {err}"))?;
        validate_parallel_traces(parallel_traces)?;
        validate_duration("trace-interval", trace_interval)?;
        validate_duration("probe-timeout", probe_timeout)?;
        Ok(Self {
            simulation_file: args.simulation,
            marker,
            parallel_traces,
            trace_interval,
            probe_timeout,
            verbose: args.verbose,
            log_format,
            log_filter,
            log_span_events,
        })
    }
}

fn cfg_layer<T>(fst: Option<T>, snd: Option<T>, def: T) -> T {
    match (fst, snd) {
        (Some(val), _) | (None, Some(val)) => val,
        (None, None) => def,
    }
}

fn validate_parallel_traces(parallel_traces: usize) -> anyhow::Result<()> {
    if parallel_traces == 0 {
        Err(anyhow!(
            "parallel-traces ({parallel_traces}) must be greater than zero"
        ))
    } else {
        Ok(())
    }
}

fn validate_duration(name: &str, duration: Duration) -> anyhow::Result<()> {
    if duration.is_zero() {
        Err(anyhow!(
            "{name} ({}) must be greater than zero",
            humantime::format_duration(duration)
        ))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use test_case::test_case;

    fn parse(cmd: &str, cfg_file: &str) -> anyhow::Result<SimConfig> {
        let args = Args::try_parse_from(cmd.split_whitespace())?;
        let cfg_file: ConfigFile = toml::from_str(cfg_file)?;
        SimConfig::build_config(args, cfg_file)
    }

    #[test]
    fn test_defaults() {
        let cfg = parse("sdntrace-sim chain.toml", "").unwrap();
        assert_eq!("chain.toml", cfg.simulation_file);
        assert_eq!(MarkerPrefix::default(), cfg.marker);
        assert_eq!(defaults::DEFAULT_PARALLEL_TRACES, cfg.parallel_traces);
        assert_eq!(defaults::DEFAULT_TRACE_INTERVAL, cfg.trace_interval);
        assert_eq!(defaults::DEFAULT_PROBE_TIMEOUT, cfg.probe_timeout);
        assert!(!cfg.verbose);
        assert_eq!(DEFAULT_LOG_FORMAT, cfg.log_format);
        assert_eq!(DEFAULT_LOG_FILTER, cfg.log_filter);
        assert_eq!(DEFAULT_LOG_SPAN_EVENTS, cfg.log_span_events);
    }

    #[test]
    fn test_file_overrides_defaults() {
        let cfg = parse(
            "sdntrace-sim chain.toml",
            r#"
[sdntrace]
color-field = "dl_dst"
color-value = "aa:bb"
parallel-traces = 3
trace-interval = "250ms"
probe-timeout = "2s"
log-format = "json"
log-filter = "sdntrace_core=trace"
log-span-events = "full"
"#,
        )
        .unwrap();
        assert_eq!(ColorField::DlDst, cfg.marker.field());
        assert_eq!("aa:bb:", cfg.marker.to_string());
        assert_eq!(3, cfg.parallel_traces);
        assert_eq!(Duration::from_millis(250), cfg.trace_interval);
        assert_eq!(Duration::from_secs(2), cfg.probe_timeout);
        assert_eq!(LogFormat::Json, cfg.log_format);
        assert_eq!("sdntrace_core=trace", cfg.log_filter);
        assert_eq!(LogSpanEvents::Full, cfg.log_span_events);
    }

    #[test]
    fn test_args_override_file() {
        let cfg = parse(
            "sdntrace-sim chain.toml -v --parallel-traces 5 --probe-timeout 100ms --color-field dl_dst --log-format compact",
            r#"
[sdntrace]
color-field = "dl_src"
parallel-traces = 3
probe-timeout = "2s"
log-format = "json"
"#,
        )
        .unwrap();
        assert!(cfg.verbose);
        assert_eq!(ColorField::DlDst, cfg.marker.field());
        assert_eq!(5, cfg.parallel_traces);
        assert_eq!(Duration::from_millis(100), cfg.probe_timeout);
        assert_eq!(LogFormat::Compact, cfg.log_format);
    }

    #[test_case("sdntrace-sim chain.toml --parallel-traces 0", ""; "zero parallel traces")]
    #[test_case("sdntrace-sim chain.toml --probe-timeout 0s", ""; "zero probe timeout")]
    #[test_case("sdntrace-sim chain.toml", "[sdntrace]\ntrace-interval = \"0s\""; "zero trace interval")]
    #[test_case("sdntrace-sim chain.toml --color-value zz", ""; "invalid color value")]
    #[test_case("sdntrace-sim chain.toml --color-field dl_type", ""; "invalid color field")]
    #[test_case("sdntrace-sim chain.toml", "[sdntrace]\nunknown = 1"; "unknown config key")]
    #[test_case("sdntrace-sim chain.toml", "[sdntrace]\nprobe-timeout = \"soon\""; "invalid duration")]
    #[test_case("sdntrace-sim", ""; "missing simulation file")]
    fn test_invalid(cmd: &str, cfg_file: &str) {
        assert!(parse(cmd, cfg_file).is_err());
    }
}
