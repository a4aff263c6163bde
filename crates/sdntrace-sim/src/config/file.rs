use crate::config::{constants, ColorFieldConfig, LogFormat, LogSpanEvents};
use anyhow::Context;
use sdntrace_core::defaults;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

const DEFAULT_CONFIG_FILE: &str = "sdntrace.toml";
const DEFAULT_HIDDEN_CONFIG_FILE: &str = ".sdntrace.toml";

/// Read the config from the current directory.
///
/// Returns the parsed `Some(ConfigFile)` if a `sdntrace.toml` or
/// `.sdntrace.toml` file exists, `None` otherwise.
pub fn read_default_config_file() -> anyhow::Result<Option<ConfigFile>> {
    if let Some(file) = read_file("", DEFAULT_CONFIG_FILE)? {
        Ok(Some(file))
    } else if let Some(file) = read_file("", DEFAULT_HIDDEN_CONFIG_FILE)? {
        Ok(Some(file))
    } else {
        Ok(None)
    }
}

/// Read the config from the given path.
pub fn read_config_file<P: AsRef<Path>>(path: P) -> anyhow::Result<ConfigFile> {
    let contents = std::fs::read_to_string(path.as_ref())
        .with_context(|| format!("config file not found: {}", path.as_ref().display()))?;
    toml::from_str(&contents)
        .with_context(|| format!("invalid config file: {}", path.as_ref().display()))
}

fn read_file<P: AsRef<Path>>(dir: P, file: &str) -> anyhow::Result<Option<ConfigFile>> {
    let path = dir.as_ref().join(file);
    if path.exists() {
        Ok(Some(read_config_file(path)?))
    } else {
        Ok(None)
    }
}

#[derive(Debug, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct ConfigFile {
    pub sdntrace: Option<ConfigSdntrace>,
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            sdntrace: Some(ConfigSdntrace::default()),
        }
    }
}

#[derive(Debug, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct ConfigSdntrace {
    pub color_field: Option<ColorFieldConfig>,
    pub color_value: Option<String>,
    pub parallel_traces: Option<usize>,
    #[serde(default)]
    #[serde(deserialize_with = "humantime_deser")]
    pub trace_interval: Option<Duration>,
    #[serde(default)]
    #[serde(deserialize_with = "humantime_deser")]
    pub probe_timeout: Option<Duration>,
    pub log_format: Option<LogFormat>,
    pub log_filter: Option<String>,
    pub log_span_events: Option<LogSpanEvents>,
}

impl Default for ConfigSdntrace {
    fn default() -> Self {
        Self {
            color_field: Some(ColorFieldConfig::from(defaults::DEFAULT_COLOR_FIELD)),
            color_value: Some(String::from(defaults::DEFAULT_COLOR_VALUE)),
            parallel_traces: Some(defaults::DEFAULT_PARALLEL_TRACES),
            trace_interval: Some(defaults::DEFAULT_TRACE_INTERVAL),
            probe_timeout: Some(defaults::DEFAULT_PROBE_TIMEOUT),
            log_format: Some(constants::DEFAULT_LOG_FORMAT),
            log_filter: Some(String::from(constants::DEFAULT_LOG_FILTER)),
            log_span_events: Some(constants::DEFAULT_LOG_SPAN_EVENTS),
        }
    }
}

fn humantime_deser<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    humantime::parse_duration(&String::deserialize(deserializer)?)
        .map_err(serde::de::Error::custom)
        .map(Some)
}
