use crate::constants::VERSION;
use crate::error::{Error, Result};
use crate::probe::MarkerPrefix;
use serde::{Serialize, Serializer};
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use std::time::Duration;

/// Default values for configuration.
pub mod defaults {
    use crate::config::ColorField;
    use std::time::Duration;

    /// The default value for `parallel-traces`.
    pub const DEFAULT_PARALLEL_TRACES: usize = 10;

    /// The default value for `trace-interval`.
    pub const DEFAULT_TRACE_INTERVAL: Duration = Duration::from_secs(1);

    /// The default value for `probe-timeout`.
    pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(1);

    /// The default value for `max-probe-attempts`.
    pub const DEFAULT_MAX_PROBE_ATTEMPTS: usize = 3;

    /// The default value for `color-field`.
    pub const DEFAULT_COLOR_FIELD: ColorField = ColorField::DlSrc;

    /// The default value for `color-value`.
    pub const DEFAULT_COLOR_VALUE: &str = "ee:ee:ee:ee:ee:";
}

/// The Ethernet field which carries a switch color.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize)]
pub enum ColorField {
    /// The Ethernet source address.
    #[serde(rename = "dl_src")]
    DlSrc,
    /// The Ethernet destination address.
    #[serde(rename = "dl_dst")]
    DlDst,
}

impl Display for ColorField {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DlSrc => write!(f, "dl_src"),
            Self::DlDst => write!(f, "dl_dst"),
        }
    }
}

impl FromStr for ColorField {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "dl_src" => Ok(Self::DlSrc),
            "dl_dst" => Ok(Self::DlDst),
            _ => Err(Error::BadConfig(format!("unsupported color field: {s}"))),
        }
    }
}

/// Manager configuration.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ManagerConfig {
    pub parallel_traces: usize,
    pub trace_interval: Duration,
    pub probe_timeout: Duration,
    pub max_probe_attempts: usize,
    pub marker: MarkerPrefix,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            parallel_traces: defaults::DEFAULT_PARALLEL_TRACES,
            trace_interval: defaults::DEFAULT_TRACE_INTERVAL,
            probe_timeout: defaults::DEFAULT_PROBE_TIMEOUT,
            max_probe_attempts: defaults::DEFAULT_MAX_PROBE_ATTEMPTS,
            marker: MarkerPrefix::default(),
        }
    }
}

/// A snapshot of the active settings of a [`crate::Manager`].
#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct Settings {
    pub color_field: ColorField,
    pub color_value: String,
    #[serde(serialize_with = "serialize_duration")]
    pub trace_interval: Duration,
    #[serde(serialize_with = "serialize_duration")]
    pub probe_timeout: Duration,
    pub parallel_traces: usize,
    pub version: &'static str,
}

impl From<&ManagerConfig> for Settings {
    fn from(config: &ManagerConfig) -> Self {
        Self {
            color_field: config.marker.field(),
            color_value: config.marker.to_string(),
            trace_interval: config.trace_interval,
            probe_timeout: config.probe_timeout,
            parallel_traces: config.parallel_traces,
            version: VERSION,
        }
    }
}

/// Serialize a [`Duration`] in human readable form, i.e. `1s 500ms`.
pub(crate) fn serialize_duration<S: Serializer>(
    duration: &Duration,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.collect_str(&humantime::format_duration(*duration))
}
