use crate::config::{defaults, ManagerConfig};
use crate::error::{Error, Result};
use crate::net::{ColorService, Directory, Network, PacketTransport};
use crate::probe::MarkerPrefix;
use crate::Manager;
use std::sync::Arc;
use std::time::Duration;

/// Build a trace manager.
///
/// # Examples
///
/// ```no_run
/// # fn main() -> anyhow::Result<()> {
/// # use sdntrace_core::{Color, ColorService, Directory, Dpid, PacketTransport, PortNo, SwitchHandle};
/// # use std::sync::Arc;
/// # struct Switches;
/// # impl Directory for Switches {
/// #     fn get_switch(&self, dpid: &Dpid) -> Option<SwitchHandle> { None }
/// #     fn get_switches(&self) -> Vec<SwitchHandle> { vec![] }
/// # }
/// # impl ColorService for Switches {
/// #     fn get_marker(&self, dpid: &Dpid) -> Option<Color> { None }
/// # }
/// # impl PacketTransport for Switches {
/// #     fn send_probe(&self, _: &SwitchHandle, _: PortNo, _: &[u8]) -> sdntrace_core::Result<()> { Ok(()) }
/// # }
/// use sdntrace_core::Builder;
/// use std::time::Duration;
///
/// let switches = Arc::new(Switches);
/// let (manager, handle) = Builder::new(switches.clone(), switches.clone(), switches)
///     .parallel_traces(4)
///     .trace_interval(Duration::from_millis(500))
///     .build()?
///     .spawn()?;
/// # Ok(())
/// # }
/// ```
///
/// # See Also
///
/// - [`Manager`] - Admits, schedules and stores traces.
#[derive(Debug)]
pub struct Builder {
    network: Network,
    parallel_traces: usize,
    trace_interval: Duration,
    probe_timeout: Duration,
    max_probe_attempts: usize,
    marker: MarkerPrefix,
}

impl Builder {
    /// Build a manager which uses the given collaborators.
    #[must_use]
    pub fn new(
        directory: Arc<dyn Directory>,
        colors: Arc<dyn ColorService>,
        transport: Arc<dyn PacketTransport>,
    ) -> Self {
        Self {
            network: Network::new(directory, colors, transport),
            parallel_traces: defaults::DEFAULT_PARALLEL_TRACES,
            trace_interval: defaults::DEFAULT_TRACE_INTERVAL,
            probe_timeout: defaults::DEFAULT_PROBE_TIMEOUT,
            max_probe_attempts: defaults::DEFAULT_MAX_PROBE_ATTEMPTS,
            marker: MarkerPrefix::default(),
        }
    }

    /// Set the maximum number of traces which may run at the same time.
    ///
    /// If not set then `DEFAULT_PARALLEL_TRACES` is used.
    #[must_use]
    pub fn parallel_traces(self, parallel_traces: usize) -> Self {
        Self {
            parallel_traces,
            ..self
        }
    }

    /// Set the longest time the dispatcher sleeps before looking for pending traces.
    #[must_use]
    pub fn trace_interval(self, trace_interval: Duration) -> Self {
        Self {
            trace_interval,
            ..self
        }
    }

    /// Set the per hop echo timeout used when a request does not set one.
    #[must_use]
    pub fn probe_timeout(self, probe_timeout: Duration) -> Self {
        Self {
            probe_timeout,
            ..self
        }
    }

    /// Set the number of times a probe is sent before a hop is given up.
    #[must_use]
    pub fn max_probe_attempts(self, max_probe_attempts: usize) -> Self {
        Self {
            max_probe_attempts,
            ..self
        }
    }

    /// Set the marker prefix used to recognize probes received from the data plane.
    #[must_use]
    pub fn marker(self, marker: MarkerPrefix) -> Self {
        Self { marker, ..self }
    }

    /// Build the [`Manager`].
    ///
    /// The manager does nothing until [`Manager::run`] or [`Manager::spawn`] is called.
    pub fn build(self) -> Result<Manager> {
        if self.parallel_traces == 0 {
            return Err(Error::BadConfig(String::from(
                "parallel_traces must be greater than zero",
            )));
        }
        if self.max_probe_attempts == 0 {
            return Err(Error::BadConfig(String::from(
                "max_probe_attempts must be greater than zero",
            )));
        }
        if self.trace_interval.is_zero() {
            return Err(Error::BadConfig(String::from(
                "trace_interval must be greater than zero",
            )));
        }
        if self.probe_timeout.is_zero() {
            return Err(Error::BadConfig(String::from(
                "probe_timeout must be greater than zero",
            )));
        }
        let config = ManagerConfig {
            parallel_traces: self.parallel_traces,
            trace_interval: self.trace_interval,
            probe_timeout: self.probe_timeout,
            max_probe_attempts: self.max_probe_attempts,
            marker: self.marker,
        };
        Ok(Manager::new(config, self.network))
    }
}
