use crate::error::Result;
use crate::probe::Color;
use crate::types::{Dpid, PortNo};
use std::sync::Arc;

/// A switch known to the [`Directory`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SwitchHandle {
    pub dpid: Dpid,
}

impl SwitchHandle {
    #[must_use]
    pub const fn new(dpid: Dpid) -> Self {
        Self { dpid }
    }
}

/// A frame received by the controller from a switch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacketIn {
    /// The switch which sent the frame to the controller.
    pub dpid: Dpid,
    /// The port the frame arrived on at that switch.
    pub in_port: PortNo,
    /// The raw Ethernet frame.
    pub frame: Vec<u8>,
}

/// The registry of switches.
#[cfg_attr(test, mockall::automock)]
pub trait Directory: Send + Sync {
    /// Lookup a switch by datapath id.
    fn get_switch(&self, dpid: &Dpid) -> Option<SwitchHandle>;

    /// All known switches.
    fn get_switches(&self) -> Vec<SwitchHandle>;
}

/// The coloring service which assigns each switch its marker.
#[cfg_attr(test, mockall::automock)]
pub trait ColorService: Send + Sync {
    /// The color of a switch, `None` if the switch has not been colored.
    fn get_marker(&self, dpid: &Dpid) -> Option<Color>;
}

/// Injects probes into the data plane.
#[cfg_attr(test, mockall::automock)]
pub trait PacketTransport: Send + Sync {
    /// Send `frame` out of `port` of `switch` as if it had been received there.
    fn send_probe(&self, switch: &SwitchHandle, port: PortNo, frame: &[u8]) -> Result<()>;
}

/// The external services a trace depends on.
#[derive(Clone)]
pub struct Network {
    pub directory: Arc<dyn Directory>,
    pub colors: Arc<dyn ColorService>,
    pub transport: Arc<dyn PacketTransport>,
}

impl Network {
    pub fn new(
        directory: Arc<dyn Directory>,
        colors: Arc<dyn ColorService>,
        transport: Arc<dyn PacketTransport>,
    ) -> Self {
        Self {
            directory,
            colors,
            transport,
        }
    }

    /// Resolve a switch and its color.
    pub(crate) fn resolve(
        &self,
        dpid: &Dpid,
    ) -> std::result::Result<(SwitchHandle, Color), Unresolved> {
        let switch = self
            .directory
            .get_switch(dpid)
            .ok_or_else(|| Unresolved::UnknownSwitch(dpid.clone()))?;
        let color = self
            .colors
            .get_marker(&switch.dpid)
            .ok_or_else(|| Unresolved::NotColored(dpid.clone()))?;
        Ok((switch, color))
    }
}

impl std::fmt::Debug for Network {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Network").finish_non_exhaustive()
    }
}

/// A switch which could not be resolved to a handle and color.
#[derive(thiserror::Error, Debug, Clone, Eq, PartialEq)]
pub enum Unresolved {
    #[error("unknown switch {0}")]
    UnknownSwitch(Dpid),
    #[error("switch {0} not colored")]
    NotColored(Dpid),
}
