use serde::Deserialize;
use serde_json::Value;

/// A simulated network and the traces to run across it.
#[derive(Debug, Clone, Deserialize)]
pub struct Simulation {
    pub name: String,
    /// The per hop echo timeout in milliseconds.
    pub probe_timeout_ms: Option<u64>,
    pub parallel_traces: Option<usize>,
    pub switches: Vec<Switch>,
    #[serde(default)]
    pub rules: Vec<Rule>,
    pub traces: Vec<Trace>,
}

impl Simulation {
    /// The rule matching a frame received at `dpid` on `in_port`.
    ///
    /// A rule with a VLAN only matches frames tagged with that VLAN, a rule
    /// without one matches any frame.
    #[must_use]
    pub fn find_rule(&self, dpid: &str, in_port: u64, vlan: Option<u16>) -> Option<&Rule> {
        self.rules.iter().find(|rule| {
            rule.dpid == dpid
                && rule.in_port == in_port
                && rule.vlan.map_or(true, |v| Some(v) == vlan)
        })
    }
}

/// A simulated switch.
#[derive(Debug, Clone, Deserialize)]
pub struct Switch {
    pub dpid: String,
    /// The color assigned to the switch, uncolored if not set.
    pub color: Option<String>,
}

/// A simulated forwarding rule.
#[derive(Debug, Clone, Deserialize)]
pub struct Rule {
    pub dpid: String,
    pub in_port: u64,
    pub vlan: Option<u16>,
    pub action: Action,
}

/// What a switch does with a matching frame.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "tag")]
pub enum Action {
    /// Forward the frame to the port of the next switch.
    Forward(Forward),
    /// Drop the frame.
    Drop,
}

/// Forward a frame to a neighbouring switch.
#[derive(Debug, Clone, Deserialize)]
pub struct Forward {
    /// The switch the frame arrives at.
    pub dpid: String,
    /// The port the frame arrives on.
    pub port: u64,
    /// Rewrite the VLAN of a tagged frame.
    pub vlan: Option<u16>,
}

/// A trace request and its expected outcome.
#[derive(Debug, Clone, Deserialize)]
pub struct Trace {
    pub name: String,
    /// The raw trace request.
    pub request: Value,
    #[serde(default)]
    pub expected: Vec<Hop>,
    pub reason: Reason,
    /// The expected message of the last step, not checked if not set.
    pub msg: Option<String>,
}

/// An expected hop.
#[derive(Debug, Clone, Eq, PartialEq, Deserialize)]
pub struct Hop {
    pub dpid: String,
    pub port: u64,
}

/// The expected reason a trace ended.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reason {
    Done,
    Loop,
}
