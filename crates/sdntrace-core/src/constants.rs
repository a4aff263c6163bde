use sdntrace_packet::ethernet::MacAddr;
use std::net::Ipv4Addr;

/// Request ids are allocated from this base, the first issued id is `REQUEST_ID_BASE + 1`.
pub const REQUEST_ID_BASE: u64 = 30000;

/// The source MAC used for probes when the switch color is not carried in the source MAC.
pub const UNCOLORED_SOURCE_MAC: MacAddr = MacAddr([0x0e, 0x55, 0x05, 0x0e, 0x55, 0x05]);

/// The destination MAC of a probe unless the request supplies `dl_dst`.
pub const DEFAULT_DL_DST: MacAddr = MacAddr([0xca, 0xfe, 0xca, 0xfe, 0xca, 0xfe]);

/// The ethertype of a probe unless the request supplies `dl_type`.
pub const DEFAULT_DL_TYPE: u16 = 0x0800;

/// The source IP of a probe unless the request supplies `nw_src`.
pub const DEFAULT_NW_SRC: Ipv4Addr = Ipv4Addr::new(1, 1, 1, 1);

/// The destination IP of a probe unless the request supplies `nw_dst`.
pub const DEFAULT_NW_DST: Ipv4Addr = Ipv4Addr::new(1, 1, 1, 2);

/// The IPv4 time-to-live of every probe.
pub const PROBE_TTL: u8 = 64;

/// The TCP window size of every probe.
pub const PROBE_TCP_WINDOW: u16 = 8192;

/// TCP `PSH` and `ACK` flags.
pub const PROBE_TCP_FLAGS: u8 = 0x18;

/// The message attached to a `last` step when the trace ended normally.
pub const LAST_STEP_MSG: &str = "none";

/// The message attached to a `last` step when the trace was cancelled.
pub const CANCELLED_MSG: &str = "trace cancelled";

/// The message attached to a `last` step when the tracer failed unexpectedly.
pub const ABORTED_MSG: &str = "trace aborted";

/// The crate version reported in the settings snapshot.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
