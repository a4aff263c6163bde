//! sdntrace - A data-plane path tracing library for software-defined networks.
//!
//! This crate traces the path a flow takes through a network of `OpenFlow`
//! switches by injecting a tagged probe at a switch port and following the
//! probe as it is forwarded from switch to switch. Each switch sends the probe
//! back to the controller, where it is matched to the trace which sent it, and
//! the trace continues from the switch the probe was observed at.
//!
//! The library does not talk to switches itself. The switch registry, the
//! switch coloring service and the packet transport are supplied by the
//! caller as implementations of [`Directory`], [`ColorService`] and
//! [`PacketTransport`], and frames received from the data plane are handed to
//! [`Manager::handle_packet_in`].
//!
//! # Example
//!
//! The following example builds a manager, runs it on a new thread, requests
//! a trace and prints the result once available:
//!
//! ```no_run
//! # fn main() -> anyhow::Result<()> {
//! # use sdntrace_core::{Color, ColorService, Directory, Dpid, PacketTransport, PortNo, SwitchHandle};
//! # use std::sync::Arc;
//! # struct Controller;
//! # impl Directory for Controller {
//! #     fn get_switch(&self, _: &Dpid) -> Option<SwitchHandle> { None }
//! #     fn get_switches(&self) -> Vec<SwitchHandle> { vec![] }
//! # }
//! # impl ColorService for Controller {
//! #     fn get_marker(&self, _: &Dpid) -> Option<Color> { None }
//! # }
//! # impl PacketTransport for Controller {
//! #     fn send_probe(&self, _: &SwitchHandle, _: PortNo, _: &[u8]) -> sdntrace_core::Result<()> { Ok(()) }
//! # }
//! # let controller = Arc::new(Controller);
//! use sdntrace_core::{Builder, Lookup};
//! use serde_json::json;
//!
//! let (manager, _) = Builder::new(controller.clone(), controller.clone(), controller)
//!     .build()?
//!     .spawn()?;
//! let request = json!({
//!     "trace": {
//!         "switch": { "dpid": "00:00:00:00:00:00:00:01", "in_port": 1 },
//!         "eth": { "dl_vlan": 100 }
//!     }
//! });
//! let request_id = manager.new_trace(&request)?;
//! if let Lookup::Complete(result) = manager.lookup_id(request_id) {
//!     println!("{}", serde_json::to_string_pretty(&result)?);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # See Also
//!
//! - [`Builder`] - Build a [`Manager`].
//! - [`Manager::new_trace`] - Validate and queue a trace request.
//! - [`Manager::spawn`] - Run the dispatcher on a new thread.
//! - [`Manager::lookup`] - Lookup the state or result of a trace.
#![warn(clippy::all, clippy::pedantic, clippy::nursery, rust_2018_idioms)]
#![allow(
    clippy::module_name_repetitions,
    clippy::option_if_let_else,
    clippy::missing_const_for_fn,
    clippy::cast_possible_truncation,
    clippy::missing_errors_doc
)]
#![deny(unsafe_code)]

mod builder;
mod config;
mod constants;
mod error;
mod flow;
mod manager;
mod net;
mod probe;
mod trace;
mod tracer;
mod types;

pub use builder::Builder;
pub use config::{defaults, ColorField, Settings};
pub use constants::REQUEST_ID_BASE;
pub use error::{AdmissionError, Error, Field, Result, ValidationError};
pub use flow::FlowDescriptor;
pub use manager::Manager;
pub use net::{ColorService, Directory, PacketIn, PacketTransport, SwitchHandle};
pub use probe::{
    build_probe, decode_trace_msg, process_packet, vlan_of, Color, MarkerPrefix, MsgKind, TraceMsg,
};
pub use trace::{LastReason, Lookup, Stats, TraceResult, TraceStep};
pub use types::{Dpid, PortNo, RequestId, Step};
