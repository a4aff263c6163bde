//! An in-memory software-defined network for running `sdntrace` traces.
//!
//! A [`Simulation`] describes a set of switches, the forwarding rules they
//! apply to probes and the traces to run. [`simulate`] runs every trace of a
//! simulation to completion and [`verify`] checks the results against the
//! expected hops.
#![warn(clippy::all, clippy::pedantic, clippy::nursery, rust_2018_idioms)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![forbid(unsafe_code)]

pub mod config;
mod network;
mod simulation;

pub use network::SimNetwork;
pub use simulation::{Action, Forward, Hop, Reason, Rule, Simulation, Switch, Trace};

use anyhow::{anyhow, Context};
use config::SimConfig;
use crossbeam::channel::unbounded;
use sdntrace_core::{Builder, LastReason, Lookup, Manager, TraceResult, TraceStep};
use std::sync::Arc;
use std::thread;
use std::thread::JoinHandle;
use std::time::Duration;

/// How often the state of a submitted trace is checked.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Run every trace of a simulation.
///
/// The probe timeout and parallel trace bound of the simulation take
/// precedence over those of `cfg`. Results are returned in the order the
/// traces appear in the simulation.
pub fn simulate(
    simulation: &Arc<Simulation>,
    cfg: &SimConfig,
) -> anyhow::Result<Vec<Arc<TraceResult>>> {
    let (packet_in_tx, packet_in_rx) = unbounded();
    let network = Arc::new(SimNetwork::new(Arc::clone(simulation), packet_in_tx)?);
    let probe_timeout = simulation
        .probe_timeout_ms
        .map_or(cfg.probe_timeout, Duration::from_millis);
    let parallel_traces = simulation.parallel_traces.unwrap_or(cfg.parallel_traces);
    let (manager, dispatcher) = Builder::new(network.clone(), network.clone(), network)
        .parallel_traces(parallel_traces)
        .trace_interval(cfg.trace_interval)
        .probe_timeout(probe_timeout)
        .marker(cfg.marker.clone())
        .build()?
        .spawn()?;
    let delivery = match network::deliver(manager.clone(), packet_in_rx) {
        Ok(delivery) => delivery,
        Err(err) => {
            manager.stop();
            join(dispatcher)?;
            return Err(err);
        }
    };
    tracing::info!(
        name = %simulation.name,
        traces = simulation.traces.len(),
        "simulation started"
    );
    let results = run_traces(&manager, simulation);
    manager.stop();
    join(dispatcher)?;
    join(delivery)?;
    tracing::info!(name = %simulation.name, "simulation finished");
    results
}

/// Check the results of a simulation against the expected outcome of each trace.
pub fn verify(simulation: &Simulation, results: &[Arc<TraceResult>]) -> anyhow::Result<()> {
    if simulation.traces.len() != results.len() {
        return Err(anyhow!(
            "expected {} results but found {}",
            simulation.traces.len(),
            results.len()
        ));
    }
    for (trace, result) in simulation.traces.iter().zip(results) {
        verify_trace(trace, result).with_context(|| format!("trace `{}` failed", trace.name))?;
    }
    Ok(())
}

fn verify_trace(trace: &Trace, result: &TraceResult) -> anyhow::Result<()> {
    let hops = result
        .result
        .iter()
        .filter_map(|step| match step {
            TraceStep::Trace { dpid, port, .. } => Some(Hop {
                dpid: dpid.to_string(),
                port: port.0,
            }),
            _ => None,
        })
        .collect::<Vec<_>>();
    if hops != trace.expected {
        return Err(anyhow!(
            "expected hops {:?} but found {:?}",
            trace.expected,
            hops
        ));
    }
    let Some(TraceStep::Last { reason, msg, .. }) = result.last() else {
        return Err(anyhow!("trace has no last step"));
    };
    let reason = match reason {
        LastReason::Done => Reason::Done,
        LastReason::Loop => Reason::Loop,
    };
    if reason != trace.reason {
        return Err(anyhow!(
            "expected reason {:?} but found {:?}",
            trace.reason,
            reason
        ));
    }
    match &trace.msg {
        Some(expected) if expected != msg => Err(anyhow!(
            "expected message `{expected}` but found `{msg}`"
        )),
        _ => Ok(()),
    }
}

/// Submit every trace and wait for all of them to complete.
fn run_traces(
    manager: &Manager,
    simulation: &Simulation,
) -> anyhow::Result<Vec<Arc<TraceResult>>> {
    let request_ids = simulation
        .traces
        .iter()
        .map(|trace| {
            manager
                .new_trace(&trace.request)
                .with_context(|| format!("trace `{}` rejected", trace.name))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;
    request_ids
        .into_iter()
        .map(|request_id| loop {
            match manager.lookup_id(request_id) {
                Lookup::Complete(result) => break Ok(result),
                Lookup::Running | Lookup::Pending => thread::sleep(POLL_INTERVAL),
                Lookup::Unknown => break Err(anyhow!("trace {request_id} not found")),
            }
        })
        .collect()
}

fn join(handle: JoinHandle<()>) -> anyhow::Result<()> {
    let name = handle.thread().name().unwrap_or_default().to_string();
    handle
        .join()
        .map_err(|_| anyhow!("thread {name} panicked"))
}
