use crate::config::{ManagerConfig, Settings};
use crate::error::{AdmissionError, Result};
use crate::flow::FlowDescriptor;
use crate::net::{Network, PacketIn};
use crate::trace::{Lookup, Stats, TraceResult};
use crate::types::RequestId;
use serde_json::Value;
use std::sync::Arc;
use std::thread;
use std::thread::JoinHandle;

/// Admits, schedules and stores traces.
///
/// The manager hands out request ids, keeps at most `parallel-traces` tracers
/// running at any time, routes probe echoes received from the data plane to
/// the tracer waiting for them and keeps every completed result for the life
/// of the manager.
///
/// Note that this type is cheaply cloneable.
#[derive(Debug, Clone)]
pub struct Manager {
    inner: Arc<inner::ManagerInner>,
}

impl Manager {
    /// Create a `Manager`.
    ///
    /// Use the [`crate::Builder`] type to create a [`Manager`].
    #[must_use]
    pub(crate) fn new(config: ManagerConfig, network: Network) -> Self {
        Self {
            inner: Arc::new(inner::ManagerInner::new(config, network)),
        }
    }

    /// Validate a raw trace request and check the requested switch can be traced.
    ///
    /// Does not change the state of the manager.
    pub fn validate(&self, request: &Value) -> std::result::Result<FlowDescriptor, AdmissionError> {
        self.inner.validate(request)
    }

    /// Queue a validated flow for tracing.
    ///
    /// Returns `None` if the manager has been stopped.
    #[must_use]
    pub fn submit(&self, flow: FlowDescriptor) -> Option<RequestId> {
        self.inner.submit(flow)
    }

    /// True if an identical request is already pending or running.
    #[must_use]
    pub fn is_duplicate(&self, flow: &FlowDescriptor) -> bool {
        self.inner.is_duplicate(flow)
    }

    /// Validate, deduplicate and queue a raw trace request.
    pub fn new_trace(&self, request: &Value) -> std::result::Result<RequestId, AdmissionError> {
        let flow = self.inner.validate(request)?;
        self.inner.submit_unique(flow)
    }

    /// Lookup a trace by the textual form of its id.
    ///
    /// Ids which are not integers are unknown.
    #[must_use]
    pub fn lookup(&self, request_id: &str) -> Lookup {
        match request_id.trim().parse::<u64>() {
            Ok(id) => self.inner.lookup(RequestId(id)),
            Err(_) => Lookup::Unknown,
        }
    }

    /// Lookup a trace by id.
    #[must_use]
    pub fn lookup_id(&self, request_id: RequestId) -> Lookup {
        self.inner.lookup(request_id)
    }

    /// All completed results, in completion order.
    #[must_use]
    pub fn results(&self) -> Vec<Arc<TraceResult>> {
        self.inner.results()
    }

    #[must_use]
    pub fn stats(&self) -> Stats {
        self.inner.stats()
    }

    #[must_use]
    pub fn settings(&self) -> Settings {
        self.inner.settings()
    }

    /// True if no further tracer may be started until a running one completes.
    #[must_use]
    pub fn limit_traces_reached(&self) -> bool {
        self.inner.limit_traces_reached()
    }

    /// Handle a frame received from the data plane.
    ///
    /// Frames which do not carry the probe marker are ignored. Returns true if
    /// the frame was delivered to a running tracer.
    pub fn handle_packet_in(&self, event: PacketIn) -> bool {
        self.inner.handle_packet_in(event)
    }

    /// Deliver a candidate probe to the tracer that sent it.
    ///
    /// Frames without a tag, or with a tag for a trace which is not running, are
    /// dropped. Returns true if the frame was delivered.
    pub fn route_echo(&self, event: PacketIn) -> bool {
        self.inner.route_echo(event)
    }

    /// Start tracers for pending requests until the parallel limit is reached.
    ///
    /// Returns the number of tracers started.
    pub fn dispatch_pending(&self) -> Result<usize> {
        inner::ManagerInner::dispatch_pending(&self.inner)
    }

    /// Run the dispatch loop on the current thread until the manager is stopped.
    pub fn run(&self) {
        inner::ManagerInner::run(&self.inner);
    }

    /// Run the dispatch loop in a new thread.
    pub fn spawn(self) -> Result<(Self, JoinHandle<()>)> {
        let handle = thread::Builder::new()
            .name(String::from("sdntrace-manager"))
            .spawn({
                let manager = self.clone();
                move || manager.run()
            })
            .map_err(|err| crate::Error::Other(err.to_string()))?;
        Ok((self, handle))
    }

    /// Stop the manager.
    ///
    /// No further trace is started, running tracers are asked to end and
    /// pending requests are recorded as cancelled. Stopping twice has no
    /// further effect.
    pub fn stop(&self) {
        self.inner.stop();
    }

    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.inner.is_stopped()
    }
}

mod inner {
    use crate::config::{ManagerConfig, Settings};
    use crate::constants::{ABORTED_MSG, CANCELLED_MSG, REQUEST_ID_BASE};
    use crate::error::{AdmissionError, Error, Result};
    use crate::flow::FlowDescriptor;
    use crate::net::{Network, PacketIn, Unresolved};
    use crate::probe::decode_trace_msg;
    use crate::trace::{LastReason, Lookup, Stats, TraceLog, TraceResult};
    use crate::tracer::{Echo, TraceSink, Tracer, TracerChannels};
    use crate::types::RequestId;
    use crossbeam::channel::{bounded, select, unbounded, Receiver, Sender};
    use indexmap::IndexMap;
    use parking_lot::{Mutex, RwLock};
    use serde_json::Value;
    use std::collections::HashMap;
    use std::panic::{self, AssertUnwindSafe};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::thread;
    use tracing::instrument;

    #[derive(Debug)]
    struct RunningTrace {
        ended: Arc<AtomicBool>,
        flow: Arc<FlowDescriptor>,
    }

    #[derive(Debug)]
    struct State {
        next_id: u64,
        total: u64,
        pending: IndexMap<RequestId, Arc<FlowDescriptor>>,
        running: IndexMap<RequestId, RunningTrace>,
        completed: IndexMap<RequestId, Arc<TraceResult>>,
        stopped: bool,
    }

    impl State {
        fn new() -> Self {
            Self {
                next_id: REQUEST_ID_BASE,
                total: 0,
                pending: IndexMap::new(),
                running: IndexMap::new(),
                completed: IndexMap::new(),
                stopped: false,
            }
        }

        fn is_duplicate(&self, flow: &FlowDescriptor) -> bool {
            self.pending
                .values()
                .chain(self.running.values().map(|running| &running.flow))
                .any(|other| other.request() == flow.request())
        }

        fn enqueue(&mut self, flow: FlowDescriptor) -> RequestId {
            self.next_id += 1;
            self.total += 1;
            let request_id = RequestId(self.next_id);
            self.pending.insert(request_id, Arc::new(flow));
            request_id
        }
    }

    #[derive(Debug)]
    pub(super) struct ManagerInner {
        config: ManagerConfig,
        network: Network,
        state: Mutex<State>,
        routes: RwLock<HashMap<RequestId, Sender<Echo>>>,
        wake_tx: Sender<()>,
        wake_rx: Receiver<()>,
        shutdown_tx: Mutex<Option<Sender<()>>>,
        shutdown_rx: Receiver<()>,
    }

    impl ManagerInner {
        pub(super) fn new(config: ManagerConfig, network: Network) -> Self {
            let (wake_tx, wake_rx) = bounded(1);
            let (shutdown_tx, shutdown_rx) = bounded(0);
            Self {
                config,
                network,
                state: Mutex::new(State::new()),
                routes: RwLock::new(HashMap::new()),
                wake_tx,
                wake_rx,
                shutdown_tx: Mutex::new(Some(shutdown_tx)),
                shutdown_rx,
            }
        }

        pub(super) fn validate(
            &self,
            request: &Value,
        ) -> std::result::Result<FlowDescriptor, AdmissionError> {
            let flow = FlowDescriptor::from_request(request, self.config.probe_timeout)?;
            self.network.resolve(flow.dpid()).map_err(|err| match err {
                Unresolved::UnknownSwitch(_) => AdmissionError::UnknownSwitch,
                Unresolved::NotColored(_) => AdmissionError::NotColored,
            })?;
            Ok(flow)
        }

        pub(super) fn submit(&self, flow: FlowDescriptor) -> Option<RequestId> {
            let mut state = self.state.lock();
            if state.stopped {
                tracing::warn!("trace submitted after stop, ignored");
                return None;
            }
            let request_id = state.enqueue(flow);
            drop(state);
            tracing::debug!(%request_id, "trace queued");
            self.wake();
            Some(request_id)
        }

        pub(super) fn submit_unique(
            &self,
            flow: FlowDescriptor,
        ) -> std::result::Result<RequestId, AdmissionError> {
            let mut state = self.state.lock();
            if state.stopped {
                return Err(AdmissionError::Stopped);
            }
            if state.is_duplicate(&flow) {
                return Err(AdmissionError::Duplicate);
            }
            let request_id = state.enqueue(flow);
            drop(state);
            tracing::debug!(%request_id, "trace queued");
            self.wake();
            Ok(request_id)
        }

        pub(super) fn is_duplicate(&self, flow: &FlowDescriptor) -> bool {
            self.state.lock().is_duplicate(flow)
        }

        pub(super) fn lookup(&self, request_id: RequestId) -> Lookup {
            let state = self.state.lock();
            if let Some(result) = state.completed.get(&request_id) {
                Lookup::Complete(Arc::clone(result))
            } else if state.running.contains_key(&request_id) {
                Lookup::Running
            } else if state.pending.contains_key(&request_id) {
                Lookup::Pending
            } else {
                Lookup::Unknown
            }
        }

        pub(super) fn results(&self) -> Vec<Arc<TraceResult>> {
            self.state.lock().completed.values().cloned().collect()
        }

        pub(super) fn stats(&self) -> Stats {
            let state = self.state.lock();
            Stats {
                number_of_requests: state.total,
                number_of_running_traces: state.running.len(),
                number_of_pending_traces: state.pending.len(),
                results: state.completed.values().cloned().collect(),
            }
        }

        pub(super) fn settings(&self) -> Settings {
            Settings::from(&self.config)
        }

        pub(super) fn limit_traces_reached(&self) -> bool {
            self.state.lock().running.len() >= self.config.parallel_traces
        }

        pub(super) fn handle_packet_in(&self, event: PacketIn) -> bool {
            if !self.config.marker.matches(&event.frame) {
                return false;
            }
            self.route_echo(event)
        }

        pub(super) fn route_echo(&self, event: PacketIn) -> bool {
            let Some(msg) = decode_trace_msg(&event.frame) else {
                tracing::trace!(dpid = %event.dpid, "packet in without trace tag dropped");
                return false;
            };
            let routes = self.routes.read();
            match routes.get(&msg.request_id) {
                Some(route) => route.send(Echo { msg, event }).is_ok(),
                None => {
                    tracing::trace!(request_id = %msg.request_id, "echo for idle trace dropped");
                    false
                }
            }
        }

        #[instrument(skip_all, level = "trace")]
        pub(super) fn dispatch_pending(this: &Arc<Self>) -> Result<usize> {
            let mut dispatched = 0;
            while let Some((request_id, flow, channels)) = this.next_pending() {
                Self::start_tracer(this, request_id, &flow, channels)?;
                dispatched += 1;
            }
            Ok(dispatched)
        }

        /// Move the oldest pending request to running and open its echo route.
        fn next_pending(&self) -> Option<(RequestId, Arc<FlowDescriptor>, TracerChannels)> {
            let mut state = self.state.lock();
            if state.stopped || state.running.len() >= self.config.parallel_traces {
                return None;
            }
            let (request_id, flow) = state.pending.shift_remove_index(0)?;
            let ended = Arc::new(AtomicBool::new(false));
            let (echo_tx, echoes) = unbounded();
            self.routes.write().insert(request_id, echo_tx);
            state.running.insert(
                request_id,
                RunningTrace {
                    ended: Arc::clone(&ended),
                    flow: Arc::clone(&flow),
                },
            );
            let channels = TracerChannels {
                echoes,
                shutdown: self.shutdown_rx.clone(),
                ended,
            };
            Some((request_id, flow, channels))
        }

        fn start_tracer(
            this: &Arc<Self>,
            request_id: RequestId,
            flow: &Arc<FlowDescriptor>,
            channels: TracerChannels,
        ) -> Result<()> {
            let sink = Arc::clone(this) as Arc<dyn TraceSink>;
            let tracer = Tracer::new(
                request_id,
                flow,
                this.network.clone(),
                channels,
                sink,
                this.config.max_probe_attempts,
            );
            let inner = Arc::clone(this);
            let aborted_flow = Arc::clone(flow);
            let spawned = thread::Builder::new()
                .name(format!("tracer-{request_id}"))
                .spawn(move || {
                    if panic::catch_unwind(AssertUnwindSafe(|| tracer.tracepath())).is_err() {
                        tracing::error!(%request_id, "tracer panicked");
                        let result = terminated(request_id, &aborted_flow, ABORTED_MSG);
                        inner.complete(request_id, result);
                    }
                });
            if let Err(err) = spawned {
                tracing::error!(%request_id, %err, "failed to start tracer");
                this.complete(request_id, terminated(request_id, flow, ABORTED_MSG));
                return Err(Error::Other(err.to_string()));
            }
            tracing::debug!(%request_id, "tracer started");
            Ok(())
        }

        pub(super) fn run(this: &Arc<Self>) {
            tracing::debug!(config = ?this.config, "manager started");
            loop {
                if this.is_stopped() {
                    break;
                }
                if let Err(err) = Self::dispatch_pending(this) {
                    tracing::error!(%err, "dispatch failed");
                }
                let shutdown = select! {
                    recv(this.wake_rx) -> _ => false,
                    recv(this.shutdown_rx) -> _ => true,
                    default(this.config.trace_interval) => false,
                };
                if shutdown {
                    break;
                }
            }
            tracing::debug!("manager stopped");
        }

        pub(super) fn stop(&self) {
            let mut state = self.state.lock();
            if state.stopped {
                return;
            }
            state.stopped = true;
            for running in state.running.values() {
                running.ended.store(true, Ordering::Release);
            }
            let pending = std::mem::take(&mut state.pending);
            for (request_id, flow) in pending {
                state
                    .completed
                    .insert(request_id, Arc::new(terminated(request_id, &flow, CANCELLED_MSG)));
            }
            tracing::info!(running = state.running.len(), "stopping manager");
            drop(state);
            self.routes.write().clear();
            self.shutdown_tx.lock().take();
        }

        pub(super) fn is_stopped(&self) -> bool {
            self.state.lock().stopped
        }

        fn wake(&self) {
            // a full channel means a wake up is already queued
            let _ = self.wake_tx.try_send(());
        }
    }

    impl TraceSink for ManagerInner {
        fn complete(&self, request_id: RequestId, result: TraceResult) {
            self.routes.write().remove(&request_id);
            let mut state = self.state.lock();
            if state.running.shift_remove(&request_id).is_none() {
                tracing::warn!(%request_id, "completion for trace which is not running ignored");
                return;
            }
            state.completed.insert(request_id, Arc::new(result));
            drop(state);
            self.wake();
        }
    }

    /// The result of a trace which never ran to completion.
    fn terminated(request_id: RequestId, flow: &FlowDescriptor, msg: &str) -> TraceResult {
        let mut log = TraceLog::start(flow.dpid().clone(), flow.in_port());
        log.finish(LastReason::Done, msg);
        log.into_result(request_id, flow.request().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ColorField;
    use crate::error::ValidationError;
    use crate::net::{MockColorService, MockDirectory, MockPacketTransport, SwitchHandle};
    use crate::probe::{build_probe, Color, TraceMsg};
    use crate::trace::{LastReason, TraceStep};
    use crate::types::{Dpid, PortNo, Step};
    use crossbeam::channel::{unbounded, RecvTimeoutError};
    use sdntrace_packet::ethernet::MacAddr;
    use serde_json::json;
    use std::collections::HashMap;
    use std::time::{Duration, Instant};

    fn dpid(n: u8) -> Dpid {
        Dpid(format!("00:00:00:00:00:00:00:{n:02x}"))
    }

    fn color(n: u8) -> Color {
        Color::new(ColorField::DlSrc, MacAddr([0xee, 0xee, 0xee, 0xee, 0xee, n]))
    }

    fn request(n: u8, timeout: f64) -> Value {
        json!({
            "trace": {
                "switch": {"dpid": dpid(n).as_str(), "in_port": 1},
                "timeout": timeout
            }
        })
    }

    fn silent() -> MockPacketTransport {
        let mut transport = MockPacketTransport::new();
        transport.expect_send_probe().returning(|_, _, _| Ok(()));
        transport
    }

    /// A manager knowing switches `1..=3`, of which only the colored ones have a marker.
    fn manager(parallel_traces: usize, colored: bool, transport: MockPacketTransport) -> Manager {
        let known = (1..=3).map(|n| (dpid(n), color(n))).collect::<HashMap<_, _>>();
        let mut directory = MockDirectory::new();
        let switches = known.clone();
        directory
            .expect_get_switch()
            .returning(move |dpid| switches.get(dpid).map(|_| SwitchHandle::new(dpid.clone())));
        let mut colors = MockColorService::new();
        colors
            .expect_get_marker()
            .returning(move |dpid| known.get(dpid).copied().filter(|_| colored));
        let network = Network::new(Arc::new(directory), Arc::new(colors), Arc::new(transport));
        let config = ManagerConfig {
            parallel_traces,
            trace_interval: Duration::from_millis(10),
            probe_timeout: Duration::from_millis(20),
            ..ManagerConfig::default()
        };
        Manager::new(config, network)
    }

    fn wait_complete(manager: &Manager, request_id: RequestId) -> Arc<TraceResult> {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if let Lookup::Complete(result) = manager.lookup_id(request_id) {
                return result;
            }
            thread::sleep(Duration::from_millis(5));
        }
        panic!("trace {request_id} did not complete");
    }

    fn last_msg(result: &TraceResult) -> Option<&str> {
        match result.last() {
            Some(TraceStep::Last { msg, .. }) => Some(msg.as_str()),
            _ => None,
        }
    }

    #[test]
    fn test_request_ids_increase_from_base() {
        let manager = manager(10, true, silent());
        let ids = (0..3)
            .map(|_| {
                let flow = manager.validate(&request(1, 0.02)).unwrap();
                manager.submit(flow).unwrap()
            })
            .collect::<Vec<_>>();
        assert_eq!(vec![RequestId(30001), RequestId(30002), RequestId(30003)], ids);
        let stats = manager.stats();
        assert_eq!(3, stats.number_of_requests);
        assert_eq!(3, stats.number_of_pending_traces);
        assert_eq!(0, stats.number_of_running_traces);
        assert!(stats.results.is_empty());
    }

    #[test]
    fn test_duplicate_requests() {
        let manager = manager(10, true, silent());
        let flow = manager.validate(&request(1, 0.02)).unwrap();
        assert!(!manager.is_duplicate(&flow));
        manager.submit(flow.clone()).unwrap();
        assert!(manager.is_duplicate(&flow));
        let other = manager.validate(&request(2, 0.02)).unwrap();
        assert!(!manager.is_duplicate(&other));
        assert_eq!(
            Err(AdmissionError::Duplicate),
            manager.new_trace(&request(1, 0.02))
        );
        assert_eq!(Ok(RequestId(30002)), manager.new_trace(&request(2, 0.02)));
    }

    #[test]
    fn test_duplicate_of_running_trace() {
        let manager = manager(10, true, silent());
        let request_id = manager.new_trace(&request(1, 5.0)).unwrap();
        assert_eq!(1, manager.dispatch_pending().unwrap());
        assert_eq!(Lookup::Running, manager.lookup_id(request_id));
        let flow = manager.validate(&request(1, 5.0)).unwrap();
        assert!(manager.is_duplicate(&flow));
        assert_eq!(
            Err(AdmissionError::Duplicate),
            manager.new_trace(&request(1, 5.0))
        );
        assert_eq!(1, manager.stats().number_of_requests);
        manager.stop();
        wait_complete(&manager, request_id);
    }

    #[test]
    fn test_duplicate_accepted_after_completion() {
        let manager = manager(10, true, silent());
        let first = manager.new_trace(&request(1, 0.02)).unwrap();
        assert_eq!(1, manager.dispatch_pending().unwrap());
        wait_complete(&manager, first);
        let flow = manager.validate(&request(1, 0.02)).unwrap();
        assert!(!manager.is_duplicate(&flow));
        assert_eq!(Ok(RequestId(30002)), manager.new_trace(&request(1, 0.02)));
        assert_eq!(Lookup::Pending, manager.lookup("30002"));
    }

    #[test]
    fn test_admission_errors() {
        let manager = manager(10, true, silent());
        assert_eq!(
            Err(AdmissionError::UnknownSwitch),
            manager.new_trace(&request(9, 0.02))
        );
        assert_eq!(
            Err(AdmissionError::Invalid(ValidationError::TraceMissing)),
            manager.new_trace(&json!({}))
        );
        let uncolored = self::manager(10, false, silent());
        assert_eq!(
            Err(AdmissionError::NotColored),
            uncolored.new_trace(&request(1, 0.02))
        );
        assert_eq!(0, manager.stats().number_of_requests);
    }

    #[test]
    fn test_lookup_states() {
        let manager = manager(10, true, silent());
        assert_eq!(Lookup::Unknown, manager.lookup("abc"));
        assert_eq!(Lookup::Unknown, manager.lookup("30001"));
        let request_id = manager.new_trace(&request(1, 0.02)).unwrap();
        assert_eq!(Lookup::Pending, manager.lookup("30001"));
        assert_eq!(1, manager.dispatch_pending().unwrap());
        assert!(matches!(
            manager.lookup_id(request_id),
            Lookup::Running | Lookup::Complete(_)
        ));
        let result = wait_complete(&manager, request_id);
        assert_eq!(request_id, result.request_id);
        assert_eq!(2, result.result.len());
        assert_eq!(Some("none"), last_msg(&result));
        assert_eq!(request(1, 0.02), result.request);
        assert_eq!(vec![result], manager.results());
    }

    #[test]
    fn test_limit_traces_reached() {
        let manager = manager(2, true, silent());
        let ids = (1..=3)
            .map(|n| manager.new_trace(&request(n, 0.02)).unwrap())
            .collect::<Vec<_>>();
        assert!(!manager.limit_traces_reached());
        assert_eq!(2, manager.dispatch_pending().unwrap());
        assert!(manager.limit_traces_reached());
        assert_eq!(0, manager.dispatch_pending().unwrap());
        assert_eq!(Lookup::Pending, manager.lookup_id(ids[2]));
        wait_complete(&manager, ids[0]);
        wait_complete(&manager, ids[1]);
        assert!(!manager.limit_traces_reached());
        assert_eq!(1, manager.dispatch_pending().unwrap());
        wait_complete(&manager, ids[2]);
    }

    #[test]
    fn test_stop_cancels_work() {
        let manager = manager(1, true, silent());
        let running = manager.new_trace(&request(1, 5.0)).unwrap();
        let pending = manager.new_trace(&request(2, 5.0)).unwrap();
        assert_eq!(1, manager.dispatch_pending().unwrap());
        let started = Instant::now();
        manager.stop();
        manager.stop();
        assert!(manager.is_stopped());
        let result = wait_complete(&manager, pending);
        assert_eq!(Some("trace cancelled"), last_msg(&result));
        let result = wait_complete(&manager, running);
        assert_eq!(Some("trace cancelled"), last_msg(&result));
        assert!(started.elapsed() < Duration::from_secs(5));
        let flow = manager.validate(&request(3, 0.02)).unwrap();
        assert_eq!(None, manager.submit(flow));
        assert_eq!(
            Err(AdmissionError::Stopped),
            manager.new_trace(&request(3, 0.02))
        );
        assert_eq!(0, manager.dispatch_pending().unwrap());
    }

    #[test]
    fn test_route_echo_drops_unmatched() {
        let manager = manager(10, true, silent());
        let flow = manager.validate(&request(1, 0.02)).unwrap();
        let event = |frame: Vec<u8>| PacketIn {
            dpid: dpid(2),
            in_port: PortNo(2),
            frame,
        };
        assert!(!manager.route_echo(event(vec![0_u8; 64])));
        let msg = TraceMsg::new(RequestId(30001), Step(0));
        let (_, frame) = build_probe(&flow, &color(1), &msg);
        assert!(!manager.route_echo(event(frame.clone())));
        assert!(!manager.handle_packet_in(event(frame)));
        let foreign = Color::new(ColorField::DlSrc, MacAddr([1; 6]));
        let (_, uncolored) = build_probe(&flow, &foreign, &msg);
        assert!(!manager.handle_packet_in(event(uncolored)));
    }

    #[test]
    fn test_settings() {
        let settings = manager(4, true, silent()).settings();
        assert_eq!(4, settings.parallel_traces);
        assert_eq!(ColorField::DlSrc, settings.color_field);
        assert_eq!("ee:ee:ee:ee:ee:", settings.color_value);
        assert_eq!(Duration::from_millis(10), settings.trace_interval);
    }

    #[test]
    fn test_end_to_end_single_hop() -> anyhow::Result<()> {
        let (packet_in_tx, packet_in_rx) = unbounded();
        let mut transport = MockPacketTransport::new();
        transport
            .expect_send_probe()
            .returning(move |switch, _, frame| {
                if switch.dpid == dpid(1) {
                    packet_in_tx
                        .send(PacketIn {
                            dpid: dpid(3),
                            in_port: PortNo(3),
                            frame: frame.to_vec(),
                        })
                        .unwrap();
                }
                Ok(())
            });
        let (manager, handle) = manager(10, true, transport).spawn()?;
        let forwarder = thread::spawn({
            let manager = manager.clone();
            move || loop {
                match packet_in_rx.recv_timeout(Duration::from_millis(10)) {
                    Ok(event) => {
                        manager.handle_packet_in(event);
                    }
                    Err(RecvTimeoutError::Timeout) if !manager.is_stopped() => {}
                    Err(_) => break,
                }
            }
        });
        let mut trace = request(1, 0.02);
        trace["trace"]["eth"] = json!({"dl_vlan": 100});
        let request_id = manager.new_trace(&trace)?;
        let result = wait_complete(&manager, request_id);
        manager.stop();
        handle.join().unwrap();
        forwarder.join().unwrap();
        assert_eq!(3, result.result.len());
        assert_eq!(Some((&dpid(1), PortNo(1))), result.result[0].location());
        assert!(matches!(result.result[0], TraceStep::Starting { .. }));
        assert_eq!(Some((&dpid(3), PortNo(3))), result.result[1].location());
        assert!(matches!(result.result[1], TraceStep::Trace { .. }));
        assert!(matches!(
            result.result[2],
            TraceStep::Last { reason: LastReason::Done, .. }
        ));
        Ok(())
    }
}
