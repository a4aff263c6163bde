use crate::constants::{CANCELLED_MSG, LAST_STEP_MSG};
use crate::flow::FlowDescriptor;
use crate::net::{Network, PacketIn, SwitchHandle, Unresolved};
use crate::probe::{build_probe, vlan_of, Color, TraceMsg};
use crate::trace::{LastReason, TraceLog, TraceResult};
use crate::types::{PortNo, RequestId, Step};
use crossbeam::channel::{at, never, select, Receiver};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::instrument;

/// A probe observed at the controller, routed to the tracer which sent it.
#[derive(Debug, Clone)]
pub(crate) struct Echo {
    pub msg: TraceMsg,
    pub event: PacketIn,
}

/// Where a tracer delivers its result.
#[cfg_attr(test, mockall::automock)]
pub(crate) trait TraceSink: Send + Sync {
    /// Store the result of a finished trace and release its echo route.
    fn complete(&self, request_id: RequestId, result: TraceResult);
}

/// The channels a tracer waits on.
#[derive(Debug, Clone)]
pub(crate) struct TracerChannels {
    /// Echoes routed to this tracer, disconnected when the route is released.
    pub echoes: Receiver<Echo>,
    /// Disconnected when the manager is stopped.
    pub shutdown: Receiver<()>,
    /// Set when the manager asks this tracer to end.
    pub ended: Arc<AtomicBool>,
}

/// The outcome of sending one probe.
#[derive(Debug)]
enum ProbeOutcome {
    Echo(PacketIn),
    TimedOut,
    Cancelled,
}

/// Traces the path of a single request, one hop at a time.
pub(crate) struct Tracer {
    request_id: RequestId,
    flow: FlowDescriptor,
    network: Network,
    channels: TracerChannels,
    sink: Arc<dyn TraceSink>,
    max_attempts: usize,
    step: Step,
}

impl Tracer {
    /// Create a tracer for `flow`.
    ///
    /// The tracer works on its own copy of the flow.
    pub(crate) fn new(
        request_id: RequestId,
        flow: &FlowDescriptor,
        network: Network,
        channels: TracerChannels,
        sink: Arc<dyn TraceSink>,
        max_attempts: usize,
    ) -> Self {
        Self {
            request_id,
            flow: flow.clone(),
            network,
            channels,
            sink,
            max_attempts,
            step: Step(0),
        }
    }

    /// Trace the path and hand the result to the sink.
    #[instrument(skip(self), fields(request_id = %self.request_id), level = "trace")]
    pub(crate) fn tracepath(mut self) {
        let request = self.flow.request().clone();
        let mut log = TraceLog::start(self.flow.dpid().clone(), self.flow.in_port());
        tracing::debug!(dpid = %self.flow.dpid(), in_port = %self.flow.in_port(), "trace starting");
        match self.network.resolve(self.flow.dpid()) {
            Ok((switch, color)) => self.tracepath_loop(&mut log, switch, color),
            Err(err) => {
                tracing::warn!(%err, "trace cannot start");
                log.finish(LastReason::Done, err.to_string());
            }
        }
        let result = log.into_result(self.request_id, request);
        tracing::info!(steps = result.result.len(), "trace completed");
        self.sink.complete(self.request_id, result);
    }

    fn tracepath_loop(&mut self, log: &mut TraceLog, mut switch: SwitchHandle, mut color: Color) {
        loop {
            let msg = TraceMsg::new(self.request_id, self.step);
            let (port, frame) = build_probe(&self.flow, &color, &msg);
            let outcome = self.send_trace_probe(&switch, port, &frame);
            self.step += Step(1);
            match outcome {
                ProbeOutcome::TimedOut => {
                    log.finish(LastReason::Done, LAST_STEP_MSG);
                    return;
                }
                ProbeOutcome::Cancelled => {
                    tracing::debug!("trace cancelled");
                    log.finish(LastReason::Done, CANCELLED_MSG);
                    return;
                }
                ProbeOutcome::Echo(event) => {
                    log.push_hop(event.dpid.clone(), event.in_port);
                    if log.has_loop() {
                        tracing::debug!(dpid = %event.dpid, in_port = %event.in_port, "loop detected");
                        log.finish(LastReason::Loop, LAST_STEP_MSG);
                        return;
                    }
                    match self.prepare_next_packet(&event) {
                        Ok((next_switch, next_color)) => {
                            switch = next_switch;
                            color = next_color;
                        }
                        Err(err) => {
                            tracing::warn!(%err, "trace cannot continue");
                            log.finish(LastReason::Done, err.to_string());
                            return;
                        }
                    }
                }
            }
        }
    }

    /// Send a probe and wait for its echo, retrying up to the attempt limit.
    ///
    /// A failed send uses up an attempt but the wait still runs so that the
    /// retry cadence does not change.
    #[instrument(skip(self, frame), fields(step = %self.step), level = "trace")]
    fn send_trace_probe(
        &self,
        switch: &SwitchHandle,
        port: PortNo,
        frame: &[u8],
    ) -> ProbeOutcome {
        for attempt in 1..=self.max_attempts {
            if self.is_ended() {
                return ProbeOutcome::Cancelled;
            }
            tracing::debug!(dpid = %switch.dpid, %port, attempt, "sending probe");
            if let Err(err) = self.network.transport.send_probe(switch, port, frame) {
                tracing::warn!(%err, attempt, "probe send failed");
            }
            match self.wait_for_echo(self.flow.timeout()) {
                ProbeOutcome::TimedOut => continue,
                outcome => return outcome,
            }
        }
        ProbeOutcome::TimedOut
    }

    /// Wait for an echo carrying the current step.
    ///
    /// Echoes for other steps are discarded without extending the deadline.
    fn wait_for_echo(&self, timeout: Duration) -> ProbeOutcome {
        let deadline = Instant::now().checked_add(timeout).map_or_else(never, at);
        loop {
            select! {
                recv(self.channels.echoes) -> echo => match echo {
                    Ok(echo) if self.is_current(&echo.msg) => {
                        let PacketIn { dpid, in_port, .. } = &echo.event;
                        tracing::debug!(%dpid, %in_port, "echo matched");
                        return ProbeOutcome::Echo(echo.event);
                    }
                    Ok(echo) => {
                        tracing::trace!(step = %echo.msg.step, "stale echo discarded");
                    }
                    Err(_) => return ProbeOutcome::Cancelled,
                },
                recv(self.channels.shutdown) -> _ => return ProbeOutcome::Cancelled,
                recv(deadline) -> _ => return ProbeOutcome::TimedOut,
            }
        }
    }

    /// Move the working flow to the switch and port an echo arrived on.
    ///
    /// The VLAN of the echoed frame replaces the flow VLAN, following any
    /// rewrite performed along the path.
    fn prepare_next_packet(
        &mut self,
        event: &PacketIn,
    ) -> Result<(SwitchHandle, Color), Unresolved> {
        let vlan = vlan_of(&event.frame);
        self.flow.rewrite_hop(event.dpid.clone(), event.in_port, vlan);
        self.network.resolve(&event.dpid)
    }

    fn is_current(&self, msg: &TraceMsg) -> bool {
        msg.request_id == self.request_id && msg.step == self.step
    }

    fn is_ended(&self) -> bool {
        self.channels.ended.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ColorField;
    use crate::net::{MockColorService, MockDirectory, MockPacketTransport};
    use crate::probe::decode_trace_msg;
    use crate::trace::TraceStep;
    use crate::types::Dpid;
    use crossbeam::channel::{bounded, unbounded, Sender};
    use sdntrace_packet::ethernet::MacAddr;
    use serde_json::json;
    use std::collections::HashMap;
    use std::time::Duration;

    const TIMEOUT: Duration = Duration::from_millis(20);

    fn dpid(n: u8) -> Dpid {
        Dpid(format!("00:00:00:00:00:00:00:{n:02x}"))
    }

    fn color(n: u8) -> Color {
        Color::new(ColorField::DlSrc, MacAddr([0xee, 0xee, 0xee, 0xee, 0xee, n]))
    }

    fn flow(dl_vlan: Option<u16>) -> FlowDescriptor {
        let mut trace = json!({
            "trace": {
                "switch": {"dpid": "00:00:00:00:00:00:00:01", "in_port": 1},
                "timeout": TIMEOUT.as_secs_f64()
            }
        });
        if let Some(vlan) = dl_vlan {
            trace["trace"]["eth"] = json!({"dl_vlan": vlan});
        }
        FlowDescriptor::from_request(&trace, TIMEOUT).unwrap()
    }

    /// A directory and color service knowing switches `1..=count`.
    fn lookups(count: u8) -> (MockDirectory, MockColorService) {
        let known = (1..=count).map(|n| (dpid(n), color(n))).collect::<HashMap<_, _>>();
        let mut directory = MockDirectory::new();
        let switches = known.clone();
        directory
            .expect_get_switch()
            .returning(move |dpid| switches.get(dpid).map(|_| SwitchHandle::new(dpid.clone())));
        let mut colors = MockColorService::new();
        colors
            .expect_get_marker()
            .returning(move |dpid| known.get(dpid).copied());
        (directory, colors)
    }

    fn channels() -> (Sender<Echo>, Sender<()>, TracerChannels) {
        let (echo_tx, echoes) = unbounded();
        let (shutdown_tx, shutdown) = bounded(0);
        let channels = TracerChannels {
            echoes,
            shutdown,
            ended: Arc::new(AtomicBool::new(false)),
        };
        (echo_tx, shutdown_tx, channels)
    }

    fn sink() -> (MockTraceSink, Receiver<TraceResult>) {
        let (tx, rx) = unbounded();
        let mut sink = MockTraceSink::new();
        sink.expect_complete()
            .times(1)
            .withf(|id, _| *id == RequestId(30001))
            .returning(move |_, result| tx.send(result).unwrap());
        (sink, rx)
    }

    fn run(
        flow: &FlowDescriptor,
        directory: MockDirectory,
        colors: MockColorService,
        transport: MockPacketTransport,
        channels: TracerChannels,
    ) -> TraceResult {
        let (sink, results) = sink();
        let network = Network::new(Arc::new(directory), Arc::new(colors), Arc::new(transport));
        let tracer = Tracer::new(RequestId(30001), flow, network, channels, Arc::new(sink), 3);
        tracer.tracepath();
        results.try_recv().unwrap()
    }

    fn echo(frame: &[u8], hop: u8) -> Echo {
        Echo {
            msg: decode_trace_msg(frame).unwrap(),
            event: PacketIn {
                dpid: dpid(hop),
                in_port: PortNo(u64::from(hop)),
                frame: frame.to_vec(),
            },
        }
    }

    #[test]
    fn test_single_hop_then_timeout() {
        let (directory, colors) = lookups(3);
        let (echo_tx, _shutdown_tx, channels) = channels();
        let mut transport = MockPacketTransport::new();
        transport
            .expect_send_probe()
            .returning(move |switch, port, frame| {
                if switch.dpid == dpid(1) && port == PortNo(1) {
                    echo_tx.send(echo(frame, 3)).unwrap();
                }
                Ok(())
            });
        let result = run(&flow(Some(100)), directory, colors, transport, channels);
        assert_eq!(3, result.result.len());
        assert_eq!(Some((&dpid(1), PortNo(1))), result.result[0].location());
        assert!(matches!(result.result[0], TraceStep::Starting { .. }));
        assert!(matches!(&result.result[1], TraceStep::Trace { dpid: d, port: PortNo(3), .. } if *d == dpid(3)));
        assert!(matches!(
            &result.result[2],
            TraceStep::Last { reason: LastReason::Done, msg, .. } if msg == "none"
        ));
        assert!(result.total_time >= TIMEOUT * 3);
    }

    #[test]
    fn test_timeout_after_three_attempts() {
        let (directory, colors) = lookups(1);
        let (_echo_tx, _shutdown_tx, channels) = channels();
        let mut transport = MockPacketTransport::new();
        transport.expect_send_probe().times(3).returning(|_, _, _| Ok(()));
        let result = run(&flow(None), directory, colors, transport, channels);
        assert_eq!(2, result.result.len());
        assert!(matches!(
            result.result[1],
            TraceStep::Last { reason: LastReason::Done, .. }
        ));
        assert!(result.total_time >= TIMEOUT * 3);
    }

    #[test]
    fn test_stale_echo_is_ignored() {
        let (directory, colors) = lookups(2);
        let (echo_tx, _shutdown_tx, channels) = channels();
        let mut transport = MockPacketTransport::new();
        transport
            .expect_send_probe()
            .returning(move |switch, _, frame| {
                if switch.dpid == dpid(1) {
                    let mut stale = echo(frame, 2);
                    stale.msg.step = Step(7);
                    echo_tx.send(stale).unwrap();
                }
                Ok(())
            });
        let result = run(&flow(None), directory, colors, transport, channels);
        assert_eq!(2, result.result.len());
        assert!(result.result[1].is_last());
    }

    #[test]
    fn test_send_failure_uses_attempt() {
        let (directory, colors) = lookups(1);
        let (_echo_tx, _shutdown_tx, channels) = channels();
        let mut transport = MockPacketTransport::new();
        transport
            .expect_send_probe()
            .times(3)
            .returning(|_, _, _| Err(crate::Error::SendFailed(String::from("link down"))));
        let result = run(&flow(None), directory, colors, transport, channels);
        assert_eq!(2, result.result.len());
        assert!(result.result[1].is_last());
    }

    #[test]
    fn test_loop_detected() {
        let (directory, colors) = lookups(3);
        let (echo_tx, _shutdown_tx, channels) = channels();
        let mut transport = MockPacketTransport::new();
        // 1 -> 2 -> 3 -> 2
        transport
            .expect_send_probe()
            .times(3)
            .returning(move |switch, _, frame| {
                let next = if switch.dpid == dpid(2) { 3 } else { 2 };
                echo_tx.send(echo(frame, next)).unwrap();
                Ok(())
            });
        let result = run(&flow(None), directory, colors, transport, channels);
        let hops = result
            .result
            .iter()
            .filter(|step| matches!(step, TraceStep::Trace { .. }))
            .count();
        assert_eq!(3, hops);
        assert!(matches!(
            result.last(),
            Some(TraceStep::Last { reason: LastReason::Loop, .. })
        ));
    }

    #[test]
    fn test_vlan_follows_echo() {
        let (directory, colors) = lookups(2);
        let (echo_tx, _shutdown_tx, channels) = channels();
        let (vlan_tx, vlans) = unbounded();
        let mut transport = MockPacketTransport::new();
        transport
            .expect_send_probe()
            .returning(move |switch, _, frame| {
                vlan_tx.send(vlan_of(frame)).unwrap();
                if switch.dpid == dpid(1) {
                    // switch 1 rewrites vlan 100 to 200
                    let mut rewritten = frame.to_vec();
                    rewritten[14..16].copy_from_slice(&200_u16.to_be_bytes());
                    echo_tx.send(echo(&rewritten, 2)).unwrap();
                }
                Ok(())
            });
        run(&flow(Some(100)), directory, colors, transport, channels);
        assert_eq!(Some(100), vlans.recv().unwrap());
        assert_eq!(Some(200), vlans.recv().unwrap());
    }

    #[test]
    fn test_unknown_next_switch() {
        let (directory, colors) = lookups(1);
        let (echo_tx, _shutdown_tx, channels) = channels();
        let mut transport = MockPacketTransport::new();
        transport
            .expect_send_probe()
            .times(1)
            .returning(move |_, _, frame| {
                echo_tx.send(echo(frame, 9)).unwrap();
                Ok(())
            });
        let result = run(&flow(None), directory, colors, transport, channels);
        assert_eq!(3, result.result.len());
        assert!(matches!(
            result.last(),
            Some(TraceStep::Last { reason: LastReason::Done, msg, .. }) if msg == "unknown switch 00:00:00:00:00:00:00:09"
        ));
    }

    #[test]
    fn test_ended_before_send() {
        let (directory, colors) = lookups(1);
        let (_echo_tx, _shutdown_tx, channels) = channels();
        channels.ended.store(true, Ordering::Release);
        let mut transport = MockPacketTransport::new();
        transport.expect_send_probe().never();
        let result = run(&flow(None), directory, colors, transport, channels);
        assert!(matches!(
            result.last(),
            Some(TraceStep::Last { reason: LastReason::Done, msg, .. }) if msg == "trace cancelled"
        ));
    }

    #[test]
    fn test_shutdown_interrupts_wait() {
        let (directory, colors) = lookups(1);
        let (_echo_tx, shutdown_tx, channels) = channels();
        drop(shutdown_tx);
        let mut transport = MockPacketTransport::new();
        transport.expect_send_probe().times(1).returning(|_, _, _| Ok(()));
        let result = run(&flow(None), directory, colors, transport, channels);
        assert!(matches!(
            result.last(),
            Some(TraceStep::Last { msg, .. }) if msg == "trace cancelled"
        ));
    }
}
