use crate::config::serialize_duration;
use crate::constants::LAST_STEP_MSG;
use crate::types::{Dpid, PortNo, RequestId};
use chrono::{DateTime, Utc};
use itertools::Itertools;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Why a trace ended.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LastReason {
    /// No further hop was observed, or the trace could not continue.
    Done,
    /// The last hop revisited an earlier hop.
    Loop,
}

/// A single entry of a trace result.
#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TraceStep {
    /// The switch and port the trace began at.
    Starting {
        dpid: Dpid,
        port: PortNo,
        time: DateTime<Utc>,
    },
    /// A hop observed by the probe, `time` is relative to the start of the trace.
    Trace {
        dpid: Dpid,
        port: PortNo,
        #[serde(serialize_with = "serialize_duration")]
        time: Duration,
    },
    /// The final entry of every trace.
    Last {
        reason: LastReason,
        msg: String,
        #[serde(serialize_with = "serialize_duration")]
        time: Duration,
    },
}

impl TraceStep {
    /// The switch and port of a `starting` or `trace` step.
    #[must_use]
    pub const fn location(&self) -> Option<(&Dpid, PortNo)> {
        match self {
            Self::Starting { dpid, port, .. } | Self::Trace { dpid, port, .. } => {
                Some((dpid, *port))
            }
            Self::Last { .. } => None,
        }
    }

    #[must_use]
    pub const fn is_last(&self) -> bool {
        matches!(self, Self::Last { .. })
    }
}

/// The ordered steps of an in-progress trace.
///
/// A log always begins with a single `starting` step and, once finished,
/// ends with a single `last` step. Nothing may be appended after `last`.
#[derive(Debug, Clone)]
pub struct TraceLog {
    steps: Vec<TraceStep>,
    started: Instant,
    start_time: DateTime<Utc>,
}

impl TraceLog {
    /// Begin a log at the given switch and port.
    #[must_use]
    pub fn start(dpid: Dpid, port: PortNo) -> Self {
        let start_time = Utc::now();
        Self {
            steps: vec![TraceStep::Starting {
                dpid,
                port,
                time: start_time,
            }],
            started: Instant::now(),
            start_time,
        }
    }

    /// Record an observed hop.
    ///
    /// Ignored once the log is finished.
    pub fn push_hop(&mut self, dpid: Dpid, port: PortNo) {
        if self.is_finished() {
            return;
        }
        let time = self.started.elapsed();
        self.steps.push(TraceStep::Trace { dpid, port, time });
    }

    /// Close the log with a `last` step.
    ///
    /// Only the first call has any effect.
    pub fn finish(&mut self, reason: LastReason, msg: impl Into<String>) {
        if self.is_finished() {
            return;
        }
        let time = self.started.elapsed();
        self.steps.push(TraceStep::Last {
            reason,
            msg: msg.into(),
            time,
        });
    }

    /// Close the log because no further hop was found.
    pub fn finish_done(&mut self) {
        self.finish(LastReason::Done, LAST_STEP_MSG);
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.steps.last().is_some_and(TraceStep::is_last)
    }

    /// The `trace` steps recorded so far.
    pub fn hops(&self) -> impl Iterator<Item = (&Dpid, PortNo)> + '_ {
        self.steps.iter().filter_map(|step| match step {
            TraceStep::Trace { dpid, port, .. } => Some((dpid, *port)),
            _ => None,
        })
    }

    /// True if the most recent `trace` step repeats an earlier `trace` step.
    ///
    /// The `starting` step does not take part in the comparison.
    #[must_use]
    pub fn has_loop(&self) -> bool {
        let hops = self.hops().collect_vec();
        match hops.split_last() {
            Some((last, earlier)) => earlier.contains(last),
            None => false,
        }
    }

    #[must_use]
    pub fn steps(&self) -> &[TraceStep] {
        &self.steps
    }

    /// Convert the log into a result.
    #[must_use]
    pub fn into_result(mut self, request_id: RequestId, request: Value) -> TraceResult {
        self.finish_done();
        let total_time = self.started.elapsed();
        TraceResult {
            request_id,
            result: self.steps,
            start_time: self.start_time,
            total_time,
            request,
        }
    }
}

/// The outcome of a completed trace.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TraceResult {
    pub request_id: RequestId,
    pub result: Vec<TraceStep>,
    pub start_time: DateTime<Utc>,
    #[serde(serialize_with = "serialize_duration")]
    pub total_time: Duration,
    pub request: Value,
}

impl TraceResult {
    /// The final step of the trace.
    #[must_use]
    pub fn last(&self) -> Option<&TraceStep> {
        self.result.last()
    }
}

/// The state of a trace as seen by a requester.
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup {
    Complete(Arc<TraceResult>),
    Running,
    Pending,
    Unknown,
}

impl Serialize for Lookup {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Complete(result) => result.serialize(serializer),
            Self::Running => serialize_msg(serializer, "trace in process"),
            Self::Pending => serialize_msg(serializer, "trace pending"),
            Self::Unknown => serialize_msg(serializer, "unknown trace id"),
        }
    }
}

fn serialize_msg<S: Serializer>(serializer: S, msg: &str) -> Result<S::Ok, S::Error> {
    let mut map = serializer.serialize_map(Some(1))?;
    map.serialize_entry("msg", msg)?;
    map.end()
}

/// Counters and completed results of a [`crate::Manager`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Stats {
    pub number_of_requests: u64,
    pub number_of_running_traces: usize,
    pub number_of_pending_traces: usize,
    pub results: Vec<Arc<TraceResult>>,
}
