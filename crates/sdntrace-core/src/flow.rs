use crate::constants::{DEFAULT_DL_DST, DEFAULT_DL_TYPE, DEFAULT_NW_DST, DEFAULT_NW_SRC};
use crate::error::{Field, ValidationError};
use crate::types::{Dpid, PortNo};
use sdntrace_packet::ethernet::MacAddr;
use serde_json::{Map, Value};
use std::net::Ipv4Addr;
use std::time::Duration;

type Result<T> = std::result::Result<T, ValidationError>;

/// A validated trace request.
///
/// Built from the untyped request with [`FlowDescriptor::from_request`]. Every
/// field other than the switch id and ingress port falls back to a default.
/// The original request is retained unchanged for duplicate detection and
/// for echoing back in the [`crate::TraceResult`].
///
/// Only the tracer rewrites the switch id, ingress port and VLAN of its own
/// working copy as it follows the path.
#[derive(Debug, Clone, PartialEq)]
pub struct FlowDescriptor {
    dpid: Dpid,
    in_port: PortNo,
    dl_src: Option<MacAddr>,
    dl_dst: MacAddr,
    dl_vlan: Option<u16>,
    dl_vlan_pcp: u8,
    dl_type: u16,
    nw_src: Ipv4Addr,
    nw_dst: Ipv4Addr,
    nw_tos: u8,
    nw_proto: u16,
    tp_src: u16,
    tp_dst: u16,
    timeout: Duration,
    request: Value,
}

impl FlowDescriptor {
    /// Validate a raw trace request.
    ///
    /// The request is of the form:
    ///
    /// ```json
    /// {
    ///   "trace": {
    ///     "switch": { "dpid": "00:00:00:00:00:00:00:01", "in_port": 1 },
    ///     "eth": { "dl_vlan": 100 },
    ///     "ip": { "nw_proto": 17 },
    ///     "tp": { "tp_dst": 53 },
    ///     "timeout": 0.5
    ///   }
    /// }
    /// ```
    ///
    /// Validation stops at the first invalid entry. Unknown keys are ignored.
    /// `default_timeout` is the per-hop echo timeout used when the request does
    /// not supply `trace.timeout`.
    pub fn from_request(request: &Value, default_timeout: Duration) -> Result<Self> {
        let trace = match request.get("trace") {
            None => return Err(ValidationError::TraceMissing),
            Some(Value::Object(trace)) => trace,
            Some(_) => return Err(ValidationError::TraceNotDict),
        };
        let switch = match trace.get("switch") {
            None => return Err(ValidationError::SwitchMissing),
            Some(Value::Object(switch)) => switch,
            Some(_) => return Err(ValidationError::SwitchNotDict),
        };
        let mut flow = Self::blank(default_timeout);
        flow.set_dpid(
            switch
                .get("dpid")
                .ok_or(ValidationError::Missing(Field::Dpid))?,
        )?;
        flow.set_in_port(
            switch
                .get("in_port")
                .ok_or(ValidationError::Missing(Field::InPort))?,
        )?;
        if let Some(eth) = section(trace, "eth")? {
            apply(eth, "dl_vlan", |v| flow.set_dl_vlan(v))?;
            apply(eth, "dl_src", |v| flow.set_dl_src(v))?;
            apply(eth, "dl_dst", |v| flow.set_dl_dst(v))?;
            apply(eth, "dl_vlan_pcp", |v| flow.set_dl_vlan_pcp(v))?;
            apply(eth, "dl_type", |v| flow.set_dl_type(v))?;
        }
        if let Some(ip) = section(trace, "ip")? {
            apply(ip, "nw_src", |v| flow.set_nw_src(v))?;
            apply(ip, "nw_dst", |v| flow.set_nw_dst(v))?;
            apply(ip, "nw_tos", |v| flow.set_nw_tos(v))?;
            if let Some(nw_proto) = ip.get("nw_proto") {
                flow.set_nw_proto(nw_proto)?;
                if !trace.contains_key("tp") {
                    return Err(ValidationError::TransportMissing);
                }
            }
        }
        if let Some(tp) = section(trace, "tp")? {
            apply(tp, "tp_src", |v| flow.set_tp_src(v))?;
            apply(tp, "tp_dst", |v| flow.set_tp_dst(v))?;
        }
        apply(trace, "timeout", |v| flow.set_timeout(v))?;
        flow.request = request.clone();
        Ok(flow)
    }

    fn blank(timeout: Duration) -> Self {
        Self {
            dpid: Dpid::default(),
            in_port: PortNo::default(),
            dl_src: None,
            dl_dst: DEFAULT_DL_DST,
            dl_vlan: None,
            dl_vlan_pcp: 0,
            dl_type: DEFAULT_DL_TYPE,
            nw_src: DEFAULT_NW_SRC,
            nw_dst: DEFAULT_NW_DST,
            nw_tos: 0,
            nw_proto: 0,
            tp_src: 0,
            tp_dst: 0,
            timeout,
            request: Value::Null,
        }
    }

    /// Accepts `1`-`16` hex digits or eight `:` / `-` separated hex octets.
    pub fn set_dpid(&mut self, value: &Value) -> Result<()> {
        let dpid = string(Field::Dpid, value)?;
        let valid = match dpid.len() {
            1..=16 => dpid.bytes().all(|b| b.is_ascii_hexdigit()),
            23 => is_separated_octets(dpid, 8),
            _ => false,
        };
        if !valid {
            return Err(ValidationError::BadFormat(Field::Dpid));
        }
        self.dpid = Dpid(dpid.to_string());
        Ok(())
    }

    pub fn set_in_port(&mut self, value: &Value) -> Result<()> {
        let in_port = integer(Field::InPort, value)?;
        if in_port == 0 {
            return Err(ValidationError::OutOfRange(Field::InPort));
        }
        self.in_port = PortNo(in_port);
        Ok(())
    }

    pub fn set_dl_src(&mut self, value: &Value) -> Result<()> {
        self.dl_src = Some(mac(Field::DlSrc, value)?);
        Ok(())
    }

    pub fn set_dl_dst(&mut self, value: &Value) -> Result<()> {
        self.dl_dst = mac(Field::DlDst, value)?;
        Ok(())
    }

    pub fn set_dl_vlan(&mut self, value: &Value) -> Result<()> {
        self.dl_vlan = Some(bounded(Field::DlVlan, value, 4095)? as u16);
        Ok(())
    }

    pub fn set_dl_vlan_pcp(&mut self, value: &Value) -> Result<()> {
        self.dl_vlan_pcp = bounded(Field::DlVlanPcp, value, 7)? as u8;
        Ok(())
    }

    pub fn set_dl_type(&mut self, value: &Value) -> Result<()> {
        self.dl_type = bounded(Field::DlType, value, 65535)? as u16;
        Ok(())
    }

    pub fn set_nw_src(&mut self, value: &Value) -> Result<()> {
        self.nw_src = ipv4(Field::NwSrc, value)?;
        Ok(())
    }

    pub fn set_nw_dst(&mut self, value: &Value) -> Result<()> {
        self.nw_dst = ipv4(Field::NwDst, value)?;
        Ok(())
    }

    pub fn set_nw_tos(&mut self, value: &Value) -> Result<()> {
        self.nw_tos = bounded(Field::NwTos, value, 7)? as u8;
        Ok(())
    }

    pub fn set_nw_proto(&mut self, value: &Value) -> Result<()> {
        self.nw_proto = bounded(Field::NwProto, value, 65535)? as u16;
        Ok(())
    }

    pub fn set_tp_src(&mut self, value: &Value) -> Result<()> {
        self.tp_src = bounded(Field::TpSrc, value, 65535)? as u16;
        Ok(())
    }

    pub fn set_tp_dst(&mut self, value: &Value) -> Result<()> {
        self.tp_dst = bounded(Field::TpDst, value, 65535)? as u16;
        Ok(())
    }

    /// Accepts a positive number of seconds, i.e. `1` or `0.25`.
    pub fn set_timeout(&mut self, value: &Value) -> Result<()> {
        let secs = value
            .as_f64()
            .ok_or(ValidationError::NotNumber(Field::Timeout))?;
        self.timeout = Duration::try_from_secs_f64(secs)
            .ok()
            .filter(|timeout| !timeout.is_zero())
            .ok_or(ValidationError::OutOfRange(Field::Timeout))?;
        Ok(())
    }

    /// Move the flow to the next hop as observed by an echo.
    pub(crate) fn rewrite_hop(&mut self, dpid: Dpid, in_port: PortNo, dl_vlan: Option<u16>) {
        self.dpid = dpid;
        self.in_port = in_port;
        self.dl_vlan = dl_vlan;
    }

    #[must_use]
    pub const fn dpid(&self) -> &Dpid {
        &self.dpid
    }

    #[must_use]
    pub const fn in_port(&self) -> PortNo {
        self.in_port
    }

    #[must_use]
    pub const fn dl_src(&self) -> Option<MacAddr> {
        self.dl_src
    }

    #[must_use]
    pub const fn dl_dst(&self) -> MacAddr {
        self.dl_dst
    }

    #[must_use]
    pub const fn dl_vlan(&self) -> Option<u16> {
        self.dl_vlan
    }

    #[must_use]
    pub const fn dl_vlan_pcp(&self) -> u8 {
        self.dl_vlan_pcp
    }

    #[must_use]
    pub const fn dl_type(&self) -> u16 {
        self.dl_type
    }

    #[must_use]
    pub const fn nw_src(&self) -> Ipv4Addr {
        self.nw_src
    }

    #[must_use]
    pub const fn nw_dst(&self) -> Ipv4Addr {
        self.nw_dst
    }

    #[must_use]
    pub const fn nw_tos(&self) -> u8 {
        self.nw_tos
    }

    #[must_use]
    pub const fn nw_proto(&self) -> u16 {
        self.nw_proto
    }

    #[must_use]
    pub const fn tp_src(&self) -> u16 {
        self.tp_src
    }

    #[must_use]
    pub const fn tp_dst(&self) -> u16 {
        self.tp_dst
    }

    /// The per-hop echo timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// The request this flow was validated from.
    #[must_use]
    pub const fn request(&self) -> &Value {
        &self.request
    }
}

fn section<'a>(trace: &'a Map<String, Value>, name: &'static str) -> Result<Option<&'a Map<String, Value>>> {
    match trace.get(name) {
        None => Ok(None),
        Some(Value::Object(section)) => Ok(Some(section)),
        Some(_) => Err(ValidationError::SectionNotDict(name)),
    }
}

fn apply<F>(section: &Map<String, Value>, key: &str, mut setter: F) -> Result<()>
where
    F: FnMut(&Value) -> Result<()>,
{
    section.get(key).map_or(Ok(()), |value| setter(value))
}

fn string(field: Field, value: &Value) -> Result<&str> {
    value.as_str().ok_or(ValidationError::NotString(field))
}

/// A JSON integer, negative integers are out of range rather than of the wrong type.
fn integer(field: Field, value: &Value) -> Result<u64> {
    match value {
        Value::Number(n) if n.is_u64() => n.as_u64().ok_or(ValidationError::OutOfRange(field)),
        Value::Number(n) if n.is_i64() => Err(ValidationError::OutOfRange(field)),
        _ => Err(ValidationError::NotInteger(field)),
    }
}

/// An integer in `1..=max`.
fn bounded(field: Field, value: &Value, max: u64) -> Result<u64> {
    let n = integer(field, value)?;
    if (1..=max).contains(&n) {
        Ok(n)
    } else {
        Err(ValidationError::OutOfRange(field))
    }
}

fn mac(field: Field, value: &Value) -> Result<MacAddr> {
    string(field, value)?
        .parse()
        .map_err(|_| ValidationError::BadFormat(field))
}

/// A dotted quad, each octet one to three decimal digits (leading zeros allowed).
fn ipv4(field: Field, value: &Value) -> Result<Ipv4Addr> {
    let mut octets = [0_u8; 4];
    let mut parts = string(field, value)?.split('.');
    for octet in &mut octets {
        *octet = parts
            .next()
            .filter(|part| (1..=3).contains(&part.len()))
            .filter(|part| part.bytes().all(|b| b.is_ascii_digit()))
            .and_then(|part| part.parse().ok())
            .ok_or(ValidationError::BadFormat(field))?;
    }
    if parts.next().is_some() {
        return Err(ValidationError::BadFormat(field));
    }
    Ok(Ipv4Addr::from(octets))
}

/// `count` pairs of hex digits separated by `:` or `-`.
fn is_separated_octets(s: &str, count: usize) -> bool {
    let mut octets = 0;
    for octet in s.split([':', '-']) {
        if octet.len() != 2 || !octet.bytes().all(|b| b.is_ascii_hexdigit()) {
            return false;
        }
        octets += 1;
    }
    octets == count
}
