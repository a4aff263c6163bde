//! Probe frame encoding and decoding.
//!
//! A probe is an ordinary Ethernet frame (optionally 802.1Q tagged, optionally
//! carrying `IPv4` and `TCP` or `UDP`) whose innermost payload is a
//! [`TraceMsg`] correlation tag.
use crate::config::{defaults, ColorField};
use crate::constants::{PROBE_TCP_FLAGS, PROBE_TCP_WINDOW, PROBE_TTL, UNCOLORED_SOURCE_MAC};
use crate::error::{Error, Result};
use crate::flow::FlowDescriptor;
use crate::types::{PortNo, RequestId, Step};
use sdntrace_packet::checksum::{ipv4_header_checksum, tcp_ipv4_checksum, udp_ipv4_checksum};
use sdntrace_packet::ethernet::{EtherType, EthernetPacket, MacAddr, VlanPacket};
use sdntrace_packet::ipv4::Ipv4Packet;
use sdntrace_packet::tcp::TcpPacket;
use sdntrace_packet::trace_msg::{TraceMsgPacket, TRACE_MSG_MAGIC, TRACE_MSG_VERSION};
use sdntrace_packet::udp::UdpPacket;
use sdntrace_packet::IpProtocol;
use serde::Serialize;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// The scope of a trace message.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum MsgKind {
    /// A trace within this controller domain.
    Intra,
    /// Reserved for traces which cross controller domains, never produced.
    Inter,
}

impl MsgKind {
    const fn id(self) -> u8 {
        match self {
            Self::Intra => 0,
            Self::Inter => 1,
        }
    }

    const fn from_id(id: u8) -> Option<Self> {
        match id {
            0 => Some(Self::Intra),
            1 => Some(Self::Inter),
            _ => None,
        }
    }
}

/// The correlation tag carried by every probe.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct TraceMsg {
    pub request_id: RequestId,
    pub step: Step,
    pub kind: MsgKind,
}

impl TraceMsg {
    #[must_use]
    pub const fn new(request_id: RequestId, step: Step) -> Self {
        Self {
            request_id,
            step,
            kind: MsgKind::Intra,
        }
    }

    /// Serialize the tag.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; TraceMsgPacket::minimum_packet_size()] {
        let mut buf = [0_u8; TraceMsgPacket::minimum_packet_size()];
        if let Ok(mut msg) = TraceMsgPacket::new(&mut buf) {
            msg.set_magic(TRACE_MSG_MAGIC);
            msg.set_version(TRACE_MSG_VERSION);
            msg.set_kind(self.kind.id());
            msg.set_length(TraceMsgPacket::minimum_packet_size() as u16);
            msg.set_request_id(self.request_id.0);
            msg.set_step(self.step.0);
        }
        buf
    }

    /// Deserialize a tag from the start of `bytes`, trailing bytes are ignored.
    ///
    /// Returns `None` if `bytes` does not start with a well formed tag.
    #[must_use]
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        let msg = TraceMsgPacket::new_view(bytes).ok()?;
        if !msg.is_well_formed() {
            return None;
        }
        Some(Self {
            request_id: RequestId(msg.get_request_id()),
            step: Step(msg.get_step()),
            kind: MsgKind::from_id(msg.get_kind())?,
        })
    }
}

/// The marker assigned to a switch by the coloring service.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize)]
pub struct Color {
    pub field: ColorField,
    #[serde(serialize_with = "serialize_mac")]
    pub value: MacAddr,
}

impl Color {
    #[must_use]
    pub const fn new(field: ColorField, value: MacAddr) -> Self {
        Self { field, value }
    }
}

fn serialize_mac<S: serde::Serializer>(
    mac: &MacAddr,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.collect_str(mac)
}

/// The marker prefix shared by the colors of all switches.
///
/// Frames whose color field starts with this prefix are candidate probes.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct MarkerPrefix {
    field: ColorField,
    prefix: [u8; 6],
    len: usize,
}

impl MarkerPrefix {
    /// Create a marker prefix from a partial MAC such as `ee:ee:ee:ee:ee:`.
    pub fn new(field: ColorField, value: &str) -> Result<Self> {
        let bad = || Error::BadConfig(format!("invalid color value: {value}"));
        let mut prefix = [0_u8; 6];
        let mut len = 0;
        for octet in value.split([':', '-']).filter(|octet| !octet.is_empty()) {
            if len == prefix.len() || octet.len() != 2 {
                return Err(bad());
            }
            prefix[len] = u8::from_str_radix(octet, 16).map_err(|_| bad())?;
            len += 1;
        }
        if len == 0 {
            return Err(bad());
        }
        Ok(Self { field, prefix, len })
    }

    #[must_use]
    pub const fn field(&self) -> ColorField {
        self.field
    }

    /// Whether `frame` is a candidate probe.
    ///
    /// Reads only the color field of the Ethernet header.
    #[must_use]
    pub fn matches(&self, frame: &[u8]) -> bool {
        let offset = match self.field {
            ColorField::DlDst => 0,
            ColorField::DlSrc => 6,
        };
        frame
            .get(offset..offset + self.len)
            .is_some_and(|bytes| bytes == &self.prefix[..self.len])
    }
}

impl Default for MarkerPrefix {
    fn default() -> Self {
        Self {
            field: defaults::DEFAULT_COLOR_FIELD,
            prefix: [0xee, 0xee, 0xee, 0xee, 0xee, 0x00],
            len: 5,
        }
    }
}

impl FromStr for MarkerPrefix {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(defaults::DEFAULT_COLOR_FIELD, s)
    }
}

impl Display for MarkerPrefix {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        for octet in &self.prefix[..self.len] {
            write!(f, "{octet:02x}:")?;
        }
        Ok(())
    }
}

/// Build the probe frame for `flow` colored with `color` and tagged with `msg`.
///
/// Returns the port to inject the probe on together with the frame.
#[must_use]
pub fn build_probe(flow: &FlowDescriptor, color: &Color, msg: &TraceMsg) -> (PortNo, Vec<u8>) {
    let tag = msg.to_bytes();
    let l3 = if EtherType::from(flow.dl_type()) == EtherType::Ipv4 {
        build_ipv4(flow, &tag)
    } else {
        tag.to_vec()
    };
    let source = match color.field {
        ColorField::DlSrc => color.value,
        ColorField::DlDst => UNCOLORED_SOURCE_MAC,
    };
    (flow.in_port(), build_ethernet(flow, source, &l3))
}

fn build_ethernet(flow: &FlowDescriptor, source: MacAddr, payload: &[u8]) -> Vec<u8> {
    let tag_len = if flow.dl_vlan().is_some() {
        VlanPacket::minimum_packet_size()
    } else {
        0
    };
    let mut buf = vec![0_u8; EthernetPacket::minimum_packet_size() + tag_len + payload.len()];
    if let Ok(mut eth) = EthernetPacket::new(&mut buf) {
        eth.set_destination(flow.dl_dst());
        eth.set_source(source);
        if let Some(vlan_id) = flow.dl_vlan() {
            eth.set_ether_type(EtherType::Vlan);
            let mut tagged = vec![0_u8; tag_len + payload.len()];
            if let Ok(mut vlan) = VlanPacket::new(&mut tagged) {
                vlan.set_priority(flow.dl_vlan_pcp());
                vlan.set_vlan_id(vlan_id);
                vlan.set_ether_type(EtherType::from(flow.dl_type()));
                vlan.set_payload(payload);
            }
            eth.set_payload(&tagged);
        } else {
            eth.set_ether_type(EtherType::from(flow.dl_type()));
            eth.set_payload(payload);
        }
    }
    buf
}

/// `nw_proto` values which do not fit the one byte protocol field are sent as reserved (255).
fn ip_protocol(flow: &FlowDescriptor) -> IpProtocol {
    IpProtocol::from(u8::try_from(flow.nw_proto()).unwrap_or(u8::MAX))
}

fn build_ipv4(flow: &FlowDescriptor, tag: &[u8]) -> Vec<u8> {
    let protocol = ip_protocol(flow);
    let l4 = match protocol {
        IpProtocol::Udp => build_udp(flow, tag),
        IpProtocol::Tcp => build_tcp(flow, tag),
        IpProtocol::Other(_) => tag.to_vec(),
    };
    let total_length = Ipv4Packet::minimum_packet_size() + l4.len();
    let mut buf = vec![0_u8; total_length];
    if let Ok(mut ipv4) = Ipv4Packet::new(&mut buf) {
        ipv4.set_version(4);
        ipv4.set_header_length(5);
        ipv4.set_tos(flow.nw_tos());
        ipv4.set_total_length(total_length as u16);
        ipv4.set_ttl(PROBE_TTL);
        ipv4.set_protocol(protocol);
        ipv4.set_source(flow.nw_src());
        ipv4.set_destination(flow.nw_dst());
        ipv4.set_checksum(ipv4_header_checksum(ipv4.header()));
        ipv4.set_payload(&l4);
    }
    buf
}

fn build_udp(flow: &FlowDescriptor, payload: &[u8]) -> Vec<u8> {
    let length = UdpPacket::minimum_packet_size() + payload.len();
    let mut buf = vec![0_u8; length];
    if let Ok(mut udp) = UdpPacket::new(&mut buf) {
        udp.set_source(flow.tp_src());
        udp.set_destination(flow.tp_dst());
        udp.set_length(length as u16);
        udp.set_payload(payload);
        udp.set_checksum(udp_ipv4_checksum(udp.packet(), flow.nw_src(), flow.nw_dst()));
    }
    buf
}

fn build_tcp(flow: &FlowDescriptor, payload: &[u8]) -> Vec<u8> {
    let mut buf = vec![0_u8; TcpPacket::minimum_packet_size() + payload.len()];
    if let Ok(mut tcp) = TcpPacket::new(&mut buf) {
        tcp.set_source(flow.tp_src());
        tcp.set_destination(flow.tp_dst());
        tcp.set_data_offset(5);
        tcp.set_flags(PROBE_TCP_FLAGS);
        tcp.set_window_size(PROBE_TCP_WINDOW);
        tcp.set_payload(payload);
        tcp.set_checksum(tcp_ipv4_checksum(tcp.packet(), flow.nw_src(), flow.nw_dst()));
    }
    buf
}

/// Locate the innermost payload of a frame, which for a probe is its tag.
///
/// Walks Ethernet, any 802.1Q tags, `IPv4` and `TCP` or `UDP`. Returns `None`
/// if the layering is inconsistent.
#[must_use]
pub fn process_packet(frame: &[u8]) -> Option<&[u8]> {
    let eth = EthernetPacket::new_view(frame).ok()?;
    let mut ether_type = eth.get_ether_type();
    let mut offset = EthernetPacket::minimum_packet_size();
    while ether_type == EtherType::Vlan {
        let vlan = VlanPacket::new_view(&frame[offset..]).ok()?;
        ether_type = vlan.get_ether_type();
        offset += VlanPacket::minimum_packet_size();
    }
    let l3 = &frame[offset..];
    if ether_type != EtherType::Ipv4 {
        return Some(l3);
    }
    let ipv4 = Ipv4Packet::new_view(l3).ok()?;
    if ipv4.get_version() != 4 {
        return None;
    }
    let start = ipv4.header().len();
    let l4 = &l3[start..start + ipv4.payload().len()];
    match ipv4.get_protocol() {
        IpProtocol::Udp => {
            let udp = UdpPacket::new_view(l4).ok()?;
            let start = UdpPacket::minimum_packet_size();
            Some(&l4[start..start + udp.payload().len()])
        }
        IpProtocol::Tcp => {
            let tcp = TcpPacket::new_view(l4).ok()?;
            Some(&l4[l4.len() - tcp.payload().len()..])
        }
        IpProtocol::Other(_) => Some(l4),
    }
}

/// Decode the correlation tag of a frame, `None` if the frame is not a probe.
#[must_use]
pub fn decode_trace_msg(frame: &[u8]) -> Option<TraceMsg> {
    process_packet(frame).and_then(TraceMsg::from_bytes)
}

/// The outermost VLAN id carried by a frame, `None` if untagged.
#[must_use]
pub fn vlan_of(frame: &[u8]) -> Option<u16> {
    let eth = EthernetPacket::new_view(frame).ok()?;
    if eth.get_ether_type() != EtherType::Vlan {
        return None;
    }
    let vlan = VlanPacket::new_view(eth.payload()).ok()?;
    Some(vlan.get_vlan_id()).filter(|&id| id != 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use std::time::Duration;
    use test_case::test_case;

    const COLOR: Color = Color::new(
        ColorField::DlSrc,
        MacAddr([0xee, 0xee, 0xee, 0xee, 0xee, 0x01]),
    );

    fn flow(extra: Value) -> FlowDescriptor {
        let mut raw = json!({ "trace": { "switch": { "dpid": "00:00:00:00:00:00:00:01", "in_port": 1 } } });
        if let (Some(trace), Value::Object(extra)) = (raw["trace"].as_object_mut(), extra) {
            trace.extend(extra);
        }
        FlowDescriptor::from_request(&raw, Duration::from_secs(1)).unwrap()
    }

    #[test]
    fn test_trace_msg_bytes() {
        let msg = TraceMsg::new(RequestId(30001), Step(3));
        let bytes = msg.to_bytes();
        assert_eq!(
            bytes,
            hex_literal::hex!("53 44 4e 54 01 00 00 18 00 00 00 00 00 00 75 31 00 00 00 00 00 00 00 03")
        );
        assert_eq!(Some(msg), TraceMsg::from_bytes(&bytes));
    }

    #[test]
    fn test_trace_msg_rejects_garbage() {
        assert_eq!(None, TraceMsg::from_bytes(&[]));
        assert_eq!(None, TraceMsg::from_bytes(&[0xab; 64]));
        let mut bytes = TraceMsg::new(RequestId(1), Step(0)).to_bytes();
        bytes[5] = 9;
        assert_eq!(None, TraceMsg::from_bytes(&bytes));
    }

    #[test_case(json!({}), IpProtocol::Other(0) ; "ipv4 without transport")]
    #[test_case(json!({ "ip": { "nw_proto": 6 }, "tp": { "tp_src": 1, "tp_dst": 80 } }), IpProtocol::Tcp ; "ipv4 tcp")]
    #[test_case(json!({ "ip": { "nw_proto": 17 }, "tp": { "tp_src": 1, "tp_dst": 53 } }), IpProtocol::Udp ; "ipv4 udp")]
    #[test_case(json!({ "ip": { "nw_proto": 300 }, "tp": {} }), IpProtocol::Other(255) ; "ipv4 wide protocol")]
    #[test_case(json!({ "eth": { "dl_vlan": 100 }, "ip": { "nw_proto": 17 }, "tp": {} }), IpProtocol::Udp ; "tagged ipv4 udp")]
    fn test_ipv4_round_trip(extra: Value, protocol: IpProtocol) {
        let flow = flow(extra);
        let msg = TraceMsg::new(RequestId(30002), Step(7));
        let (port, frame) = build_probe(&flow, &COLOR, &msg);
        assert_eq!(PortNo(1), port);
        assert_eq!(Some(msg), decode_trace_msg(&frame));
        let eth = EthernetPacket::new_view(&frame).unwrap();
        assert_eq!(COLOR.value, eth.get_source());
        let offset = if flow.dl_vlan().is_some() { 18 } else { 14 };
        let ipv4 = Ipv4Packet::new_view(&frame[offset..]).unwrap();
        assert_eq!(protocol, ipv4.get_protocol());
        assert_eq!(ipv4_header_checksum(ipv4.header()), ipv4.get_checksum());
        assert_eq!(usize::from(ipv4.get_total_length()), frame.len() - offset);
    }

    #[test]
    fn test_non_ipv4_round_trip() {
        let flow = flow(json!({ "eth": { "dl_type": 0x88cc } }));
        let msg = TraceMsg::new(RequestId(30003), Step(0));
        let (_, frame) = build_probe(&flow, &COLOR, &msg);
        assert_eq!(EthernetPacket::minimum_packet_size() + 24, frame.len());
        assert_eq!(Some(&msg.to_bytes()[..]), process_packet(&frame));
        assert_eq!(Some(msg), decode_trace_msg(&frame));
    }

    #[test]
    fn test_round_trip_with_ethernet_padding() {
        let flow = flow(json!({ "ip": { "nw_proto": 17 }, "tp": {} }));
        let msg = TraceMsg::new(RequestId(30004), Step(1));
        let (_, mut frame) = build_probe(&flow, &COLOR, &msg);
        frame.extend_from_slice(&[0; 16]);
        assert_eq!(Some(&msg.to_bytes()[..]), process_packet(&frame));
    }

    #[test]
    fn test_udp_checksum_is_valid() {
        let flow = flow(json!({ "ip": { "nw_src": "10.0.0.1", "nw_dst": "10.0.0.2", "nw_proto": 17 }, "tp": { "tp_src": 5000, "tp_dst": 53 } }));
        let (_, frame) = build_probe(&flow, &COLOR, &TraceMsg::new(RequestId(1), Step(1)));
        let udp = UdpPacket::new_view(&frame[34..]).unwrap();
        assert_eq!(5000, udp.get_source());
        assert_eq!(53, udp.get_destination());
        assert_eq!(32, udp.get_length());
        assert_eq!(
            udp_ipv4_checksum(udp.packet(), flow.nw_src(), flow.nw_dst()),
            udp.get_checksum()
        );
    }

    #[test]
    fn test_uncolored_source_when_color_not_in_source() {
        let flow = flow(json!({}));
        let color = Color::new(ColorField::DlDst, COLOR.value);
        let (_, frame) = build_probe(&flow, &color, &TraceMsg::new(RequestId(1), Step(0)));
        let eth = EthernetPacket::new_view(&frame).unwrap();
        assert_eq!(UNCOLORED_SOURCE_MAC, eth.get_source());
        assert_eq!(flow.dl_dst(), eth.get_destination());
    }

    #[test]
    fn test_vlan_of() {
        let tagged = flow(json!({ "eth": { "dl_vlan": 100, "dl_vlan_pcp": 2 } }));
        let (_, frame) = build_probe(&tagged, &COLOR, &TraceMsg::new(RequestId(1), Step(0)));
        assert_eq!(Some(100), vlan_of(&frame));
        let untagged = flow(json!({}));
        let (_, frame) = build_probe(&untagged, &COLOR, &TraceMsg::new(RequestId(1), Step(0)));
        assert_eq!(None, vlan_of(&frame));
        assert_eq!(None, vlan_of(&[0; 4]));
    }

    #[test_case(&[], None ; "empty")]
    #[test_case(&[0xff; 13], None ; "truncated ethernet")]
    #[test_case(&hex_literal::hex!("ff ff ff ff ff ff ee ee ee ee ee 01 81 00 00"), None ; "truncated vlan")]
    #[test_case(&hex_literal::hex!("ff ff ff ff ff ff ee ee ee ee ee 01 08 00 45 00"), None ; "truncated ipv4")]
    fn test_process_packet_malformed(frame: &[u8], expected: Option<&[u8]>) {
        assert_eq!(expected, process_packet(frame));
        assert_eq!(None, decode_trace_msg(frame));
    }

    #[test]
    fn test_marker_prefix() {
        let marker = MarkerPrefix::from_str("ee:ee:ee:ee:ee:").unwrap();
        assert_eq!(marker, MarkerPrefix::default());
        assert_eq!("ee:ee:ee:ee:ee:", marker.to_string());
        let (_, probe) = build_probe(&flow(json!({})), &COLOR, &TraceMsg::new(RequestId(1), Step(0)));
        assert!(marker.matches(&probe));
        let mut other = probe.clone();
        other[10] = 0x00;
        assert!(!marker.matches(&other));
        assert!(!marker.matches(&probe[..8]));
    }

    #[test_case("" ; "empty")]
    #[test_case("ee:ee:ee:ee:ee:ee:ee" ; "too long")]
    #[test_case("eee:ee" ; "bad octet")]
    #[test_case("zz:" ; "not hex")]
    fn test_marker_prefix_invalid(value: &str) {
        assert!(MarkerPrefix::from_str(value).is_err());
    }

    #[test]
    fn test_color_serialize() {
        let json = serde_json::to_value(COLOR).unwrap();
        assert_eq!(json!({ "field": "dl_src", "value": "ee:ee:ee:ee:ee:01" }), json);
    }
}
