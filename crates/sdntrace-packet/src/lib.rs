//! Probe packet wire format parsing and building.
//!
//! The following packet are supported:
//! - `Ethernet` (Ethernet II)
//! - `VLAN` (802.1Q tag)
//! - `IPv4`
//! - `UDP`
//! - `TCP`
//! - `TraceMsg` (the probe correlation tag)
//!
//! # Endianness
//!
//! The internal representation is held in network byte order (big-endian) and
//! all accessor methods take and return data in host byte order, converting as
//! necessary for the given architecture.
//!
//! # Example
//!
//! The following example builds a `UDP` datagram and sets its checksum:
//!
//! ```rust
//! # fn main() -> anyhow::Result<()> {
//! use sdntrace_packet::checksum::udp_ipv4_checksum;
//! use sdntrace_packet::udp::UdpPacket;
//! use std::net::Ipv4Addr;
//!
//! let mut buf = [0; UdpPacket::minimum_packet_size() + 2];
//! let mut udp = UdpPacket::new(&mut buf)?;
//! udp.set_source(1);
//! udp.set_destination(2);
//! udp.set_length(10);
//! udp.set_payload(&[0xab, 0xcd]);
//! let checksum = udp_ipv4_checksum(udp.packet(), Ipv4Addr::new(1, 1, 1, 1), Ipv4Addr::new(1, 1, 1, 2));
//! udp.set_checksum(checksum);
//! assert_eq!(checksum, udp.get_checksum());
//! assert_eq!(&[0xab, 0xcd], udp.payload());
//! # Ok(())
//! # }
//! ```
#![forbid(unsafe_code)]

mod buffer;

/// Packet errors.
pub mod error;

/// Functions for calculating network checksums.
pub mod checksum;

/// `Ethernet` frames and `802.1Q` tags.
pub mod ethernet;

/// `IPv4` packets.
pub mod ipv4;

/// `UDP` packets.
pub mod udp;

/// `TCP` packets.
pub mod tcp;

/// Probe correlation tags.
pub mod trace_msg;

/// The IP packet next layer protocol.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum IpProtocol {
    Udp,
    Tcp,
    Other(u8),
}

impl IpProtocol {
    #[must_use]
    pub const fn id(self) -> u8 {
        match self {
            Self::Udp => 17,
            Self::Tcp => 6,
            Self::Other(id) => id,
        }
    }
}

impl From<u8> for IpProtocol {
    fn from(id: u8) -> Self {
        match id {
            17 => Self::Udp,
            6 => Self::Tcp,
            p => Self::Other(p),
        }
    }
}

/// Format a payload as a hexadecimal string.
#[must_use]
pub fn fmt_payload(bytes: &[u8]) -> String {
    use itertools::Itertools as _;
    format!("{:02x}", bytes.iter().format(" "))
}
