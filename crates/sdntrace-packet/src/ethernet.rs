use crate::buffer::Buffer;
use crate::error::{Error, Result};
use crate::fmt_payload;
use std::fmt::{Debug, Display, Formatter};
use std::str::FromStr;

const DESTINATION_OFFSET: usize = 0;
const SOURCE_OFFSET: usize = 6;
const ETHER_TYPE_OFFSET: usize = 12;

/// The Ethernet payload type.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum EtherType {
    Ipv4,
    Vlan,
    Other(u16),
}

impl EtherType {
    #[must_use]
    pub const fn id(self) -> u16 {
        match self {
            Self::Ipv4 => 0x0800,
            Self::Vlan => 0x8100,
            Self::Other(id) => id,
        }
    }
}

impl From<u16> for EtherType {
    fn from(id: u16) -> Self {
        match id {
            0x0800 => Self::Ipv4,
            0x8100 => Self::Vlan,
            t => Self::Other(t),
        }
    }
}

/// A 48-bit Ethernet hardware address.
#[derive(Clone, Copy, Eq, PartialEq, Hash, Default)]
pub struct MacAddr(pub [u8; 6]);

impl MacAddr {
    #[must_use]
    pub const fn octets(self) -> [u8; 6] {
        self.0
    }
}

impl FromStr for MacAddr {
    type Err = Error;

    /// Parse six hex octets separated by `:` or `-`, i.e. `ca:fe:ca:fe:ca:fe`.
    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::InvalidMacAddr(s.to_string());
        if s.len() != 17 {
            return Err(invalid());
        }
        let mut octets = [0_u8; 6];
        for (i, octet) in s.split([':', '-']).enumerate() {
            if i >= 6 || octet.len() != 2 || !octet.bytes().all(|b| b.is_ascii_hexdigit()) {
                return Err(invalid());
            }
            octets[i] = u8::from_str_radix(octet, 16).map_err(|_| invalid())?;
        }
        Ok(Self(octets))
    }
}

impl Display for MacAddr {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{g:02x}")
    }
}

impl Debug for MacAddr {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(self, f)
    }
}

/// Represents an Ethernet II frame header and payload.
pub struct EthernetPacket<'a> {
    buf: Buffer<'a>,
}

impl<'a> EthernetPacket<'a> {
    pub fn new(packet: &'a mut [u8]) -> Result<Self> {
        if packet.len() >= Self::minimum_packet_size() {
            Ok(Self {
                buf: Buffer::Mutable(packet),
            })
        } else {
            Err(Error::InsufficientPacketBuffer(
                String::from("EthernetPacket"),
                Self::minimum_packet_size(),
                packet.len(),
            ))
        }
    }

    pub fn new_view(packet: &'a [u8]) -> Result<Self> {
        if packet.len() >= Self::minimum_packet_size() {
            Ok(Self {
                buf: Buffer::Immutable(packet),
            })
        } else {
            Err(Error::InsufficientPacketBuffer(
                String::from("EthernetPacket"),
                Self::minimum_packet_size(),
                packet.len(),
            ))
        }
    }

    #[must_use]
    pub const fn minimum_packet_size() -> usize {
        14
    }

    #[must_use]
    pub fn get_destination(&self) -> MacAddr {
        MacAddr(self.buf.get_bytes(DESTINATION_OFFSET))
    }

    #[must_use]
    pub fn get_source(&self) -> MacAddr {
        MacAddr(self.buf.get_bytes(SOURCE_OFFSET))
    }

    #[must_use]
    pub fn get_ether_type(&self) -> EtherType {
        EtherType::from(u16::from_be_bytes(self.buf.get_bytes(ETHER_TYPE_OFFSET)))
    }

    pub fn set_destination(&mut self, val: MacAddr) {
        self.buf.set_bytes(DESTINATION_OFFSET, val.octets());
    }

    pub fn set_source(&mut self, val: MacAddr) {
        self.buf.set_bytes(SOURCE_OFFSET, val.octets());
    }

    pub fn set_ether_type(&mut self, val: EtherType) {
        self.buf.set_bytes(ETHER_TYPE_OFFSET, val.id().to_be_bytes());
    }

    pub fn set_payload(&mut self, vals: &[u8]) {
        self.buf.copy_from(Self::minimum_packet_size(), vals);
    }

    #[must_use]
    pub fn packet(&self) -> &[u8] {
        self.buf.as_slice()
    }

    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.buf.as_slice()[Self::minimum_packet_size()..]
    }
}

impl Debug for EthernetPacket<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EthernetPacket")
            .field("destination", &self.get_destination())
            .field("source", &self.get_source())
            .field("ether_type", &self.get_ether_type())
            .field("payload", &fmt_payload(self.payload()))
            .finish()
    }
}

const TCI_OFFSET: usize = 0;
const INNER_ETHER_TYPE_OFFSET: usize = 2;

/// Represents an 802.1Q tag which follows an Ethernet header of type `EtherType::Vlan`.
///
/// The tag control information holds the priority (3 bits), the drop eligible
/// indicator (1 bit) and the VLAN identifier (12 bits).
pub struct VlanPacket<'a> {
    buf: Buffer<'a>,
}

impl<'a> VlanPacket<'a> {
    pub fn new(packet: &'a mut [u8]) -> Result<Self> {
        if packet.len() >= Self::minimum_packet_size() {
            Ok(Self {
                buf: Buffer::Mutable(packet),
            })
        } else {
            Err(Error::InsufficientPacketBuffer(
                String::from("VlanPacket"),
                Self::minimum_packet_size(),
                packet.len(),
            ))
        }
    }

    pub fn new_view(packet: &'a [u8]) -> Result<Self> {
        if packet.len() >= Self::minimum_packet_size() {
            Ok(Self {
                buf: Buffer::Immutable(packet),
            })
        } else {
            Err(Error::InsufficientPacketBuffer(
                String::from("VlanPacket"),
                Self::minimum_packet_size(),
                packet.len(),
            ))
        }
    }

    #[must_use]
    pub const fn minimum_packet_size() -> usize {
        4
    }

    fn get_tci(&self) -> u16 {
        u16::from_be_bytes(self.buf.get_bytes(TCI_OFFSET))
    }

    fn set_tci(&mut self, tci: u16) {
        self.buf.set_bytes(TCI_OFFSET, tci.to_be_bytes());
    }

    #[must_use]
    pub fn get_priority(&self) -> u8 {
        (self.get_tci() >> 13) as u8
    }

    #[must_use]
    pub fn get_drop_eligible(&self) -> bool {
        self.get_tci() & 0x1000 != 0
    }

    #[must_use]
    pub fn get_vlan_id(&self) -> u16 {
        self.get_tci() & 0x0fff
    }

    #[must_use]
    pub fn get_ether_type(&self) -> EtherType {
        EtherType::from(u16::from_be_bytes(
            self.buf.get_bytes(INNER_ETHER_TYPE_OFFSET),
        ))
    }

    pub fn set_priority(&mut self, val: u8) {
        self.set_tci((self.get_tci() & 0x1fff) | (u16::from(val & 0x7) << 13));
    }

    pub fn set_drop_eligible(&mut self, val: bool) {
        self.set_tci((self.get_tci() & 0xefff) | (u16::from(val) << 12));
    }

    pub fn set_vlan_id(&mut self, val: u16) {
        self.set_tci((self.get_tci() & 0xf000) | (val & 0x0fff));
    }

    pub fn set_ether_type(&mut self, val: EtherType) {
        self.buf
            .set_bytes(INNER_ETHER_TYPE_OFFSET, val.id().to_be_bytes());
    }

    pub fn set_payload(&mut self, vals: &[u8]) {
        self.buf.copy_from(Self::minimum_packet_size(), vals);
    }

    #[must_use]
    pub fn packet(&self) -> &[u8] {
        self.buf.as_slice()
    }

    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.buf.as_slice()[Self::minimum_packet_size()..]
    }
}

impl Debug for VlanPacket<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VlanPacket")
            .field("priority", &self.get_priority())
            .field("drop_eligible", &self.get_drop_eligible())
            .field("vlan_id", &self.get_vlan_id())
            .field("ether_type", &self.get_ether_type())
            .field("payload", &fmt_payload(self.payload()))
            .finish()
    }
}
