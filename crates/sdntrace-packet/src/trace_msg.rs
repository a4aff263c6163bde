use crate::buffer::Buffer;
use crate::error::{Error, Result};
use std::fmt::{Debug, Formatter};

const MAGIC_OFFSET: usize = 0;
const VERSION_OFFSET: usize = 4;
const KIND_OFFSET: usize = 5;
const LENGTH_OFFSET: usize = 6;
const REQUEST_ID_OFFSET: usize = 8;
const STEP_OFFSET: usize = 16;

/// The magic bytes which open every correlation tag (`SDNT`).
pub const TRACE_MSG_MAGIC: u32 = 0x5344_4e54;

/// The only correlation tag format version produced and accepted.
pub const TRACE_MSG_VERSION: u8 = 1;

/// Represents the correlation tag carried as the innermost probe payload.
///
/// Layout (network byte order):
///
/// ```text
///  0               4       5       6               8
/// +---------------+-------+-------+---------------+
/// |     magic     |version| kind  |    length     |
/// +---------------+-------+-------+---------------+
/// |                  request id                   |
/// +-----------------------------------------------+
/// |                     step                      |
/// +-----------------------------------------------+
/// ```
///
/// The length field holds the size of the tag in bytes so that readers can
/// skip any trailing bytes added along the path.
pub struct TraceMsgPacket<'a> {
    buf: Buffer<'a>,
}

impl<'a> TraceMsgPacket<'a> {
    pub fn new(packet: &'a mut [u8]) -> Result<Self> {
        if packet.len() >= Self::minimum_packet_size() {
            Ok(Self {
                buf: Buffer::Mutable(packet),
            })
        } else {
            Err(Error::InsufficientPacketBuffer(
                String::from("TraceMsgPacket"),
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
                String::from("TraceMsgPacket"),
                Self::minimum_packet_size(),
                packet.len(),
            ))
        }
    }

    #[must_use]
    pub const fn minimum_packet_size() -> usize {
        24
    }

    #[must_use]
    pub fn get_magic(&self) -> u32 {
        u32::from_be_bytes(self.buf.get_bytes(MAGIC_OFFSET))
    }

    #[must_use]
    pub fn get_version(&self) -> u8 {
        self.buf.read(VERSION_OFFSET)
    }

    #[must_use]
    pub fn get_kind(&self) -> u8 {
        self.buf.read(KIND_OFFSET)
    }

    #[must_use]
    pub fn get_length(&self) -> u16 {
        u16::from_be_bytes(self.buf.get_bytes(LENGTH_OFFSET))
    }

    #[must_use]
    pub fn get_request_id(&self) -> u64 {
        u64::from_be_bytes(self.buf.get_bytes(REQUEST_ID_OFFSET))
    }

    #[must_use]
    pub fn get_step(&self) -> u64 {
        u64::from_be_bytes(self.buf.get_bytes(STEP_OFFSET))
    }

    pub fn set_magic(&mut self, val: u32) {
        self.buf.set_bytes(MAGIC_OFFSET, val.to_be_bytes());
    }

    pub fn set_version(&mut self, val: u8) {
        *self.buf.write(VERSION_OFFSET) = val;
    }

    pub fn set_kind(&mut self, val: u8) {
        *self.buf.write(KIND_OFFSET) = val;
    }

    pub fn set_length(&mut self, val: u16) {
        self.buf.set_bytes(LENGTH_OFFSET, val.to_be_bytes());
    }

    pub fn set_request_id(&mut self, val: u64) {
        self.buf.set_bytes(REQUEST_ID_OFFSET, val.to_be_bytes());
    }

    pub fn set_step(&mut self, val: u64) {
        self.buf.set_bytes(STEP_OFFSET, val.to_be_bytes());
    }

    /// Whether the magic, version and length fields describe a well formed tag.
    #[must_use]
    pub fn is_well_formed(&self) -> bool {
        self.get_magic() == TRACE_MSG_MAGIC
            && self.get_version() == TRACE_MSG_VERSION
            && usize::from(self.get_length()) == Self::minimum_packet_size()
    }

    #[must_use]
    pub fn packet(&self) -> &[u8] {
        self.buf.as_slice()
    }
}

impl Debug for TraceMsgPacket<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TraceMsgPacket")
            .field("magic", &self.get_magic())
            .field("version", &self.get_version())
            .field("kind", &self.get_kind())
            .field("length", &self.get_length())
            .field("request_id", &self.get_request_id())
            .field("step", &self.get_step())
            .finish()
    }
}
