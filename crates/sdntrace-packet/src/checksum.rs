//! Internet checksums for the `IPv4` header and the `TCP` and `UDP` transports.
//!
//! The transport checksums cover the `IPv4` pseudo-header, the transport
//! header (with the checksum word skipped) and the payload.

use crate::IpProtocol;
use std::net::Ipv4Addr;

const IPV4_CHECKSUM_WORD: usize = 5;
const UDP_CHECKSUM_WORD: usize = 3;
const TCP_CHECKSUM_WORD: usize = 8;

/// Calculate the checksum for an `Ipv4` header.
#[must_use]
pub fn ipv4_header_checksum(data: &[u8]) -> u16 {
    if data.is_empty() {
        return 0;
    }
    finalize_checksum(sum_be_words(data, IPV4_CHECKSUM_WORD))
}

/// Calculate the checksum for an `IPv4` `UDP` datagram (header and payload).
#[must_use]
pub fn udp_ipv4_checksum(data: &[u8], src_addr: Ipv4Addr, dest_addr: Ipv4Addr) -> u16 {
    transport_checksum(data, UDP_CHECKSUM_WORD, src_addr, dest_addr, IpProtocol::Udp)
}

/// Calculate the checksum for an `IPv4` `TCP` segment (header and payload).
#[must_use]
pub fn tcp_ipv4_checksum(data: &[u8], src_addr: Ipv4Addr, dest_addr: Ipv4Addr) -> u16 {
    transport_checksum(data, TCP_CHECKSUM_WORD, src_addr, dest_addr, IpProtocol::Tcp)
}

fn transport_checksum(
    data: &[u8],
    ignore_word: usize,
    source: Ipv4Addr,
    destination: Ipv4Addr,
    protocol: IpProtocol,
) -> u16 {
    let pseudo_header = addr_sum(source)
        + addr_sum(destination)
        + u32::from(protocol.id())
        + data.len() as u32;
    finalize_checksum(pseudo_header + sum_be_words(data, ignore_word))
}

fn addr_sum(addr: Ipv4Addr) -> u32 {
    let [a, b, c, d] = addr.octets();
    u32::from(u16::from_be_bytes([a, b])) + u32::from(u16::from_be_bytes([c, d]))
}

/// Sum the buffer as big-endian 16-bit words, skipping word `ignore_word`.
///
/// A trailing odd byte is padded with zero on the right.
fn sum_be_words(data: &[u8], ignore_word: usize) -> u32 {
    let mut chunks = data.chunks_exact(2);
    let mut sum = chunks
        .by_ref()
        .enumerate()
        .filter(|(i, _)| *i != ignore_word)
        .map(|(_, word)| u32::from(u16::from_be_bytes([word[0], word[1]])))
        .sum::<u32>();
    if let [last] = chunks.remainder() {
        if data.len() / 2 != ignore_word {
            sum += u32::from(*last) << 8;
        }
    }
    sum
}

/// Fold the carries back into the low 16 bits and take the one's complement.
const fn finalize_checksum(mut sum: u32) -> u16 {
    while sum >> 16 != 0 {
        sum = (sum >> 16) + (sum & 0xFFFF);
    }
    !sum as u16
}
