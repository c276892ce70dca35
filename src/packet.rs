//! ICMP and ICMPv6 echo packet encoding and message parsing
//!
//! Only the pieces the probes need are modelled: Echo Request/Reply and
//! Time-Exceeded. Everything else parses as [`IcmpKind::Other`] (or
//! [`IcmpKind::DestinationUnreachable`]) so callers can skip it.

use crate::transport::{IpFamily, TransportError};
use pnet::packet::icmp::echo_request::MutableEchoRequestPacket;
use pnet::packet::icmp::{IcmpCode, IcmpPacket, IcmpTypes};
use pnet::packet::icmpv6::echo_request::MutableEchoRequestPacket as MutableEchoRequestV6Packet;
use pnet::packet::icmpv6::{self, Icmpv6Code, Icmpv6Packet, Icmpv6Types};
use pnet::packet::Packet;
use pnet::util::checksum as pnet_checksum;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

/// Echo identifier carried by every ping probe
pub const PING_IDENTIFIER: u16 = 2;
/// Echo identifier carried by every route-trace probe
pub const TRACE_IDENTIFIER: u16 = 1;

/// Length of the fixed ICMP header (type, code, checksum and 4 more bytes)
pub const ICMP_HEADER_LEN_BYTES: usize = 8;
/// Largest echo payload that still fits in one IPv4 datagram
pub const MAX_ECHO_PAYLOAD_BYTES: usize = 65_507;

const IPV4_HEADER_MIN_LEN_BYTES: usize = 20;
const IPV6_HEADER_LEN_BYTES: usize = 40;

/// Text the echo payload is filled with
const PAYLOAD_PATTERN: &[u8] = b"The very model of a modern Major General.";

/// Build an echo payload of `size` bytes
pub fn ping_payload(size: usize) -> Vec<u8> {
    PAYLOAD_PATTERN.iter().cycle().take(size).copied().collect()
}

/// An outgoing ICMP Echo Request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EchoRequest {
    /// Echo identifier, constant per probe kind
    pub identifier: u16,
    /// Sequence number, the correlation key within one session
    pub sequence: u16,
    /// Opaque payload bytes
    pub payload: Vec<u8>,
}

impl EchoRequest {
    /// Create a new echo request
    pub fn new(identifier: u16, sequence: u16, payload: Vec<u8>) -> Self {
        Self {
            identifier,
            sequence,
            payload,
        }
    }

    /// Serialize as an ICMPv4 Echo Request with its checksum filled in
    pub fn encode_v4(&self) -> Result<Vec<u8>, TransportError> {
        self.check_payload()?;
        let mut buf = vec![0u8; MutableEchoRequestPacket::minimum_packet_size() + self.payload.len()];
        let mut echo = MutableEchoRequestPacket::new(&mut buf)
            .ok_or_else(|| TransportError::Encoding("buffer too small for ICMP echo".into()))?;

        echo.set_icmp_type(IcmpTypes::EchoRequest);
        echo.set_icmp_code(IcmpCode(0));
        echo.set_identifier(self.identifier);
        echo.set_sequence_number(self.sequence);
        echo.set_payload(&self.payload);

        let checksum = pnet_checksum(echo.packet(), 1);
        echo.set_checksum(checksum);
        Ok(buf)
    }

    /// Serialize as an ICMPv6 Echo Request
    ///
    /// The checksum covers the IPv6 pseudo-header, so the source and
    /// destination addresses of the datagram are needed.
    pub fn encode_v6(
        &self,
        source: Ipv6Addr,
        destination: Ipv6Addr,
    ) -> Result<Vec<u8>, TransportError> {
        self.check_payload()?;
        let mut buf =
            vec![0u8; MutableEchoRequestV6Packet::minimum_packet_size() + self.payload.len()];
        {
            let mut echo = MutableEchoRequestV6Packet::new(&mut buf).ok_or_else(|| {
                TransportError::Encoding("buffer too small for ICMPv6 echo".into())
            })?;
            echo.set_icmpv6_type(Icmpv6Types::EchoRequest);
            echo.set_icmpv6_code(Icmpv6Code(0));
            echo.set_identifier(self.identifier);
            echo.set_sequence_number(self.sequence);
            echo.set_payload(&self.payload);
        }

        let checksum = {
            let packet = Icmpv6Packet::new(&buf)
                .ok_or_else(|| TransportError::Encoding("truncated ICMPv6 packet".into()))?;
            icmpv6::checksum(&packet, &source, &destination)
        };
        buf[2..4].copy_from_slice(&checksum.to_be_bytes());
        Ok(buf)
    }

    fn check_payload(&self) -> Result<(), TransportError> {
        if self.payload.len() > MAX_ECHO_PAYLOAD_BYTES {
            return Err(TransportError::Encoding(format!(
                "payload of {} bytes exceeds the {MAX_ECHO_PAYLOAD_BYTES} byte maximum",
                self.payload.len()
            )));
        }
        Ok(())
    }
}

/// ICMP message types the probes care about
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IcmpKind {
    /// Echo Request (type 8, or 128 for ICMPv6)
    EchoRequest,
    /// Echo Reply (type 0, or 129 for ICMPv6)
    EchoReply,
    /// Time Exceeded (type 11, or 3 for ICMPv6)
    TimeExceeded,
    /// Destination Unreachable (type 3, or 1 for ICMPv6)
    DestinationUnreachable,
    /// Any other type, with its raw type number
    Other(u8),
}

impl IcmpKind {
    fn from_v4(icmp_type: u8) -> Self {
        match icmp_type {
            t if t == IcmpTypes::EchoReply.0 => IcmpKind::EchoReply,
            t if t == IcmpTypes::EchoRequest.0 => IcmpKind::EchoRequest,
            t if t == IcmpTypes::TimeExceeded.0 => IcmpKind::TimeExceeded,
            t if t == IcmpTypes::DestinationUnreachable.0 => IcmpKind::DestinationUnreachable,
            other => IcmpKind::Other(other),
        }
    }

    fn from_v6(icmp_type: u8) -> Self {
        match icmp_type {
            t if t == Icmpv6Types::EchoReply.0 => IcmpKind::EchoReply,
            t if t == Icmpv6Types::EchoRequest.0 => IcmpKind::EchoRequest,
            t if t == Icmpv6Types::TimeExceeded.0 => IcmpKind::TimeExceeded,
            t if t == Icmpv6Types::DestinationUnreachable.0 => IcmpKind::DestinationUnreachable,
            other => IcmpKind::Other(other),
        }
    }
}

/// Identifier, sequence and payload of an echo message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EchoFields {
    /// Echo identifier
    pub identifier: u16,
    /// Echo sequence number
    pub sequence: u16,
    /// Payload bytes after the echo header
    pub payload: Vec<u8>,
}

/// Decoded body of an ICMP message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IcmpBody {
    /// Echo Request or Echo Reply
    Echo(EchoFields),
    /// Error message quoting the start of the datagram that triggered it
    Quoted(Vec<u8>),
    /// Body of a message type we do not decode
    Opaque,
}

/// A parsed ICMP or ICMPv6 message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IcmpMessage {
    /// Family the message was parsed for
    pub family: IpFamily,
    /// Message type
    pub kind: IcmpKind,
    /// Message code
    pub code: u8,
    /// Type-specific body
    pub body: IcmpBody,
}

impl IcmpMessage {
    /// Echo fields if this is an Echo Reply carrying `identifier`
    pub fn echo_reply_for(&self, identifier: u16) -> Option<&EchoFields> {
        match (&self.kind, &self.body) {
            (IcmpKind::EchoReply, IcmpBody::Echo(fields)) if fields.identifier == identifier => {
                Some(fields)
            }
            _ => None,
        }
    }

    /// Destination address of the datagram quoted by a Time-Exceeded message
    ///
    /// Read from bytes 16..20 of the quoted IPv4 header, or 24..40 of the
    /// quoted IPv6 header.
    pub fn original_destination(&self) -> Option<IpAddr> {
        if self.kind != IcmpKind::TimeExceeded {
            return None;
        }
        let IcmpBody::Quoted(quoted) = &self.body else {
            return None;
        };
        match self.family {
            IpFamily::V4 => {
                let bytes: [u8; 4] = quoted.get(16..20)?.try_into().ok()?;
                Some(IpAddr::V4(Ipv4Addr::from(bytes)))
            }
            IpFamily::V6 => {
                let bytes: [u8; 16] = quoted.get(24..40)?.try_into().ok()?;
                Some(IpAddr::V6(Ipv6Addr::from(bytes)))
            }
        }
    }

    /// Identifier and sequence of the echo request quoted by an error
    /// message, when enough of it was included
    pub fn quoted_echo(&self) -> Option<(u16, u16)> {
        let IcmpBody::Quoted(quoted) = &self.body else {
            return None;
        };
        let echo = match self.family {
            IpFamily::V4 => {
                let first = *quoted.first()?;
                let header_len = usize::from(first & 0x0f) * 4;
                if first >> 4 != 4
                    || header_len < IPV4_HEADER_MIN_LEN_BYTES
                    || *quoted.get(9)? != IpFamily::V4.icmp_protocol()
                {
                    return None;
                }
                let echo = quoted.get(header_len..)?;
                (*echo.first()? == IcmpTypes::EchoRequest.0).then_some(echo)?
            }
            IpFamily::V6 => {
                if *quoted.get(6)? != IpFamily::V6.icmp_protocol() {
                    return None;
                }
                let echo = quoted.get(IPV6_HEADER_LEN_BYTES..)?;
                (*echo.first()? == Icmpv6Types::EchoRequest.0).then_some(echo)?
            }
        };
        if echo.len() < ICMP_HEADER_LEN_BYTES {
            return None;
        }
        Some((
            u16::from_be_bytes([echo[4], echo[5]]),
            u16::from_be_bytes([echo[6], echo[7]]),
        ))
    }
}

/// Parse a bare ICMP (IPv4) or ICMPv6 message
pub fn parse(family: IpFamily, bytes: &[u8]) -> Result<IcmpMessage, TransportError> {
    let (kind, code, rest) = match family {
        IpFamily::V4 => {
            let packet = IcmpPacket::new(bytes).ok_or_else(|| truncated(bytes.len()))?;
            (
                IcmpKind::from_v4(packet.get_icmp_type().0),
                packet.get_icmp_code().0,
                packet.payload().to_vec(),
            )
        }
        IpFamily::V6 => {
            let packet = Icmpv6Packet::new(bytes).ok_or_else(|| truncated(bytes.len()))?;
            (
                IcmpKind::from_v6(packet.get_icmpv6_type().0),
                packet.get_icmpv6_code().0,
                packet.payload().to_vec(),
            )
        }
    };

    // `rest` starts after type, code and checksum.
    let body = match kind {
        IcmpKind::EchoRequest | IcmpKind::EchoReply => {
            if rest.len() < 4 {
                return Err(truncated(bytes.len()));
            }
            IcmpBody::Echo(EchoFields {
                identifier: u16::from_be_bytes([rest[0], rest[1]]),
                sequence: u16::from_be_bytes([rest[2], rest[3]]),
                payload: rest[4..].to_vec(),
            })
        }
        IcmpKind::TimeExceeded | IcmpKind::DestinationUnreachable => {
            if rest.len() < 4 {
                return Err(truncated(bytes.len()));
            }
            IcmpBody::Quoted(rest[4..].to_vec())
        }
        IcmpKind::Other(_) => IcmpBody::Opaque,
    };

    Ok(IcmpMessage {
        family,
        kind,
        code,
        body,
    })
}

fn truncated(len: usize) -> TransportError {
    TransportError::Parse(format!("message truncated at {len} bytes"))
}
