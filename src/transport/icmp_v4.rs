//! Raw ICMPv4 transport

use super::raw::RawIcmpSocket;
use super::{IpFamily, Transport, TransportError};
use crate::packet::EchoRequest;
use async_trait::async_trait;
use std::net::{IpAddr, SocketAddr};
use tokio::time::Instant;
use tracing::trace;

/// IPv4 header minimum length in bytes
const IPV4_HEADER_MIN_LEN_BYTES: usize = 20;

/// Raw ICMP socket bound to `0.0.0.0`
///
/// Raw IPv4 sockets hand back the whole IP datagram; [`Transport::receive`]
/// strips the IP header so callers only ever see the ICMP message.
pub struct IcmpV4Transport {
    socket: RawIcmpSocket,
}

impl IcmpV4Transport {
    /// Open the socket. Requires root or `CAP_NET_RAW`.
    pub fn open() -> Result<Self, TransportError> {
        Ok(Self {
            socket: RawIcmpSocket::open(IpFamily::V4)?,
        })
    }
}

#[async_trait]
impl Transport for IcmpV4Transport {
    fn family(&self) -> IpFamily {
        IpFamily::V4
    }

    fn set_deadline(&self, deadline: Instant) {
        self.socket.deadline.set(deadline);
    }

    fn set_hop_limit(&self, hops: u8) -> Result<(), TransportError> {
        self.socket.socket().set_ttl_v4(u32::from(hops))?;
        Ok(())
    }

    async fn send(&self, target: IpAddr, request: &EchoRequest) -> Result<(), TransportError> {
        let IpAddr::V4(target_v4) = target else {
            return Err(TransportError::Encoding(format!(
                "cannot send to IPv6 address {target} over an IPv4 socket"
            )));
        };
        let bytes = request.encode_v4()?;
        trace!(
            "sending echo id={} seq={} to {target_v4}",
            request.identifier,
            request.sequence
        );
        self.socket
            .send_to(&bytes, SocketAddr::from((target_v4, 0)))
            .await
    }

    async fn receive(&self, buf: &mut [u8]) -> Result<(usize, IpAddr), TransportError> {
        let (len, from) = self.socket.recv_from(buf).await?;
        let header_len = ipv4_header_len(&buf[..len])?;
        buf.copy_within(header_len..len, 0);
        Ok((len - header_len, from.ip()))
    }
}

/// Length of the IPv4 header at the front of `datagram`
fn ipv4_header_len(datagram: &[u8]) -> Result<usize, TransportError> {
    let first = *datagram
        .first()
        .ok_or_else(|| TransportError::Parse("empty IPv4 datagram".into()))?;
    let header_len = usize::from(first & 0x0f) * 4;
    if first >> 4 != 4 || header_len < IPV4_HEADER_MIN_LEN_BYTES || header_len > datagram.len() {
        return Err(TransportError::Parse(format!(
            "invalid IPv4 header (first byte {first:#04x}, {} bytes)",
            datagram.len()
        )));
    }
    Ok(header_len)
}
