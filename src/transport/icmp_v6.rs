//! Raw ICMPv6 transport

use super::raw::RawIcmpSocket;
use super::{IpFamily, Transport, TransportError};
use crate::packet::EchoRequest;
use async_trait::async_trait;
use std::net::{IpAddr, Ipv6Addr, SocketAddr};
use std::sync::Mutex;
use tokio::net::UdpSocket;
use tokio::time::Instant;
use tracing::{debug, trace};

/// Raw ICMPv6 socket bound to `::`
///
/// Raw ICMPv6 sockets never include the IPv6 header on receive, so the
/// datagram is already the bare ICMPv6 message.
pub struct IcmpV6Transport {
    socket: RawIcmpSocket,
    /// Last (destination, source) pair used for the pseudo-header checksum
    route_source: Mutex<Option<(Ipv6Addr, Ipv6Addr)>>,
}

impl IcmpV6Transport {
    /// Open the socket. Requires root or `CAP_NET_RAW`.
    pub fn open() -> Result<Self, TransportError> {
        Ok(Self {
            socket: RawIcmpSocket::open(IpFamily::V6)?,
            route_source: Mutex::new(None),
        })
    }

    /// Source address the kernel will pick for packets to `destination`
    ///
    /// The socket is bound to the wildcard address, so the real source comes
    /// from a route lookup (connecting a throwaway UDP socket sends nothing).
    /// The cache lock is not held across the lookup.
    async fn source_for(&self, destination: Ipv6Addr) -> Ipv6Addr {
        let cached = *self.route_source.lock().expect("mutex poisoned");
        if let Some((dest, source)) = cached {
            if dest == destination {
                return source;
            }
        }

        let source = lookup_route_source(destination).await.unwrap_or_else(|e| {
            debug!("no route source for {destination}: {e}");
            Ipv6Addr::UNSPECIFIED
        });
        *self.route_source.lock().expect("mutex poisoned") = Some((destination, source));
        source
    }
}

async fn lookup_route_source(destination: Ipv6Addr) -> std::io::Result<Ipv6Addr> {
    let probe = UdpSocket::bind(SocketAddr::from((Ipv6Addr::UNSPECIFIED, 0))).await?;
    probe.connect(SocketAddr::from((destination, 9))).await?;
    match probe.local_addr()?.ip() {
        IpAddr::V6(source) => Ok(source),
        IpAddr::V4(source) => Ok(source.to_ipv6_mapped()),
    }
}

#[async_trait]
impl Transport for IcmpV6Transport {
    fn family(&self) -> IpFamily {
        IpFamily::V6
    }

    fn set_deadline(&self, deadline: Instant) {
        self.socket.deadline.set(deadline);
    }

    fn set_hop_limit(&self, hops: u8) -> Result<(), TransportError> {
        self.socket
            .socket()
            .set_unicast_hops_v6(u32::from(hops))?;
        Ok(())
    }

    async fn send(&self, target: IpAddr, request: &EchoRequest) -> Result<(), TransportError> {
        let IpAddr::V6(target_v6) = target else {
            return Err(TransportError::Encoding(format!(
                "cannot send to IPv4 address {target} over an IPv6 socket"
            )));
        };
        let source = self.source_for(target_v6).await;
        let bytes = request.encode_v6(source, target_v6)?;
        trace!(
            "sending echo id={} seq={} to {target_v6} from {source}",
            request.identifier,
            request.sequence
        );
        self.socket
            .send_to(&bytes, SocketAddr::from((target_v6, 0)))
            .await
    }

    async fn receive(&self, buf: &mut [u8]) -> Result<(usize, IpAddr), TransportError> {
        let (len, from) = self.socket.recv_from(buf).await?;
        Ok((len, from.ip()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_route_source_for_loopback() {
        // Hosts without IPv6 cannot look up any route at all.
        if let Ok(source) = lookup_route_source(Ipv6Addr::LOCALHOST).await {
            assert_eq!(source, Ipv6Addr::LOCALHOST);
        }
    }
}
