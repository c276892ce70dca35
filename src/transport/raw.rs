//! Non-blocking raw socket registered with the tokio reactor

use super::{IpFamily, SharedDeadline, TransportError};
use socket2::{Domain, Protocol, SockAddr, Socket, Type};
use std::io;
use std::mem::MaybeUninit;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use tokio::io::unix::AsyncFd;
use tracing::warn;

/// Kernel receive buffer requested for every raw socket
///
/// Every ICMP datagram on the host is queued on every raw socket, and a ping
/// session has all its replies in flight at once.
const RECV_BUFFER_BYTES: usize = 8 * 1024 * 1024;

/// A raw ICMP socket that many tasks can read and write concurrently
///
/// Every waiter parks on the reactor's readiness notification; the kernel
/// hands each datagram to exactly one `recv_from` call.
pub(crate) struct RawIcmpSocket {
    fd: AsyncFd<Socket>,
    pub(crate) deadline: SharedDeadline,
}

impl RawIcmpSocket {
    /// Bind a raw ICMP socket for `family` on the wildcard address
    pub(crate) fn open(family: IpFamily) -> Result<Self, TransportError> {
        let socket =
            Self::bind(family).map_err(|e| TransportError::from_open_error(family, e))?;
        let fd = AsyncFd::new(socket).map_err(|e| TransportError::from_open_error(family, e))?;
        Ok(Self {
            fd,
            deadline: SharedDeadline::default(),
        })
    }

    fn bind(family: IpFamily) -> io::Result<Socket> {
        let (domain, protocol, local) = match family {
            IpFamily::V4 => (
                Domain::IPV4,
                Protocol::ICMPV4,
                SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0)),
            ),
            IpFamily::V6 => (
                Domain::IPV6,
                Protocol::ICMPV6,
                SocketAddr::from((Ipv6Addr::UNSPECIFIED, 0)),
            ),
        };
        let socket = Socket::new(domain, Type::RAW, Some(protocol))?;
        socket.set_nonblocking(true)?;
        if let Err(e) = socket.set_recv_buffer_size(RECV_BUFFER_BYTES) {
            warn!(
                "Could not set {family} ICMP receive buffer to {RECV_BUFFER_BYTES} bytes: {e}"
            );
        }
        socket.bind(&local.into())?;
        Ok(socket)
    }

    pub(crate) fn socket(&self) -> &Socket {
        self.fd.get_ref()
    }

    /// Send one datagram, bounded by the deadline
    pub(crate) async fn send_to(
        &self,
        bytes: &[u8],
        target: SocketAddr,
    ) -> Result<(), TransportError> {
        let addr = SockAddr::from(target);
        self.deadline.bound(self.send_ready(bytes, &addr)).await
    }

    /// Receive one datagram, bounded by the deadline
    pub(crate) async fn recv_from(
        &self,
        buf: &mut [u8],
    ) -> Result<(usize, SocketAddr), TransportError> {
        self.deadline.bound(self.recv_ready(buf)).await
    }

    async fn send_ready(&self, bytes: &[u8], addr: &SockAddr) -> Result<(), TransportError> {
        loop {
            let mut guard = self.fd.writable().await?;
            match guard.try_io(|inner| inner.get_ref().send_to(bytes, addr)) {
                Ok(result) => return result.map(|_| ()).map_err(TransportError::Io),
                Err(_would_block) => continue,
            }
        }
    }

    async fn recv_ready(&self, buf: &mut [u8]) -> Result<(usize, SocketAddr), TransportError> {
        loop {
            let mut guard = self.fd.readable().await?;
            let attempt = guard.try_io(|inner| {
                // SAFETY: an initialized `[u8]` is a valid `[MaybeUninit<u8>]`, and
                // `recv_from` only ever writes initialized bytes into it.
                let uninit =
                    unsafe { &mut *(&mut buf[..] as *mut [u8] as *mut [MaybeUninit<u8>]) };
                inner.get_ref().recv_from(uninit)
            });
            match attempt {
                Ok(Ok((len, from))) => {
                    let from = from.as_socket().ok_or_else(|| {
                        TransportError::Io(io::Error::new(
                            io::ErrorKind::InvalidData,
                            "datagram from a non-IP address",
                        ))
                    })?;
                    return Ok((len, from));
                }
                Ok(Err(e)) => return Err(TransportError::Io(e)),
                Err(_would_block) => continue,
            }
        }
    }
}
