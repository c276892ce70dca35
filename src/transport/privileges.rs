//! Privilege checks for raw ICMP sockets

use super::{IpFamily, TransportError};
use socket2::{Domain, Protocol, Socket, Type};

/// Check if running as root
pub fn is_root() -> bool {
    #[cfg(unix)]
    {
        // SAFETY: geteuid has no preconditions and cannot fail.
        unsafe { libc::geteuid() == 0 }
    }
    #[cfg(not(unix))]
    {
        false
    }
}

/// Check that a raw ICMP socket can be opened for `family`
///
/// Opens and immediately drops a plain socket, without touching the async
/// runtime, so it can run before one is started.
pub fn check_raw_socket_access(family: IpFamily) -> Result<(), TransportError> {
    let (domain, protocol) = match family {
        IpFamily::V4 => (Domain::IPV4, Protocol::ICMPV4),
        IpFamily::V6 => (Domain::IPV6, Protocol::ICMPV6),
    };
    Socket::new(domain, Type::RAW, Some(protocol))
        .map(drop)
        .map_err(|e| TransportError::from_open_error(family, e))
}
