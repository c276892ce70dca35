//! Dual-stack raw ICMP transport
//!
//! A [`Transport`] owns exactly one raw ICMP socket, bound either for IPv4 or
//! for IPv6. The family is picked once, by the caller, when the transport is
//! opened; nothing here looks at an address to decide which wire format to
//! speak. Callers (the echo prober and the route tracer) only see echo
//! requests going out and bare ICMP messages coming back.
//!
//! The socket is shared between many tasks at once: sends and receives are
//! independent operations and need no external locking. The deadline and the
//! hop limit are the only mutable state and are kept behind interior
//! mutability.

use crate::packet::{self, EchoRequest, IcmpMessage};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::io;
use std::net::IpAddr;
use std::sync::Mutex;
use thiserror::Error;
use tokio::time::Instant;

#[cfg(unix)]
pub mod icmp_v4;
#[cfg(unix)]
pub mod icmp_v6;
pub mod privileges;
#[cfg(unix)]
mod raw;

#[cfg(test)]
pub(crate) mod simulated;

#[cfg(unix)]
pub use icmp_v4::IcmpV4Transport;
#[cfg(unix)]
pub use icmp_v6::IcmpV6Transport;

/// IP address family a transport is bound to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IpFamily {
    /// IPv4 with ICMP (protocol 1)
    V4,
    /// IPv6 with ICMPv6 (next header 58)
    V6,
}

impl IpFamily {
    /// Pick the family from an explicit "is IPv6" flag
    pub fn from_ipv6_flag(is_ipv6: bool) -> Self {
        if is_ipv6 {
            IpFamily::V6
        } else {
            IpFamily::V4
        }
    }

    /// IP protocol number used for ICMP in this family
    pub fn icmp_protocol(self) -> u8 {
        match self {
            IpFamily::V4 => 1,
            IpFamily::V6 => 58,
        }
    }
}

impl fmt::Display for IpFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IpFamily::V4 => write!(f, "IPv4"),
            IpFamily::V6 => write!(f, "IPv6"),
        }
    }
}

/// Errors produced by a [`Transport`]
#[derive(Debug, Error)]
pub enum TransportError {
    /// The raw socket could not be opened because of missing privileges
    #[error("Insufficient permissions: {required}")]
    InsufficientPermissions {
        /// What is needed to open the socket
        required: String,
        /// How the user can obtain it
        suggestion: String,
    },

    /// The raw socket could not be opened for any other reason
    #[error("Failed to open {family} ICMP socket: {source}")]
    Socket {
        /// Family the socket was requested for
        family: IpFamily,
        /// Underlying OS error
        #[source]
        source: io::Error,
    },

    /// An echo request could not be serialized
    #[error("Failed to encode ICMP packet: {0}")]
    Encoding(String),

    /// Received bytes are not a well-formed ICMP message
    #[error("Failed to parse ICMP message: {0}")]
    Parse(String),

    /// Reading from or writing to the socket failed
    #[error("Socket I/O failed: {0}")]
    Io(#[from] io::Error),

    /// The transport deadline passed before the operation completed
    #[error("Operation timed out")]
    Timeout,
}

impl TransportError {
    /// Whether this error means the socket itself is unusable
    pub fn is_socket_error(&self) -> bool {
        matches!(
            self,
            TransportError::InsufficientPermissions { .. } | TransportError::Socket { .. }
        )
    }

    pub(crate) fn from_open_error(family: IpFamily, err: io::Error) -> Self {
        if err.kind() == io::ErrorKind::PermissionDenied {
            TransportError::InsufficientPermissions {
                required: "root or CAP_NET_RAW".to_string(),
                suggestion: "try running as root, with `capsh` or with `sudo`".to_string(),
            }
        } else {
            TransportError::Socket {
                family,
                source: err,
            }
        }
    }
}

/// A raw ICMP endpoint for one address family
#[async_trait]
pub trait Transport: Send + Sync {
    /// Family this transport was opened for
    fn family(&self) -> IpFamily;

    /// Bound every send or receive started after this call by `deadline`
    ///
    /// An operation reads the deadline once, when it starts, and fails with
    /// [`TransportError::Timeout`] if it is still pending at that instant.
    /// Operations already in progress keep the deadline they started with.
    fn set_deadline(&self, deadline: Instant);

    /// Set the IPv4 TTL or IPv6 unicast hop limit for outgoing packets
    fn set_hop_limit(&self, hops: u8) -> Result<(), TransportError>;

    /// Serialize `request` and send it to `target`
    async fn send(&self, target: IpAddr, request: &EchoRequest) -> Result<(), TransportError>;

    /// Wait for the next inbound ICMP message
    ///
    /// The bare ICMP message (without any IP header) is written to the front
    /// of `buf`. Returns the number of bytes written and the source address.
    async fn receive(&self, buf: &mut [u8]) -> Result<(usize, IpAddr), TransportError>;

    /// Decode ICMP bytes using this transport's family
    fn parse_icmp(&self, bytes: &[u8]) -> Result<IcmpMessage, TransportError> {
        packet::parse(self.family(), bytes)
    }
}

/// Open a raw ICMP transport for `family`
///
/// Must be called from inside a tokio runtime: the socket is registered
/// with the runtime's reactor.
pub fn open(family: IpFamily) -> Result<Box<dyn Transport>, TransportError> {
    #[cfg(unix)]
    {
        match family {
            IpFamily::V4 => Ok(Box::new(IcmpV4Transport::open()?)),
            IpFamily::V6 => Ok(Box::new(IcmpV6Transport::open()?)),
        }
    }
    #[cfg(not(unix))]
    {
        Err(TransportError::Socket {
            family,
            source: io::Error::new(
                io::ErrorKind::Unsupported,
                "raw ICMP sockets are only supported on Unix platforms",
            ),
        })
    }
}

/// Deadline shared by every operation on one transport
#[derive(Debug, Default)]
pub(crate) struct SharedDeadline {
    at: Mutex<Option<Instant>>,
}

impl SharedDeadline {
    pub(crate) fn set(&self, deadline: Instant) {
        *self.at.lock().expect("mutex poisoned") = Some(deadline);
    }

    pub(crate) fn get(&self) -> Option<Instant> {
        *self.at.lock().expect("mutex poisoned")
    }

    /// Run `op`, failing with `Timeout` if the deadline passes first
    pub(crate) async fn bound<F, T>(&self, op: F) -> Result<T, TransportError>
    where
        F: Future<Output = Result<T, TransportError>>,
    {
        match self.get() {
            Some(deadline) => tokio::time::timeout_at(deadline, op)
                .await
                .map_err(|_| TransportError::Timeout)?,
            None => op.await,
        }
    }
}
