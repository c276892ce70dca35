//! Error types for probe operations

use crate::transport::TransportError;
use std::net::IpAddr;
use thiserror::Error;

/// Errors that can occur while probing a host
#[derive(Debug, Error)]
pub enum ProbeError {
    /// The transport failed in a way the probe could not recover from
    ///
    /// In practice this is a socket that could not be opened, which is fatal
    /// for that probe of that host only.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The host name could not be resolved to an address
    #[error("Host '{0}' could not be resolved")]
    Resolution(String),

    /// The route tracer ran out of hops before the target answered
    ///
    /// Not fatal: the hops discovered so far are still reported.
    #[error(
        "Route was longer than the maximum-allowed TTL ({max_hops}), or host '{target}' could not be reached"
    )]
    RouteNotFound {
        /// Traced address
        target: IpAddr,
        /// Hop limit that was exhausted
        max_hops: u8,
    },

    /// Invalid configuration provided
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// None of the requested hosts could be resolved
    #[error("No hosts could be parsed")]
    NoTargets,
}
