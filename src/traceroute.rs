//! Hop-by-hop route tracing over ICMP echo

pub mod config;
pub mod engine;
pub mod result;
pub mod types;

use crate::error::ProbeError;
use crate::transport::IpFamily;
use std::net::IpAddr;

// Re-export commonly used types
pub use config::{TracerouteConfig, TracerouteConfigBuilder};
pub use engine::RouteTracer;
pub use result::RouteTrace;
pub use types::HopRecord;

/// Trace the route to `target` with `config`, choosing the socket family
/// from `is_ipv6`
pub async fn trace_host(
    target: IpAddr,
    is_ipv6: bool,
    config: TracerouteConfig,
) -> Result<RouteTrace, ProbeError> {
    RouteTracer::new(config)
        .run(target, IpFamily::from_ipv6_flag(is_ipv6))
        .await
}
