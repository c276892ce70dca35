//! Hop-by-hop route tracer
//!
//! Probes are sent one hop at a time: set the hop limit, send one echo
//! request, then read until the hop answers or its deadline passes. The
//! trace stops at the first echo reply from the target itself.

use crate::error::ProbeError;
use crate::packet::{EchoRequest, IcmpKind, IcmpMessage, TRACE_IDENTIFIER};
use crate::traceroute::config::TracerouteConfig;
use crate::traceroute::result::RouteTrace;
use crate::traceroute::types::HopRecord;
use crate::transport::{self, IpFamily, Transport, TransportError};
use std::net::IpAddr;
use tokio::time::Instant;
use tracing::{debug, trace, warn};

/// Size of the receive buffer for hop replies
const RECV_BUFFER_LEN: usize = 1500;
/// Payload carried by every trace probe
const TRACE_PAYLOAD: [u8; 1] = [0];

/// How one hop's receive loop ended
enum HopOutcome {
    /// An intermediate router answered
    Router(HopRecord),
    /// The target answered directly
    Destination(HopRecord),
    /// Nothing usable arrived in time
    Silent,
}

/// Traces the route to one host, one hop at a time
#[derive(Debug, Clone)]
pub struct RouteTracer {
    config: TracerouteConfig,
}

impl RouteTracer {
    /// Create a tracer for `config`
    pub fn new(config: TracerouteConfig) -> Self {
        Self { config }
    }

    /// Configuration this tracer runs with
    pub fn config(&self) -> &TracerouteConfig {
        &self.config
    }

    /// Trace the route to `target` over a freshly opened socket of `family`
    ///
    /// Only failing to open the socket is an error here. Running out of hops
    /// is reported through [`RouteTrace::check`] alongside the partial route.
    pub async fn run(&self, target: IpAddr, family: IpFamily) -> Result<RouteTrace, ProbeError> {
        let transport = transport::open(family)?;
        Ok(self.run_with_transport(&*transport, target).await)
    }

    /// Trace the route to `target` over an already opened transport
    pub async fn run_with_transport(&self, transport: &dyn Transport, target: IpAddr) -> RouteTrace {
        let started = Instant::now();
        let max_hops = self.config.max_hops;
        let mut hops = Vec::with_capacity(usize::from(max_hops));
        let mut destination_reached = false;
        let mut buf = vec![0u8; RECV_BUFFER_LEN];

        for hop in 1..=max_hops {
            if let Err(e) = transport.set_hop_limit(hop) {
                warn!("Failed to set hop limit {hop} for {target}: {e}");
                hops.push(HopRecord::Unresolved);
                continue;
            }

            let sent_at = Instant::now();
            transport.set_deadline(sent_at + self.config.hop_timeout);

            let request = EchoRequest::new(TRACE_IDENTIFIER, u16::from(hop), TRACE_PAYLOAD.to_vec());
            if let Err(e) = transport.send(target, &request).await {
                warn!("Failed to send trace probe {hop} to {target}: {e}");
                hops.push(HopRecord::Unresolved);
                continue;
            }

            match await_hop(transport, target, hop, sent_at, &mut buf).await {
                HopOutcome::Router(record) => {
                    trace!("hop {hop} to {target}: {record}");
                    hops.push(record);
                }
                HopOutcome::Destination(record) => {
                    trace!("hop {hop} reached {target}: {record}");
                    hops.push(record);
                    destination_reached = true;
                    break;
                }
                HopOutcome::Silent => hops.push(HopRecord::Unresolved),
            }
        }

        debug!(
            "trace to {target} finished after {} hops (reached: {destination_reached})",
            hops.len()
        );
        RouteTrace {
            target,
            max_hops,
            hops,
            destination_reached,
            total_duration: started.elapsed(),
        }
    }
}

/// Read replies for the current hop until one is relevant or time runs out
async fn await_hop(
    transport: &dyn Transport,
    target: IpAddr,
    hop: u8,
    sent_at: Instant,
    buf: &mut [u8],
) -> HopOutcome {
    loop {
        let (len, from) = match transport.receive(buf).await {
            Ok(received) => received,
            Err(TransportError::Timeout) => return HopOutcome::Silent,
            Err(e) => {
                warn!("Failed to receive trace reply for {target}: {e}");
                return HopOutcome::Silent;
            }
        };
        let rtt = sent_at.elapsed();

        let message = match transport.parse_icmp(&buf[..len]) {
            Ok(message) => message,
            Err(e) => {
                warn!("Discarding trace reply from {from}: {e}");
                return HopOutcome::Silent;
            }
        };

        let record = HopRecord::Responded { addr: from, rtt };
        if from == target && message.echo_reply_for(TRACE_IDENTIFIER).is_some() {
            return HopOutcome::Destination(record);
        }
        if expired_on_way_to(&message, target, hop) {
            return HopOutcome::Router(record);
        }
    }
}

/// Whether `message` is a Time-Exceeded for the probe sent to `target` at `hop`
fn expired_on_way_to(message: &IcmpMessage, target: IpAddr, hop: u8) -> bool {
    if message.kind != IcmpKind::TimeExceeded || message.original_destination() != Some(target) {
        return false;
    }
    // Routers quoting enough of the probe let us rule out other tracers
    // and answers to earlier hops.
    match message.quoted_echo() {
        Some((identifier, sequence)) => {
            identifier == TRACE_IDENTIFIER && sequence == u16::from(hop)
        }
        None => true,
    }
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod engine_tests;
