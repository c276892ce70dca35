//! Result types for route tracing

use crate::error::ProbeError;
use crate::traceroute::types::HopRecord;
use std::net::IpAddr;
use std::time::Duration;

/// Result of a route trace
///
/// Holds every hop in TTL order. When the target never answered the list
/// has exactly `max_hops` entries and [`RouteTrace::check`] reports
/// [`ProbeError::RouteNotFound`]; the hops are still worth showing.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteTrace {
    /// Traced address
    pub target: IpAddr,
    /// Hop limit the trace ran with
    pub max_hops: u8,
    /// One record per hop, nearest first
    pub hops: Vec<HopRecord>,
    /// Whether the target itself answered
    pub destination_reached: bool,
    /// Total duration of the trace
    pub total_duration: Duration,
}

impl RouteTrace {
    /// Get the number of hops discovered
    pub fn hop_count(&self) -> usize {
        self.hops.len()
    }

    /// The hop that reached the destination, if any
    pub fn destination_hop(&self) -> Option<&HopRecord> {
        if !self.destination_reached {
            return None;
        }
        self.hops.last()
    }

    /// Hops that answered, with their 1-based TTL
    pub fn responded_hops(&self) -> impl Iterator<Item = (usize, &HopRecord)> {
        self.hops
            .iter()
            .enumerate()
            .filter(|(_, hop)| hop.addr().is_some())
            .map(|(index, hop)| (index + 1, hop))
    }

    /// Calculate average RTT across all responding hops
    pub fn average_rtt_ms(&self) -> Option<f64> {
        let rtts: Vec<f64> = self.hops.iter().filter_map(HopRecord::rtt_ms).collect();

        if rtts.is_empty() {
            None
        } else {
            Some(rtts.iter().sum::<f64>() / rtts.len() as f64)
        }
    }

    /// `Err(RouteNotFound)` when the hop limit ran out before the target answered
    pub fn check(&self) -> Result<(), ProbeError> {
        if self.destination_reached {
            Ok(())
        } else {
            Err(ProbeError::RouteNotFound {
                target: self.target,
                max_hops: self.max_hops,
            })
        }
    }
}
