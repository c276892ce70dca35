//! Core types for route tracing

use crate::stats::millis;
use serde::ser::{SerializeSeq, Serializer};
use serde::Serialize;
use std::fmt;
use std::net::IpAddr;
use std::time::Duration;

/// What was learned about one hop of the route
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HopRecord {
    /// A router (or the target) answered
    Responded {
        /// Address the answer came from
        addr: IpAddr,
        /// Time from sending the probe to receiving the answer
        rtt: Duration,
    },
    /// Nothing usable arrived before the hop deadline
    Unresolved,
}

impl HopRecord {
    /// Address of the responder, if any
    pub fn addr(&self) -> Option<IpAddr> {
        match self {
            HopRecord::Responded { addr, .. } => Some(*addr),
            HopRecord::Unresolved => None,
        }
    }

    /// Get RTT in milliseconds
    pub fn rtt_ms(&self) -> Option<f64> {
        match self {
            HopRecord::Responded { rtt, .. } => Some(millis(*rtt)),
            HopRecord::Unresolved => None,
        }
    }

    /// Check if this hop is the destination
    pub fn is_destination(&self, target: IpAddr) -> bool {
        self.addr() == Some(target)
    }
}

impl fmt::Display for HopRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HopRecord::Responded { addr, rtt } => {
                write!(f, "{addr}\t{:.3}", millis(*rtt))
            }
            HopRecord::Unresolved => write!(f, "*"),
        }
    }
}

/// `["*"]` or `["<addr>", <rtt ms>]`
impl Serialize for HopRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            HopRecord::Responded { addr, rtt } => {
                let mut seq = serializer.serialize_seq(Some(2))?;
                seq.serialize_element(&addr.to_string())?;
                seq.serialize_element(&(millis(*rtt)))?;
                seq.end()
            }
            HopRecord::Unresolved => {
                let mut seq = serializer.serialize_seq(Some(1))?;
                seq.serialize_element("*")?;
                seq.end()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[test]
    fn test_responded_hop() {
        let hop = HopRecord::Responded {
            addr: IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1)),
            rtt: Duration::from_micros(1500),
        };
        assert_eq!(hop.rtt_ms(), Some(1.5));
        assert!(hop.is_destination(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1))));
        assert_eq!(hop.to_string(), "10.0.0.1\t1.500");
        assert_eq!(serde_json::to_string(&hop).unwrap(), r#"["10.0.0.1",1.5]"#);
    }

    #[test]
    fn test_unresolved_hop() {
        let hop = HopRecord::Unresolved;
        assert_eq!(hop.addr(), None);
        assert_eq!(hop.rtt_ms(), None);
        assert!(!hop.is_destination(IpAddr::V4(Ipv4Addr::LOCALHOST)));
        assert_eq!(hop.to_string(), "*");
        assert_eq!(serde_json::to_string(&hop).unwrap(), r#"["*"]"#);
    }

    #[test]
    fn test_ipv6_hop_display() {
        let hop = HopRecord::Responded {
            addr: "2001:db8::1".parse().unwrap(),
            rtt: Duration::from_millis(12),
        };
        assert_eq!(hop.to_string(), "2001:db8::1\t12.000");
    }
}
