//! connvitals - network connection vitals
//!
//! This library measures the health of the path to one or more hosts:
//! ICMP echo statistics (min/avg/max/std/loss), hop-by-hop route tracing,
//! and a quick probe of the HTTP, HTTPS and MySQL ports. IPv4 and IPv6 are
//! both supported over raw ICMP sockets.
//!
//! # Example
//!
//! ```no_run
//! use connvitals::{run_vitals, OutputFormat, VitalsConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = VitalsConfig::builder().port_scan(true).build()?;
//! let reports = run_vitals(&["example.com".to_string()], config).await?;
//! for report in &reports {
//!     println!("{}", connvitals::report::render(report, OutputFormat::Text)?);
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod orchestrator;
pub mod packet;
pub mod ping;
pub mod report;
pub mod resolve;
pub mod scan;
pub mod stats;
pub mod traceroute;
pub mod transport;

// Re-export core types for library users
pub use config::TimingConfig;
pub use error::ProbeError;
pub use orchestrator::{run_vitals, HostReport, Orchestrator, VitalsConfig, VitalsConfigBuilder};
pub use ping::{ping_host, EchoProber, PingConfig, PingConfigBuilder};
pub use report::OutputFormat;
pub use resolve::{ResolvedHost, Resolver};
pub use scan::{scan, HttpService, MysqlService, ScanResult};
pub use stats::Statistics;
pub use traceroute::{
    trace_host, HopRecord, RouteTrace, RouteTracer, TracerouteConfig, TracerouteConfigBuilder,
};
pub use transport::{IpFamily, Transport, TransportError};
