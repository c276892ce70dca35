//! ICMP echo round-trip measurement

pub mod config;
pub mod prober;
pub mod session;

// Re-export commonly used types
pub use config::{PingConfig, PingConfigBuilder};
pub use prober::{ping_host, EchoProber};
pub use session::{EchoSession, ReplyOutcome};
