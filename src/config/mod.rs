//! Configuration shared across probes

pub mod timing;

use std::time::Duration;

/// Every timing value used by the probes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimingConfig {
    /// Deadline for a whole ping session
    pub ping_timeout: Duration,
    /// Deadline for each traced hop
    pub hop_timeout: Duration,
    /// TCP connect timeout for port probes
    pub connect_timeout: Duration,
    /// Time allowed for an HTTP/HTTPS response
    pub http_read_timeout: Duration,
    /// Time allowed for a TLS handshake
    pub tls_handshake_timeout: Duration,
    /// Time allowed for a MySQL server greeting
    pub mysql_read_timeout: Duration,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            ping_timeout: Duration::from_millis(timing::DEFAULT_PING_TIMEOUT_MS),
            hop_timeout: Duration::from_millis(timing::DEFAULT_HOP_TIMEOUT_MS),
            connect_timeout: Duration::from_millis(timing::DEFAULT_CONNECT_TIMEOUT_MS),
            http_read_timeout: Duration::from_millis(timing::DEFAULT_HTTP_READ_TIMEOUT_MS),
            tls_handshake_timeout: Duration::from_millis(timing::DEFAULT_TLS_HANDSHAKE_TIMEOUT_MS),
            mysql_read_timeout: Duration::from_millis(timing::DEFAULT_MYSQL_READ_TIMEOUT_MS),
        }
    }
}
