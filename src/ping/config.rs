//! Configuration types for ping sessions

use crate::config::timing;
use crate::packet::MAX_ECHO_PAYLOAD_BYTES;
use std::time::Duration;

/// Default number of echo requests per session
pub const DEFAULT_PING_COUNT: u16 = 10;
/// Default echo payload size in bytes
pub const DEFAULT_PAYLOAD_SIZE: usize = 41;

/// Configuration for one ping session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PingConfig {
    /// Number of echo requests to send (default: 10)
    pub count: u16,
    /// Size of each echo payload in bytes (default: 41)
    pub payload_size: usize,
    /// Deadline for the whole session, measured from its start (default: 2000ms)
    pub timeout: Duration,
}

impl Default for PingConfig {
    fn default() -> Self {
        Self {
            count: DEFAULT_PING_COUNT,
            payload_size: DEFAULT_PAYLOAD_SIZE,
            timeout: timing::ping_timeout(),
        }
    }
}

impl PingConfig {
    /// Create a new PingConfig builder
    pub fn builder() -> PingConfigBuilder {
        PingConfigBuilder::new()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.count < 1 {
            return Err("count must be at least 1".to_string());
        }
        if self.payload_size > MAX_ECHO_PAYLOAD_BYTES {
            return Err(format!(
                "payload_size must be at most {MAX_ECHO_PAYLOAD_BYTES} bytes"
            ));
        }
        if self.timeout.is_zero() {
            return Err("timeout must be greater than 0".to_string());
        }
        Ok(())
    }

    /// Receive buffer large enough for any reply to this session
    pub(crate) fn receive_buffer_len(&self) -> usize {
        // Reply payload plus ICMP and (IPv4, with options) IP headers.
        (self.payload_size + 128).max(1500)
    }
}

/// Builder for PingConfig
pub struct PingConfigBuilder {
    config: PingConfig,
}

impl PingConfigBuilder {
    /// Create a new builder with default values
    pub fn new() -> Self {
        Self {
            config: PingConfig::default(),
        }
    }

    /// Set the number of echo requests
    pub fn count(mut self, count: u16) -> Self {
        self.config.count = count;
        self
    }

    /// Set the payload size in bytes
    pub fn payload_size(mut self, size: usize) -> Self {
        self.config.payload_size = size;
        self
    }

    /// Set the session deadline
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<PingConfig, String> {
        self.config.validate()?;
        Ok(self.config)
    }
}

impl Default for PingConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
