//! Configuration types for route tracing

use crate::config::timing;
use std::time::Duration;

/// Default hop limit for a trace
pub const DEFAULT_MAX_HOPS: u8 = 30;

/// Configuration for a route trace
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TracerouteConfig {
    /// Maximum number of hops (default: 30)
    pub max_hops: u8,
    /// Time to wait for each hop to answer (default: 100ms)
    pub hop_timeout: Duration,
}

impl Default for TracerouteConfig {
    fn default() -> Self {
        Self {
            max_hops: DEFAULT_MAX_HOPS,
            hop_timeout: timing::hop_timeout(),
        }
    }
}

impl TracerouteConfig {
    /// Create a new TracerouteConfig builder
    pub fn builder() -> TracerouteConfigBuilder {
        TracerouteConfigBuilder::new()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.max_hops < 1 {
            return Err("max_hops must be at least 1".to_string());
        }
        if self.hop_timeout.is_zero() {
            return Err("hop_timeout must be greater than 0".to_string());
        }
        Ok(())
    }
}

/// Builder for TracerouteConfig
pub struct TracerouteConfigBuilder {
    config: TracerouteConfig,
}

impl TracerouteConfigBuilder {
    /// Create a new builder with default values
    pub fn new() -> Self {
        Self {
            config: TracerouteConfig::default(),
        }
    }

    /// Set the maximum number of hops
    pub fn max_hops(mut self, hops: u8) -> Self {
        self.config.max_hops = hops;
        self
    }

    /// Set the per-hop timeout
    pub fn hop_timeout(mut self, timeout: Duration) -> Self {
        self.config.hop_timeout = timeout;
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<TracerouteConfig, String> {
        self.config.validate()?;
        Ok(self.config)
    }
}

impl Default for TracerouteConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
