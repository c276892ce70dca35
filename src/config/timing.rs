//! Global timing configuration with compile-time defaults and runtime overrides
//!
//! Default values are compile-time constants. A process may install one
//! override at startup (the CLI does so from its timeout flags); every getter
//! falls back to the default when no override is set.

use super::TimingConfig;
use once_cell::sync::OnceCell;
use std::time::Duration;

// Compile-time defaults as public constants (in milliseconds)
/// Default deadline for a whole ping session in milliseconds
pub const DEFAULT_PING_TIMEOUT_MS: u64 = 2000;
/// Default deadline for each traced hop in milliseconds
pub const DEFAULT_HOP_TIMEOUT_MS: u64 = 100;
/// Default TCP connect timeout for port probes in milliseconds
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 25;
/// Default HTTP/HTTPS response timeout in milliseconds
pub const DEFAULT_HTTP_READ_TIMEOUT_MS: u64 = 100;
/// Default TLS handshake timeout in milliseconds
pub const DEFAULT_TLS_HANDSHAKE_TIMEOUT_MS: u64 = 1000;
/// Default MySQL greeting timeout in milliseconds
pub const DEFAULT_MYSQL_READ_TIMEOUT_MS: u64 = 10;

// Runtime override storage - set once at program startup
static OVERRIDE_CONFIG: OnceCell<TimingConfig> = OnceCell::new();

/// Get the ping session deadline
pub fn ping_timeout() -> Duration {
    OVERRIDE_CONFIG
        .get()
        .map(|c| c.ping_timeout)
        .unwrap_or_else(|| Duration::from_millis(DEFAULT_PING_TIMEOUT_MS))
}

/// Get the per-hop trace deadline
pub fn hop_timeout() -> Duration {
    OVERRIDE_CONFIG
        .get()
        .map(|c| c.hop_timeout)
        .unwrap_or_else(|| Duration::from_millis(DEFAULT_HOP_TIMEOUT_MS))
}

/// Get the TCP connect timeout for port probes
pub fn connect_timeout() -> Duration {
    OVERRIDE_CONFIG
        .get()
        .map(|c| c.connect_timeout)
        .unwrap_or_else(|| Duration::from_millis(DEFAULT_CONNECT_TIMEOUT_MS))
}

/// Get the HTTP/HTTPS response timeout
pub fn http_read_timeout() -> Duration {
    OVERRIDE_CONFIG
        .get()
        .map(|c| c.http_read_timeout)
        .unwrap_or_else(|| Duration::from_millis(DEFAULT_HTTP_READ_TIMEOUT_MS))
}

/// Get the TLS handshake timeout
pub fn tls_handshake_timeout() -> Duration {
    OVERRIDE_CONFIG
        .get()
        .map(|c| c.tls_handshake_timeout)
        .unwrap_or_else(|| Duration::from_millis(DEFAULT_TLS_HANDSHAKE_TIMEOUT_MS))
}

/// Get the MySQL greeting timeout
pub fn mysql_read_timeout() -> Duration {
    OVERRIDE_CONFIG
        .get()
        .map(|c| c.mysql_read_timeout)
        .unwrap_or_else(|| Duration::from_millis(DEFAULT_MYSQL_READ_TIMEOUT_MS))
}

/// Set the global timing configuration
///
/// This should be called once at program startup if custom timing is needed.
/// Returns the rejected configuration if one has already been set.
pub fn set_config(config: TimingConfig) -> Result<(), TimingConfig> {
    OVERRIDE_CONFIG.set(config)
}

/// Check if custom timing configuration has been set
pub fn is_custom_config_set() -> bool {
    OVERRIDE_CONFIG.get().is_some()
}
