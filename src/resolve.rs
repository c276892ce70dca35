//! Host name resolution

use crate::error::ProbeError;
use hickory_resolver::config::ResolverConfig;
use hickory_resolver::name_server::TokioConnectionProvider;
use hickory_resolver::TokioResolver;
use std::net::IpAddr;
use tracing::debug;

/// A host as typed on the command line together with its address
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedHost {
    /// Host exactly as given
    pub name: String,
    /// Address the host resolved to
    pub addr: IpAddr,
}

impl ResolvedHost {
    /// Whether probes must use IPv6 sockets
    pub fn is_ipv6(&self) -> bool {
        self.addr.is_ipv6()
    }
}

/// Resolves host names, preferring IPv4 addresses
pub struct Resolver {
    inner: TokioResolver,
}

impl Resolver {
    /// Create a resolver
    pub fn new() -> Self {
        let inner = TokioResolver::builder_with_config(
            ResolverConfig::cloudflare(),
            TokioConnectionProvider::default(),
        )
        .build();
        Self { inner }
    }

    /// Resolve `host`; IP literals are returned as-is
    pub async fn resolve(&self, host: &str) -> Result<ResolvedHost, ProbeError> {
        let addr = self.lookup(host).await?;
        debug!("resolved {host} to {addr}");
        Ok(ResolvedHost {
            name: host.to_string(),
            addr,
        })
    }

    async fn lookup(&self, host: &str) -> Result<IpAddr, ProbeError> {
        // Try parsing as IP first
        if let Ok(ip) = host.parse::<IpAddr>() {
            return Ok(ip);
        }
        if host == "localhost" {
            return Ok(IpAddr::from([127, 0, 0, 1]));
        }

        // Try IPv4 first
        if let Ok(lookup) = self.inner.ipv4_lookup(host).await {
            if let Some(ipv4) = lookup.iter().next() {
                return Ok(IpAddr::V4(ipv4.0));
            }
        }

        // Try IPv6
        if let Ok(lookup) = self.inner.ipv6_lookup(host).await {
            if let Some(ipv6) = lookup.iter().next() {
                return Ok(IpAddr::V6(ipv6.0));
            }
        }

        Err(ProbeError::Resolution(host.to_string()))
    }
}

impl Default for Resolver {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_resolve_ip_literals() {
        let resolver = Resolver::new();

        let host = resolver.resolve("192.0.2.1").await.unwrap();
        assert_eq!(host.name, "192.0.2.1");
        assert_eq!(host.addr, "192.0.2.1".parse::<IpAddr>().unwrap());
        assert!(!host.is_ipv6());

        let host = resolver.resolve("::1").await.unwrap();
        assert!(host.is_ipv6());
    }

    #[tokio::test]
    async fn test_resolve_localhost() {
        let host = Resolver::new().resolve("localhost").await.unwrap();
        assert!(host.addr.is_loopback());
        assert_eq!(host.name, "localhost");
    }

    #[tokio::test]
    async fn test_resolve_invalid() {
        let result = Resolver::new()
            .resolve("this.domain.definitely.does.not.exist.invalid")
            .await;
        assert!(matches!(result, Err(ProbeError::Resolution(_))));
    }
}
