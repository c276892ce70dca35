//! Runs every requested probe against every requested host
//!
//! Hosts are resolved first; the ones that fail are logged and skipped.
//! Each remaining host then gets its own ping, trace and scan tasks, all
//! running at once. Results land in a collector with one lock per probe
//! kind and come back in command-line order.

use crate::error::ProbeError;
use crate::logging;
use crate::ping::{EchoProber, PingConfig};
use crate::resolve::{ResolvedHost, Resolver};
use crate::scan::{self, ScanResult};
use crate::stats::Statistics;
use crate::traceroute::{RouteTrace, RouteTracer, TracerouteConfig};
use crate::transport::{self, IpFamily, Transport, TransportError};
use futures::future::join_all;
use std::net::IpAddr;
use std::sync::{Arc, Mutex};
use tokio::task::JoinSet;
use tracing::{debug, warn};

/// Opens the ICMP transport used by one probe of one host
pub type TransportOpener =
    Arc<dyn Fn(IpAddr, IpFamily) -> Result<Box<dyn Transport>, TransportError> + Send + Sync>;

/// Which probes to run for every host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VitalsConfig {
    /// Ping settings; `None` skips pinging
    pub ping: Option<PingConfig>,
    /// Trace settings; `None` skips route tracing
    pub trace: Option<TracerouteConfig>,
    /// Whether to scan HTTP, HTTPS and MySQL ports
    pub port_scan: bool,
}

impl Default for VitalsConfig {
    fn default() -> Self {
        Self {
            ping: Some(PingConfig::default()),
            trace: None,
            port_scan: false,
        }
    }
}

impl VitalsConfig {
    /// Create a new VitalsConfig builder
    pub fn builder() -> VitalsConfigBuilder {
        VitalsConfigBuilder::new()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if let Some(ping) = &self.ping {
            ping.validate()?;
        }
        if let Some(trace) = &self.trace {
            trace.validate()?;
        }
        Ok(())
    }

    /// Whether any probe needs a raw ICMP socket
    pub fn needs_raw_socket(&self) -> bool {
        self.ping.is_some() || self.trace.is_some()
    }
}

/// Builder for VitalsConfig
pub struct VitalsConfigBuilder {
    config: VitalsConfig,
}

impl VitalsConfigBuilder {
    /// Create a new builder with default values: ping only
    pub fn new() -> Self {
        Self {
            config: VitalsConfig::default(),
        }
    }

    /// Ping every host with `ping`
    pub fn ping(mut self, ping: PingConfig) -> Self {
        self.config.ping = Some(ping);
        self
    }

    /// Skip pinging
    pub fn no_ping(mut self) -> Self {
        self.config.ping = None;
        self
    }

    /// Trace the route to every host with `trace`
    pub fn trace(mut self, trace: TracerouteConfig) -> Self {
        self.config.trace = Some(trace);
        self
    }

    /// Enable or disable the port scan
    pub fn port_scan(mut self, enabled: bool) -> Self {
        self.config.port_scan = enabled;
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<VitalsConfig, ProbeError> {
        self.config.validate().map_err(ProbeError::Config)?;
        Ok(self.config)
    }
}

impl Default for VitalsConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Everything learned about one host
#[derive(Debug, Clone, PartialEq)]
pub struct HostReport {
    /// Host as given on the command line
    pub name: String,
    /// Address that was probed
    pub addr: IpAddr,
    /// Ping statistics, when pinging ran and its socket opened
    pub ping: Option<Statistics>,
    /// Route, when tracing ran and its socket opened; may be partial
    pub trace: Option<RouteTrace>,
    /// Port scan, when requested
    pub scan: Option<ScanResult>,
}

/// Per-host results, one lock per probe kind
struct Collector {
    ping: Mutex<Vec<Option<Statistics>>>,
    trace: Mutex<Vec<Option<RouteTrace>>>,
    scan: Mutex<Vec<Option<ScanResult>>>,
}

impl Collector {
    fn new(hosts: usize) -> Self {
        Self {
            ping: Mutex::new(vec![None; hosts]),
            trace: Mutex::new(vec![None; hosts]),
            scan: Mutex::new(vec![None; hosts]),
        }
    }

    fn record_ping(&self, index: usize, stats: Statistics) {
        self.ping.lock().expect("mutex poisoned")[index] = Some(stats);
    }

    fn record_trace(&self, index: usize, trace: RouteTrace) {
        self.trace.lock().expect("mutex poisoned")[index] = Some(trace);
    }

    fn record_scan(&self, index: usize, scan: ScanResult) {
        self.scan.lock().expect("mutex poisoned")[index] = Some(scan);
    }

    fn drain(&self, hosts: Vec<ResolvedHost>) -> Vec<HostReport> {
        let pings = std::mem::take(&mut *self.ping.lock().expect("mutex poisoned"));
        let traces = std::mem::take(&mut *self.trace.lock().expect("mutex poisoned"));
        let scans = std::mem::take(&mut *self.scan.lock().expect("mutex poisoned"));

        hosts
            .into_iter()
            .zip(pings)
            .zip(traces)
            .zip(scans)
            .map(|(((host, ping), trace), scan)| HostReport {
                name: host.name,
                addr: host.addr,
                ping,
                trace,
                scan,
            })
            .collect()
    }
}

/// Resolves hosts and runs the configured probes against them
pub struct Orchestrator {
    config: VitalsConfig,
    resolver: Resolver,
    opener: TransportOpener,
}

impl Orchestrator {
    /// Create an orchestrator that probes over raw ICMP sockets
    pub fn new(config: VitalsConfig) -> Self {
        Self::with_opener(
            config,
            Arc::new(|_: IpAddr, family: IpFamily| transport::open(family)),
        )
    }

    /// Create an orchestrator that opens transports with `opener`
    pub fn with_opener(config: VitalsConfig, opener: TransportOpener) -> Self {
        Self {
            config,
            resolver: Resolver::new(),
            opener,
        }
    }

    /// Configuration this orchestrator runs with
    pub fn config(&self) -> &VitalsConfig {
        &self.config
    }

    /// Probe every host in `hosts` and return one report per resolved host
    ///
    /// Fails only when none of the hosts could be resolved.
    pub async fn run(&self, hosts: &[String]) -> Result<Vec<HostReport>, ProbeError> {
        let resolved = self.resolve_all(hosts).await;
        if resolved.is_empty() {
            return Err(ProbeError::NoTargets);
        }

        let collector = Arc::new(Collector::new(resolved.len()));
        let mut tasks = JoinSet::new();
        for (index, host) in resolved.iter().enumerate() {
            self.spawn_probes(&mut tasks, &collector, index, host);
        }
        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                warn!("probe task failed: {e}");
            }
        }

        Ok(collector.drain(resolved))
    }

    async fn resolve_all(&self, hosts: &[String]) -> Vec<ResolvedHost> {
        let lookups = hosts.iter().map(|host| self.resolver.resolve(host));
        join_all(lookups)
            .await
            .into_iter()
            .filter_map(|result| match result {
                Ok(host) => Some(host),
                Err(e) => {
                    logging::error(&e, 0);
                    None
                }
            })
            .collect()
    }

    fn spawn_probes(
        &self,
        tasks: &mut JoinSet<()>,
        collector: &Arc<Collector>,
        index: usize,
        host: &ResolvedHost,
    ) {
        let addr = host.addr;
        let family = IpFamily::from_ipv6_flag(host.is_ipv6());
        debug!("probing {} ({addr}) over {family}", host.name);

        if let Some(ping) = &self.config.ping {
            let prober = EchoProber::new(ping.clone());
            let opener = Arc::clone(&self.opener);
            let collector = Arc::clone(collector);
            tasks.spawn(async move {
                match opener(addr, family) {
                    Ok(transport) => {
                        let stats = prober.run_with_transport(Arc::from(transport), addr).await;
                        collector.record_ping(index, stats);
                    }
                    Err(e) => logging::error(&ProbeError::from(e), 0),
                }
            });
        }

        if let Some(trace) = &self.config.trace {
            let tracer = RouteTracer::new(trace.clone());
            let opener = Arc::clone(&self.opener);
            let collector = Arc::clone(collector);
            tasks.spawn(async move {
                match opener(addr, family) {
                    Ok(transport) => {
                        let route = tracer.run_with_transport(&*transport, addr).await;
                        if let Err(e) = route.check() {
                            logging::error(&e, 0);
                        }
                        collector.record_trace(index, route);
                    }
                    Err(e) => logging::error(&ProbeError::from(e), 0),
                }
            });
        }

        if self.config.port_scan {
            let collector = Arc::clone(collector);
            tasks.spawn(async move {
                collector.record_scan(index, scan::scan(addr).await);
            });
        }
    }
}

/// Probe `hosts` with `config` over raw ICMP sockets
pub async fn run_vitals(
    hosts: &[String],
    config: VitalsConfig,
) -> Result<Vec<HostReport>, ProbeError> {
    Orchestrator::new(config).run(hosts).await
}

#[cfg(test)]
#[path = "orchestrator_tests.rs"]
mod orchestrator_tests;
