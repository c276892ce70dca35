//! connvitals - checks the vitals of network connections to hosts.
//!
//! This is the command-line interface for the connvitals library.

#![allow(clippy::uninlined_format_args)]

use anyhow::Result;
use clap::Parser;
use connvitals::config::{timing, TimingConfig};
use connvitals::transport::privileges::check_raw_socket_access;
use connvitals::{
    logging, report, IpFamily, Orchestrator, OutputFormat, PingConfig, ProbeError,
    TracerouteConfig, TransportError, VitalsConfig,
};
use std::time::Duration;

/// Get the version string for connvitals
fn get_version() -> &'static str {
    if cfg!(debug_assertions) {
        concat!(env!("CARGO_PKG_VERSION"), "-UNRELEASED")
    } else {
        env!("CARGO_PKG_VERSION")
    }
}

/// Command-line arguments for connvitals.
#[derive(Parser, Debug)]
#[clap(
    author,
    version,
    about = "Ping, trace and port-scan hosts to check their connection vitals",
    long_about = None
)]
struct Args {
    /// Hosts to check, by name or IP address
    #[clap(required = true)]
    hosts: Vec<String>,

    /// Maximum number of hops for route tracing
    #[clap(short = 'H', long, default_value_t = 30)]
    hops: u8,

    /// Number of pings used for aggregate statistics
    #[clap(short, long, default_value_t = 10)]
    pings: u16,

    /// Don't run ping tests
    #[clap(short = 'P', long)]
    no_ping: bool,

    /// Run route tracing
    #[clap(short, long)]
    trace: bool,

    /// Perform a limited scan of each host's HTTP, HTTPS and MySQL ports
    #[clap(short = 's', long)]
    port_scan: bool,

    /// Print one line of JSON per host
    #[clap(short, long)]
    json: bool,

    /// Size (in bytes) of ping payloads
    #[clap(long, default_value_t = 41)]
    payload_size: usize,

    /// Deadline for each host's ping run in milliseconds (default 2000)
    #[clap(long)]
    ping_timeout_ms: Option<u64>,

    /// Time to wait for each traced hop in milliseconds (default 100)
    #[clap(long)]
    hop_timeout_ms: Option<u64>,

    /// Enable verbose logging (repeat for more detail)
    #[clap(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Args {
    /// Timing overrides requested on the command line, if any
    fn timing_overrides(&self) -> Option<TimingConfig> {
        if self.ping_timeout_ms.is_none() && self.hop_timeout_ms.is_none() {
            return None;
        }
        let mut timing = TimingConfig::default();
        if let Some(ms) = self.ping_timeout_ms {
            timing.ping_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = self.hop_timeout_ms {
            timing.hop_timeout = Duration::from_millis(ms);
        }
        Some(timing)
    }
}

/// Translate the command line into a validated probe configuration
fn build_config(args: &Args) -> Result<VitalsConfig, ProbeError> {
    let mut builder = VitalsConfig::builder().port_scan(args.port_scan);

    builder = if args.no_ping {
        builder.no_ping()
    } else {
        let ping = PingConfig::builder()
            .count(args.pings)
            .payload_size(args.payload_size)
            .build()
            .map_err(ProbeError::Config)?;
        builder.ping(ping)
    };

    if args.trace {
        let trace = TracerouteConfig::builder()
            .max_hops(args.hops)
            .build()
            .map_err(ProbeError::Config)?;
        builder = builder.trace(trace);
    }

    builder.build()
}

fn main() {
    // Quick check for version before parsing, so the output matches the binary name
    let raw_args: Vec<String> = std::env::args().collect();
    if raw_args.len() == 2 && (raw_args[1] == "--version" || raw_args[1] == "-V") {
        println!("connvitals {}", get_version());
        return;
    }

    let args = Args::parse();
    logging::init(args.verbose);

    if let Some(overrides) = args.timing_overrides() {
        if timing::set_config(overrides).is_err() {
            tracing::warn!("timing configuration was already set; ignoring overrides");
        }
    }

    let config = match build_config(&args) {
        Ok(config) => config,
        Err(e) => {
            logging::error(&e, 1);
            return;
        }
    };

    if config.needs_raw_socket() {
        if let Err(e) = check_raw_socket_access(IpFamily::V4) {
            if let TransportError::InsufficientPermissions { suggestion, .. } = &e {
                eprintln!("connvitals needs raw ICMP sockets for ping and trace: {suggestion}");
            }
            logging::error(&e, 1);
            return;
        }
    }

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            logging::error(&format!("Failed to create Tokio runtime: {e}"), 1);
            return;
        }
    };

    if let Err(e) = runtime.block_on(async_main(args, config)) {
        logging::error(&e, 1);
    }
}

async fn async_main(args: Args, config: VitalsConfig) -> Result<()> {
    let format = OutputFormat::from_json_flag(args.json);
    let reports = Orchestrator::new(config).run(&args.hosts).await?;

    for host_report in &reports {
        println!("{}", report::render(host_report, format)?);
    }
    Ok(())
}
