//! Text and JSON rendering of host reports

use crate::orchestrator::HostReport;
use crate::scan::ScanResult;
use crate::stats::Statistics;
use crate::traceroute::HopRecord;
use serde::Serialize;
use std::net::IpAddr;

/// Output format for host reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Tab-separated, several lines per host
    #[default]
    Text,
    /// One JSON object per host, one per line
    Json,
}

impl OutputFormat {
    /// Pick the format from the `--json` flag
    pub fn from_json_flag(json: bool) -> Self {
        if json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        }
    }
}

#[derive(Serialize)]
struct JsonReport<'a> {
    addr: IpAddr,
    name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    ping: Option<&'a Statistics>,
    #[serde(skip_serializing_if = "Option::is_none")]
    trace: Option<&'a [HopRecord]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    scan: Option<&'a ScanResult>,
}

/// Render `report` in `format`, without a trailing newline
pub fn render(report: &HostReport, format: OutputFormat) -> Result<String, serde_json::Error> {
    match format {
        OutputFormat::Text => Ok(render_text(report)),
        OutputFormat::Json => render_json(report),
    }
}

/// Header line, then ping statistics, hops and scan results as present
pub fn render_text(report: &HostReport) -> String {
    let mut lines = Vec::new();
    if report.addr.to_string() == report.name {
        lines.push(report.name.clone());
    } else {
        lines.push(format!("{} ({})", report.name, report.addr));
    }
    if let Some(stats) = &report.ping {
        lines.push(stats.to_string());
    }
    if let Some(route) = &report.trace {
        lines.extend(route.hops.iter().map(ToString::to_string));
    }
    if let Some(scan) = &report.scan {
        lines.push(scan.to_string());
    }
    lines.join("\n")
}

/// One-line JSON object; categories that did not run are left out
pub fn render_json(report: &HostReport) -> Result<String, serde_json::Error> {
    serde_json::to_string(&JsonReport {
        addr: report.addr,
        name: &report.name,
        ping: report.ping.as_ref(),
        trace: report.trace.as_ref().map(|route| route.hops.as_slice()),
        scan: report.scan.as_ref(),
    })
}
