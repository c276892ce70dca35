//! Banner probes for well-known TCP services
//!
//! Each probe connects, exchanges at most one request and one response,
//! and reports the service as absent on any failure. Failures are only
//! logged at debug level: a closed port is the common case.

use crate::config::timing;
use crate::stats::millis;
use serde::{Serialize, Serializer};
use std::fmt;
use std::io;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::{timeout, Instant};
use tracing::debug;

/// Port probed for plain HTTP
pub const HTTP_PORT: u16 = 80;
/// Port probed for HTTPS
pub const HTTPS_PORT: u16 = 443;
/// Port probed for MySQL
pub const MYSQL_PORT: u16 = 3306;

const HEAD_REQUEST: &[u8] = b"HEAD / HTTP/1.1\r\n\r\n";
const RESPONSE_BUFFER_LEN: usize = 1000;
const UNKNOWN_SERVER: &str = "Unknown";

/// An HTTP or HTTPS server that answered a `HEAD` request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HttpService {
    /// Time from connection established to response received
    #[serde(serialize_with = "duration_ms")]
    pub rtt: Duration,
    /// Three-digit status code
    #[serde(rename = "response code")]
    pub response: String,
    /// Value of the `Server` header, or `Unknown`
    pub server: String,
}

impl fmt::Display for HttpService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:.3}, {}, {}",
            millis(self.rtt),
            self.response,
            self.server
        )
    }
}

/// A MySQL server that sent its greeting
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MysqlService {
    /// Time from connection established to greeting received
    #[serde(serialize_with = "duration_ms")]
    pub rtt: Duration,
    /// Server version string from the greeting
    pub version: String,
}

impl fmt::Display for MysqlService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.3}, {}", millis(self.rtt), self.version)
    }
}

/// Services found on one host; absent services serialize as `"None"`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScanResult {
    /// Plain HTTP on port 80
    #[serde(serialize_with = "none_as_string")]
    pub http: Option<HttpService>,
    /// HTTPS on port 443
    #[serde(serialize_with = "none_as_string")]
    pub https: Option<HttpService>,
    /// MySQL on port 3306
    #[serde(serialize_with = "none_as_string")]
    pub mysql: Option<MysqlService>,
}

impl fmt::Display for ScanResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn or_none<T: fmt::Display>(service: &Option<T>) -> String {
            service
                .as_ref()
                .map_or_else(|| "None".to_string(), ToString::to_string)
        }
        write!(
            f,
            "{}\t{}\t{}",
            or_none(&self.http),
            or_none(&self.https),
            or_none(&self.mysql)
        )
    }
}

fn duration_ms<S: Serializer>(rtt: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(millis(*rtt))
}

fn none_as_string<T: Serialize, S: Serializer>(
    service: &Option<T>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match service {
        Some(service) => service.serialize(serializer),
        None => serializer.serialize_str("None"),
    }
}

#[derive(Debug, Error)]
enum ServiceError {
    #[error("{0} timed out")]
    Timeout(&'static str),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("TLS failure: {0}")]
    Tls(#[from] native_tls::Error),
    #[error("unrecognised response: {0}")]
    Malformed(String),
}

/// Probe `addr` for HTTP, HTTPS and MySQL concurrently
pub async fn scan(addr: IpAddr) -> ScanResult {
    let (http, https, mysql) = tokio::join!(
        probe_http(SocketAddr::new(addr, HTTP_PORT)),
        probe_https(SocketAddr::new(addr, HTTPS_PORT)),
        probe_mysql(SocketAddr::new(addr, MYSQL_PORT)),
    );
    ScanResult { http, https, mysql }
}

/// Send `HEAD /` over plain TCP
pub async fn probe_http(addr: SocketAddr) -> Option<HttpService> {
    report(addr, "http", http_exchange(addr).await)
}

/// Send `HEAD /` over TLS, accepting any certificate
pub async fn probe_https(addr: SocketAddr) -> Option<HttpService> {
    report(addr, "https", https_exchange(addr).await)
}

/// Read the MySQL server greeting
pub async fn probe_mysql(addr: SocketAddr) -> Option<MysqlService> {
    report(addr, "mysql", mysql_exchange(addr).await)
}

fn report<T>(addr: SocketAddr, service: &str, result: Result<T, ServiceError>) -> Option<T> {
    result
        .map_err(|e| debug!("{service} probe of {addr} failed: {e}"))
        .ok()
}

async fn connect(addr: SocketAddr) -> Result<TcpStream, ServiceError> {
    timeout(timing::connect_timeout(), TcpStream::connect(addr))
        .await
        .map_err(|_| ServiceError::Timeout("connect"))?
        .map_err(ServiceError::Io)
}

async fn http_exchange(addr: SocketAddr) -> Result<HttpService, ServiceError> {
    let stream = connect(addr).await?;
    let started = Instant::now();
    let response = timeout(timing::http_read_timeout(), head_request(stream))
        .await
        .map_err(|_| ServiceError::Timeout("http response"))??;
    http_service(started.elapsed(), &response)
}

async fn https_exchange(addr: SocketAddr) -> Result<HttpService, ServiceError> {
    let stream = connect(addr).await?;
    let connector = native_tls::TlsConnector::builder()
        .danger_accept_invalid_certs(true)
        .danger_accept_invalid_hostnames(true)
        .build()?;
    let connector = tokio_native_tls::TlsConnector::from(connector);
    let domain = addr.ip().to_string();
    let stream = timeout(
        timing::tls_handshake_timeout(),
        connector.connect(&domain, stream),
    )
    .await
    .map_err(|_| ServiceError::Timeout("tls handshake"))??;

    let started = Instant::now();
    let response = timeout(timing::http_read_timeout(), head_request(stream))
        .await
        .map_err(|_| ServiceError::Timeout("https response"))??;
    http_service(started.elapsed(), &response)
}

async fn mysql_exchange(addr: SocketAddr) -> Result<MysqlService, ServiceError> {
    let mut stream = connect(addr).await?;
    let started = Instant::now();
    let mut buf = vec![0u8; RESPONSE_BUFFER_LEN];
    let len = timeout(timing::mysql_read_timeout(), stream.read(&mut buf))
        .await
        .map_err(|_| ServiceError::Timeout("mysql greeting"))??;
    let rtt = started.elapsed();

    let version = parse_mysql_greeting(&buf[..len])
        .ok_or_else(|| ServiceError::Malformed(format!("{len} byte greeting")))?;
    Ok(MysqlService { rtt, version })
}

async fn head_request<S>(mut stream: S) -> Result<Vec<u8>, ServiceError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    stream.write_all(HEAD_REQUEST).await?;
    let mut buf = vec![0u8; RESPONSE_BUFFER_LEN];
    let len = stream.read(&mut buf).await?;
    buf.truncate(len);
    Ok(buf)
}

fn http_service(rtt: Duration, response: &[u8]) -> Result<HttpService, ServiceError> {
    let (response, server) = parse_http_response(response).ok_or_else(|| {
        let status_line = String::from_utf8_lossy(response);
        ServiceError::Malformed(status_line.lines().next().unwrap_or_default().to_string())
    })?;
    Ok(HttpService {
        rtt,
        response,
        server,
    })
}

/// Status code and `Server` header of an HTTP response head
fn parse_http_response(response: &[u8]) -> Option<(String, String)> {
    let text = String::from_utf8_lossy(response);
    if !text.starts_with("HTTP/") {
        return None;
    }
    let code = text.get(9..12)?;
    if !code.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let server = text
        .lines()
        .skip(1)
        .take_while(|line| !line.is_empty())
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("server"))
        .map_or(UNKNOWN_SERVER, |(_, value)| value.trim());
    Some((code.to_string(), server.to_string()))
}

/// Server version from a MySQL initial handshake packet
///
/// The packet is a 4-byte header, a protocol version byte, then the
/// NUL-terminated version string.
fn parse_mysql_greeting(greeting: &[u8]) -> Option<String> {
    const ERROR_PACKET: u8 = 0xff;
    if *greeting.get(4)? == ERROR_PACKET {
        return None;
    }
    let rest = greeting.get(5..)?;
    let version = rest.split(|&b| b == 0).next()?;
    if version.is_empty() {
        return None;
    }
    Some(String::from_utf8_lossy(version).into_owned())
}
