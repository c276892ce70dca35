//! Concurrent ICMP echo prober

use super::config::PingConfig;
use super::session::{EchoSession, ReplyOutcome};
use crate::error::ProbeError;
use crate::packet::{self, EchoRequest, PING_IDENTIFIER};
use crate::stats::Statistics;
use crate::transport::{self, IpFamily, Transport, TransportError};
use std::net::IpAddr;
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, trace, warn};

/// Sends a burst of echo requests to one host and times the replies
///
/// Every request gets its own send task and its own receive task. Receive
/// tasks race for datagrams on the shared socket; a reply is filed under the
/// sequence number it carries, not under the task that happened to read it.
#[derive(Debug, Clone)]
pub struct EchoProber {
    config: PingConfig,
}

impl EchoProber {
    /// Create a prober for `config`
    pub fn new(config: PingConfig) -> Self {
        Self { config }
    }

    /// Configuration this prober runs with
    pub fn config(&self) -> &PingConfig {
        &self.config
    }

    /// Ping `target` over a freshly opened raw socket of `family`
    ///
    /// Only failing to open the socket is an error; lost or unparseable
    /// replies show up as loss in the returned statistics.
    pub async fn run(&self, target: IpAddr, family: IpFamily) -> Result<Statistics, ProbeError> {
        let transport: Arc<dyn Transport> = Arc::from(transport::open(family)?);
        Ok(self.run_with_transport(transport, target).await)
    }

    /// Ping `target` over an already opened transport
    pub async fn run_with_transport(
        &self,
        transport: Arc<dyn Transport>,
        target: IpAddr,
    ) -> Statistics {
        let count = self.config.count;
        let session = Arc::new(EchoSession::new(
            count,
            packet::ping_payload(self.config.payload_size),
        ));
        transport.set_deadline(Instant::now() + self.config.timeout);
        debug!(
            "pinging {target} with {count} probes of {} bytes",
            self.config.payload_size
        );

        let mut tasks = JoinSet::new();
        for sequence in 0..count {
            let session = Arc::clone(&session);
            let transport = Arc::clone(&transport);
            tasks.spawn(async move { send_probe(&*transport, target, &session, sequence).await });
        }
        for _ in 0..count {
            let session = Arc::clone(&session);
            let transport = Arc::clone(&transport);
            let buffer_len = self.config.receive_buffer_len();
            tasks.spawn(async move {
                await_reply(&*transport, target, &session, buffer_len).await;
            });
        }

        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                warn!("ping task for {target} failed: {e}");
            }
        }

        Statistics::from_samples(&session.samples())
    }
}

async fn send_probe(transport: &dyn Transport, target: IpAddr, session: &EchoSession, sequence: u16) {
    let request = EchoRequest::new(PING_IDENTIFIER, sequence, session.payload().to_vec());
    session.record_send(sequence, Instant::now());
    if let Err(e) = transport.send(target, &request).await {
        warn!("Failed to send ping {sequence} to {target}: {e}");
    }
}

/// Read datagrams until one completes a probe of this session
async fn await_reply(
    transport: &dyn Transport,
    target: IpAddr,
    session: &EchoSession,
    buffer_len: usize,
) {
    let mut buf = vec![0u8; buffer_len];
    loop {
        let (len, from) = match transport.receive(&mut buf).await {
            Ok(received) => received,
            Err(TransportError::Timeout) => return,
            Err(e) => {
                warn!("Failed to receive ping reply from {target}: {e}");
                return;
            }
        };
        let received_at = Instant::now();
        if from != target {
            continue;
        }

        let message = match transport.parse_icmp(&buf[..len]) {
            Ok(message) => message,
            Err(e) => {
                warn!("Discarding reply from {target}: {e}");
                continue;
            }
        };
        let Some(echo) = message.echo_reply_for(PING_IDENTIFIER) else {
            continue;
        };

        match session.record_reply(echo.sequence, received_at) {
            ReplyOutcome::Recorded(rtt) => {
                trace!("ping {} from {target}: {rtt:?}", echo.sequence);
                return;
            }
            ReplyOutcome::Duplicate | ReplyOutcome::Unknown => {
                trace!("ignoring reply {} from {target}", echo.sequence);
            }
        }
    }
}

/// Ping `target` with `config`, choosing the socket family from `is_ipv6`
pub async fn ping_host(
    target: IpAddr,
    is_ipv6: bool,
    config: PingConfig,
) -> Result<Statistics, ProbeError> {
    EchoProber::new(config)
        .run(target, IpFamily::from_ipv6_flag(is_ipv6))
        .await
}

#[cfg(test)]
#[path = "prober_tests.rs"]
mod prober_tests;
