//! In-memory network for exercising the probes without raw sockets
//!
//! Like a raw ICMP socket, every attached transport sees every inbound
//! datagram, so a ping session and a trace session attached to the same
//! network receive each other's replies and must filter them out.

use super::{IpFamily, SharedDeadline, Transport, TransportError};
use crate::packet::{EchoRequest, PING_IDENTIFIER};
use async_trait::async_trait;
use std::collections::HashSet;
use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::Instant;

const DEFAULT_HOP_LIMIT: u8 = 64;

/// Behaviour of one router on the simulated path
#[derive(Debug, Clone, Copy)]
pub(crate) enum SimHop {
    /// Answers expiring probes with Time-Exceeded after `delay`
    Router { addr: IpAddr, delay: Duration },
    /// Drops expiring probes silently
    Silent,
}

#[derive(Debug, Clone)]
struct Datagram {
    from: IpAddr,
    bytes: Vec<u8>,
}

/// A scripted path to a single target
pub(crate) struct SimulatedNetwork {
    family: IpFamily,
    target: IpAddr,
    path: Vec<SimHop>,
    ping_delays: Vec<Option<Duration>>,
    target_delay: Option<Duration>,
    failing_sends: HashSet<(u16, u16)>,
    inbound: broadcast::Sender<Datagram>,
}

impl SimulatedNetwork {
    /// A target directly reachable that answers every echo after 1ms
    pub(crate) fn new(target: IpAddr) -> Self {
        let family = IpFamily::from_ipv6_flag(target.is_ipv6());
        let (inbound, _) = broadcast::channel(1024);
        Self {
            family,
            target,
            path: Vec::new(),
            ping_delays: Vec::new(),
            target_delay: Some(Duration::from_millis(1)),
            failing_sends: HashSet::new(),
            inbound,
        }
    }

    /// Routers between the sender and the target, nearest first
    pub(crate) fn path(mut self, path: Vec<SimHop>) -> Self {
        self.path = path;
        self
    }

    /// Per-sequence reply delays for ping probes; `None` drops the reply
    pub(crate) fn ping_delays(mut self, delays: Vec<Option<Duration>>) -> Self {
        self.ping_delays = delays;
        self
    }

    /// Reply delay for every other echo reaching the target
    pub(crate) fn target_delay(mut self, delay: Option<Duration>) -> Self {
        self.target_delay = delay;
        self
    }

    /// Make sending the given (identifier, sequence) fail with an I/O error
    pub(crate) fn fail_send(mut self, identifier: u16, sequence: u16) -> Self {
        self.failing_sends.insert((identifier, sequence));
        self
    }

    pub(crate) fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// Attach a new transport; it only sees datagrams sent after this call
    pub(crate) fn attach(self: &Arc<Self>) -> SimulatedTransport {
        SimulatedTransport {
            network: Arc::clone(self),
            inbound: tokio::sync::Mutex::new(self.inbound.subscribe()),
            deadline: SharedDeadline::default(),
            hop_limit: AtomicU8::new(DEFAULT_HOP_LIMIT),
            sent: Mutex::new(Vec::new()),
        }
    }

    /// Deliver arbitrary bytes from `from` to every attached transport after `delay`
    pub(crate) fn inject(&self, delay: Duration, from: IpAddr, bytes: Vec<u8>) {
        self.deliver(delay, Datagram { from, bytes });
    }

    fn deliver(&self, delay: Duration, datagram: Datagram) {
        let inbound = self.inbound.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = inbound.send(datagram);
        });
    }

    fn echo_delay(&self, request: &EchoRequest) -> Option<Duration> {
        let slot = usize::from(request.sequence);
        if request.identifier == PING_IDENTIFIER && slot < self.ping_delays.len() {
            self.ping_delays[slot]
        } else {
            self.target_delay
        }
    }

    fn route(&self, hop_limit: u8, request: &EchoRequest) {
        if hop_limit == 0 {
            return;
        }
        match self.path.get(usize::from(hop_limit) - 1) {
            Some(SimHop::Router { addr, delay }) => {
                let bytes = time_exceeded_bytes(
                    self.family,
                    self.target,
                    request.identifier,
                    request.sequence,
                );
                self.deliver(*delay, Datagram { from: *addr, bytes });
            }
            Some(SimHop::Silent) => {}
            None => {
                if let Some(delay) = self.echo_delay(request) {
                    let bytes = echo_reply_bytes(
                        self.family,
                        request.identifier,
                        request.sequence,
                        &request.payload,
                    );
                    self.deliver(
                        delay,
                        Datagram {
                            from: self.target,
                            bytes,
                        },
                    );
                }
            }
        }
    }
}

/// One endpoint attached to a [`SimulatedNetwork`]
pub(crate) struct SimulatedTransport {
    network: Arc<SimulatedNetwork>,
    inbound: tokio::sync::Mutex<broadcast::Receiver<Datagram>>,
    deadline: SharedDeadline,
    hop_limit: AtomicU8,
    sent: Mutex<Vec<(u8, EchoRequest)>>,
}

impl SimulatedTransport {
    /// Every request sent so far, with the hop limit it was sent with
    pub(crate) fn sent_requests(&self) -> Vec<(u8, EchoRequest)> {
        self.sent.lock().expect("mutex poisoned").clone()
    }
}

#[async_trait]
impl Transport for SimulatedTransport {
    fn family(&self) -> IpFamily {
        self.network.family
    }

    fn set_deadline(&self, deadline: Instant) {
        self.deadline.set(deadline);
    }

    fn set_hop_limit(&self, hops: u8) -> Result<(), TransportError> {
        self.hop_limit.store(hops, Ordering::SeqCst);
        Ok(())
    }

    async fn send(&self, target: IpAddr, request: &EchoRequest) -> Result<(), TransportError> {
        if self
            .network
            .failing_sends
            .contains(&(request.identifier, request.sequence))
        {
            return Err(TransportError::Io(io::Error::new(
                io::ErrorKind::NetworkUnreachable,
                "simulated send failure",
            )));
        }
        let hop_limit = self.hop_limit.load(Ordering::SeqCst);
        self.sent
            .lock()
            .expect("mutex poisoned")
            .push((hop_limit, request.clone()));
        if target == self.network.target {
            self.network.route(hop_limit, request);
        }
        Ok(())
    }

    async fn receive(&self, buf: &mut [u8]) -> Result<(usize, IpAddr), TransportError> {
        self.deadline
            .bound(async {
                let mut inbound = self.inbound.lock().await;
                loop {
                    match inbound.recv().await {
                        Ok(datagram) => {
                            let len = datagram.bytes.len().min(buf.len());
                            buf[..len].copy_from_slice(&datagram.bytes[..len]);
                            return Ok((len, datagram.from));
                        }
                        Err(broadcast::error::RecvError::Lagged(_)) => continue,
                        Err(broadcast::error::RecvError::Closed) => {
                            return Err(TransportError::Io(io::Error::from(
                                io::ErrorKind::BrokenPipe,
                            )))
                        }
                    }
                }
            })
            .await
    }
}

/// Bytes of an Echo Reply as a raw socket would deliver them (no IP header)
pub(crate) fn echo_reply_bytes(
    family: IpFamily,
    identifier: u16,
    sequence: u16,
    payload: &[u8],
) -> Vec<u8> {
    let mut bytes = vec![0u8; 8];
    bytes[0] = match family {
        IpFamily::V4 => 0,
        IpFamily::V6 => 129,
    };
    bytes[4..6].copy_from_slice(&identifier.to_be_bytes());
    bytes[6..8].copy_from_slice(&sequence.to_be_bytes());
    bytes.extend_from_slice(payload);
    if family == IpFamily::V4 {
        let checksum = pnet::util::checksum(&bytes, 1);
        bytes[2..4].copy_from_slice(&checksum.to_be_bytes());
    }
    bytes
}

/// Bytes of a Time-Exceeded message quoting an echo request sent to
/// `original_destination`
pub(crate) fn time_exceeded_bytes(
    family: IpFamily,
    original_destination: IpAddr,
    identifier: u16,
    sequence: u16,
) -> Vec<u8> {
    let request = EchoRequest::new(identifier, sequence, vec![0]);
    let (icmp_type, quoted_header, echo) = match (family, original_destination) {
        (IpFamily::V4, IpAddr::V4(dest)) => {
            let echo = request.encode_v4().expect("echo encodes");
            let mut header = vec![0u8; 20];
            header[0] = 0x45;
            header[2..4].copy_from_slice(&((20 + echo.len()) as u16).to_be_bytes());
            header[8] = 1;
            header[9] = 1;
            header[12..16].copy_from_slice(&Ipv4Addr::new(192, 0, 2, 1).octets());
            header[16..20].copy_from_slice(&dest.octets());
            (11, header, echo)
        }
        (IpFamily::V6, IpAddr::V6(dest)) => {
            let source: Ipv6Addr = "2001:db8::1".parse().expect("valid address");
            let echo = request.encode_v6(source, dest).expect("echo encodes");
            let mut header = vec![0u8; 40];
            header[0] = 0x60;
            header[4..6].copy_from_slice(&(echo.len() as u16).to_be_bytes());
            header[6] = 58;
            header[7] = 1;
            header[8..24].copy_from_slice(&source.octets());
            header[24..40].copy_from_slice(&dest.octets());
            (3, header, echo)
        }
        _ => panic!("destination {original_destination} does not match {family}"),
    };

    let mut bytes = vec![icmp_type, 0, 0, 0, 0, 0, 0, 0];
    bytes.extend_from_slice(&quoted_header);
    bytes.extend_from_slice(&echo);
    bytes
}
