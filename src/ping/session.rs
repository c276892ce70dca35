//! Per-sequence bookkeeping for one ping session

use once_cell::sync::OnceCell;
use std::time::Duration;
use tokio::time::Instant;

/// What happened to a reply offered to the session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyOutcome {
    /// The round trip was recorded
    Recorded(Duration),
    /// A reply for this sequence was already recorded
    Duplicate,
    /// The sequence is out of range or was never sent
    Unknown,
}

/// Send timestamps and round-trip results, one slot per sequence number
///
/// Each timestamp slot is written once, by the task sending that sequence.
/// Each result slot is claimed at most once, by whichever receive task sees
/// the reply first, and only after its timestamp exists.
#[derive(Debug)]
pub struct EchoSession {
    payload: Vec<u8>,
    sent_at: Vec<OnceCell<Instant>>,
    rtts: Vec<OnceCell<Duration>>,
}

impl EchoSession {
    /// A session of `count` probes sharing `payload`, all initially lost
    pub fn new(count: u16, payload: Vec<u8>) -> Self {
        let count = usize::from(count);
        Self {
            payload,
            sent_at: (0..count).map(|_| OnceCell::new()).collect(),
            rtts: (0..count).map(|_| OnceCell::new()).collect(),
        }
    }

    /// Number of probes in the session
    pub fn len(&self) -> usize {
        self.sent_at.len()
    }

    /// Whether the session has no probes
    pub fn is_empty(&self) -> bool {
        self.sent_at.is_empty()
    }

    /// Echo payload shared by every probe
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Record when `sequence` was sent; later calls for the same slot are ignored
    pub fn record_send(&self, sequence: u16, at: Instant) {
        if let Some(slot) = self.sent_at.get(usize::from(sequence)) {
            let _ = slot.set(at);
        }
    }

    /// Offer a reply for `sequence` received at `at`
    pub fn record_reply(&self, sequence: u16, at: Instant) -> ReplyOutcome {
        let index = usize::from(sequence);
        let Some(sent_at) = self.sent_at.get(index).and_then(OnceCell::get) else {
            return ReplyOutcome::Unknown;
        };
        let rtt = at.saturating_duration_since(*sent_at);
        match self.rtts[index].set(rtt) {
            Ok(()) => ReplyOutcome::Recorded(rtt),
            Err(_) => ReplyOutcome::Duplicate,
        }
    }

    /// Round trip per sequence; `None` for probes that got no reply
    pub fn samples(&self) -> Vec<Option<Duration>> {
        self.rtts.iter().map(|slot| slot.get().copied()).collect()
    }
}
