//! Round-trip time statistics over a ping session

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Convert a duration to fractional milliseconds
pub fn millis(duration: Duration) -> f64 {
    duration.as_nanos() as f64 / 1_000_000.0
}

/// Summary of one ping session
///
/// All times are in milliseconds; `loss` is a percentage. When every probe
/// was lost the times hold the sentinel `-1`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Statistics {
    /// Fastest round trip
    pub min: f64,
    /// Mean round trip over delivered probes
    pub avg: f64,
    /// Slowest round trip
    pub max: f64,
    /// Sample standard deviation over delivered probes
    pub std: f64,
    /// Percentage of probes that got no reply
    pub loss: f64,
}

impl Statistics {
    /// Result when no probe got a reply
    pub const ALL_LOST: Statistics = Statistics {
        min: -1.0,
        avg: -1.0,
        max: -1.0,
        std: -1.0,
        loss: 100.0,
    };

    /// Compute statistics from per-sequence samples; `None` is a lost probe
    ///
    /// With exactly one delivered sample the standard deviation is 0.
    pub fn from_samples(samples: &[Option<Duration>]) -> Self {
        let delivered: Vec<f64> = samples
            .iter()
            .flatten()
            .map(|rtt| millis(*rtt))
            .collect();
        if delivered.is_empty() {
            return Self::ALL_LOST;
        }

        let sent = samples.len() as f64;
        let count = delivered.len() as f64;
        let lost = sent - count;

        let min = delivered.iter().copied().fold(f64::INFINITY, f64::min);
        let max = delivered.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let avg = delivered.iter().sum::<f64>() / count;

        let std = if delivered.len() > 1 {
            let squares: f64 = delivered.iter().map(|rtt| (rtt - avg).powi(2)).sum();
            (squares / (count - 1.0)).sqrt()
        } else {
            0.0
        };

        Statistics {
            min,
            avg,
            max,
            std,
            loss: lost / sent * 100.0,
        }
    }

    /// Whether every probe was lost
    pub fn all_lost(&self) -> bool {
        self.loss >= 100.0
    }
}

impl fmt::Display for Statistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:.3}\t{:.3}\t{:.3}\t{:.3}\t{:.3}",
            self.min, self.avg, self.max, self.std, self.loss
        )
    }
}
