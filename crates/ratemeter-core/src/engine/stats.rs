use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Result of feeding one latency into [`ResponseStats::record`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThresholdCheck {
    /// The latency exceeded the threshold derived from earlier requests.
    pub over_threshold: bool,
    /// Threshold after this latency was folded into the mean.
    pub threshold: Duration,
}

/// Point-in-time copy of the running statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct StatsSnapshot {
    pub average_secs: f64,
    pub threshold_secs: f64,
    pub count: u64,
}

#[derive(Debug, Default)]
struct Running {
    average: f64,
    count: u64,
    threshold: f64,
}

/// Running mean of response times and the slow-response threshold derived
/// from it.
///
/// Shared by every worker of every sample and never reset. Only completed
/// round-trips are recorded.
#[derive(Debug)]
pub struct ResponseStats {
    multiplier: f64,
    running: Mutex<Running>,
}

impl ResponseStats {
    pub fn new(multiplier: f64) -> Self {
        Self {
            multiplier,
            running: Mutex::new(Running::default()),
        }
    }

    /// Fold `latency` into the mean and report whether it was slow compared
    /// to every request recorded before it. The first latency is never slow.
    pub fn record(&self, latency: Duration) -> ThresholdCheck {
        let secs = latency.as_secs_f64();
        let mut running = self.running.lock().unwrap_or_else(PoisonError::into_inner);

        let had_baseline = running.count > 0;
        let previous_threshold = running.threshold;

        let count = running.count as f64;
        running.average = (running.average * count + secs) / (count + 1.0);
        running.count += 1;
        running.threshold = running.average * self.multiplier;

        ThresholdCheck {
            over_threshold: had_baseline && secs > previous_threshold,
            threshold: Duration::from_secs_f64(running.threshold),
        }
    }

    /// Current mean, or `None` before the first completed request.
    pub fn average(&self) -> Option<Duration> {
        let snap = self.snapshot();
        (snap.count > 0).then(|| Duration::from_secs_f64(snap.average_secs))
    }

    pub fn threshold(&self) -> Duration {
        Duration::from_secs_f64(self.snapshot().threshold_secs)
    }

    pub fn count(&self) -> u64 {
        self.snapshot().count
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let running = self.running.lock().unwrap_or_else(PoisonError::into_inner);
        StatsSnapshot {
            average_secs: running.average,
            threshold_secs: running.threshold,
            count: running.count,
        }
    }
}
