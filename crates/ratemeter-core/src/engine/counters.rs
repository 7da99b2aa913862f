use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Loss and throttling counters shared by every worker of a session.
///
/// All counters only ever grow.
#[derive(Debug, Default)]
pub struct AggregateCounters {
    loss: AtomicU64,
    transport_error_loss: AtomicU64,
    suspected_rate_limits: AtomicU64,
    confirmed_rate_limits: AtomicU64,
    parse_errors: AtomicU64,
}

/// Plain copy of [`AggregateCounters`] for reporting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct CounterSnapshot {
    /// IDs dropped because the server confirmed throttling.
    pub loss_count: u64,
    /// IDs dropped because the request never completed.
    pub transport_error_count: u64,
    pub suspected_rate_limit_count: u64,
    pub confirmed_rate_limit_count: u64,
    pub parse_error_count: u64,
}

impl AggregateCounters {
    pub fn new() -> Self {
        Self::default()
    }

    /// A confirmed rate limit drops the whole batch.
    pub fn record_rate_limited(&self, batch_size: u64) {
        self.loss.fetch_add(batch_size, Ordering::Relaxed);
        self.confirmed_rate_limits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_transport_error(&self, batch_size: u64) {
        self.transport_error_loss
            .fetch_add(batch_size, Ordering::Relaxed);
    }

    pub fn record_suspected(&self) {
        self.suspected_rate_limits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_parse_error(&self) {
        self.parse_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            loss_count: self.loss.load(Ordering::Relaxed),
            transport_error_count: self.transport_error_loss.load(Ordering::Relaxed),
            suspected_rate_limit_count: self.suspected_rate_limits.load(Ordering::Relaxed),
            confirmed_rate_limit_count: self.confirmed_rate_limits.load(Ordering::Relaxed),
            parse_error_count: self.parse_errors.load(Ordering::Relaxed),
        }
    }
}

impl CounterSnapshot {
    /// Difference against an earlier snapshot of the same counters.
    pub fn since(&self, earlier: &CounterSnapshot) -> CounterSnapshot {
        CounterSnapshot {
            loss_count: self.loss_count - earlier.loss_count,
            transport_error_count: self.transport_error_count - earlier.transport_error_count,
            suspected_rate_limit_count: self.suspected_rate_limit_count
                - earlier.suspected_rate_limit_count,
            confirmed_rate_limit_count: self.confirmed_rate_limit_count
                - earlier.confirmed_rate_limit_count,
            parse_error_count: self.parse_error_count - earlier.parse_error_count,
        }
    }
}
