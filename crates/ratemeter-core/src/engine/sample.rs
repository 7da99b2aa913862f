use std::sync::Arc;

use tokio::task::JoinSet;
use tokio::time::Instant;

use crate::engine::batch::{plan_batches, Batch};
use crate::engine::events::EngineEvent;
use crate::engine::worker::{OutcomeKind, Pacer, RequestResult, RequestWorker};
use crate::results::{per_second, SampleResult};

/// Runs one wave of concurrent batched requests per call.
///
/// Worker slot `i` keeps the same [`Pacer`] from sample to sample, so pacing
/// is enforced per worker across the whole session.
pub struct SampleRunner {
    worker: Arc<RequestWorker>,
    batch_size: u32,
    concurrency: u32,
    pacers: Vec<Pacer>,
}

#[derive(Debug, Default)]
struct Tally {
    successes: u32,
    rate_limited: u32,
    suspected: u32,
    transport_errors: u32,
    parse_errors: u32,
}

impl Tally {
    fn add(&mut self, result: &RequestResult) {
        match result.outcome.kind() {
            OutcomeKind::Success => self.successes += 1,
            OutcomeKind::RateLimited => self.rate_limited += 1,
            OutcomeKind::TransportError => self.transport_errors += 1,
            OutcomeKind::ParseError => self.parse_errors += 1,
        }
        if result.over_threshold {
            self.suspected += 1;
        }
    }
}

impl SampleRunner {
    pub fn new(worker: Arc<RequestWorker>, batch_size: u32, concurrency: u32) -> Self {
        Self {
            worker,
            batch_size,
            concurrency,
            pacers: (0..concurrency).map(|_| Pacer::new()).collect(),
        }
    }

    /// The disjoint batches every sample covers, in slot order.
    pub fn batches(&self) -> Vec<Batch> {
        plan_batches(self.batch_size, self.concurrency)
    }

    /// Issue `concurrency` requests at once and wait for every one of them.
    ///
    /// Individual failures, including a panicked worker task, are absorbed;
    /// a sample always produces a result.
    pub async fn run_sample(&mut self, index: u32) -> SampleResult {
        let ids = self.batch_size as u64 * self.concurrency as u64;
        self.worker.events().emit(EngineEvent::SampleStarted {
            sample: index,
            requests: self.concurrency,
            ids,
        });
        tracing::info!(
            "Running sample #{:02} with batch size of {ids}",
            index + 1
        );

        let started = Instant::now();
        let mut join_set: JoinSet<(usize, Pacer, RequestResult)> = JoinSet::new();
        let pacers = std::mem::take(&mut self.pacers);

        for (slot, (batch, mut pacer)) in self.batches().into_iter().zip(pacers).enumerate() {
            let worker = Arc::clone(&self.worker);
            join_set.spawn(async move {
                let result = worker.run(index, batch, &mut pacer).await;
                (slot, pacer, result)
            });
        }

        let mut returned: Vec<Option<Pacer>> =
            (0..self.concurrency).map(|_| None).collect();
        let mut tally = Tally::default();
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((slot, pacer, result)) => {
                    tally.add(&result);
                    returned[slot] = Some(pacer);
                }
                Err(e) => {
                    tracing::error!(sample = index, "Request worker task failed: {e}");
                }
            }
        }
        self.pacers = returned.into_iter().map(Option::unwrap_or_default).collect();

        let elapsed = started.elapsed().as_secs_f64();
        let average = self
            .worker
            .stats()
            .average()
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0);

        let result = SampleResult {
            index,
            elapsed_secs: elapsed,
            throughput_by_elapsed: per_second(ids, elapsed),
            throughput_by_latency: per_second(ids, average),
            average_latency_secs: average,
            successes: tally.successes,
            rate_limited: tally.rate_limited,
            suspected: tally.suspected,
            transport_errors: tally.transport_errors,
            parse_errors: tally.parse_errors,
        };

        tracing::info!(
            sample = index,
            elapsed_secs = result.elapsed_secs,
            "Sample finished at {:.3} UIDs/s",
            result.throughput_by_elapsed
        );
        self.worker.events().emit(EngineEvent::SampleFinished {
            result: result.clone(),
        });

        result
    }
}
