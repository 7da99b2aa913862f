use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::time::{sleep_until, timeout, Instant};

use crate::engine::batch::Batch;
use crate::engine::counters::AggregateCounters;
use crate::engine::events::{EngineEvent, EventEmitter};
use crate::engine::stats::ResponseStats;
use crate::http::{Transport, TransportError, TransportResponse};

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// What became of one batched request.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseOutcome {
    /// Items of the configured list field. May be empty.
    Success(Vec<Value>),
    /// The server answered 503.
    RateLimited,
    /// No response was received.
    TransportError(TransportError),
    /// A response arrived but its body did not hold the expected list.
    ParseError(String),
}

/// Fieldless tag of a [`ResponseOutcome`], used in events and tallies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
    Success,
    RateLimited,
    TransportError,
    ParseError,
}

impl ResponseOutcome {
    pub fn kind(&self) -> OutcomeKind {
        match self {
            ResponseOutcome::Success(_) => OutcomeKind::Success,
            ResponseOutcome::RateLimited => OutcomeKind::RateLimited,
            ResponseOutcome::TransportError(_) => OutcomeKind::TransportError,
            ResponseOutcome::ParseError(_) => OutcomeKind::ParseError,
        }
    }
}

/// Everything a worker learned from its request.
#[derive(Debug, Clone)]
pub struct RequestResult {
    pub batch: Batch,
    pub outcome: ResponseOutcome,
    /// HTTP status, when a response was received.
    pub status: Option<u16>,
    /// Round-trip time, when a response was received.
    pub latency: Option<Duration>,
    /// Latency exceeded the threshold derived from earlier requests.
    pub over_threshold: bool,
}

// ---------------------------------------------------------------------------
// Pacer
// ---------------------------------------------------------------------------

/// Per-worker pacing state: when this worker last finished a request.
///
/// Never shared between workers, so the check-then-sleep needs no lock.
#[derive(Debug, Default)]
pub struct Pacer {
    last_completed: Option<Instant>,
}

impl Pacer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `completed_at` as this worker's latest completion and hold the
    /// worker until `min_spacing` has passed since it.
    pub async fn pace(&mut self, completed_at: Instant, min_spacing: Duration) {
        self.last_completed = Some(completed_at);
        sleep_until(completed_at + min_spacing).await;
    }

    /// Wait until the next request may be issued.
    pub async fn ready(&self, min_spacing: Duration) {
        if let Some(last) = self.last_completed {
            sleep_until(last + min_spacing).await;
        }
    }

    pub fn last_completed(&self) -> Option<Instant> {
        self.last_completed
    }
}

// ---------------------------------------------------------------------------
// RequestWorker
// ---------------------------------------------------------------------------

/// Settings every worker of a session shares.
#[derive(Debug, Clone)]
pub struct WorkerSettings {
    pub target: String,
    pub data_field: String,
    pub timeout: Duration,
    pub min_spacing: Duration,
}

/// Issues batched requests and folds their outcomes into the shared
/// statistics and counters.
///
/// One instance is shared by all concurrent workers; the only per-worker
/// state is the [`Pacer`] passed to [`RequestWorker::run`].
pub struct RequestWorker {
    transport: Arc<dyn Transport>,
    stats: Arc<ResponseStats>,
    counters: Arc<AggregateCounters>,
    events: EventEmitter,
    settings: WorkerSettings,
}

impl RequestWorker {
    pub fn new(
        transport: Arc<dyn Transport>,
        stats: Arc<ResponseStats>,
        counters: Arc<AggregateCounters>,
        events: EventEmitter,
        settings: WorkerSettings,
    ) -> Self {
        Self {
            transport,
            stats,
            counters,
            events,
            settings,
        }
    }

    pub fn stats(&self) -> &Arc<ResponseStats> {
        &self.stats
    }

    pub fn counters(&self) -> &Arc<AggregateCounters> {
        &self.counters
    }

    pub fn events(&self) -> &EventEmitter {
        &self.events
    }

    /// Issue exactly one request for `batch` and produce exactly one result.
    ///
    /// Never fails: transport, throttling and parse problems are recorded in
    /// the counters and returned as the outcome. Returns no sooner than
    /// `min_spacing` after the request completed.
    pub async fn run(&self, sample: u32, batch: Batch, pacer: &mut Pacer) -> RequestResult {
        let url = batch.url(&self.settings.target);
        let batch_ids = batch.len();

        pacer.ready(self.settings.min_spacing).await;
        let start = Instant::now();
        let reply = match timeout(
            self.settings.timeout,
            self.transport.get(&url, self.settings.timeout),
        )
        .await
        {
            Ok(reply) => reply,
            Err(_) => Err(TransportError::Timeout(self.settings.timeout)),
        };
        let completed_at = Instant::now();

        let result = match reply {
            Ok(response) => self.record_response(batch, response, completed_at - start),
            Err(err) => {
                self.counters.record_transport_error(batch_ids);
                tracing::warn!(
                    sample,
                    batch_start = batch.start(),
                    "Transport error, {batch_ids} IDs lost: {err}"
                );
                RequestResult {
                    batch,
                    outcome: ResponseOutcome::TransportError(err),
                    status: None,
                    latency: None,
                    over_threshold: false,
                }
            }
        };

        pacer.pace(completed_at, self.settings.min_spacing).await;

        tracing::debug!(
            sample,
            batch_start = batch.start(),
            outcome = ?result.outcome.kind(),
            latency_ms = result.latency.map(|l| l.as_secs_f64() * 1000.0),
            over_threshold = result.over_threshold,
            "Request completed"
        );

        self.events.emit(EngineEvent::RequestCompleted {
            sample,
            batch,
            outcome: result.outcome.kind(),
            status: result.status,
            latency_ms: result.latency.map(|l| l.as_secs_f64() * 1000.0),
            over_threshold: result.over_threshold,
        });

        result
    }

    /// Classify a completed round-trip and update the shared state.
    fn record_response(
        &self,
        batch: Batch,
        response: TransportResponse,
        latency: Duration,
    ) -> RequestResult {
        let check = self.stats.record(latency);

        if response.is_rate_limited() {
            self.counters.record_rate_limited(batch.len());
            tracing::warn!(
                batch_start = batch.start(),
                "Confirmed rate limit (HTTP {}), {} IDs lost",
                response.status,
                batch.len()
            );
        }
        if check.over_threshold {
            self.counters.record_suspected();
            tracing::info!(
                batch_start = batch.start(),
                "Unusual response time {:.3}s (threshold {:.3}s)",
                latency.as_secs_f64(),
                check.threshold.as_secs_f64()
            );
        }

        let outcome = if response.is_rate_limited() {
            ResponseOutcome::RateLimited
        } else {
            match extract_records(&response.body, &self.settings.data_field) {
                Ok(records) => ResponseOutcome::Success(records),
                Err(reason) => {
                    self.counters.record_parse_error();
                    tracing::warn!(
                        batch_start = batch.start(),
                        status = response.status,
                        "Unusable response body: {reason}"
                    );
                    ResponseOutcome::ParseError(reason)
                }
            }
        };

        RequestResult {
            batch,
            outcome,
            status: Some(response.status),
            latency: Some(latency),
            over_threshold: check.over_threshold,
        }
    }
}

/// Pull the list stored under `field` out of a JSON object body.
///
/// An object without the field yields an empty list.
pub fn extract_records(body: &str, field: &str) -> Result<Vec<Value>, String> {
    let value: Value =
        serde_json::from_str(body).map_err(|e| format!("invalid JSON: {e}"))?;
    let Value::Object(mut object) = value else {
        return Err("body is not a JSON object".to_string());
    };
    match object.remove(field) {
        None => Ok(Vec::new()),
        Some(Value::Array(items)) => Ok(items),
        Some(_) => Err(format!("field `{field}` is not a list")),
    }
}
