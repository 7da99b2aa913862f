use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::engine::batch::Batch;
use crate::engine::worker::OutcomeKind;
use crate::results::{Report, SampleResult};

/// An event emitted by the engine while a session runs.
///
/// Purely observational: nothing in the engine waits on a consumer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    /// The session validated its configuration and is about to sample.
    SessionStarted {
        target: String,
        batch_size: u32,
        concurrent_requests: u32,
        sample_count: u32,
        total_ids: u64,
        rate_limit_delay_secs: f64,
    },

    /// A wave of `requests` concurrent batches is being issued.
    SampleStarted { sample: u32, requests: u32, ids: u64 },

    /// One worker finished its request, whatever the outcome.
    RequestCompleted {
        sample: u32,
        batch: Batch,
        outcome: OutcomeKind,
        #[serde(skip_serializing_if = "Option::is_none")]
        status: Option<u16>,
        #[serde(skip_serializing_if = "Option::is_none")]
        latency_ms: Option<f64>,
        over_threshold: bool,
    },

    /// Every worker of the sample has returned.
    SampleFinished { result: SampleResult },

    /// Final figures for the whole session.
    SessionFinished { report: Box<Report> },
}

/// Optional sender side of the engine's event stream.
#[derive(Debug, Clone, Default)]
pub struct EventEmitter {
    tx: Option<mpsc::UnboundedSender<EngineEvent>>,
}

impl EventEmitter {
    pub fn new(tx: mpsc::UnboundedSender<EngineEvent>) -> Self {
        Self { tx: Some(tx) }
    }

    /// An emitter that drops every event.
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Send an event. A closed or missing receiver is ignored.
    pub fn emit(&self, event: EngineEvent) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(event);
        }
    }
}
