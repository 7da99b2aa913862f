//! Scripted transports for engine tests. Latency is simulated with
//! `tokio::time::sleep`, so tests run under a paused clock.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use crate::http::{Transport, TransportError, TransportResponse};

/// What the transport does for one call.
#[derive(Debug, Clone)]
pub enum Step {
    Reply {
        latency: Duration,
        status: u16,
        body: String,
    },
    Fail {
        latency: Duration,
        error: TransportError,
    },
    /// Never answers; only the caller's timeout ends the call.
    Hang,
}

impl Step {
    pub fn ok(latency_ms: u64, body: &str) -> Self {
        Step::Reply {
            latency: Duration::from_millis(latency_ms),
            status: 200,
            body: body.to_string(),
        }
    }

    pub fn status(latency_ms: u64, status: u16, body: &str) -> Self {
        Step::Reply {
            latency: Duration::from_millis(latency_ms),
            status,
            body: body.to_string(),
        }
    }
}

type Script = Box<dyn Fn(usize, &str) -> Step + Send + Sync>;

/// Transport whose behaviour is chosen per call by a closure receiving the
/// zero-based call number and the requested URL.
pub struct ScriptedTransport {
    script: Script,
    calls: AtomicUsize,
    issued: Mutex<Vec<(String, Instant)>>,
}

impl ScriptedTransport {
    pub fn new(script: impl Fn(usize, &str) -> Step + Send + Sync + 'static) -> Self {
        Self {
            script: Box::new(script),
            calls: AtomicUsize::new(0),
            issued: Mutex::new(Vec::new()),
        }
    }

    /// Every call gets the same step.
    pub fn always(step: Step) -> Self {
        Self::new(move |_, _| step.clone())
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn urls(&self) -> Vec<String> {
        self.issued().into_iter().map(|(url, _)| url).collect()
    }

    /// Every call in order, with the instant it was issued.
    pub fn issued(&self) -> Vec<(String, Instant)> {
        self.issued.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn get(&self, url: &str, _timeout: Duration) -> Result<TransportResponse, TransportError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        self.issued.lock().unwrap().push((url.to_string(), Instant::now()));
        match (self.script)(call, url) {
            Step::Reply {
                latency,
                status,
                body,
            } => {
                tokio::time::sleep(latency).await;
                Ok(TransportResponse::new(status, body))
            }
            Step::Fail { latency, error } => {
                tokio::time::sleep(latency).await;
                Err(error)
            }
            Step::Hang => std::future::pending().await,
        }
    }
}
