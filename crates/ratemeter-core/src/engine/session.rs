use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::mpsc;
use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;

use crate::config::{ensure_valid, BenchmarkConfig};
use crate::engine::counters::AggregateCounters;
use crate::engine::events::{EngineEvent, EventEmitter};
use crate::engine::sample::SampleRunner;
use crate::engine::stats::ResponseStats;
use crate::engine::worker::{RequestWorker, WorkerSettings};
use crate::error::RatemeterError;
use crate::http::{HttpTransport, Transport};
use crate::results::{prepare_report_dir, write_report, Report, RunTiming};

/// What a finished session produced.
#[derive(Debug)]
pub struct SessionOutcome {
    pub report: Report,
    /// Where the JSON report was written, when report generation is on.
    pub report_path: Option<PathBuf>,
    /// Set when the report could not be written after all samples ran.
    pub report_error: Option<RatemeterError>,
}

/// Runs `sample_count` samples back to back and summarizes them.
pub struct BenchmarkSession {
    config: BenchmarkConfig,
    transport: Arc<dyn Transport>,
    events: EventEmitter,
    cancel: CancellationToken,
}

impl BenchmarkSession {
    /// Validate `config` and bind it to a transport.
    pub fn new(
        config: BenchmarkConfig,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, RatemeterError> {
        ensure_valid(&config)?;
        Ok(Self {
            config,
            transport,
            events: EventEmitter::disabled(),
            cancel: CancellationToken::new(),
        })
    }

    /// Validate `config` and build the default reqwest transport for it.
    pub fn with_http_transport(config: BenchmarkConfig) -> Result<Self, RatemeterError> {
        ensure_valid(&config)?;
        let mut builder = HttpTransport::builder().timeout(config.response_timeout());
        if let Some(ua) = &config.user_agent {
            builder = builder.user_agent(ua.clone());
        }
        let transport = builder.build()?;
        Self::new(config, Arc::new(transport))
    }

    /// Stream [`EngineEvent`]s to `tx` while the session runs.
    pub fn with_events(mut self, tx: mpsc::UnboundedSender<EngineEvent>) -> Self {
        self.events = EventEmitter::new(tx);
        self
    }

    /// Stop between samples once `token` is cancelled. A sample already in
    /// flight always runs to completion.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn config(&self) -> &BenchmarkConfig {
        &self.config
    }

    /// Run every sample, build the report and, if enabled, write it.
    ///
    /// An unusable output directory fails the session before any request is
    /// sent.
    pub async fn run(self) -> Result<SessionOutcome, RatemeterError> {
        let config = self.config;
        if config.generate_report {
            prepare_report_dir(&config.output_dir).await?;
        }
        let stats = Arc::new(ResponseStats::new(config.threshold_multiplier));
        let counters = Arc::new(AggregateCounters::new());
        let worker = Arc::new(RequestWorker::new(
            self.transport,
            Arc::clone(&stats),
            Arc::clone(&counters),
            self.events.clone(),
            WorkerSettings {
                target: config.target.clone(),
                data_field: config.data_field.clone(),
                timeout: config.response_timeout(),
                min_spacing: config.rate_limit_delay(),
            },
        ));
        let mut runner =
            SampleRunner::new(worker, config.batch_size, config.concurrent_requests);

        self.events.emit(EngineEvent::SessionStarted {
            target: config.target.clone(),
            batch_size: config.batch_size,
            concurrent_requests: config.concurrent_requests,
            sample_count: config.sample_count,
            total_ids: config.total_ids(),
            rate_limit_delay_secs: config.rate_limit_delay_secs,
        });
        tracing::info!(
            target_url = %config.target,
            "Benchmarking {} samples of {} x {} IDs ({} total)",
            config.sample_count,
            config.concurrent_requests,
            config.batch_size,
            config.total_ids()
        );

        let start_delay = config.start_delay();
        if !start_delay.is_zero() {
            tokio::select! {
                _ = sleep(start_delay) => {}
                _ = self.cancel.cancelled() => {}
            }
        }

        let started_at = Utc::now();
        let clock = Instant::now();
        let mut samples = Vec::with_capacity(config.sample_count as usize);

        for index in 0..config.sample_count {
            if self.cancel.is_cancelled() {
                tracing::warn!("Benchmark interrupted after {} sample(s)", samples.len());
                return Err(RatemeterError::Interrupted {
                    completed_samples: samples.len(),
                });
            }
            samples.push(runner.run_sample(index).await);
        }

        let report = Report::build(
            &config,
            samples,
            stats.snapshot(),
            counters.snapshot(),
            RunTiming {
                started_at,
                finished_at: Utc::now(),
                duration: clock.elapsed(),
            },
        );
        self.events.emit(EngineEvent::SessionFinished {
            report: Box::new(report.clone()),
        });

        let mut outcome = SessionOutcome {
            report,
            report_path: None,
            report_error: None,
        };
        if config.generate_report {
            match write_report(&outcome.report, &config.output_dir).await {
                Ok(path) => outcome.report_path = Some(path),
                Err(e) => {
                    tracing::error!("Failed to write benchmark report: {e}");
                    outcome.report_error = Some(e);
                }
            }
        }

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::engine::testing::{ScriptedTransport, Step};
    use crate::http::TransportError;

    fn config(batch_size: u32, concurrency: u32, samples: u32) -> BenchmarkConfig {
        BenchmarkConfig {
            target: "http://bench.test/v1/games?universeIds=".to_string(),
            batch_size,
            concurrent_requests: concurrency,
            sample_count: samples,
            rate_limit_delay_secs: 0.0,
            start_delay_secs: 0.0,
            generate_report: false,
            ..BenchmarkConfig::default()
        }
    }

    #[test]
    fn invalid_config_is_rejected_up_front() {
        let transport = Arc::new(ScriptedTransport::always(Step::ok(1, "{}")));
        let result = BenchmarkSession::new(config(0, 4, 1), transport);
        assert!(matches!(result, Err(RatemeterError::Config(_))));
    }

    #[test]
    fn session_exposes_its_config() {
        let transport = Arc::new(ScriptedTransport::always(Step::ok(1, "{}")));
        let session = BenchmarkSession::new(config(25, 3, 2), transport).unwrap();
        assert_eq!(session.config().batch_size, 25);
        assert_eq!(session.config().total_ids(), 150);
    }

    #[tokio::test(start_paused = true)]
    async fn healthy_endpoint_loses_nothing_and_writes_report() {
        let dir = tempfile::tempdir().expect("tempdir should be created");
        let cfg = BenchmarkConfig {
            generate_report: true,
            output_dir: dir.path().join("benchmark-results"),
            ..config(100, 4, 1)
        };
        let transport = Arc::new(ScriptedTransport::always(Step::ok(100, r#"{"data":[1]}"#)));

        let outcome = BenchmarkSession::new(cfg, transport)
            .unwrap()
            .run()
            .await
            .expect("session should succeed");
        let report = &outcome.report;

        assert_eq!(report.uids_lost_to_rate_limiting, 0);
        assert_eq!(report.uids_lost_to_transport_errors, 0);
        assert_eq!(report.total_uids, 400);
        assert_eq!(report.samples.len(), 1);
        let sample = &report.samples[0];
        assert!((sample.throughput_by_elapsed - 400.0 / sample.elapsed_secs).abs() < 1e-6);
        assert!((report.average_requests_only_time - 0.1).abs() < 1e-9);

        let path = outcome.report_path.expect("report should be written");
        let written: Report =
            serde_json::from_str(&tokio::fs::read_to_string(&path).await.unwrap()).unwrap();
        assert_eq!(written.run_id, report.run_id);
        assert_eq!(written.concurrent_requests, 4);
        assert_eq!(written.average_gather_speed, report.average_gather_speed);
    }

    #[tokio::test(start_paused = true)]
    async fn always_503_loses_every_id() {
        let transport = Arc::new(ScriptedTransport::always(Step::status(50, 503, "")));
        let outcome = BenchmarkSession::new(config(100, 4, 3), transport)
            .unwrap()
            .run()
            .await
            .unwrap();
        let report = outcome.report;

        assert_eq!(report.uids_lost_to_rate_limiting, 100 * 4 * 3);
        assert_eq!(report.confirmed_rate_limit_count, 4 * 3);
        assert_eq!(report.loss_percentage, 100.0);
        assert!(outcome.report_path.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn single_timeout_costs_one_batch() {
        let transport = Arc::new(ScriptedTransport::new(|call, _| {
            if call == 1 {
                Step::Hang
            } else {
                Step::ok(100, r#"{"data":[]}"#)
            }
        }));
        let cfg = BenchmarkConfig {
            response_timeout_secs: 2.0,
            ..config(100, 4, 1)
        };

        let report = BenchmarkSession::new(cfg, transport)
            .unwrap()
            .run()
            .await
            .unwrap()
            .report;

        assert_eq!(report.uids_lost_to_transport_errors, 100);
        assert_eq!(report.uids_lost_to_rate_limiting, 0);
        assert_eq!(report.samples[0].transport_errors, 1);
        assert!(report.samples[0].elapsed_secs < 2.5);
    }

    #[tokio::test(start_paused = true)]
    async fn losses_never_exceed_attempted_ids() {
        let transport = Arc::new(ScriptedTransport::new(|call, _| match call % 3 {
            0 => Step::status(20, 503, ""),
            1 => Step::Fail {
                latency: Duration::from_millis(5),
                error: TransportError::Request("reset".to_string()),
            },
            _ => Step::ok(20, r#"{"data":[]}"#),
        }));
        let report = BenchmarkSession::new(config(10, 5, 4), transport)
            .unwrap()
            .run()
            .await
            .unwrap()
            .report;

        assert_eq!(report.total_uids, 10 * 5 * 4);
        assert!(
            report.uids_lost_to_rate_limiting + report.uids_lost_to_transport_errors
                <= report.total_uids
        );
        assert_eq!(report.uids_lost_to_rate_limiting, 70);
        assert_eq!(report.uids_lost_to_transport_errors, 70);
    }

    #[tokio::test(start_paused = true)]
    async fn worker_never_starts_before_delay_since_its_last_completion() {
        let cfg = BenchmarkConfig {
            rate_limit_delay_secs: 3.0,
            ..config(10, 2, 3)
        };
        let latency = Duration::from_millis(100);
        let transport = Arc::new(ScriptedTransport::always(Step::ok(100, "{}")));
        let report = BenchmarkSession::new(cfg, transport.clone())
            .unwrap()
            .run()
            .await
            .unwrap()
            .report;

        // Each worker slot requests the same batch every sample.
        let issued = transport.issued();
        assert_eq!(issued.len(), 6);
        for url in ["0,1,2,3,4,5,6,7,8,9", "10,11,12,13,14,15,16,17,18,19"] {
            let starts: Vec<Instant> = issued
                .iter()
                .filter(|(u, _)| u.ends_with(url))
                .map(|(_, at)| *at)
                .collect();
            assert_eq!(starts.len(), 3, "batch {url}");
            for pair in starts.windows(2) {
                let previous_completion = pair[0] + latency;
                assert!(pair[1].duration_since(previous_completion) >= Duration::from_secs(3));
            }
        }
        for sample in &report.samples {
            assert!(sample.elapsed_secs >= 3.1, "sample {}", sample.index);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn unwritable_output_dir_fails_before_any_request() {
        let dir = tempfile::tempdir().expect("tempdir should be created");
        let blocker = dir.path().join("results-file");
        std::fs::write(&blocker, "x").unwrap();
        let cfg = BenchmarkConfig {
            generate_report: true,
            output_dir: blocker,
            ..config(10, 4, 3)
        };
        let transport = Arc::new(ScriptedTransport::always(Step::ok(10, "{}")));

        let err = BenchmarkSession::new(cfg, transport.clone())
            .unwrap()
            .run()
            .await
            .unwrap_err();

        assert!(matches!(err, RatemeterError::Io(_)));
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_report_write_keeps_the_report() {
        let dir = tempfile::tempdir().expect("tempdir should be created");
        let out_dir = dir.path().join("benchmark-results");
        let cfg = BenchmarkConfig {
            generate_report: true,
            output_dir: out_dir.clone(),
            ..config(10, 2, 1)
        };
        // The directory passes the up-front check, then is replaced by a file.
        let transport = Arc::new(ScriptedTransport::new(move |call, _| {
            if call == 0 {
                std::fs::remove_dir_all(&out_dir).unwrap();
                std::fs::write(&out_dir, "x").unwrap();
            }
            Step::ok(10, "{}")
        }));

        let outcome = BenchmarkSession::new(cfg, transport)
            .unwrap()
            .run()
            .await
            .expect("samples should still be reported");

        assert!(outcome.report_path.is_none());
        assert!(matches!(outcome.report_error, Some(RatemeterError::Io(_))));
        assert_eq!(outcome.report.samples.len(), 1);
        assert_eq!(outcome.report.total_uids, 20);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_stops_between_samples() {
        let token = CancellationToken::new();
        let trigger = token.clone();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let transport = Arc::new(ScriptedTransport::always(Step::ok(100, "{}")));
        let session = BenchmarkSession::new(config(10, 2, 5), transport)
            .unwrap()
            .with_events(tx)
            .with_cancellation(token);

        let handle = tokio::spawn(session.run());
        // Cancel while sample #1 is in flight; it must still run to completion.
        while let Some(event) = rx.recv().await {
            if matches!(event, EngineEvent::SampleStarted { sample: 1, .. }) {
                trigger.cancel();
                break;
            }
        }

        let err = handle.await.unwrap().unwrap_err();
        assert!(matches!(
            err,
            RatemeterError::Interrupted {
                completed_samples: 2
            }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_during_start_delay_sends_nothing() {
        let token = CancellationToken::new();
        let trigger = token.clone();
        let cfg = BenchmarkConfig {
            start_delay_secs: 10.0,
            ..config(10, 2, 3)
        };
        let transport = Arc::new(ScriptedTransport::always(Step::ok(10, "{}")));
        let session = BenchmarkSession::new(cfg, transport.clone())
            .unwrap()
            .with_cancellation(token);

        let started = Instant::now();
        let handle = tokio::spawn(session.run());
        sleep(Duration::from_secs(1)).await;
        trigger.cancel();

        let err = handle.await.unwrap().unwrap_err();
        assert!(matches!(
            err,
            RatemeterError::Interrupted {
                completed_samples: 0
            }
        ));
        assert_eq!(transport.calls(), 0);
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn events_bracket_the_session() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let transport = Arc::new(ScriptedTransport::always(Step::ok(10, "{}")));
        BenchmarkSession::new(config(10, 2, 2), transport)
            .unwrap()
            .with_events(tx)
            .run()
            .await
            .unwrap();

        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        assert!(matches!(
            events.first(),
            Some(EngineEvent::SessionStarted { total_ids: 40, .. })
        ));
        assert!(matches!(
            events.last(),
            Some(EngineEvent::SessionFinished { report }) if report.samples.len() == 2
        ));
        let finished = events
            .iter()
            .filter(|e| matches!(e, EngineEvent::SampleFinished { .. }))
            .count();
        assert_eq!(finished, 2);
    }
}
