use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use ratemeter_core::engine::EngineEvent;
use ratemeter_core::results::SampleResult;
use tokio::sync::mpsc;

const BAR_TEMPLATE: &str = "{msg} {spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len}";

/// Draws one progress bar per sample from the engine's event stream.
pub struct ProgressRenderer {
    style: ProgressStyle,
    hidden: bool,
    current: Option<ProgressBar>,
}

impl ProgressRenderer {
    pub fn new(hidden: bool) -> Self {
        let style = ProgressStyle::default_bar()
            .template(BAR_TEMPLATE)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=>-");
        Self {
            style,
            hidden,
            current: None,
        }
    }

    pub fn handle(&mut self, event: &EngineEvent) {
        match event {
            EngineEvent::SessionStarted {
                target,
                total_ids,
                sample_count,
                ..
            } => {
                if !self.hidden {
                    println!("Benchmarking {target}");
                    println!("{sample_count} samples, {total_ids} IDs in total");
                }
            }
            EngineEvent::SampleStarted { sample, requests, ids } => {
                self.finish_current();
                let bar = ProgressBar::with_draw_target(Some(*requests as u64), self.target());
                bar.set_style(self.style.clone());
                bar.set_message(format!(
                    "Running Sample #{:02} with Batch Size of {ids}",
                    sample + 1
                ));
                self.current = Some(bar);
            }
            EngineEvent::RequestCompleted { .. } => {
                if let Some(bar) = &self.current {
                    bar.inc(1);
                }
            }
            EngineEvent::SampleFinished { result } => {
                if let Some(bar) = self.current.take() {
                    bar.finish_with_message(sample_summary(result));
                }
            }
            EngineEvent::SessionFinished { .. } => self.finish_current(),
        }
    }

    /// Consume events until the engine drops its sender.
    pub async fn drain(mut self, mut rx: mpsc::UnboundedReceiver<EngineEvent>) {
        while let Some(event) = rx.recv().await {
            self.handle(&event);
        }
        self.finish_current();
    }

    fn target(&self) -> ProgressDrawTarget {
        if self.hidden {
            ProgressDrawTarget::hidden()
        } else {
            ProgressDrawTarget::stdout()
        }
    }

    fn finish_current(&mut self) {
        if let Some(bar) = self.current.take() {
            bar.abandon();
        }
    }
}

/// One closing line per sample; throttling shows up as a count.
fn sample_summary(result: &SampleResult) -> String {
    let mut line = format!(
        "Sample #{:02} done in {:.2}s ({:.3} UIDs/s)",
        result.index + 1,
        result.elapsed_secs,
        result.throughput_by_elapsed
    );
    if result.rate_limited > 0 {
        line.push_str(&format!(", {} rate limited", result.rate_limited));
    }
    if result.transport_errors > 0 {
        line.push_str(&format!(", {} failed", result.transport_errors));
    }
    line
}
