pub mod batch;
pub mod counters;
pub mod events;
pub mod sample;
pub mod session;
pub mod stats;
pub mod worker;

#[cfg(test)]
pub(crate) mod testing;

pub use batch::{plan_batches, Batch};
pub use counters::{AggregateCounters, CounterSnapshot};
pub use events::{EngineEvent, EventEmitter};
pub use sample::SampleRunner;
pub use session::{BenchmarkSession, SessionOutcome};
pub use stats::{ResponseStats, StatsSnapshot, ThresholdCheck};
pub use worker::{
    extract_records, OutcomeKind, Pacer, RequestResult, RequestWorker, ResponseOutcome,
    WorkerSettings,
};
