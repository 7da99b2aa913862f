pub mod config;
pub mod engine;
pub mod error;
pub mod http;
pub mod results;

pub use config::BenchmarkConfig;
pub use engine::{BenchmarkSession, EngineEvent, SessionOutcome};
pub use error::RatemeterError;
pub use results::Report;
