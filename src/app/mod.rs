//! Orchestration of probes and the aggregator.
mod orchestrator;
mod settings;


pub use orchestrator::run_probes;
pub use settings::RunSettings;
