use clap::ValueEnum;
use serde::{Deserialize, Serialize};

pub mod dataset;
pub mod error;
pub mod footprint;
pub mod harness;
pub mod orchestrator;
pub mod plan;
pub mod registry;
pub mod report;
pub mod schema;
pub mod workloads;

pub use error::{BenchError, Result};
pub use orchestrator::{Orchestrator, RawSample, RunOutcome, RunRequest};
pub use report::{BaselinePolicy, ComparisonReport};

/// How much the execution engine logs while measuring.
#[derive(Clone, Copy, Debug, Default, ValueEnum, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verbosity {
    /// Nothing per benchmark.
    Quiet,
    /// One line per benchmark and container size.
    #[default]
    Normal,
    /// One line per warmup and measurement iteration.
    Extra,
}
