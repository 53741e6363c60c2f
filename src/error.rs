//! Error taxonomy for a benchmark run.
//!
//! Only [`AnalysisError`] is recoverable: the footprint store logs it and skips
//! the observation. Everything else aborts the run.

use std::io;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, BenchError>;

/// A group, tag or profile value that cannot be resolved before execution.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("unknown workload group '{0}'")]
    UnknownGroup(String),

    #[error("unknown implementation tag '{tag}' (registered: {known})")]
    UnknownTag { tag: String, known: String },

    #[error("no workload groups selected")]
    NoGroups,

    #[error("profile '{profile}': {field} must be >= 1")]
    InvalidProfile {
        profile: String,
        field: &'static str,
    },

    #[error("container sizes must be non-empty and > 0")]
    InvalidContainerSizes,

    #[error("plan requests {0} forks; runs are single-fork")]
    UnsupportedForks(u32),

    #[error("no included implementation tag is registered by every selected group ({groups}); pass a baseline")]
    NoSharedBaseline { groups: String },
}

/// Heap graph traversal failed for one object.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AnalysisError {
    #[error("cannot introspect heap graph of {type_name}")]
    Opaque { type_name: &'static str },

    #[error("heap graph of {type_name} exceeds {limit} nodes")]
    GraphTooLarge {
        type_name: &'static str,
        limit: usize,
    },
}

/// No classification rule matches a measured type. Add a pattern.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("no footprint classification pattern matches type '{type_name}'")]
pub struct ClassificationError {
    pub type_name: String,
}

/// Failure inside fixture setup or verification.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FixtureError {
    #[error(transparent)]
    Classification(#[from] ClassificationError),

    #[error("fixture verification failed: {0}")]
    Verification(String),

    #[error("fixture setup failed: {0}")]
    Setup(String),
}

/// Anything surfaced by the execution engine. Always fatal for the run.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("benchmark {benchmark} (size {container_size}): {source}")]
    Fixture {
        benchmark: String,
        container_size: usize,
        #[source]
        source: FixtureError,
    },

    #[error("benchmark {benchmark} (size {container_size}) panicked: {message}")]
    Panicked {
        benchmark: String,
        container_size: usize,
        message: String,
    },

    #[error("benchmark {benchmark} is not matched by any include pattern of the plan")]
    NotIncluded { benchmark: String },

    #[error("engine returned result for unknown benchmark '{0}'")]
    Unattributable(String),

    #[error("writing result sink {path}: {source}")]
    Sink {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("{0}")]
    Other(String),
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ReportError {
    #[error("missing baseline: tag '{baseline}' has no samples in group '{group}'")]
    MissingBaseline { group: String, baseline: String },

    #[error(
        "degenerate baseline: tag '{baseline}' in {group}.{operation} (size {container_size}) has no usable throughput"
    )]
    DegenerateBaseline {
        group: String,
        operation: String,
        container_size: usize,
        baseline: String,
    },

    #[error("no samples to report")]
    Empty,
}

#[derive(Debug, Error)]
pub enum BenchError {
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("execution engine failure: {0}")]
    Engine(#[from] EngineError),

    #[error("report error: {0}")]
    Report(#[from] ReportError),

    #[error("a benchmark run is already in progress")]
    RunInProgress,

    #[error(transparent)]
    Io(#[from] io::Error),
}
