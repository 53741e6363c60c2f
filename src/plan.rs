use std::collections::BTreeSet;
use std::path::PathBuf;
use std::time::Duration;

use regex::RegexSet;
use serde::{Deserialize, Serialize};

use crate::error::ConfigurationError;
use crate::Verbosity;

/// Where the engine writes its raw results unless told otherwise.
pub const DEFAULT_RESULT_SINK: &str = "benchmark_results.json";

/// Always a single fork: the per-run footprint and sample state must not be
/// split across processes.
pub const FORKS: u32 = 1;

/// Fixed runtime tuning. Not configurable: anything that pauses a measurement
/// iteration turns it into an unflagged outlier.
pub const RUNTIME_TUNING: RuntimeTuning = RuntimeTuning {
    assertions: false,
    heap_bytes: 6 << 30,
    single_generation: true,
    worker_stack_bytes: 150 << 20,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Profile {
    Quick,
    Normal,
    Slow,
}

impl Profile {
    pub fn as_str(&self) -> &'static str {
        match self {
            Profile::Quick => "quick",
            Profile::Normal => "normal",
            Profile::Slow => "slow",
        }
    }

    pub fn settings(&self) -> RunProfile {
        let (warmup, measurement, millis, verbosity) = match self {
            Profile::Quick => (5, 5, 15, Verbosity::Normal),
            Profile::Normal => (7, 6, 300, Verbosity::Normal),
            Profile::Slow => (10, 6, 400, Verbosity::Extra),
        };
        RunProfile {
            name: self.as_str().to_string(),
            warmup_iterations: warmup,
            measurement_iterations: measurement,
            iteration_millis: millis,
            verbosity,
            result_sink: Some(PathBuf::from(DEFAULT_RESULT_SINK)),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunProfile {
    pub name: String,
    pub warmup_iterations: u32,
    pub measurement_iterations: u32,
    pub iteration_millis: u64,
    pub verbosity: Verbosity,
    pub result_sink: Option<PathBuf>,
}

impl RunProfile {
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        let invalid = |field| ConfigurationError::InvalidProfile {
            profile: self.name.clone(),
            field,
        };
        if self.warmup_iterations < 1 {
            return Err(invalid("warmup_iterations"));
        }
        if self.measurement_iterations < 1 {
            return Err(invalid("measurement_iterations"));
        }
        if self.iteration_millis < 1 {
            return Err(invalid("iteration_millis"));
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimingMode {
    /// Operations per second.
    Throughput,
    /// Seconds per operation.
    AverageTime,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeTuning {
    /// Run fixture verification after setup.
    pub assertions: bool,
    /// Fixed heap size for engines running on a managed runtime.
    pub heap_bytes: u64,
    /// Keep all allocations in one generation so no collection runs mid-iteration.
    pub single_generation: bool,
    /// Stack of the dedicated measurement thread.
    pub worker_stack_bytes: usize,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExecutionPlan {
    pub profile: String,
    pub groups: Vec<String>,
    pub include_tags: BTreeSet<String>,
    /// One `^<Group>\..*?\b(<tag>|...)_` pattern per group.
    pub include_patterns: Vec<String>,
    /// Overrides every group's own container sizes when set.
    pub container_sizes: Option<Vec<usize>>,
    pub mode: TimingMode,
    pub warmup_iterations: u32,
    pub measurement_iterations: u32,
    pub warmup_time: Duration,
    pub measurement_time: Duration,
    pub verbosity: Verbosity,
    pub forks: u32,
    pub fail_on_error: bool,
    pub result_sink: Option<PathBuf>,
    pub seed: u64,
    pub tuning: RuntimeTuning,
}

impl ExecutionPlan {
    pub fn with_container_sizes(mut self, sizes: Vec<usize>) -> Result<Self, ConfigurationError> {
        if sizes.is_empty() || sizes.contains(&0) {
            return Err(ConfigurationError::InvalidContainerSizes);
        }
        self.container_sizes = Some(sizes);
        Ok(self)
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_mode(mut self, mode: TimingMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn include_filter(&self) -> Result<RegexSet, regex::Error> {
        RegexSet::new(&self.include_patterns)
    }
}

/// Pattern selecting `<tag>_*` variant methods of `group`'s operations.
pub fn include_pattern<'a>(group: &str, tags: impl IntoIterator<Item = &'a String>) -> String {
    let alternation = tags
        .into_iter()
        .map(|t| regex::escape(t))
        .collect::<Vec<_>>()
        .join("|");
    format!(r"^{}\..*?\b({})_", regex::escape(group), alternation)
}

/// Build the execution plan. Pure: identical inputs give equal plans.
pub fn build_plan(
    profile: &RunProfile,
    include_tags: &BTreeSet<String>,
    groups: &[String],
) -> Result<ExecutionPlan, ConfigurationError> {
    profile.validate()?;
    if groups.is_empty() {
        return Err(ConfigurationError::NoGroups);
    }

    let include_patterns = groups
        .iter()
        .map(|g| include_pattern(g, include_tags))
        .collect();
    let iteration_time = Duration::from_millis(profile.iteration_millis);

    Ok(ExecutionPlan {
        profile: profile.name.clone(),
        groups: groups.to_vec(),
        include_tags: include_tags.clone(),
        include_patterns,
        container_sizes: None,
        mode: TimingMode::Throughput,
        warmup_iterations: profile.warmup_iterations,
        measurement_iterations: profile.measurement_iterations,
        warmup_time: iteration_time,
        measurement_time: iteration_time,
        verbosity: profile.verbosity,
        forks: FORKS,
        fail_on_error: true,
        result_sink: profile.result_sink.clone(),
        seed: 0,
        tuning: RUNTIME_TUNING,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(list: &[&str]) -> BTreeSet<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_canonical_profiles() {
        let quick = Profile::Quick.settings();
        assert_eq!((quick.warmup_iterations, quick.measurement_iterations, quick.iteration_millis), (5, 5, 15));
        let normal = Profile::Normal.settings();
        assert_eq!((normal.warmup_iterations, normal.measurement_iterations, normal.iteration_millis), (7, 6, 300));
        let slow = Profile::Slow.settings();
        assert_eq!((slow.warmup_iterations, slow.measurement_iterations, slow.iteration_millis), (10, 6, 400));
        assert_eq!(slow.verbosity, Verbosity::Extra);
    }

    #[test]
    fn test_profile_numbers_must_be_positive() {
        let mut p = Profile::Quick.settings();
        p.measurement_iterations = 0;
        let err = build_plan(&p, &tags(&["java"]), &["ArrayBenchmark".to_string()]).unwrap_err();
        assert_eq!(
            err,
            ConfigurationError::InvalidProfile {
                profile: "quick".to_string(),
                field: "measurement_iterations"
            }
        );

        // Fewer measurement than warmup iterations is allowed.
        let mut p = Profile::Quick.settings();
        p.warmup_iterations = 9;
        p.measurement_iterations = 1;
        assert!(build_plan(&p, &tags(&["java"]), &["ArrayBenchmark".to_string()]).is_ok());
    }

    #[test]
    fn test_build_plan_is_idempotent() {
        let profile = Profile::Normal.settings();
        let include = tags(&["vavr", "java", "scala"]);
        let groups = vec!["ArrayBenchmark".to_string(), "ListBenchmark".to_string()];
        let a = build_plan(&profile, &include, &groups).unwrap();
        let b = build_plan(&profile, &include, &groups).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_numbers_copied_verbatim() {
        let profile = Profile::Quick.settings();
        let plan = build_plan(&profile, &tags(&["java"]), &["ArrayBenchmark".to_string()]).unwrap();
        assert_eq!(plan.warmup_iterations, 5);
        assert_eq!(plan.measurement_iterations, 5);
        assert_eq!(plan.warmup_time, Duration::from_millis(15));
        assert_eq!(plan.measurement_time, Duration::from_millis(15));
        assert_eq!(plan.forks, 1);
        assert_eq!(plan.tuning, RUNTIME_TUNING);
        assert!(!plan.tuning.assertions);
    }

    #[test]
    fn test_runtime_tuning_sizes() {
        assert_eq!(RUNTIME_TUNING.heap_bytes, 6 * 1024 * 1024 * 1024);
        assert_eq!(RUNTIME_TUNING.worker_stack_bytes, 150 * 1024 * 1024);
        let json = serde_json::to_string(&RUNTIME_TUNING).unwrap();
        assert!(json.contains("\"heap_bytes\":6442450944"));
    }

    #[test]
    fn test_include_pattern_shape() {
        let pattern = include_pattern("ArrayBenchmark", &tags(&["vavr", "java"]));
        assert_eq!(pattern, r"^ArrayBenchmark\..*?\b(java|vavr)_");
    }

    #[test]
    fn test_include_filter_matches_only_selected() {
        let profile = Profile::Quick.settings();
        let plan = build_plan(&profile, &tags(&["java", "vavr"]), &["ArrayBenchmark".to_string()]).unwrap();
        let filter = plan.include_filter().unwrap();

        assert!(filter.is_match("ArrayBenchmark.ArrayCreate.java_mutable"));
        assert!(filter.is_match("ArrayBenchmark.ArrayGet.vavr_immutable"));
        assert!(!filter.is_match("ArrayBenchmark.ArrayCreate.scala_immutable"));
        assert!(!filter.is_match("ArrayBenchmark.ArrayCreate.fjava_immutable"));
        assert!(!filter.is_match("ListBenchmark.Prepend.java_mutable"));
        assert!(!filter.is_match("XArrayBenchmark.ArrayCreate.java_mutable"));
    }

    #[test]
    fn test_include_pattern_escapes_group() {
        let filter = RegexSet::new([include_pattern("io.vavr.ArrayBenchmark", &tags(&["java"]))]).unwrap();
        assert!(filter.is_match("io.vavr.ArrayBenchmark.ArrayCreate.java_mutable"));
        assert!(!filter.is_match("ioXvavr.ArrayBenchmark.ArrayCreate.java_mutable"));
    }

    #[test]
    fn test_container_sizes_validated() {
        let profile = Profile::Quick.settings();
        let plan = build_plan(&profile, &tags(&["java"]), &["ArrayBenchmark".to_string()]).unwrap();
        assert!(plan.clone().with_container_sizes(vec![]).is_err());
        assert!(plan.clone().with_container_sizes(vec![10, 0]).is_err());
        assert_eq!(plan.with_container_sizes(vec![10, 100]).unwrap().container_sizes, Some(vec![10, 100]));
    }
}
