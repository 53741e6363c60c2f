//! Drives one benchmark run: plan, single engine invocation, attribution,
//! report.
//!
//! All per-run state (raw samples, footprint observations) lives in a
//! [`RunContext`] created when the engine is invoked and handed back in the
//! [`RunOutcome`]; nothing accumulates across runs.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU8, Ordering};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{BenchError, ConfigurationError, EngineError, Result};
use crate::footprint::{Classifier, FootprintAnalyzer, Footprints, ReachabilitySizer};
use crate::harness::{ExecutionEngine, RunResult};
use crate::plan::{build_plan, ExecutionPlan, RunProfile, TimingMode, FORKS};
use crate::registry::Registry;
use crate::report::{BaselinePolicy, ComparisonReport};

#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunState {
    Idle = 0,
    Configuring = 1,
    Executing = 2,
    Reporting = 3,
}

impl RunState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            1 => RunState::Configuring,
            2 => RunState::Executing,
            3 => RunState::Reporting,
            _ => RunState::Idle,
        }
    }
}

/// Holds the orchestrator out of `Idle` until dropped.
struct RunGuard<'o> {
    state: &'o AtomicU8,
}

impl<'o> RunGuard<'o> {
    fn acquire(state: &'o AtomicU8, first: RunState) -> Result<Self> {
        state
            .compare_exchange(RunState::Idle as u8, first as u8, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| BenchError::RunInProgress)?;
        debug!(from = ?RunState::Idle, to = ?first, "run state");
        Ok(Self { state })
    }

    fn advance(&self, next: RunState) {
        let prev = RunState::from_u8(self.state.swap(next as u8, Ordering::AcqRel));
        debug!(from = ?prev, to = ?next, "run state");
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        let prev = RunState::from_u8(self.state.swap(RunState::Idle as u8, Ordering::AcqRel));
        debug!(from = ?prev, to = ?RunState::Idle, "run state");
    }
}

/// One throughput measurement, normalized to ops/s.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RawSample {
    pub group: String,
    pub operation: String,
    pub tag: String,
    pub container_size: usize,
    pub ops_per_sec: f64,
}

/// What the caller asks for; resolved into an [`ExecutionPlan`] by
/// [`Orchestrator::plan`].
#[derive(Clone, Debug)]
pub struct RunRequest {
    pub profile: RunProfile,
    /// Implementation tags; empty means every registered tag.
    pub include: Vec<String>,
    /// Group ids; empty means the curated list.
    pub groups: Vec<String>,
    pub container_sizes: Option<Vec<usize>>,
    pub seed: u64,
    pub mode: TimingMode,
    pub baseline: BaselinePolicy,
}

impl RunRequest {
    pub fn new(profile: RunProfile) -> Self {
        Self {
            profile,
            include: Vec::new(),
            groups: Vec::new(),
            container_sizes: None,
            seed: 0,
            mode: TimingMode::Throughput,
            baseline: BaselinePolicy::default(),
        }
    }

    pub fn include<S: Into<String>>(mut self, tags: impl IntoIterator<Item = S>) -> Self {
        self.include = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn groups<S: Into<String>>(mut self, groups: impl IntoIterator<Item = S>) -> Self {
        self.groups = groups.into_iter().map(Into::into).collect();
        self
    }

    pub fn container_sizes(mut self, sizes: Vec<usize>) -> Self {
        self.container_sizes = Some(sizes);
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn mode(mut self, mode: TimingMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn baseline(mut self, baseline: BaselinePolicy) -> Self {
        self.baseline = baseline;
        self
    }
}

pub struct RunContext {
    footprints: FootprintAnalyzer,
    samples: Vec<RawSample>,
}

impl RunContext {
    pub fn new(footprints: FootprintAnalyzer) -> Self {
        Self {
            footprints,
            samples: Vec::new(),
        }
    }

    pub fn footprints(&self) -> &FootprintAnalyzer {
        &self.footprints
    }

    pub fn samples(&self) -> &[RawSample] {
        &self.samples
    }

    fn into_outcome(self, plan: ExecutionPlan) -> RunOutcome {
        RunOutcome {
            plan,
            samples: self.samples,
            footprints: self.footprints.into_observations(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct RunOutcome {
    pub plan: ExecutionPlan,
    pub samples: Vec<RawSample>,
    pub footprints: Footprints,
}

pub struct Orchestrator {
    registry: Registry,
    engine: Box<dyn ExecutionEngine>,
    classifier: Classifier,
    node_limit: usize,
    state: AtomicU8,
}

impl Orchestrator {
    pub fn new(registry: Registry, engine: impl ExecutionEngine + 'static) -> Self {
        Self {
            registry,
            engine: Box::new(engine),
            classifier: Classifier::default(),
            node_limit: crate::footprint::graph::DEFAULT_NODE_LIMIT,
            state: AtomicU8::new(RunState::Idle as u8),
        }
    }

    pub fn with_classifier(mut self, classifier: Classifier) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn with_node_limit(mut self, node_limit: usize) -> Self {
        self.node_limit = node_limit;
        self
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn state(&self) -> RunState {
        RunState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Resolve groups and tags against the registry and build the plan.
    pub fn plan(&self, request: &RunRequest) -> std::result::Result<ExecutionPlan, ConfigurationError> {
        let groups = self.registry.resolve_groups(&request.groups)?;
        let tags = self.registry.resolve_tags(&request.include)?;
        let mut plan = build_plan(&request.profile, &tags, &groups)?
            .with_seed(request.seed)
            .with_mode(request.mode);
        if let Some(sizes) = &request.container_sizes {
            plan = plan.with_container_sizes(sizes.clone())?;
        }
        Ok(plan)
    }

    /// Run an already built plan and return its raw samples.
    pub fn execute(&self, plan: ExecutionPlan) -> Result<RunOutcome> {
        let guard = RunGuard::acquire(&self.state, RunState::Configuring)?;
        self.check_plan(&plan)?;
        guard.advance(RunState::Executing);
        self.execute_plan(plan)
    }

    /// Plan, execute and report. Any failure aborts the whole run.
    pub fn run(&self, request: &RunRequest) -> Result<(RunOutcome, ComparisonReport)> {
        let guard = RunGuard::acquire(&self.state, RunState::Configuring)?;
        let plan = self.plan(request)?;
        self.check_plan(&plan)?;
        let baseline = self.baseline(&plan, &request.baseline)?;
        debug!(%baseline, "baseline resolved");

        guard.advance(RunState::Executing);
        let outcome = self.execute_plan(plan)?;

        guard.advance(RunState::Reporting);
        let report = ComparisonReport::build(
            &outcome.plan.include_tags,
            &outcome.plan.groups,
            &outcome.samples,
            &BaselinePolicy::Fixed(baseline),
        )?
        .with_footprints(outcome.footprints.clone());
        Ok((outcome, report))
    }

    /// Resolve the report baseline among the included tags that every
    /// planned group registers. A fixed tag is taken as is.
    pub fn baseline(
        &self,
        plan: &ExecutionPlan,
        policy: &BaselinePolicy,
    ) -> std::result::Result<String, ConfigurationError> {
        let shared = self.registry.shared_tags(&plan.groups, &plan.include_tags);
        policy.resolve(&shared).ok_or_else(|| ConfigurationError::NoSharedBaseline {
            groups: plan.groups.join(", "),
        })
    }

    fn check_plan(&self, plan: &ExecutionPlan) -> std::result::Result<(), ConfigurationError> {
        if plan.forks != FORKS {
            return Err(ConfigurationError::UnsupportedForks(plan.forks));
        }
        self.registry.resolve_groups(&plan.groups)?;
        let requested: Vec<String> = plan.include_tags.iter().cloned().collect();
        self.registry.resolve_tags(&requested)?;
        Ok(())
    }

    fn execute_plan(&self, plan: ExecutionPlan) -> Result<RunOutcome> {
        let benchmarks = self.registry.select(&plan.groups, &plan.include_tags, plan.container_sizes.as_deref());
        let analyzer = FootprintAnalyzer::new(
            Box::new(ReachabilitySizer::with_node_limit(self.node_limit)),
            self.classifier.clone(),
        );
        let mut ctx = RunContext::new(analyzer);

        info!(
            profile = %plan.profile,
            groups = plan.groups.len(),
            benchmarks = benchmarks.len(),
            "invoking execution engine"
        );
        let results = self.engine.execute(&plan, &benchmarks, &mut ctx.footprints)?;

        let mut seen = BTreeSet::new();
        for result in &results {
            let sample = self.attribute(result)?;
            debug!(
                group = %sample.group,
                operation = %sample.operation,
                tag = %sample.tag,
                size = sample.container_size,
                ops_per_sec = sample.ops_per_sec,
                "sample"
            );
            seen.insert(sample.tag.clone());
            ctx.samples.push(sample);
        }
        info!(samples = ctx.samples.len(), tags = seen.len(), "run complete");
        Ok(ctx.into_outcome(plan))
    }

    fn attribute(&self, result: &RunResult) -> std::result::Result<RawSample, EngineError> {
        let (group, operation, variant) = self
            .registry
            .attribute(&result.benchmark)
            .ok_or_else(|| EngineError::Unattributable(result.benchmark.clone()))?;
        let ops_per_sec = match result.mode {
            TimingMode::Throughput => result.score,
            TimingMode::AverageTime if result.score > 0.0 => 1.0 / result.score,
            TimingMode::AverageTime => 0.0,
        };
        Ok(RawSample {
            group: group.id().to_string(),
            operation: operation.name().to_string(),
            tag: variant.tag().to_string(),
            container_size: result.container_size,
            ops_per_sec,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::{Arc, Barrier};
    use std::thread;

    use crate::error::{FixtureError, ReportError};
    use crate::plan::Profile;
    use crate::registry::{Benchmark, Fixture, FixtureContext, Operation, WorkloadGroup};

    fn vec_fixture(ctx: &mut FixtureContext<'_>) -> std::result::Result<Fixture, FixtureError> {
        let v: Vec<u64> = (0..ctx.container_size() as u64).collect();
        ctx.record_footprint(&v)?;
        Ok(Fixture::new(move || v.iter().sum()))
    }

    fn registry() -> Registry {
        let mut registry = Registry::new();
        registry.register(
            WorkloadGroup::new("ArrayBenchmark").operation(
                Operation::new("ArrayGet")
                    .variant("java", "mutable", vec_fixture)
                    .variant("vavr", "immutable", vec_fixture)
                    .variant("scala", "immutable", vec_fixture),
            ),
            true,
        );
        registry.register(
            WorkloadGroup::new("ListBenchmark")
                .operation(Operation::new("Prepend").variant("java", "mutable", vec_fixture)),
            false,
        );
        registry
    }

    fn result(id: &str, size: usize, score: f64, mode: TimingMode) -> RunResult {
        RunResult {
            benchmark: id.to_string(),
            container_size: size,
            mode,
            score,
            score_unit: "ops/s".to_string(),
            iteration_scores: vec![score],
            warmup_iterations: 1,
            total_ops: 1,
            total_ns: 1,
        }
    }

    /// Runs every fixture setup once and reports a fixed score per tag.
    #[derive(Default)]
    struct ScriptedEngine;

    impl ExecutionEngine for ScriptedEngine {
        fn execute(
            &self,
            plan: &ExecutionPlan,
            benchmarks: &[Benchmark<'_>],
            footprints: &mut FootprintAnalyzer,
        ) -> std::result::Result<Vec<RunResult>, EngineError> {
            let mut out = Vec::new();
            for bench in benchmarks {
                for &size in &bench.container_sizes {
                    let mut ctx = FixtureContext::new(size, plan.seed, footprints);
                    bench.variant.setup(&mut ctx).map_err(|e| EngineError::Other(e.to_string()))?;
                    let score = match bench.variant.tag() {
                        "java" => 300.0,
                        "vavr" => 100.0,
                        _ => 50.0,
                    };
                    out.push(result(&bench.id, size, score, plan.mode));
                }
            }
            Ok(out)
        }
    }

    struct CountingEngine(Arc<AtomicUsize>);

    impl ExecutionEngine for CountingEngine {
        fn execute(
            &self,
            plan: &ExecutionPlan,
            benchmarks: &[Benchmark<'_>],
            footprints: &mut FootprintAnalyzer,
        ) -> std::result::Result<Vec<RunResult>, EngineError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            ScriptedEngine.execute(plan, benchmarks, footprints)
        }
    }

    struct FixedEngine(std::result::Result<Vec<RunResult>, String>);

    impl ExecutionEngine for FixedEngine {
        fn execute(
            &self,
            _plan: &ExecutionPlan,
            _benchmarks: &[Benchmark<'_>],
            _footprints: &mut FootprintAnalyzer,
        ) -> std::result::Result<Vec<RunResult>, EngineError> {
            self.0.clone().map_err(EngineError::Other)
        }
    }

    struct BlockingEngine {
        entered: Arc<Barrier>,
        release: Arc<Barrier>,
    }

    impl ExecutionEngine for BlockingEngine {
        fn execute(
            &self,
            _plan: &ExecutionPlan,
            benchmarks: &[Benchmark<'_>],
            _footprints: &mut FootprintAnalyzer,
        ) -> std::result::Result<Vec<RunResult>, EngineError> {
            self.entered.wait();
            self.release.wait();
            Ok(benchmarks
                .iter()
                .map(|b| result(&b.id, 100, 10.0, TimingMode::Throughput))
                .collect())
        }
    }

    fn quick() -> RunRequest {
        let mut profile = Profile::Quick.settings();
        profile.result_sink = None;
        RunRequest::new(profile)
    }

    #[test]
    fn test_run_produces_report() {
        let orchestrator = Orchestrator::new(registry(), ScriptedEngine);
        let request = quick().include(["java", "vavr"]).groups(["ArrayBenchmark"]);
        let (outcome, report) = orchestrator.run(&request).unwrap();

        assert_eq!(outcome.samples.len(), 2);
        assert_eq!(report.baseline, "vavr");
        let group = report.group("ArrayBenchmark").unwrap();
        assert_eq!(group.rows.len(), 2);
        assert_eq!(group.rows[0].tag, "java");
        assert!((group.rows[0].relative.unwrap() - 3.0).abs() < 1e-12);
        assert_eq!(orchestrator.state(), RunState::Idle);
    }

    #[test]
    fn test_engine_invoked_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let orchestrator = Orchestrator::new(registry(), CountingEngine(calls.clone()));
        let request = quick().groups(["ArrayBenchmark", "ListBenchmark"]).include(["java", "vavr"]);
        let plan = orchestrator.plan(&request).unwrap();
        let outcome = orchestrator.execute(plan).unwrap();
        assert_eq!(outcome.samples.len(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_footprints_scoped_to_run() {
        let orchestrator = Orchestrator::new(registry(), ScriptedEngine);
        let request = quick().groups(["ArrayBenchmark"]).container_sizes(vec![10]);
        let (first, _) = orchestrator.run(&request).unwrap();
        let (second, _) = orchestrator.run(&request).unwrap();
        assert_eq!(first.footprints, second.footprints);
        assert_eq!(first.footprints[&10].len(), 1);
    }

    #[test]
    fn test_configuration_errors_before_engine() {
        let orchestrator = Orchestrator::new(registry(), FixedEngine(Err("must not run".into())));
        let err = orchestrator.run(&quick().include(["clojure"])).unwrap_err();
        assert!(matches!(err, BenchError::Configuration(ConfigurationError::UnknownTag { .. })));
        let err = orchestrator.run(&quick().groups(["SetBenchmark"])).unwrap_err();
        assert!(matches!(err, BenchError::Configuration(ConfigurationError::UnknownGroup(_))));

        let mut plan = orchestrator.plan(&quick()).unwrap();
        plan.forks = 3;
        let err = orchestrator.execute(plan).unwrap_err();
        assert!(matches!(err, BenchError::Configuration(ConfigurationError::UnsupportedForks(3))));
        assert_eq!(orchestrator.state(), RunState::Idle);
    }

    #[test]
    fn test_engine_failure_is_fatal() {
        let orchestrator = Orchestrator::new(registry(), FixedEngine(Err("engine crashed".into())));
        let err = orchestrator.run(&quick()).unwrap_err();
        assert!(matches!(err, BenchError::Engine(EngineError::Other(ref m)) if m == "engine crashed"));
        assert_eq!(orchestrator.state(), RunState::Idle);
    }

    #[test]
    fn test_unattributable_result() {
        let results = vec![result("ArrayBenchmark.ArrayGet.clojure_immutable", 100, 1.0, TimingMode::Throughput)];
        let orchestrator = Orchestrator::new(registry(), FixedEngine(Ok(results)));
        let err = orchestrator.run(&quick()).unwrap_err();
        assert!(matches!(err, BenchError::Engine(EngineError::Unattributable(_))));
    }

    #[test]
    fn test_average_time_normalized() {
        let results = vec![
            result("ArrayBenchmark.ArrayGet.vavr_immutable", 100, 0.5, TimingMode::AverageTime),
            result("ArrayBenchmark.ArrayGet.java_mutable", 100, 0.25, TimingMode::AverageTime),
        ];
        let orchestrator = Orchestrator::new(registry(), FixedEngine(Ok(results)));
        let (outcome, report) = orchestrator
            .run(&quick().include(["java", "vavr"]).mode(TimingMode::AverageTime))
            .unwrap();
        assert_eq!(outcome.samples[0].ops_per_sec, 2.0);
        let relative = report.group("ArrayBenchmark").unwrap().rows[0].relative.unwrap();
        assert!((relative - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_missing_baseline_fails_run() {
        let orchestrator = Orchestrator::new(registry(), ScriptedEngine);
        let request = quick()
            .include(["java", "scala"])
            .baseline(BaselinePolicy::Fixed("vavr".into()));
        let err = orchestrator.run(&request).unwrap_err();
        assert!(matches!(err, BenchError::Report(ReportError::MissingBaseline { .. })));
        assert_eq!(orchestrator.state(), RunState::Idle);
    }

    #[test]
    fn test_baseline_shared_by_selected_groups() {
        let orchestrator = Orchestrator::new(registry(), ScriptedEngine);
        let request = quick().groups(["ArrayBenchmark", "ListBenchmark"]);
        let plan = orchestrator.plan(&request).unwrap();
        assert_eq!(orchestrator.baseline(&plan, &BaselinePolicy::Convention).unwrap(), "java");

        let (_, report) = orchestrator.run(&request).unwrap();
        assert_eq!(report.baseline, "java");
        assert_eq!(report.groups.len(), 2);
        let array = report.group("ArrayBenchmark").unwrap();
        let vavr = array.rows.iter().find(|r| r.tag == "vavr").unwrap();
        assert!((vavr.relative.unwrap() - 1.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_no_shared_baseline_rejected_before_engine() {
        let calls = Arc::new(AtomicUsize::new(0));
        let orchestrator = Orchestrator::new(registry(), CountingEngine(calls.clone()));
        let request = quick().groups(["ArrayBenchmark", "ListBenchmark"]).include(["vavr", "scala"]);
        let err = orchestrator.run(&request).unwrap_err();
        assert!(matches!(
            err,
            BenchError::Configuration(ConfigurationError::NoSharedBaseline { ref groups })
                if groups == "ArrayBenchmark, ListBenchmark"
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(orchestrator.state(), RunState::Idle);
    }

    #[test]
    fn test_concurrent_run_rejected() {
        let entered = Arc::new(Barrier::new(2));
        let release = Arc::new(Barrier::new(2));
        let orchestrator = Orchestrator::new(
            registry(),
            BlockingEngine {
                entered: entered.clone(),
                release: release.clone(),
            },
        );
        let request = quick().include(["vavr"]);

        thread::scope(|s| {
            let first = s.spawn(|| orchestrator.run(&request));
            entered.wait();
            assert_eq!(orchestrator.state(), RunState::Executing);
            assert!(matches!(orchestrator.run(&request), Err(BenchError::RunInProgress)));
            release.wait();
            assert!(first.join().unwrap().is_ok());
        });
        assert_eq!(orchestrator.state(), RunState::Idle);
    }
}
