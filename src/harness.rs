use std::any::Any;
use std::hint::black_box;
use std::thread;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::EngineError;
use crate::footprint::FootprintAnalyzer;
use crate::plan::{ExecutionPlan, TimingMode};
use crate::registry::{Benchmark, Fixture, FixtureContext};
use crate::schema;
use crate::Verbosity;

/// One engine result, attributable through its benchmark id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    /// `Group.Operation.method`
    pub benchmark: String,
    pub container_size: usize,
    pub mode: TimingMode,
    /// Mean over measurement iterations, in `score_unit`.
    pub score: f64,
    pub score_unit: String,
    pub iteration_scores: Vec<f64>,
    pub warmup_iterations: u32,
    pub total_ops: u64,
    pub total_ns: u128,
}

/// Executes a plan. Implementations own iteration scheduling and timing.
///
/// Benchmarks must run one at a time; fixture setup receives `footprints` so
/// it can record the containers it builds.
pub trait ExecutionEngine: Send + Sync {
    fn execute(
        &self,
        plan: &ExecutionPlan,
        benchmarks: &[Benchmark<'_>],
        footprints: &mut FootprintAnalyzer,
    ) -> Result<Vec<RunResult>, EngineError>;
}

#[derive(Clone, Debug)]
pub struct Measured {
    pub ops: u64,
    pub elapsed: Duration,
}

impl Measured {
    pub fn score(&self, mode: TimingMode) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        let ops = self.ops.max(1) as f64;
        match mode {
            TimingMode::Throughput if secs <= 0.0 => 0.0,
            TimingMode::Throughput => ops / secs,
            TimingMode::AverageTime => secs / ops,
        }
    }
}

/// Call `f` repeatedly for at least `budget`.
///
/// Calls are batched so the clock is read once per batch; the batch doubles
/// while the elapsed time is under a quarter of the budget.
pub fn measure_for<T>(budget: Duration, mut f: impl FnMut() -> T) -> Measured {
    let start = Instant::now();
    let mut ops = 0u64;
    let mut batch = 1u64;
    loop {
        for _ in 0..batch {
            black_box(f());
        }
        ops += batch;
        let elapsed = start.elapsed();
        if elapsed >= budget {
            return Measured { ops, elapsed };
        }
        if elapsed * 4 < budget {
            batch = batch.saturating_mul(2);
        }
    }
}

/// Runs every benchmark in this process, each on a dedicated worker thread.
#[derive(Clone, Debug, Default)]
pub struct InProcessEngine;

impl ExecutionEngine for InProcessEngine {
    fn execute(
        &self,
        plan: &ExecutionPlan,
        benchmarks: &[Benchmark<'_>],
        footprints: &mut FootprintAnalyzer,
    ) -> Result<Vec<RunResult>, EngineError> {
        let filter = plan
            .include_filter()
            .map_err(|e| EngineError::Other(format!("invalid include pattern: {e}")))?;

        let mut results = Vec::new();
        for bench in benchmarks {
            if !filter.is_match(&bench.id) {
                return Err(EngineError::NotIncluded {
                    benchmark: bench.id.clone(),
                });
            }
            for &size in &bench.container_sizes {
                let result = run_on_worker(plan, bench, size, &mut *footprints)?;
                if plan.verbosity != Verbosity::Quiet {
                    info!(
                        benchmark = %result.benchmark,
                        size,
                        score = result.score,
                        unit = %result.score_unit,
                        "benchmark finished"
                    );
                }
                results.push(result);
            }
        }

        if let Some(path) = &plan.result_sink {
            schema::write_results(path, plan, &results, footprints.observations()).map_err(|source| {
                EngineError::Sink {
                    path: path.display().to_string(),
                    source,
                }
            })?;
        }
        Ok(results)
    }
}

fn run_on_worker(
    plan: &ExecutionPlan,
    bench: &Benchmark<'_>,
    size: usize,
    footprints: &mut FootprintAnalyzer,
) -> Result<RunResult, EngineError> {
    thread::scope(|scope| {
        let handle = thread::Builder::new()
            .name(format!("bench:{}", bench.id))
            .stack_size(plan.tuning.worker_stack_bytes)
            .spawn_scoped(scope, move || measure_benchmark(plan, bench, size, footprints))
            .map_err(|e| EngineError::Other(format!("spawning worker for {}: {e}", bench.id)))?;

        handle.join().map_err(|payload| EngineError::Panicked {
            benchmark: bench.id.clone(),
            container_size: size,
            message: panic_message(payload.as_ref()),
        })?
    })
}

fn measure_benchmark(
    plan: &ExecutionPlan,
    bench: &Benchmark<'_>,
    size: usize,
    footprints: &mut FootprintAnalyzer,
) -> Result<RunResult, EngineError> {
    let fixture_err = |source| EngineError::Fixture {
        benchmark: bench.id.clone(),
        container_size: size,
        source,
    };

    let mut ctx = FixtureContext::new(size, plan.seed, footprints);
    let Fixture { mut body, check } = bench.variant.setup(&mut ctx).map_err(fixture_err)?;
    if plan.tuning.assertions {
        if let Some(check) = check {
            check().map_err(fixture_err)?;
        }
    }

    for i in 0..plan.warmup_iterations {
        let m = measure_for(plan.warmup_time, &mut body);
        if plan.verbosity == Verbosity::Extra {
            info!(benchmark = %bench.id, size, iteration = i + 1, score = m.score(plan.mode), "warmup");
        }
    }

    let mut iteration_scores = Vec::with_capacity(plan.measurement_iterations as usize);
    let mut total_ops = 0u64;
    let mut total_ns = 0u128;
    for i in 0..plan.measurement_iterations {
        let m = measure_for(plan.measurement_time, &mut body);
        let score = m.score(plan.mode);
        if plan.verbosity == Verbosity::Extra {
            info!(benchmark = %bench.id, size, iteration = i + 1, score, "measurement");
        }
        total_ops += m.ops;
        total_ns += m.elapsed.as_nanos();
        iteration_scores.push(score);
    }

    let denom = iteration_scores.len().max(1) as f64;
    let score = iteration_scores.iter().sum::<f64>() / denom;

    Ok(RunResult {
        benchmark: bench.id.clone(),
        container_size: size,
        mode: plan.mode,
        score,
        score_unit: match plan.mode {
            TimingMode::Throughput => "ops/s",
            TimingMode::AverageTime => "s/op",
        }
        .to_string(),
        iteration_scores,
        warmup_iterations: plan.warmup_iterations,
        total_ops,
        total_ns,
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
