//! Comparison report aggregation and rendering

use std::collections::BTreeSet;

use collection_bench::{BaselinePolicy, ComparisonReport, RawSample};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

const TAGS: [&str; 8] = ["agrona", "clojure", "fjava", "hppc", "java", "pcollections", "scala", "vavr"];

fn samples(groups: usize, operations: usize, sizes: &[usize]) -> Vec<RawSample> {
    let mut out = Vec::new();
    for g in 0..groups {
        for op in 0..operations {
            for &size in sizes {
                for (t, tag) in TAGS.iter().enumerate() {
                    out.push(RawSample {
                        group: format!("Group{g}"),
                        operation: format!("Op{op}"),
                        tag: tag.to_string(),
                        container_size: size,
                        ops_per_sec: 1_000.0 * (t + 1) as f64 + (op * size) as f64,
                    });
                }
            }
        }
    }
    out
}

fn bench_build(c: &mut Criterion) {
    let include: BTreeSet<String> = TAGS.iter().map(|t| t.to_string()).collect();
    let policy = BaselinePolicy::default();

    let mut group = c.benchmark_group("report_build");
    for groups in [1usize, 4, 16] {
        let group_names: Vec<String> = (0..groups).map(|g| format!("Group{g}")).collect();
        let data = samples(groups, 8, &[10, 100, 1_000]);

        group.bench_with_input(BenchmarkId::new("build", groups), &data, |bencher, data| {
            bencher.iter(|| {
                ComparisonReport::build(black_box(&include), black_box(&group_names), black_box(data), &policy)
            })
        });

        let report = ComparisonReport::build(&include, &group_names, &data, &policy)
            .expect("baseline is always present");
        group.bench_with_input(BenchmarkId::new("render", groups), &report, |bencher, report| {
            bencher.iter(|| black_box(report.render()))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_build);
criterion_main!(benches);
