use std::fs;
use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::footprint::Footprints;
use crate::harness::RunResult;
use crate::plan::{ExecutionPlan, RuntimeTuning};

pub const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunMeta {
    pub schema_version: u32,
    pub bench_version: String,
    pub profile: String,
    pub seed: u64,
    pub forks: u32,
    pub timestamp_utc: String,
    pub git_sha: Option<String>,
    pub tuning: RuntimeTuning,
}

impl RunMeta {
    pub fn capture(plan: &ExecutionPlan) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            bench_version: env!("CARGO_PKG_VERSION").to_string(),
            profile: plan.profile.clone(),
            seed: plan.seed,
            forks: plan.forks,
            timestamp_utc: now_utc(),
            git_sha: git_sha_short(),
            tuning: plan.tuning,
        }
    }
}

/// Raw engine output as persisted to the result sink.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultsDocument {
    pub run: RunMeta,
    pub include_patterns: Vec<String>,
    pub results: Vec<RunResult>,
    #[serde(default)]
    pub footprints: Footprints,
}

pub fn write_results(
    path: &Path,
    plan: &ExecutionPlan,
    results: &[RunResult],
    footprints: &Footprints,
) -> io::Result<()> {
    let doc = ResultsDocument {
        run: RunMeta::capture(plan),
        include_patterns: plan.include_patterns.clone(),
        results: results.to_vec(),
        footprints: footprints.clone(),
    };
    let json = serde_json::to_string_pretty(&doc).map_err(io::Error::other)?;
    fs::write(path, json)
}

pub fn read_results(path: &Path) -> io::Result<ResultsDocument> {
    let bytes = fs::read(path)?;
    serde_json::from_slice(&bytes).map_err(io::Error::other)
}

fn now_utc() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    format!("unix:{secs}")
}

fn git_sha_short() -> Option<String> {
    std::env::var("GIT_SHA")
        .ok()
        .or_else(|| std::env::var("GITHUB_SHA").ok())
        .map(|s| s.chars().take(12).collect())
}
