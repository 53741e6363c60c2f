//! Workload catalog: group -> operations -> tagged variants.
//!
//! A variant's method name is always `<tag>_<kind>` (`java_mutable`,
//! `persistent_immutable`), which is what the include patterns of a plan
//! anchor on. Benchmark ids are `Group.Operation.method`.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use rand_chacha::rand_core::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::dataset;
use crate::error::{ConfigurationError, FixtureError};
use crate::footprint::{FootprintAnalyzer, HeapNode};

/// Container size used when a group does not declare its own.
pub const DEFAULT_CONTAINER_SIZES: &[usize] = &[100];

/// The measured body of a benchmark. Its return value is fed to `black_box`.
pub type Workload = Box<dyn FnMut() -> u64>;

pub type Check = Box<dyn FnOnce() -> Result<(), FixtureError>>;

pub type SetupFn = dyn Fn(&mut FixtureContext<'_>) -> Result<Fixture, FixtureError> + Send + Sync;

/// What a variant's setup hands to the engine.
pub struct Fixture {
    pub body: Workload,
    pub check: Option<Check>,
}

impl Fixture {
    pub fn new(body: impl FnMut() -> u64 + 'static) -> Self {
        Self {
            body: Box::new(body),
            check: None,
        }
    }

    /// Verification run once after setup, only when assertions are enabled.
    pub fn with_check(mut self, check: impl FnOnce() -> Result<(), FixtureError> + 'static) -> Self {
        self.check = Some(Box::new(check));
        self
    }
}

/// Setup-time view of the run handed to each variant.
pub struct FixtureContext<'r> {
    container_size: usize,
    seed: u64,
    footprints: &'r mut FootprintAnalyzer,
}

impl<'r> FixtureContext<'r> {
    pub fn new(container_size: usize, seed: u64, footprints: &'r mut FootprintAnalyzer) -> Self {
        Self {
            container_size,
            seed,
            footprints,
        }
    }

    pub fn container_size(&self) -> usize {
        self.container_size
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Deterministic per (seed, container size).
    pub fn rng(&self) -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(dataset::per_size_seed(self.seed, self.container_size))
    }

    /// Record the retained size of a freshly built container.
    pub fn record_footprint<T: HeapNode>(&mut self, target: &T) -> Result<(), FixtureError> {
        self.footprints.record(self.container_size, target)?;
        Ok(())
    }
}

#[derive(Clone)]
pub struct Variant {
    tag: String,
    method: String,
    setup: Arc<SetupFn>,
}

impl Variant {
    pub fn new(
        tag: &str,
        kind: &str,
        setup: impl Fn(&mut FixtureContext<'_>) -> Result<Fixture, FixtureError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            tag: tag.to_string(),
            method: format!("{tag}_{kind}"),
            setup: Arc::new(setup),
        }
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn setup(&self, ctx: &mut FixtureContext<'_>) -> Result<Fixture, FixtureError> {
        (self.setup)(ctx)
    }
}

impl fmt::Debug for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Variant")
            .field("tag", &self.tag)
            .field("method", &self.method)
            .finish_non_exhaustive()
    }
}

#[derive(Clone, Debug)]
pub struct Operation {
    name: String,
    variants: Vec<Variant>,
}

impl Operation {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            variants: Vec::new(),
        }
    }

    pub fn variant(
        mut self,
        tag: &str,
        kind: &str,
        setup: impl Fn(&mut FixtureContext<'_>) -> Result<Fixture, FixtureError> + Send + Sync + 'static,
    ) -> Self {
        self.variants.push(Variant::new(tag, kind, setup));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn variants(&self) -> &[Variant] {
        &self.variants
    }
}

#[derive(Clone, Debug)]
pub struct WorkloadGroup {
    id: String,
    container_sizes: Vec<usize>,
    operations: Vec<Operation>,
}

impl WorkloadGroup {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            container_sizes: DEFAULT_CONTAINER_SIZES.to_vec(),
            operations: Vec::new(),
        }
    }

    pub fn container_sizes(mut self, sizes: &[usize]) -> Self {
        self.container_sizes = sizes.to_vec();
        self
    }

    pub fn operation(mut self, op: Operation) -> Self {
        self.operations.push(op);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn sizes(&self) -> &[usize] {
        &self.container_sizes
    }

    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    pub fn tags(&self) -> BTreeSet<&str> {
        self.operations
            .iter()
            .flat_map(|op| op.variants.iter().map(|v| v.tag.as_str()))
            .collect()
    }
}

/// One (group, operation, variant) triple selected for execution.
#[derive(Clone, Debug)]
pub struct Benchmark<'r> {
    pub id: String,
    pub group: &'r str,
    pub operation: &'r str,
    pub variant: &'r Variant,
    pub container_sizes: Vec<usize>,
}

#[derive(Clone, Debug, Default)]
pub struct Registry {
    groups: Vec<WorkloadGroup>,
    curated: Vec<String>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a group; `curated` groups form the default selection.
    pub fn register(&mut self, group: WorkloadGroup, curated: bool) {
        if curated {
            self.curated.push(group.id.clone());
        }
        self.groups.push(group);
    }

    pub fn groups(&self) -> &[WorkloadGroup] {
        &self.groups
    }

    pub fn group(&self, id: &str) -> Option<&WorkloadGroup> {
        self.groups.iter().find(|g| g.id == id)
    }

    pub fn curated(&self) -> &[String] {
        &self.curated
    }

    pub fn known_tags(&self) -> BTreeSet<String> {
        self.groups
            .iter()
            .flat_map(|g| g.tags())
            .map(str::to_string)
            .collect()
    }

    /// Resolve a group selection; empty means the curated default list.
    pub fn resolve_groups(&self, requested: &[String]) -> Result<Vec<String>, ConfigurationError> {
        let ids: Vec<String> = if requested.is_empty() {
            self.curated.clone()
        } else {
            requested.to_vec()
        };
        if ids.is_empty() {
            return Err(ConfigurationError::NoGroups);
        }
        for id in &ids {
            if self.group(id).is_none() {
                return Err(ConfigurationError::UnknownGroup(id.clone()));
            }
        }
        Ok(ids)
    }

    /// Resolve an include set; empty means every registered tag.
    pub fn resolve_tags(&self, requested: &[String]) -> Result<BTreeSet<String>, ConfigurationError> {
        let known = self.known_tags();
        if requested.is_empty() {
            return Ok(known);
        }
        let mut tags = BTreeSet::new();
        for tag in requested {
            if !known.contains(tag) {
                return Err(ConfigurationError::UnknownTag {
                    tag: tag.clone(),
                    known: known.iter().cloned().collect::<Vec<_>>().join(", "),
                });
            }
            tags.insert(tag.clone());
        }
        Ok(tags)
    }

    /// Tags of `include` that every group in `groups` registers.
    pub fn shared_tags(&self, groups: &[String], include: &BTreeSet<String>) -> BTreeSet<String> {
        let mut shared = include.clone();
        for group in groups.iter().filter_map(|id| self.group(id)) {
            let tags = group.tags();
            shared.retain(|tag| tags.contains(tag.as_str()));
        }
        shared
    }

    /// Variants of `groups` whose tag is in `tags`, in registration order.
    pub fn select<'r>(
        &'r self,
        groups: &[String],
        tags: &BTreeSet<String>,
        sizes: Option<&[usize]>,
    ) -> Vec<Benchmark<'r>> {
        let mut out = Vec::new();
        for group in groups.iter().filter_map(|id| self.group(id)) {
            let container_sizes = sizes.unwrap_or(group.container_sizes.as_slice()).to_vec();
            for op in &group.operations {
                for variant in op.variants.iter().filter(|v| tags.contains(&v.tag)) {
                    out.push(Benchmark {
                        id: benchmark_id(&group.id, &op.name, &variant.method),
                        group: &group.id,
                        operation: &op.name,
                        variant,
                        container_sizes: container_sizes.clone(),
                    });
                }
            }
        }
        out
    }

    /// Split `Group.Operation.method` back into its registered parts.
    pub fn attribute(&self, benchmark: &str) -> Option<(&WorkloadGroup, &Operation, &Variant)> {
        self.groups
            .iter()
            .filter(|g| benchmark.starts_with(&g.id) && benchmark[g.id.len()..].starts_with('.'))
            .max_by_key(|g| g.id.len())
            .and_then(|group| {
                let rest = &benchmark[group.id.len() + 1..];
                let (op_name, method) = rest.rsplit_once('.')?;
                let op = group.operations.iter().find(|op| op.name == op_name)?;
                let variant = op.variants.iter().find(|v| v.method == method)?;
                Some((group, op, variant))
            })
    }
}

pub fn benchmark_id(group: &str, operation: &str, method: &str) -> String {
    format!("{group}.{operation}.{method}")
}
