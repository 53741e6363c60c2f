//! Curated workload groups shipped with the harness.
//!
//! Each group compares std containers against [`SharedList`], a small
//! structurally shared list. Setups build their container once, record its
//! footprint and hand the engine a body closure; mutable variants carry state
//! across calls the same way a benchmark state object would.

pub mod array;
pub mod list;
pub mod map;
pub mod persistent;

use std::fmt::Debug;

pub use persistent::SharedList;

use crate::dataset;
use crate::error::FixtureError;
use crate::registry::{FixtureContext, Registry};

pub const STD: &str = "std";
pub const DEQUE: &str = "deque";
pub const LINKED: &str = "linked";
pub const BTREE: &str = "btree";
pub const PERSISTENT: &str = "persistent";

/// Registry with every shipped group; all of them are curated.
pub fn registry() -> Registry {
    let mut registry = Registry::new();
    registry.register(array::group(), true);
    registry.register(list::group(), true);
    registry.register(map::group(), true);
    registry
}

/// Inputs shared by every variant of one container size.
pub(crate) struct Elements {
    pub values: Vec<u64>,
    /// Random permutation of `0..values.len()`.
    pub order: Vec<usize>,
    /// XOR of all values.
    pub expected: u64,
}

impl Elements {
    /// `0..size` in order.
    pub fn sequential(ctx: &FixtureContext<'_>) -> Self {
        let mut rng = ctx.rng();
        let values = dataset::fill_with_size(ctx.container_size());
        let order = dataset::shuffled_indices(values.len(), &mut rng);
        Self::from_parts(values, order)
    }

    /// `size` non-negative random values with repeats.
    pub fn random(ctx: &FixtureContext<'_>) -> Self {
        let mut rng = ctx.rng();
        let values: Vec<u64> = dataset::random_values(ctx.container_size(), true, &mut rng)
            .into_iter()
            .map(|v| v as u64)
            .collect();
        let order = dataset::shuffled_indices(values.len(), &mut rng);
        Self::from_parts(values, order)
    }

    fn from_parts(values: Vec<u64>, order: Vec<usize>) -> Self {
        let expected = dataset::expected_aggregate(&values);
        Self { values, order, expected }
    }
}

pub(crate) fn expect_eq<T: PartialEq + Debug>(what: &str, actual: T, expected: T) -> Result<(), FixtureError> {
    if actual == expected {
        Ok(())
    } else {
        Err(FixtureError::Verification(format!(
            "{what}: expected {expected:?}, got {actual:?}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::footprint::FootprintAnalyzer;
    use crate::registry::Fixture;

    /// Run setup, the check, and a few body calls for every shipped variant.
    #[test]
    fn test_every_variant_sets_up_and_verifies() {
        let registry = registry();
        let mut footprints = FootprintAnalyzer::default();
        for group in registry.groups() {
            for op in group.operations() {
                for variant in op.variants() {
                    for size in [1, 17, 100] {
                        let mut ctx = FixtureContext::new(size, 42, &mut footprints);
                        let Fixture { mut body, check } = variant
                            .setup(&mut ctx)
                            .unwrap_or_else(|e| panic!("{}.{}.{}: {e}", group.id(), op.name(), variant.method()));
                        if let Some(check) = check {
                            check().unwrap_or_else(|e| panic!("{}.{}.{}: {e}", group.id(), op.name(), variant.method()));
                        }
                        for _ in 0..3 {
                            body();
                        }
                    }
                }
            }
        }

        // One row per distinct container type and size, all classified.
        let obs = footprints.observations();
        assert_eq!(obs.keys().copied().collect::<Vec<_>>(), [1, 17, 100]);
        let labels: Vec<&str> = obs[&100].iter().map(|r| r.label.as_str()).collect();
        for expected in [
            "Std mutable @ Vec",
            "Std mutable @ VecDeque",
            "Std mutable @ LinkedList",
            "Std mutable @ HashMap",
            "Std mutable @ BTreeMap",
            "Shared-structure immutable @ SharedList",
        ] {
            assert!(labels.contains(&expected), "missing {expected} in {labels:?}");
        }
    }

    #[test]
    fn test_shipped_tags() {
        let tags: Vec<String> = registry().known_tags().into_iter().collect();
        assert_eq!(tags, [BTREE, DEQUE, LINKED, PERSISTENT, STD]);
        assert_eq!(registry().curated(), ["ArrayBenchmark", "ListBenchmark", "MapBenchmark"]);
    }

    #[test]
    fn test_elements_deterministic() {
        let mut footprints = FootprintAnalyzer::default();
        let ctx = FixtureContext::new(64, 7, &mut footprints);
        let a = Elements::random(&ctx);
        let b = Elements::random(&ctx);
        assert_eq!(a.values, b.values);
        assert_eq!(a.order, b.order);
        assert_eq!(a.expected, dataset::expected_aggregate(&b.values));
    }

    #[test]
    fn test_expect_eq_message() {
        assert!(expect_eq("head", 1, 1).is_ok());
        let err = expect_eq("head", 2, 1).unwrap_err();
        assert_eq!(err, FixtureError::Verification("head: expected 1, got 2".to_string()));
    }
}
