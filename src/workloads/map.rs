//! `MapBenchmark`: keyed lookup tables.

use std::collections::{BTreeMap, HashMap};
use std::hint::black_box;

use super::{expect_eq, Elements, BTREE, STD};
use crate::dataset::aggregate;
use crate::error::FixtureError;
use crate::footprint::HeapNode;
use crate::registry::{Fixture, FixtureContext, Operation, WorkloadGroup};

pub const GROUP: &str = "MapBenchmark";

pub trait Table: HeapNode + 'static {
    const TAG: &'static str;
    const KIND: &'static str;

    fn of_all(entries: &[(u64, u64)]) -> Self;
    fn empty() -> Self;
    fn size(&self) -> usize;
    fn lookup(&self, key: u64) -> Option<u64>;
    fn put(&mut self, key: u64, value: u64);
    /// XOR of `key ^ value` over all entries.
    fn aggregate_all(&self) -> u64;
}

impl Table for HashMap<u64, u64> {
    const TAG: &'static str = STD;
    const KIND: &'static str = "mutable";

    fn of_all(entries: &[(u64, u64)]) -> Self {
        entries.iter().copied().collect()
    }

    fn empty() -> Self {
        HashMap::new()
    }

    fn size(&self) -> usize {
        self.len()
    }

    fn lookup(&self, key: u64) -> Option<u64> {
        self.get(&key).copied()
    }

    fn put(&mut self, key: u64, value: u64) {
        self.insert(key, value);
    }

    fn aggregate_all(&self) -> u64 {
        self.iter().fold(0, |acc, (&k, &v)| aggregate(acc, k ^ v))
    }
}

impl Table for BTreeMap<u64, u64> {
    const TAG: &'static str = BTREE;
    const KIND: &'static str = "mutable";

    fn of_all(entries: &[(u64, u64)]) -> Self {
        entries.iter().copied().collect()
    }

    fn empty() -> Self {
        BTreeMap::new()
    }

    fn size(&self) -> usize {
        self.len()
    }

    fn lookup(&self, key: u64) -> Option<u64> {
        self.get(&key).copied()
    }

    fn put(&mut self, key: u64, value: u64) {
        self.insert(key, value);
    }

    fn aggregate_all(&self) -> u64 {
        self.iter().fold(0, |acc, (&k, &v)| aggregate(acc, k ^ v))
    }
}

/// Distinct keys in random order, each mapped to a random value.
struct Entries {
    entries: Vec<(u64, u64)>,
    keys: Vec<u64>,
    values_aggregate: u64,
    entries_aggregate: u64,
}

impl Entries {
    fn new(ctx: &FixtureContext<'_>) -> Self {
        let input = Elements::random(ctx);
        let entries: Vec<(u64, u64)> = input
            .order
            .iter()
            .zip(&input.values)
            .map(|(&key, &value)| (key as u64, value))
            .collect();
        let keys = entries.iter().map(|&(k, _)| k).collect();
        let entries_aggregate = entries.iter().fold(0, |acc, &(k, v)| aggregate(acc, k ^ v));
        Self {
            entries,
            keys,
            values_aggregate: input.expected,
            entries_aggregate,
        }
    }
}

fn fill<T: Table>(entries: &[(u64, u64)]) -> T {
    let mut table = T::empty();
    for &(k, v) in entries {
        table.put(k, v);
    }
    table
}

fn create<T: Table>(ctx: &mut FixtureContext<'_>) -> Result<Fixture, FixtureError> {
    let input = Entries::new(ctx);
    ctx.record_footprint(&T::of_all(&input.entries))?;
    let size = T::of_all(&input.entries).size();
    let expected = input.entries.len();
    Ok(Fixture::new(move || black_box(T::of_all(black_box(&input.entries))).size() as u64)
        .with_check(move || expect_eq("MapCreate", size, expected)))
}

fn get<T: Table>(ctx: &mut FixtureContext<'_>) -> Result<Fixture, FixtureError> {
    let input = Entries::new(ctx);
    let table = T::of_all(&input.entries);
    ctx.record_footprint(&table)?;
    let lookup_all = |table: &T, keys: &[u64]| {
        keys.iter()
            .fold(0, |acc, &k| aggregate(acc, table.lookup(k).unwrap_or_default()))
    };
    let actual = lookup_all(&table, input.keys.as_slice());
    Ok(Fixture::new(move || lookup_all(&table, black_box(input.keys.as_slice())))
        .with_check(move || expect_eq("MapGet", actual, input.values_aggregate)))
}

fn put<T: Table>(ctx: &mut FixtureContext<'_>) -> Result<Fixture, FixtureError> {
    let input = Entries::new(ctx);
    ctx.record_footprint(&T::of_all(&input.entries))?;
    let filled = fill::<T>(&input.entries).aggregate_all();
    Ok(Fixture::new(move || black_box(fill::<T>(black_box(&input.entries))).size() as u64)
        .with_check(move || expect_eq("MapPut", filled, input.entries_aggregate)))
}

fn iterate<T: Table>(ctx: &mut FixtureContext<'_>) -> Result<Fixture, FixtureError> {
    let input = Entries::new(ctx);
    let table = T::of_all(&input.entries);
    ctx.record_footprint(&table)?;
    let actual = table.aggregate_all();
    Ok(Fixture::new(move || black_box(&table).aggregate_all())
        .with_check(move || expect_eq("MapIterate", actual, input.entries_aggregate)))
}

macro_rules! over_tables {
    ($name:literal, $setup:ident) => {
        Operation::new($name)
            .variant(
                <HashMap<u64, u64> as Table>::TAG,
                <HashMap<u64, u64> as Table>::KIND,
                $setup::<HashMap<u64, u64>>,
            )
            .variant(
                <BTreeMap<u64, u64> as Table>::TAG,
                <BTreeMap<u64, u64> as Table>::KIND,
                $setup::<BTreeMap<u64, u64>>,
            )
    };
}

pub fn group() -> WorkloadGroup {
    WorkloadGroup::new(GROUP)
        .operation(over_tables!("MapCreate", create))
        .operation(over_tables!("MapGet", get))
        .operation(over_tables!("MapPut", put))
        .operation(over_tables!("MapIterate", iterate))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::footprint::FootprintAnalyzer;

    fn exercise<T: Table>() {
        let mut table = T::of_all(&[(1, 10), (2, 20)]);
        assert_eq!(table.lookup(2), Some(20));
        assert_eq!(table.lookup(3), None);
        table.put(3, 30);
        assert_eq!(table.size(), 3);
        assert_eq!(table.aggregate_all(), (1 ^ 10) ^ (2 ^ 20) ^ (3 ^ 30));
    }

    #[test]
    fn test_tables_agree() {
        exercise::<HashMap<u64, u64>>();
        exercise::<BTreeMap<u64, u64>>();
    }

    #[test]
    fn test_entries_have_distinct_keys() {
        let mut footprints = FootprintAnalyzer::default();
        let ctx = FixtureContext::new(200, 11, &mut footprints);
        let input = Entries::new(&ctx);
        let mut keys = input.keys.clone();
        keys.sort_unstable();
        keys.dedup();
        assert_eq!(keys.len(), 200);
    }
}
