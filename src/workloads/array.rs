//! `ArrayBenchmark`: indexed sequences.

use std::collections::VecDeque;
use std::hint::black_box;
use std::mem;

use super::{expect_eq, Elements, SharedList, DEQUE, PERSISTENT, STD};
use crate::dataset::aggregate;
use crate::error::FixtureError;
use crate::footprint::HeapNode;
use crate::registry::{Fixture, FixtureContext, Operation, WorkloadGroup};

pub const GROUP: &str = "ArrayBenchmark";

/// An indexed sequence of `u64`. Mutable implementations modify in place and
/// hand themselves back.
pub trait Sequence: HeapNode + 'static {
    const TAG: &'static str;
    const KIND: &'static str;

    fn of_all(values: &[u64]) -> Self;
    fn empty() -> Self;
    fn size(&self) -> usize;
    fn first(&self) -> Option<u64>;
    fn at(&self, index: usize) -> Option<u64>;
    fn updated(self, index: usize, value: u64) -> Self;
    fn appended(self, value: u64) -> Self;
    fn aggregate_all(&self) -> u64;
    fn elements(&self) -> Vec<u64>;
}

impl Sequence for Vec<u64> {
    const TAG: &'static str = STD;
    const KIND: &'static str = "mutable";

    fn of_all(values: &[u64]) -> Self {
        values.to_vec()
    }

    fn empty() -> Self {
        Vec::new()
    }

    fn size(&self) -> usize {
        self.len()
    }

    fn first(&self) -> Option<u64> {
        self.as_slice().first().copied()
    }

    fn at(&self, index: usize) -> Option<u64> {
        self.as_slice().get(index).copied()
    }

    fn updated(mut self, index: usize, value: u64) -> Self {
        if let Some(slot) = self.get_mut(index) {
            *slot = value;
        }
        self
    }

    fn appended(mut self, value: u64) -> Self {
        self.push(value);
        self
    }

    fn aggregate_all(&self) -> u64 {
        self.iter().fold(0, |acc, &v| aggregate(acc, v))
    }

    fn elements(&self) -> Vec<u64> {
        self.clone()
    }
}

impl Sequence for VecDeque<u64> {
    const TAG: &'static str = DEQUE;
    const KIND: &'static str = "mutable";

    fn of_all(values: &[u64]) -> Self {
        values.iter().copied().collect()
    }

    fn empty() -> Self {
        VecDeque::new()
    }

    fn size(&self) -> usize {
        self.len()
    }

    fn first(&self) -> Option<u64> {
        self.front().copied()
    }

    fn at(&self, index: usize) -> Option<u64> {
        VecDeque::get(self, index).copied()
    }

    fn updated(mut self, index: usize, value: u64) -> Self {
        if let Some(slot) = self.get_mut(index) {
            *slot = value;
        }
        self
    }

    fn appended(mut self, value: u64) -> Self {
        self.push_back(value);
        self
    }

    fn aggregate_all(&self) -> u64 {
        self.iter().fold(0, |acc, &v| aggregate(acc, v))
    }

    fn elements(&self) -> Vec<u64> {
        self.iter().copied().collect()
    }
}

impl Sequence for SharedList<u64> {
    const TAG: &'static str = PERSISTENT;
    const KIND: &'static str = "immutable";

    fn of_all(values: &[u64]) -> Self {
        SharedList::of_all(values.iter().copied())
    }

    fn empty() -> Self {
        SharedList::new()
    }

    fn size(&self) -> usize {
        self.len()
    }

    fn first(&self) -> Option<u64> {
        self.head().copied()
    }

    fn at(&self, index: usize) -> Option<u64> {
        self.get(index).copied()
    }

    fn updated(self, index: usize, value: u64) -> Self {
        self.update(index, value).unwrap_or(self)
    }

    fn appended(self, value: u64) -> Self {
        self.append(value)
    }

    fn aggregate_all(&self) -> u64 {
        self.iter().fold(0, |acc, &v| aggregate(acc, v))
    }

    fn elements(&self) -> Vec<u64> {
        self.iter().copied().collect()
    }
}

fn gather<S: Sequence>(seq: &S, order: &[usize]) -> u64 {
    order
        .iter()
        .fold(0, |acc, &i| aggregate(acc, seq.at(i).unwrap_or_default()))
}

fn overwrite<S: Sequence>(mut seq: S, order: &[usize]) -> S {
    for &i in order {
        seq = seq.updated(i, 0);
    }
    seq
}

fn create<S: Sequence>(ctx: &mut FixtureContext<'_>) -> Result<Fixture, FixtureError> {
    let input = Elements::sequential(ctx);
    ctx.record_footprint(&S::of_all(&input.values))?;
    let values = input.values.clone();
    Ok(Fixture::new(move || black_box(S::of_all(black_box(&input.values))).size() as u64)
        .with_check(move || expect_eq("ArrayCreate", S::of_all(&values).elements(), values)))
}

fn head<S: Sequence>(ctx: &mut FixtureContext<'_>) -> Result<Fixture, FixtureError> {
    let input = Elements::sequential(ctx);
    let seq = S::of_all(&input.values);
    ctx.record_footprint(&seq)?;
    let expected = input.values.as_slice().first().copied();
    let actual = seq.first();
    Ok(Fixture::new(move || seq.first().unwrap_or_default())
        .with_check(move || expect_eq("ArrayHead", actual, expected)))
}

fn get<S: Sequence>(ctx: &mut FixtureContext<'_>) -> Result<Fixture, FixtureError> {
    let input = Elements::sequential(ctx);
    let seq = S::of_all(&input.values);
    ctx.record_footprint(&seq)?;
    let actual = gather(&seq, &input.order);
    Ok(Fixture::new(move || gather(&seq, black_box(&input.order)))
        .with_check(move || expect_eq("ArrayGet", actual, input.expected)))
}

fn update<S: Sequence>(ctx: &mut FixtureContext<'_>) -> Result<Fixture, FixtureError> {
    let input = Elements::sequential(ctx);
    let mut seq = S::of_all(&input.values);
    ctx.record_footprint(&seq)?;
    let overwritten = overwrite(S::of_all(&input.values), &input.order).elements();
    let size = input.values.len();
    let order = input.order;
    Ok(Fixture::new(move || {
        seq = overwrite(mem::replace(&mut seq, S::empty()), black_box(&order));
        seq.first().unwrap_or_default()
    })
    .with_check(move || expect_eq("ArrayUpdate", overwritten, vec![0; size])))
}

fn append<S: Sequence>(ctx: &mut FixtureContext<'_>) -> Result<Fixture, FixtureError> {
    let input = Elements::sequential(ctx);
    ctx.record_footprint(&S::of_all(&input.values))?;
    let build = |values: &[u64]| values.iter().fold(S::empty(), |seq, &v| seq.appended(v));
    let appended = build(input.values.as_slice()).elements();
    let values = input.values;
    let expected = values.clone();
    Ok(Fixture::new(move || black_box(build(black_box(values.as_slice()))).size() as u64)
        .with_check(move || expect_eq("ArrayAppend", appended, expected)))
}

fn iterate<S: Sequence>(ctx: &mut FixtureContext<'_>) -> Result<Fixture, FixtureError> {
    let input = Elements::sequential(ctx);
    let seq = S::of_all(&input.values);
    ctx.record_footprint(&seq)?;
    let actual = seq.aggregate_all();
    Ok(Fixture::new(move || black_box(&seq).aggregate_all())
        .with_check(move || expect_eq("ArrayIterate", actual, input.expected)))
}

macro_rules! over_sequences {
    ($name:literal, $setup:ident) => {
        Operation::new($name)
            .variant(<Vec<u64> as Sequence>::TAG, <Vec<u64> as Sequence>::KIND, $setup::<Vec<u64>>)
            .variant(
                <VecDeque<u64> as Sequence>::TAG,
                <VecDeque<u64> as Sequence>::KIND,
                $setup::<VecDeque<u64>>,
            )
            .variant(
                <SharedList<u64> as Sequence>::TAG,
                <SharedList<u64> as Sequence>::KIND,
                $setup::<SharedList<u64>>,
            )
    };
}

pub fn group() -> WorkloadGroup {
    WorkloadGroup::new(GROUP)
        .operation(over_sequences!("ArrayCreate", create))
        .operation(over_sequences!("ArrayHead", head))
        .operation(over_sequences!("ArrayGet", get))
        .operation(over_sequences!("ArrayUpdate", update))
        .operation(over_sequences!("ArrayAppend", append))
        .operation(over_sequences!("ArrayIterate", iterate))
}
