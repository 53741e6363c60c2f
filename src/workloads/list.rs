//! `ListBenchmark`: front-access sequences.

use std::collections::LinkedList;
use std::hint::black_box;

use super::{expect_eq, Elements, SharedList, LINKED, PERSISTENT, STD};
use crate::dataset::aggregate;
use crate::error::FixtureError;
use crate::footprint::HeapNode;
use crate::registry::{Fixture, FixtureContext, Operation, WorkloadGroup};

pub const GROUP: &str = "ListBenchmark";

/// A sequence accessed from the front.
pub trait Stack: HeapNode + Clone + 'static {
    const TAG: &'static str;
    const KIND: &'static str;

    fn of_all(values: &[u64]) -> Self;
    fn empty() -> Self;
    fn size(&self) -> usize;
    fn prepended(self, value: u64) -> Self;
    fn peek(&self) -> Option<u64>;
    /// Everything but the first element; `None` when empty.
    fn rest(self) -> Option<Self>;
    fn aggregate_all(&self) -> u64;
    fn elements(&self) -> Vec<u64>;
}

impl Stack for Vec<u64> {
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

    fn prepended(mut self, value: u64) -> Self {
        self.insert(0, value);
        self
    }

    fn peek(&self) -> Option<u64> {
        self.as_slice().first().copied()
    }

    fn rest(mut self) -> Option<Self> {
        if self.is_empty() {
            return None;
        }
        self.remove(0);
        Some(self)
    }

    fn aggregate_all(&self) -> u64 {
        self.iter().fold(0, |acc, &v| aggregate(acc, v))
    }

    fn elements(&self) -> Vec<u64> {
        self.clone()
    }
}

impl Stack for LinkedList<u64> {
    const TAG: &'static str = LINKED;
    const KIND: &'static str = "mutable";

    fn of_all(values: &[u64]) -> Self {
        values.iter().copied().collect()
    }

    fn empty() -> Self {
        LinkedList::new()
    }

    fn size(&self) -> usize {
        self.len()
    }

    fn prepended(mut self, value: u64) -> Self {
        self.push_front(value);
        self
    }

    fn peek(&self) -> Option<u64> {
        self.front().copied()
    }

    fn rest(mut self) -> Option<Self> {
        self.pop_front().map(|_| self)
    }

    fn aggregate_all(&self) -> u64 {
        self.iter().fold(0, |acc, &v| aggregate(acc, v))
    }

    fn elements(&self) -> Vec<u64> {
        self.iter().copied().collect()
    }
}

impl Stack for SharedList<u64> {
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

    fn prepended(self, value: u64) -> Self {
        self.prepend(value)
    }

    fn peek(&self) -> Option<u64> {
        self.head().copied()
    }

    fn rest(self) -> Option<Self> {
        self.tail()
    }

    fn aggregate_all(&self) -> u64 {
        self.iter().fold(0, |acc, &v| aggregate(acc, v))
    }

    fn elements(&self) -> Vec<u64> {
        self.iter().copied().collect()
    }
}

fn build_by_prepending<S: Stack>(values: &[u64]) -> S {
    values.iter().fold(S::empty(), |stack, &v| stack.prepended(v))
}

/// Drop the first element until empty; returns the number of steps.
fn drain<S: Stack>(stack: S) -> u64 {
    let mut steps = 0;
    let mut current = stack.rest();
    while let Some(stack) = current {
        steps += 1;
        current = stack.rest();
    }
    steps
}

fn prepend<S: Stack>(ctx: &mut FixtureContext<'_>) -> Result<Fixture, FixtureError> {
    let input = Elements::random(ctx);
    ctx.record_footprint(&S::of_all(&input.values))?;
    let built = build_by_prepending::<S>(&input.values).elements();
    let values = input.values;
    let reversed: Vec<u64> = values.iter().rev().copied().collect();
    Ok(
        Fixture::new(move || black_box(build_by_prepending::<S>(black_box(&values))).size() as u64)
            .with_check(move || expect_eq("Prepend", built, reversed)),
    )
}

fn head<S: Stack>(ctx: &mut FixtureContext<'_>) -> Result<Fixture, FixtureError> {
    let input = Elements::random(ctx);
    let stack = S::of_all(&input.values);
    ctx.record_footprint(&stack)?;
    let actual = stack.peek();
    let expected = input.values.as_slice().first().copied();
    Ok(Fixture::new(move || black_box(&stack).peek().unwrap_or_default())
        .with_check(move || expect_eq("Head", actual, expected)))
}

fn tail<S: Stack>(ctx: &mut FixtureContext<'_>) -> Result<Fixture, FixtureError> {
    let input = Elements::random(ctx);
    let stack = S::of_all(&input.values);
    ctx.record_footprint(&stack)?;
    let rest = stack.clone().rest().map(|s| s.elements());
    let expected = input.values.get(1..).map(<[u64]>::to_vec);
    Ok(Fixture::new(move || drain(black_box(&stack).clone()))
        .with_check(move || expect_eq("Tail", rest, expected)))
}

fn iterate<S: Stack>(ctx: &mut FixtureContext<'_>) -> Result<Fixture, FixtureError> {
    let input = Elements::random(ctx);
    let stack = S::of_all(&input.values);
    ctx.record_footprint(&stack)?;
    let actual = stack.aggregate_all();
    Ok(Fixture::new(move || black_box(&stack).aggregate_all())
        .with_check(move || expect_eq("Iterate", actual, input.expected)))
}

macro_rules! over_stacks {
    ($name:literal, $setup:ident) => {
        Operation::new($name)
            .variant(<Vec<u64> as Stack>::TAG, <Vec<u64> as Stack>::KIND, $setup::<Vec<u64>>)
            .variant(
                <LinkedList<u64> as Stack>::TAG,
                <LinkedList<u64> as Stack>::KIND,
                $setup::<LinkedList<u64>>,
            )
            .variant(
                <SharedList<u64> as Stack>::TAG,
                <SharedList<u64> as Stack>::KIND,
                $setup::<SharedList<u64>>,
            )
    };
}

pub fn group() -> WorkloadGroup {
    WorkloadGroup::new(GROUP)
        .operation(over_stacks!("Prepend", prepend))
        .operation(over_stacks!("Head", head))
        .operation(over_stacks!("Tail", tail))
        .operation(over_stacks!("Iterate", iterate))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exercise<S: Stack>() {
        let stack = S::of_all(&[1, 2, 3]);
        assert_eq!(stack.peek(), Some(1));
        assert_eq!(stack.clone().rest().unwrap().elements(), [2, 3]);
        assert_eq!(stack.clone().prepended(0).elements(), [0, 1, 2, 3]);
        assert_eq!(drain(stack), 3);
        assert!(S::empty().rest().is_none());
        assert_eq!(build_by_prepending::<S>(&[1, 2]).elements(), [2, 1]);
    }

    #[test]
    fn test_stacks_agree() {
        exercise::<Vec<u64>>();
        exercise::<LinkedList<u64>>();
        exercise::<SharedList<u64>>();
    }

    #[test]
    fn test_tail_of_single_element() {
        let stack = SharedList::of_all([9u64]);
        let rest = Stack::rest(stack).unwrap();
        assert_eq!(rest.size(), 0);
        assert!(Stack::rest(rest).is_none());
    }
}
