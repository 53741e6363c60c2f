//! A minimal persistent singly linked list.
//!
//! Every "modifying" operation returns a new list; the unchanged suffix is
//! shared with the original through `Arc`. Prepend and tail are O(1), update
//! copies the prefix up to the index, append copies everything.

use std::sync::Arc;

use crate::error::AnalysisError;
use crate::footprint::{GraphWalker, HeapNode};

struct Node<T> {
    value: T,
    next: Option<Arc<Node<T>>>,
}

pub struct SharedList<T> {
    head: Option<Arc<Node<T>>>,
    len: usize,
}

impl<T> SharedList<T> {
    pub fn new() -> Self {
        Self { head: None, len: 0 }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn prepend(&self, value: T) -> Self {
        Self {
            head: Some(Arc::new(Node {
                value,
                next: self.head.clone(),
            })),
            len: self.len + 1,
        }
    }

    pub fn head(&self) -> Option<&T> {
        self.head.as_deref().map(|node| &node.value)
    }

    pub fn tail(&self) -> Option<Self> {
        self.head.as_deref().map(|node| Self {
            head: node.next.clone(),
            len: self.len - 1,
        })
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        self.iter().nth(index)
    }

    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            next: self.head.as_deref(),
        }
    }
}

impl<T: Clone> SharedList<T> {
    pub fn of_all(values: impl IntoIterator<Item = T>) -> Self {
        let values: Vec<T> = values.into_iter().collect();
        values
            .into_iter()
            .rev()
            .fold(Self::new(), |list, value| list.prepend(value))
    }

    /// Replace the element at `index`; `None` when out of bounds.
    pub fn update(&self, index: usize, value: T) -> Option<Self> {
        if index >= self.len {
            return None;
        }
        let mut prefix = Vec::with_capacity(index);
        let mut cursor = self.head.as_ref();
        for _ in 0..index {
            let node = cursor?;
            prefix.push(node.value.clone());
            cursor = node.next.as_ref();
        }
        let suffix = Self {
            head: cursor?.next.clone(),
            len: self.len - index - 1,
        };
        let list = suffix.prepend(value);
        Some(prefix.into_iter().rev().fold(list, |list, v| list.prepend(v)))
    }

    pub fn append(&self, value: T) -> Self {
        let mut values: Vec<T> = self.iter().cloned().collect();
        values.push(value);
        Self::of_all(values)
    }
}

impl<T> Default for SharedList<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for SharedList<T> {
    fn clone(&self) -> Self {
        Self {
            head: self.head.clone(),
            len: self.len,
        }
    }
}

// Unlink uniquely owned nodes one at a time; the default drop recurses once
// per node.
impl<T> Drop for SharedList<T> {
    fn drop(&mut self) {
        let mut next = self.head.take();
        while let Some(node) = next {
            match Arc::try_unwrap(node) {
                Ok(mut node) => next = node.next.take(),
                Err(_) => break,
            }
        }
    }
}

pub struct Iter<'a, T> {
    next: Option<&'a Node<T>>,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.next?;
        self.next = node.next.as_deref();
        Some(&node.value)
    }
}

impl<'a, T> IntoIterator for &'a SharedList<T> {
    type Item = &'a T;
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<T: HeapNode> HeapNode for Node<T> {
    fn visit_heap<'a>(&'a self, walker: &mut GraphWalker<'a>) -> Result<(), AnalysisError> {
        self.value.visit_heap(walker)?;
        self.next.visit_heap(walker)
    }
}

impl<T: HeapNode> HeapNode for SharedList<T> {
    fn visit_heap<'a>(&'a self, walker: &mut GraphWalker<'a>) -> Result<(), AnalysisError> {
        self.head.visit_heap(walker)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prepend_shares_tail() {
        let a = SharedList::of_all([1u64, 2, 3]);
        let b = a.prepend(0);
        assert_eq!(b.len(), 4);
        assert_eq!(a.iter().copied().collect::<Vec<_>>(), [1, 2, 3]);
        assert_eq!(b.iter().copied().collect::<Vec<_>>(), [0, 1, 2, 3]);
        let a_head = a.head.as_ref().unwrap();
        let b_next = b.head.as_ref().unwrap().next.as_ref().unwrap();
        assert!(Arc::ptr_eq(a_head, b_next));
    }

    #[test]
    fn test_head_tail_get() {
        let list = SharedList::of_all(0u64..5);
        assert_eq!(list.head(), Some(&0));
        let tail = list.tail().unwrap();
        assert_eq!(tail.len(), 4);
        assert_eq!(tail.head(), Some(&1));
        assert_eq!(list.get(4), Some(&4));
        assert_eq!(list.get(5), None);
        assert!(SharedList::<u64>::new().tail().is_none());
    }

    #[test]
    fn test_update_keeps_original() {
        let list = SharedList::of_all(0u64..5);
        let updated = list.update(2, 20).unwrap();
        assert_eq!(updated.iter().copied().collect::<Vec<_>>(), [0, 1, 20, 3, 4]);
        assert_eq!(list.iter().copied().collect::<Vec<_>>(), [0, 1, 2, 3, 4]);
        assert!(list.update(5, 0).is_none());
    }

    #[test]
    fn test_append() {
        let list = SharedList::new().append(1u64).append(2);
        assert_eq!(list.iter().copied().collect::<Vec<_>>(), [1, 2]);
    }

    #[test]
    fn test_long_list_drops() {
        let list = SharedList::of_all(0u64..500_000);
        let shared = list.tail().unwrap();
        drop(list);
        assert_eq!(shared.len(), 499_999);
    }

    #[test]
    fn test_footprint_type_name() {
        let list = SharedList::of_all([1u64]);
        assert!(list.type_name().starts_with("collection_bench::workloads::persistent::SharedList"));
    }
}
