//! Retained-size measurement by walking the heap graph of a value.
//!
//! Rust has no runtime reflection, so every measurable type describes its own
//! heap edges through [`HeapNode`]. The [`GraphWalker`] does the bookkeeping:
//! allocations with a stable address (vector buffers, `Box`, `Rc`, `Arc`
//! targets) are keyed by that address and counted once no matter how many paths
//! reach them. Pointer targets are queued instead of recursed into, so long
//! linked structures do not grow the native stack.
//!
//! Buffers that std does not expose an address for (`VecDeque`, hash tables,
//! B-tree nodes, linked-list nodes) are counted as owned by their parent. They
//! can only be reached twice through a shared pointer, and that pointer is
//! deduplicated first.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, LinkedList, VecDeque};
use std::mem::{size_of, size_of_val};
use std::rc::Rc;
use std::sync::Arc;

use crate::error::AnalysisError;

/// Strong + weak counters stored in front of an `Rc`/`Arc` value.
pub const REF_COUNT_OVERHEAD: usize = 2 * size_of::<usize>();

/// Default cap on the number of distinct allocations visited for one root.
pub const DEFAULT_NODE_LIMIT: usize = 50_000_000;

/// Entries per B-tree node in std's implementation (`2 * B - 1`, `B = 6`).
const BTREE_NODE_CAPACITY: usize = 11;

/// A value whose heap graph can be walked.
pub trait HeapNode {
    /// Fully-qualified type name used for classification.
    fn type_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Report every heap allocation this value owns or points to.
    ///
    /// Inline fields are visited directly; pointers go through
    /// [`GraphWalker::pointer`].
    fn visit_heap<'a>(&'a self, walker: &mut GraphWalker<'a>) -> Result<(), AnalysisError>;
}

/// Pluggable retained-size measurement.
pub trait GraphSizer: Send + Sync {
    fn measure(&self, target: &dyn HeapNode) -> Result<u64, AnalysisError>;
}

/// Walks the full reachability graph and counts each distinct allocation once.
#[derive(Clone, Debug)]
pub struct ReachabilitySizer {
    node_limit: usize,
}

impl ReachabilitySizer {
    pub fn with_node_limit(node_limit: usize) -> Self {
        Self {
            node_limit: node_limit.max(1),
        }
    }
}

impl Default for ReachabilitySizer {
    fn default() -> Self {
        Self::with_node_limit(DEFAULT_NODE_LIMIT)
    }
}

impl GraphSizer for ReachabilitySizer {
    fn measure(&self, target: &dyn HeapNode) -> Result<u64, AnalysisError> {
        let mut walker = GraphWalker::new(target.type_name(), self.node_limit);
        walker.pending.push(target);
        walker.drain()?;
        Ok(size_of_val(target) as u64 + walker.bytes)
    }
}

pub struct GraphWalker<'a> {
    root_type: &'static str,
    seen: HashSet<usize>,
    pending: Vec<&'a dyn HeapNode>,
    bytes: u64,
    nodes: usize,
    node_limit: usize,
}

impl<'a> GraphWalker<'a> {
    fn new(root_type: &'static str, node_limit: usize) -> Self {
        Self {
            root_type,
            seen: HashSet::new(),
            pending: Vec::new(),
            bytes: 0,
            nodes: 0,
            node_limit,
        }
    }

    fn drain(&mut self) -> Result<(), AnalysisError> {
        while let Some(node) = self.pending.pop() {
            node.visit_heap(self)?;
        }
        Ok(())
    }

    fn count_node(&mut self, bytes: usize) -> Result<(), AnalysisError> {
        self.nodes += 1;
        if self.nodes > self.node_limit {
            return Err(AnalysisError::GraphTooLarge {
                type_name: self.root_type,
                limit: self.node_limit,
            });
        }
        self.bytes += bytes as u64;
        Ok(())
    }

    /// Count an allocation identified by its start address.
    ///
    /// Returns `false` when the allocation was already counted (or is empty), in
    /// which case the caller must not visit its contents again.
    pub fn allocation(&mut self, addr: usize, bytes: usize) -> Result<bool, AnalysisError> {
        if bytes == 0 || !self.seen.insert(addr) {
            return Ok(false);
        }
        self.count_node(bytes)?;
        Ok(true)
    }

    /// Count a buffer reachable only through its (already deduplicated) owner.
    pub fn owned(&mut self, bytes: usize) -> Result<(), AnalysisError> {
        if bytes == 0 {
            return Ok(());
        }
        self.count_node(bytes)
    }

    /// Follow a pointer to a heap value stored `overhead` bytes past its header.
    pub fn pointer<T: HeapNode>(&mut self, target: &'a T, overhead: usize) -> Result<(), AnalysisError> {
        let addr = target as *const T as usize;
        if self.allocation(addr, size_of::<T>() + overhead)? {
            self.pending.push(target);
        }
        Ok(())
    }

    pub fn bytes(&self) -> u64 {
        self.bytes
    }
}

/// Wraps a value whose heap graph cannot be introspected.
///
/// Measuring it fails with [`AnalysisError::Opaque`]; classification still uses
/// the wrapped type's name.
pub struct Opaque<T>(pub T);

impl<T> HeapNode for Opaque<T> {
    fn type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }

    fn visit_heap<'a>(&'a self, _walker: &mut GraphWalker<'a>) -> Result<(), AnalysisError> {
        Err(AnalysisError::Opaque {
            type_name: std::any::type_name::<T>(),
        })
    }
}

macro_rules! leaf_nodes {
    ($($t:ty),* $(,)?) => {
        $(
            impl HeapNode for $t {
                fn visit_heap<'a>(&'a self, _walker: &mut GraphWalker<'a>) -> Result<(), AnalysisError> {
                    Ok(())
                }
            }
        )*
    };
}

leaf_nodes!(
    (), bool, char, u8, u16, u32, u64, u128, usize, i8, i16, i32, i64, i128, isize, f32, f64,
);

impl HeapNode for String {
    fn visit_heap<'a>(&'a self, walker: &mut GraphWalker<'a>) -> Result<(), AnalysisError> {
        walker.allocation(self.as_ptr() as usize, self.capacity())?;
        Ok(())
    }
}

impl<T: HeapNode> HeapNode for Option<T> {
    fn visit_heap<'a>(&'a self, walker: &mut GraphWalker<'a>) -> Result<(), AnalysisError> {
        match self {
            Some(value) => value.visit_heap(walker),
            None => Ok(()),
        }
    }
}

impl<A: HeapNode, B: HeapNode> HeapNode for (A, B) {
    fn visit_heap<'a>(&'a self, walker: &mut GraphWalker<'a>) -> Result<(), AnalysisError> {
        self.0.visit_heap(walker)?;
        self.1.visit_heap(walker)
    }
}

impl<T: HeapNode, const N: usize> HeapNode for [T; N] {
    fn visit_heap<'a>(&'a self, walker: &mut GraphWalker<'a>) -> Result<(), AnalysisError> {
        for item in self {
            item.visit_heap(walker)?;
        }
        Ok(())
    }
}

impl<T: HeapNode> HeapNode for Box<T> {
    fn visit_heap<'a>(&'a self, walker: &mut GraphWalker<'a>) -> Result<(), AnalysisError> {
        walker.pointer(&**self, 0)
    }
}

impl<T: HeapNode> HeapNode for Rc<T> {
    fn visit_heap<'a>(&'a self, walker: &mut GraphWalker<'a>) -> Result<(), AnalysisError> {
        walker.pointer(&**self, REF_COUNT_OVERHEAD)
    }
}

impl<T: HeapNode> HeapNode for Arc<T> {
    fn visit_heap<'a>(&'a self, walker: &mut GraphWalker<'a>) -> Result<(), AnalysisError> {
        walker.pointer(&**self, REF_COUNT_OVERHEAD)
    }
}

impl<T: HeapNode> HeapNode for Vec<T> {
    fn visit_heap<'a>(&'a self, walker: &mut GraphWalker<'a>) -> Result<(), AnalysisError> {
        if walker.allocation(self.as_ptr() as usize, self.capacity() * size_of::<T>())? {
            for item in self {
                item.visit_heap(walker)?;
            }
        }
        Ok(())
    }
}

impl<T: HeapNode> HeapNode for VecDeque<T> {
    fn visit_heap<'a>(&'a self, walker: &mut GraphWalker<'a>) -> Result<(), AnalysisError> {
        walker.owned(self.capacity() * size_of::<T>())?;
        for item in self {
            item.visit_heap(walker)?;
        }
        Ok(())
    }
}

impl<T: HeapNode> HeapNode for LinkedList<T> {
    fn visit_heap<'a>(&'a self, walker: &mut GraphWalker<'a>) -> Result<(), AnalysisError> {
        // Each element lives in its own node with prev/next links.
        let node_bytes = size_of::<T>() + 2 * size_of::<usize>();
        for item in self {
            walker.owned(node_bytes)?;
            item.visit_heap(walker)?;
        }
        Ok(())
    }
}

/// Bucket storage of a SwissTable with `capacity` usable slots: one slot plus
/// one control byte per bucket, plus a trailing control group.
fn hash_table_bytes(capacity: usize, slot: usize) -> usize {
    if capacity == 0 {
        return 0;
    }
    let buckets = if capacity < 8 {
        (capacity + 1).next_power_of_two()
    } else {
        (capacity * 8 / 7).next_power_of_two()
    };
    buckets * (slot + 1) + 16
}

fn btree_bytes(len: usize, entry: usize) -> usize {
    let nodes = len.div_ceil(BTREE_NODE_CAPACITY);
    // parent pointer + parent index + len per node
    nodes * (BTREE_NODE_CAPACITY * entry + size_of::<usize>() + 4)
}

impl<K: HeapNode, V: HeapNode, S> HeapNode for HashMap<K, V, S> {
    fn visit_heap<'a>(&'a self, walker: &mut GraphWalker<'a>) -> Result<(), AnalysisError> {
        walker.owned(hash_table_bytes(self.capacity(), size_of::<(K, V)>()))?;
        for (key, value) in self {
            key.visit_heap(walker)?;
            value.visit_heap(walker)?;
        }
        Ok(())
    }
}

impl<T: HeapNode, S> HeapNode for HashSet<T, S> {
    fn visit_heap<'a>(&'a self, walker: &mut GraphWalker<'a>) -> Result<(), AnalysisError> {
        walker.owned(hash_table_bytes(self.capacity(), size_of::<T>()))?;
        for item in self {
            item.visit_heap(walker)?;
        }
        Ok(())
    }
}

impl<K: HeapNode, V: HeapNode> HeapNode for BTreeMap<K, V> {
    fn visit_heap<'a>(&'a self, walker: &mut GraphWalker<'a>) -> Result<(), AnalysisError> {
        walker.owned(btree_bytes(self.len(), size_of::<K>() + size_of::<V>()))?;
        for (key, value) in self {
            key.visit_heap(walker)?;
            value.visit_heap(walker)?;
        }
        Ok(())
    }
}

impl<T: HeapNode> HeapNode for BTreeSet<T> {
    fn visit_heap<'a>(&'a self, walker: &mut GraphWalker<'a>) -> Result<(), AnalysisError> {
        walker.owned(btree_bytes(self.len(), size_of::<T>()))?;
        for item in self {
            item.visit_heap(walker)?;
        }
        Ok(())
    }
}
