//! Build-time (memtable) graph bookkeeping.
//!
//! While a memtable is being indexed, its graph lives on the heap. Rows
//! with bit-identical vectors share a single node, so one ordinal can map
//! to several primary keys. This type owns that ordinal <-> key mapping;
//! neighbour lists are maintained by the graph builder.

use std::collections::{BTreeSet, HashMap};

use crate::error::{IndexError, Result};
use crate::key::PrimaryKey;

/// Ordinal <-> key mapping of an in-memory graph with value deduplication.
#[derive(Debug)]
pub struct OnHeapGraph {
    dimension: usize,
    /// Vector bit pattern -> ordinal.
    vectors: HashMap<Vec<u32>, u32>,
    /// Ordinal -> keys sharing that node.
    postings: Vec<BTreeSet<PrimaryKey>>,
    /// Key -> its current ordinal.
    key_ordinals: HashMap<PrimaryKey, u32>,
}

impl OnHeapGraph {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            vectors: HashMap::new(),
            postings: Vec::new(),
            key_ordinals: HashMap::new(),
        }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Index `vector` for `key` and return the node's ordinal.
    ///
    /// A vector bit-identical to one already indexed reuses its ordinal.
    /// Re-adding a key with a different vector moves the key to the new node.
    pub fn add(&mut self, key: PrimaryKey, vector: &[f32]) -> Result<u32> {
        if vector.len() != self.dimension {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            });
        }

        let bits: Vec<u32> = vector.iter().map(|v| v.to_bits()).collect();
        let ordinal = match self.vectors.get(&bits) {
            Some(&ordinal) => ordinal,
            None => {
                let next = Self::next_ordinal(self.postings.len())?;
                self.vectors.insert(bits, next);
                self.postings.push(BTreeSet::new());
                next
            }
        };

        if let Some(previous) = self.key_ordinals.insert(key, ordinal) {
            if previous != ordinal {
                self.postings[previous as usize].remove(&key);
            }
        }
        self.postings[ordinal as usize].insert(key);
        Ok(ordinal)
    }

    /// Ordinal for a node appended after `nodes` existing ones. The ordinal
    /// space is u32; `u32::MAX` stays unused, as in the on-disk map.
    fn next_ordinal(nodes: usize) -> Result<u32> {
        u32::try_from(nodes)
            .ok()
            .filter(|&ordinal| ordinal != u32::MAX)
            .ok_or_else(|| {
                IndexError::InvalidSegment(format!(
                    "build-time graph is full: {} nodes exhaust the ordinal space",
                    nodes
                ))
            })
    }

    /// Detach `key` from its node. The node itself stays in the graph.
    pub fn remove(&mut self, key: &PrimaryKey) -> Option<u32> {
        let ordinal = self.key_ordinals.remove(key)?;
        self.postings[ordinal as usize].remove(key);
        Some(ordinal)
    }

    /// Keys mapped to `ordinal`. `None` for ordinals outside the graph.
    pub fn keys_for(&self, ordinal: u32) -> Option<&BTreeSet<PrimaryKey>> {
        self.postings.get(ordinal as usize)
    }

    pub fn ordinal_for(&self, key: &PrimaryKey) -> Option<u32> {
        self.key_ordinals.get(key).copied()
    }

    /// Number of graph nodes (distinct vectors).
    pub fn size(&self) -> usize {
        self.postings.len()
    }

    /// Number of keys currently indexed.
    pub fn key_count(&self) -> usize {
        self.key_ordinals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.postings.is_empty()
    }
}
