//! Vector index over a live memtable.
//!
//! The graph is still being built, so ordinals resolve straight to
//! primary keys through [`OnHeapGraph`] and no row ids are involved.

use crate::error::Result;
use crate::expression::VectorColumn;
use crate::graph::{OnHeapGraph, SegmentGraph};
use crate::key::PrimaryKey;

/// Build-time vector index for one column of a memtable.
#[derive(Debug)]
pub struct MemtableVectorIndex {
    column: VectorColumn,
    graph: OnHeapGraph,
}

impl MemtableVectorIndex {
    pub fn new(column: VectorColumn) -> Self {
        let graph = OnHeapGraph::new(column.dimension);
        Self { column, graph }
    }

    /// Index a row's vector. Returns the graph ordinal it landed on.
    pub fn add(&mut self, key: PrimaryKey, vector: &[f32]) -> Result<u32> {
        self.graph.add(key, vector)
    }

    /// Drop a row from the index (the row was overwritten without a vector).
    pub fn remove(&mut self, key: &PrimaryKey) -> Option<u32> {
        self.graph.remove(key)
    }

    pub fn column(&self) -> &VectorColumn {
        &self.column
    }

    pub fn graph(&self) -> &OnHeapGraph {
        &self.graph
    }

    /// This index as a [`SegmentGraph`] for predicate construction.
    pub fn as_graph(&self) -> SegmentGraph<'_> {
        SegmentGraph::BuildTime(&self.graph)
    }
}
