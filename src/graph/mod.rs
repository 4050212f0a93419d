//! Vector graph representations.
//!
//! A segment's graph is either disk-resident (sealed sstable segment) or
//! build-time (memtable, on heap). The set is closed: every consumer
//! matches on [`SegmentGraph`] exhaustively.

pub mod disk;
pub mod heap;
pub mod ordinals;

pub use disk::{DiskAnnGraph, DiskOrdinalsView};
pub use heap::OnHeapGraph;
pub use ordinals::{OrdinalMap, OrdinalMapWriter, OrdinalSource, OrdinalsView};

use crate::segment::key_map::PrimaryKeyMap;
use crate::segment::metadata::SegmentMetadata;

/// Borrowed view of one graph plus the context its representation needs.
#[derive(Clone, Copy)]
pub enum SegmentGraph<'a> {
    /// Sealed segment: keys reach ordinals through row ids.
    DiskResident {
        metadata: &'a SegmentMetadata,
        key_map: &'a dyn PrimaryKeyMap,
        graph: &'a DiskAnnGraph,
    },
    /// Memtable graph: ordinals map straight to keys.
    BuildTime(&'a OnHeapGraph),
}

impl SegmentGraph<'_> {
    /// Number of graph nodes.
    pub fn size(&self) -> usize {
        match self {
            SegmentGraph::DiskResident { graph, .. } => graph.size(),
            SegmentGraph::BuildTime(graph) => graph.size(),
        }
    }
}
