//! Sealed sstable segments with a disk-resident vector graph.
//!
//! Each segment directory entry is a pair of files:
//! `segment_<id>.json` (bounds) and `segment_<id>.ordm` (ordinal map).

pub mod key_map;
pub mod metadata;

pub use key_map::{PrimaryKeyMap, SortedKeyMap};
pub use metadata::{RowPosition, SegmentMetadata};

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{IndexError, Result};
use crate::expression::VectorColumn;
use crate::graph::{DiskAnnGraph, SegmentGraph};

/// One segment of an sstable's vector index.
pub struct VectorSegment {
    column: VectorColumn,
    metadata: SegmentMetadata,
    graph: DiskAnnGraph,
    key_map: Arc<dyn PrimaryKeyMap>,
}

impl VectorSegment {
    /// Assemble a segment from loaded parts.
    ///
    /// The graph cannot have more nodes than the segment has rows.
    pub fn new(
        column: VectorColumn,
        metadata: SegmentMetadata,
        graph: DiskAnnGraph,
        key_map: Arc<dyn PrimaryKeyMap>,
    ) -> Result<Self> {
        if graph.size() > metadata.domain_size() {
            return Err(IndexError::InvalidSegment(format!(
                "segment {}: graph has {} nodes but only {} rows",
                metadata.segment_id,
                graph.size(),
                metadata.domain_size()
            )));
        }
        Ok(Self {
            column,
            metadata,
            graph,
            key_map,
        })
    }

    /// Open `segment_<id>.json` + `segment_<id>.ordm` from `dir`.
    pub fn open(
        dir: &Path,
        segment_id: u64,
        column: VectorColumn,
        key_map: Arc<dyn PrimaryKeyMap>,
    ) -> Result<Self> {
        let metadata = SegmentMetadata::read_from(&Self::metadata_path(dir, segment_id))?;
        if metadata.segment_id != segment_id {
            return Err(IndexError::InvalidSegment(format!(
                "expected segment {}, metadata says {}",
                segment_id, metadata.segment_id
            )));
        }
        let graph = DiskAnnGraph::open(&Self::ordinals_path(dir, segment_id))?;
        Self::new(column, metadata, graph, key_map)
    }

    pub fn metadata_path(dir: &Path, segment_id: u64) -> PathBuf {
        dir.join(format!("segment_{}.json", segment_id))
    }

    pub fn ordinals_path(dir: &Path, segment_id: u64) -> PathBuf {
        dir.join(format!("segment_{}.ordm", segment_id))
    }

    /// Indexed column.
    pub fn column(&self) -> &VectorColumn {
        &self.column
    }

    pub fn metadata(&self) -> &SegmentMetadata {
        &self.metadata
    }

    pub fn graph(&self) -> &DiskAnnGraph {
        &self.graph
    }

    pub fn key_map(&self) -> &dyn PrimaryKeyMap {
        self.key_map.as_ref()
    }

    /// This segment as a [`SegmentGraph`] for predicate construction.
    pub fn as_graph(&self) -> SegmentGraph<'_> {
        SegmentGraph::DiskResident {
            metadata: &self.metadata,
            key_map: self.key_map.as_ref(),
            graph: &self.graph,
        }
    }
}
