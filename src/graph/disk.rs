//! Disk-resident graph handle.
//!
//! Only the part of the on-disk graph this crate needs: the row id ->
//! ordinal map and view bookkeeping. Neighbour lists and vectors are read
//! by the traversal, which lives elsewhere.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::Result;
use crate::graph::ordinals::{OrdinalMap, OrdinalSource, OrdinalsView};

/// Immutable graph of one sealed segment.
#[derive(Debug)]
pub struct DiskAnnGraph {
    ordinals: OrdinalMap,
    open_views: AtomicUsize,
}

impl DiskAnnGraph {
    pub fn new(ordinals: OrdinalMap) -> Self {
        Self {
            ordinals,
            open_views: AtomicUsize::new(0),
        }
    }

    /// Open the graph's ordinal map file.
    pub fn open(ordinals_path: &Path) -> Result<Self> {
        Ok(Self::new(OrdinalMap::open(ordinals_path)?))
    }

    /// Number of graph nodes.
    pub fn size(&self) -> usize {
        self.ordinals.ordinal_count() as usize
    }

    /// Views currently held. Zero whenever no translation pass is running.
    pub fn open_views(&self) -> usize {
        self.open_views.load(Ordering::Acquire)
    }
}

/// View over a [`DiskAnnGraph`]'s ordinal map. Released on drop.
#[derive(Debug)]
pub struct DiskOrdinalsView<'a> {
    ordinals: &'a OrdinalMap,
    open_views: &'a AtomicUsize,
}

impl OrdinalsView for DiskOrdinalsView<'_> {
    #[inline]
    fn ordinal_for(&self, segment_row_id: u32) -> Result<Option<u32>> {
        Ok(self.ordinals.lookup(segment_row_id))
    }
}

impl Drop for DiskOrdinalsView<'_> {
    fn drop(&mut self) {
        self.open_views.fetch_sub(1, Ordering::AcqRel);
    }
}

impl OrdinalSource for DiskAnnGraph {
    type View<'a> = DiskOrdinalsView<'a>;

    fn ordinals_view(&self) -> Result<DiskOrdinalsView<'_>> {
        self.open_views.fetch_add(1, Ordering::AcqRel);
        Ok(DiskOrdinalsView {
            ordinals: &self.ordinals,
            open_views: &self.open_views,
        })
    }
}
