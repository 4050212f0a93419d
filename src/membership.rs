//! Graph membership predicates built from a query's shadowed keys.
//!
//! The traversal asks "may I return this ordinal?" once per visited node,
//! so both predicate shapes answer in O(1) (negative list) or O(keys per
//! node) (key set), with no I/O.
//!
//! Disk-resident graphs translate each shadowed key to an ordinal up front:
//!
//! ```text
//! PrimaryKey --key_map--> whole-table row id --(- offset)--> segment row id
//!            --OrdinalsView--> ordinal
//! ```
//!
//! Shadowed keys are visited in ascending order, and within one sstable row
//! ids ascend with the key, so the pass stops at the first row id past the
//! segment's span.
//!
//! Build-time graphs keep ordinal -> keys in memory and check the shadow
//! set directly. An ordinal stays visible while any of its keys is live.

use std::collections::{BTreeSet, HashSet};
use std::time::Instant;

use rayon::prelude::*;

use crate::context::QueryContext;
use crate::error::Result;
use crate::graph::heap::OnHeapGraph;
use crate::graph::ordinals::{OrdinalSource, OrdinalsView};
use crate::graph::SegmentGraph;
use crate::key::PrimaryKey;
use crate::segment::key_map::PrimaryKeyMap;
use crate::segment::metadata::{RowPosition, SegmentMetadata};
use crate::segment::VectorSegment;
use crate::shadow::ShadowSet;

// ── Predicate ──────────────────────────────────────────────────────

/// Fixed-domain ordinal filter handed to the graph traversal.
///
/// Read-only after construction; safe to share across traversal threads.
#[derive(Debug, Clone)]
pub enum MembershipPredicate<'a> {
    /// Disk-resident graph: everything visible except `ignored`.
    IgnoringOrdinals { ignored: HashSet<u32>, length: usize },
    /// Build-time graph: visible while any mapped key is not shadowed.
    IgnoringKeys {
        graph: &'a OnHeapGraph,
        ignored: &'a BTreeSet<PrimaryKey>,
    },
}

impl MembershipPredicate<'_> {
    /// True if `ordinal` may appear in results.
    #[inline]
    pub fn get(&self, ordinal: u32) -> bool {
        match self {
            MembershipPredicate::IgnoringOrdinals { ignored, .. } => !ignored.contains(&ordinal),
            MembershipPredicate::IgnoringKeys { graph, ignored } => graph
                .keys_for(ordinal)
                .is_some_and(|keys| keys.iter().any(|k| !ignored.contains(k))),
        }
    }

    /// Declared domain size: ordinals `0..len()`.
    pub fn len(&self) -> usize {
        match self {
            MembershipPredicate::IgnoringOrdinals { length, .. } => *length,
            MembershipPredicate::IgnoringKeys { graph, .. } => graph.size(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Excluded ordinals of a negative-list predicate.
    pub fn ignored_ordinals(&self) -> Option<&HashSet<u32>> {
        match self {
            MembershipPredicate::IgnoringOrdinals { ignored, .. } => Some(ignored),
            MembershipPredicate::IgnoringKeys { .. } => None,
        }
    }
}

// ── Builders ───────────────────────────────────────────────────────

/// Build the predicate for one graph.
///
/// `Ok(None)` means no filtering is needed, which is distinct from a
/// predicate that rejects everything.
pub fn build_predicate<'a>(
    ctx: &'a QueryContext,
    graph: SegmentGraph<'a>,
) -> Result<Option<MembershipPredicate<'a>>> {
    match graph {
        SegmentGraph::DiskResident {
            metadata,
            key_map,
            graph,
        } => disk_predicate(ctx, metadata, key_map, graph),
        SegmentGraph::BuildTime(graph) => {
            let predicate = heap_predicate(ctx.shadowed(), graph);
            if predicate.is_some() {
                ctx.add_segment_filtered(0);
            }
            Ok(predicate)
        }
    }
}

/// Key-set predicate for a build-time graph. No I/O.
pub fn heap_predicate<'a>(
    shadowed: &'a ShadowSet,
    graph: &'a OnHeapGraph,
) -> Option<MembershipPredicate<'a>> {
    if shadowed.is_empty() {
        return None;
    }
    let ignored = shadowed.keys()?;
    Some(MembershipPredicate::IgnoringKeys { graph, ignored })
}

/// Negative-list predicate for a disk-resident graph.
pub fn disk_predicate<S>(
    ctx: &QueryContext,
    metadata: &SegmentMetadata,
    key_map: &dyn PrimaryKeyMap,
    source: &S,
) -> Result<Option<MembershipPredicate<'static>>>
where
    S: OrdinalSource + ?Sized,
{
    let ignored = ignored_ordinals(ctx, metadata, key_map, source)?;
    Ok(ignored.map(|ignored| {
        ctx.add_segment_filtered(ignored.len() as u64);
        MembershipPredicate::IgnoringOrdinals {
            ignored,
            length: metadata.domain_size(),
        }
    }))
}

/// Ordinals of `metadata`'s segment whose keys are shadowed.
///
/// Holds one ordinals view for the whole pass; it is released on every
/// exit path, including early termination and errors. `None` when no
/// shadowed key maps into the segment.
pub fn ignored_ordinals<S>(
    ctx: &QueryContext,
    metadata: &SegmentMetadata,
    key_map: &dyn PrimaryKeyMap,
    source: &S,
) -> Result<Option<HashSet<u32>>>
where
    S: OrdinalSource + ?Sized,
{
    let shadowed = ctx.shadowed();
    if shadowed.is_empty() {
        return Ok(None);
    }

    let started = Instant::now();
    let interval = ctx.config().checkpoint_interval.max(1);
    let mut ignored: Option<HashSet<u32>> = None;
    let mut scanned = 0u64;
    let mut early_exit = false;

    let view = source.ordinals_view()?;
    for key in shadowed.ascending() {
        if scanned % interval as u64 == 0 {
            ctx.checkpoint()?;
        }
        scanned += 1;

        // not in current segment
        if !metadata.covers_key(key) {
            continue;
        }
        let Some(row_id) = key_map.row_id_for(key)? else {
            continue;
        };
        let segment_row_id = match metadata.position_of(row_id)? {
            RowPosition::Before => continue,
            RowPosition::After => {
                early_exit = true;
                break;
            }
            RowPosition::Within(segment_row_id) => segment_row_id,
        };
        if let Some(ordinal) = view.ordinal_for(segment_row_id)? {
            ignored.get_or_insert_with(HashSet::new).insert(ordinal);
        }
    }
    drop(view);

    ctx.add_keys_scanned(scanned);
    let elapsed_ms = started.elapsed().as_millis() as u64;
    let ignored_count = ignored.as_ref().map_or(0, HashSet::len);
    if elapsed_ms > ctx.config().slow_translation_ms {
        tracing::warn!(
            segment = metadata.segment_id,
            shadowed = shadowed.len(),
            scanned,
            elapsed_ms,
            "slow shadowed-key translation"
        );
    }
    tracing::debug!(
        segment = metadata.segment_id,
        shadowed = shadowed.len(),
        scanned,
        ignored = ignored_count,
        early_exit,
        "translated shadowed keys to ordinals"
    );

    Ok(ignored)
}

/// Build predicates for every segment of an sstable, in segment order.
///
/// Runs on the rayon pool when `parallel_segments` is set. Each segment
/// acquires and releases its own ordinals view; the first error wins.
pub fn build_segment_predicates(
    ctx: &QueryContext,
    segments: &[VectorSegment],
) -> Result<Vec<Option<MembershipPredicate<'static>>>> {
    let build = |segment: &VectorSegment| {
        disk_predicate(ctx, segment.metadata(), segment.key_map(), segment.graph())
    };
    if ctx.config().parallel_segments && segments.len() > 1 {
        segments.par_iter().map(build).collect()
    } else {
        segments.iter().map(build).collect()
    }
}
