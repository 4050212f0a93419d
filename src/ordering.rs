//! Per-segment top-K ordering.
//!
//! Ordering happens in two steps:
//!
//! 1. Limit a single segment's results to its best `limit` keys, then put
//!    them back in primary-key order so they merge with the rest of the
//!    key-ordered query pipeline.
//! 2. Merge the key-ordered streams of every segment and memtable, rank by
//!    score, and apply the final limit.
//!
//! This module handles step 1. Step 2 belongs to the query's post-processor.

use std::collections::HashSet;

use crate::context::QueryContext;
use crate::error::Result;
use crate::expression::VectorExpression;
use crate::key::PrimaryKey;
use crate::memtable::MemtableVectorIndex;
use crate::segment::VectorSegment;

// ── Candidates and results ─────────────────────────────────────────

/// One traversal result.
///
/// `row_id` is the component's native row identifier: the whole-table row
/// id for sstable segments, the graph ordinal for memtable indexes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredRowId {
    pub row_id: u64,
    pub score: f32,
}

impl ScoredRowId {
    pub fn new(row_id: u64, score: f32) -> Self {
        Self { row_id, score }
    }
}

/// A surviving result, resolved to its primary key.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredKey {
    pub key: PrimaryKey,
    pub score: f32,
}

/// Ascending primary-key stream of one component's top-K results.
#[derive(Debug, Clone, Default)]
pub struct KeyRangeIterator {
    items: Vec<ScoredKey>,
    pos: usize,
}

impl KeyRangeIterator {
    /// Wrap results already sorted by key.
    pub fn new(items: Vec<ScoredKey>) -> Self {
        debug_assert!(items.windows(2).all(|w| w[0].key < w[1].key));
        Self { items, pos: 0 }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Smallest key in the range (not affected by iteration).
    pub fn min_key(&self) -> Option<&PrimaryKey> {
        self.items.first().map(|s| &s.key)
    }

    /// Largest key in the range (not affected by iteration).
    pub fn max_key(&self) -> Option<&PrimaryKey> {
        self.items.last().map(|s| &s.key)
    }

    pub fn peek(&self) -> Option<&ScoredKey> {
        self.items.get(self.pos)
    }

    /// Advance to the first result with key >= `key` and return it.
    pub fn skip_to(&mut self, key: &PrimaryKey) -> Option<&ScoredKey> {
        let remaining = &self.items[self.pos..];
        self.pos += remaining.partition_point(|s| s.key < *key);
        self.peek()
    }
}

impl Iterator for KeyRangeIterator {
    type Item = ScoredKey;

    fn next(&mut self) -> Option<ScoredKey> {
        let item = self.items.get(self.pos).copied();
        if item.is_some() {
            self.pos += 1;
        }
        item
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.items.len() - self.pos;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for KeyRangeIterator {}

/// Outcome of asking a component for its top-K.
#[derive(Debug)]
pub enum TopK {
    /// Key-ordered, limited results.
    Ordered(KeyRangeIterator),
    /// The component cannot order by this expression; the caller must fall
    /// back to plain filtering for it.
    NotApplicable,
}

impl TopK {
    pub fn is_applicable(&self) -> bool {
        matches!(self, TopK::Ordered(_))
    }
}

// ── Ordering contract ──────────────────────────────────────────────

/// Step 1 of vector ordering for one index component.
pub trait SegmentOrdering {
    /// Reorder, limit, and put back into key order the candidates of one
    /// segment or memtable.
    ///
    /// Components without vector ordering keep this default.
    fn limit_to_top_k(
        &self,
        _ctx: &QueryContext,
        _candidates: &mut dyn Iterator<Item = ScoredRowId>,
        _exp: &VectorExpression,
    ) -> Result<TopK> {
        Ok(TopK::NotApplicable)
    }
}

/// Rank by score (best first, ties by key), keep the best score per key,
/// cut to the query limit, and restore key order. NaN scores are unrankable
/// and dropped.
fn rank_and_restore(ctx: &QueryContext, mut scored: Vec<ScoredKey>) -> KeyRangeIterator {
    let before = scored.len();
    scored.retain(|s| !s.score.is_nan());
    if scored.len() < before {
        tracing::debug!(dropped = before - scored.len(), "dropped NaN-scored candidates");
    }
    ctx.add_candidates_ranked(scored.len() as u64);
    scored.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.key.cmp(&b.key)));
    let mut seen = HashSet::with_capacity(scored.len());
    scored.retain(|s| seen.insert(s.key));
    scored.truncate(ctx.limit());
    scored.sort_by_key(|s| s.key);
    KeyRangeIterator::new(scored)
}

impl SegmentOrdering for VectorSegment {
    fn limit_to_top_k(
        &self,
        ctx: &QueryContext,
        candidates: &mut dyn Iterator<Item = ScoredRowId>,
        exp: &VectorExpression,
    ) -> Result<TopK> {
        if !self.column().supports(exp)? {
            return Ok(TopK::NotApplicable);
        }

        let meta = self.metadata();
        let interval = ctx.config().checkpoint_interval.max(1);
        let mut scored = Vec::new();
        let mut out_of_segment = 0usize;
        let mut shadowed = 0usize;

        for (i, candidate) in candidates.enumerate() {
            if i % interval == 0 {
                ctx.checkpoint()?;
            }
            if candidate.row_id < meta.row_id_offset || candidate.row_id > meta.max_row_id() {
                out_of_segment += 1;
                continue;
            }
            let Some(key) = self.key_map().key_for(candidate.row_id)? else {
                continue;
            };
            if ctx.contains_shadowed(&key) {
                shadowed += 1;
                continue;
            }
            scored.push(ScoredKey {
                key,
                score: candidate.score,
            });
        }

        tracing::trace!(
            segment = meta.segment_id,
            kept = scored.len(),
            shadowed,
            out_of_segment,
            "segment candidates filtered"
        );
        Ok(TopK::Ordered(rank_and_restore(ctx, scored)))
    }
}

impl SegmentOrdering for MemtableVectorIndex {
    fn limit_to_top_k(
        &self,
        ctx: &QueryContext,
        candidates: &mut dyn Iterator<Item = ScoredRowId>,
        exp: &VectorExpression,
    ) -> Result<TopK> {
        if !self.column().supports(exp)? {
            return Ok(TopK::NotApplicable);
        }

        let interval = ctx.config().checkpoint_interval.max(1);
        let mut scored = Vec::new();
        for (i, candidate) in candidates.enumerate() {
            if i % interval == 0 {
                ctx.checkpoint()?;
            }
            let Ok(ordinal) = u32::try_from(candidate.row_id) else {
                continue;
            };
            let Some(keys) = self.graph().keys_for(ordinal) else {
                continue;
            };
            scored.extend(
                keys.iter()
                    .filter(|k| !ctx.contains_shadowed(k))
                    .map(|&key| ScoredKey {
                        key,
                        score: candidate.score,
                    }),
            );
        }

        tracing::trace!(
            column = self.column().name.as_str(),
            kept = scored.len(),
            "memtable candidates filtered"
        );
        Ok(TopK::Ordered(rank_and_restore(ctx, scored)))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::error::IndexError;
    use crate::expression::{SimilarityFunction, VectorColumn};
    use crate::graph::{DiskAnnGraph, OrdinalMap, OrdinalMapWriter};
    use crate::segment::{PrimaryKeyMap, SegmentMetadata, SortedKeyMap};

    fn key(token: u128) -> PrimaryKey {
        PrimaryKey::new(token, 0)
    }

    fn column() -> VectorColumn {
        VectorColumn::new("embedding", SimilarityFunction::Cosine, 2)
    }

    fn exp() -> VectorExpression {
        VectorExpression::new("embedding", SimilarityFunction::Cosine, vec![1.0, 0.0])
    }

    /// Sstable of keys 0..20 (row id == token); segment covers rows 5..=14.
    fn segment() -> VectorSegment {
        let key_map: Arc<dyn PrimaryKeyMap> =
            Arc::new(SortedKeyMap::from_keys((0..20).map(key)));
        let mut writer = OrdinalMapWriter::new();
        for row in 0..10 {
            writer.add(row, row);
        }
        let mut buf = Vec::new();
        writer.finish(&mut buf).unwrap();
        VectorSegment::new(
            column(),
            SegmentMetadata::new(3, key(5), key(14), 5, 9).unwrap(),
            DiskAnnGraph::new(OrdinalMap::from_bytes(buf).unwrap()),
            key_map,
        )
        .unwrap()
    }

    fn ordered(top: TopK) -> Vec<(u128, f32)> {
        match top {
            TopK::Ordered(iter) => iter.map(|s| (s.key.token, s.score)).collect(),
            TopK::NotApplicable => panic!("expected ordered results"),
        }
    }

    // ── KeyRangeIterator ───────────────────────────────────────────

    #[test]
    fn test_key_range_iterator_bounds_and_skip() {
        let items = [1, 4, 9, 12]
            .iter()
            .map(|t| ScoredKey { key: key(*t), score: 0.0 })
            .collect();
        let mut iter = KeyRangeIterator::new(items);
        assert_eq!(iter.min_key(), Some(&key(1)));
        assert_eq!(iter.max_key(), Some(&key(12)));
        assert_eq!(iter.len(), 4);

        assert_eq!(iter.skip_to(&key(5)).map(|s| s.key), Some(key(9)));
        assert_eq!(iter.len(), 2);
        assert_eq!(iter.skip_to(&key(9)).map(|s| s.key), Some(key(9)));
        assert_eq!(iter.next().map(|s| s.key), Some(key(9)));
        assert!(iter.skip_to(&key(100)).is_none());
        assert_eq!(iter.next(), None);
        // bounds are fixed
        assert_eq!(iter.min_key(), Some(&key(1)));
    }

    #[test]
    fn test_empty_iterator() {
        let mut iter = KeyRangeIterator::empty();
        assert!(iter.min_key().is_none());
        assert!(iter.peek().is_none());
        assert_eq!(iter.next(), None);
    }

    // ── Capability ─────────────────────────────────────────────────

    struct PlainSegment;

    impl SegmentOrdering for PlainSegment {}

    #[test]
    fn test_default_is_not_applicable() {
        let ctx = QueryContext::default();
        let mut candidates = vec![ScoredRowId::new(1, 0.5)].into_iter();
        let top = PlainSegment
            .limit_to_top_k(&ctx, &mut candidates, &exp())
            .unwrap();
        assert!(!top.is_applicable());
    }

    #[test]
    fn test_other_column_not_applicable() {
        let ctx = QueryContext::default();
        let exp = VectorExpression::new("title", SimilarityFunction::Cosine, vec![1.0, 0.0]);
        let top = segment()
            .limit_to_top_k(&ctx, &mut std::iter::empty(), &exp)
            .unwrap();
        assert!(matches!(top, TopK::NotApplicable));
    }

    #[test]
    fn test_dimension_mismatch_is_error() {
        let ctx = QueryContext::default();
        let exp = VectorExpression::new("embedding", SimilarityFunction::Cosine, vec![1.0]);
        let err = segment()
            .limit_to_top_k(&ctx, &mut std::iter::empty(), &exp)
            .unwrap_err();
        assert!(matches!(err, IndexError::DimensionMismatch { .. }));
    }

    // ── Sstable segments ───────────────────────────────────────────

    #[test]
    fn test_segment_limits_then_restores_key_order() {
        let ctx = QueryContext::default().with_limit(3);
        let mut candidates = vec![
            ScoredRowId::new(12, 0.9),
            ScoredRowId::new(6, 0.8),
            ScoredRowId::new(9, 0.1),
            ScoredRowId::new(7, 0.95),
            ScoredRowId::new(10, 0.5),
        ]
        .into_iter();
        let top = segment().limit_to_top_k(&ctx, &mut candidates, &exp()).unwrap();
        assert_eq!(ordered(top), vec![(6, 0.8), (7, 0.95), (12, 0.9)]);
        assert_eq!(ctx.stats().candidates_ranked, 5);
    }

    #[test]
    fn test_segment_drops_shadowed_and_out_of_span() {
        let mut ctx = QueryContext::default().with_limit(10);
        ctx.record_shadowed(key(7));
        let mut candidates = vec![
            ScoredRowId::new(7, 0.99),
            ScoredRowId::new(2, 0.98),  // before span
            ScoredRowId::new(15, 0.97), // after span
            ScoredRowId::new(8, 0.5),
        ]
        .into_iter();
        let top = segment().limit_to_top_k(&ctx, &mut candidates, &exp()).unwrap();
        assert_eq!(ordered(top), vec![(8, 0.5)]);
    }

    #[test]
    fn test_segment_duplicate_rows_keep_best_score() {
        let ctx = QueryContext::default();
        let mut candidates = vec![ScoredRowId::new(8, 0.2), ScoredRowId::new(8, 0.7)].into_iter();
        let top = segment().limit_to_top_k(&ctx, &mut candidates, &exp()).unwrap();
        assert_eq!(ordered(top), vec![(8, 0.7)]);
    }

    #[test]
    fn test_segment_score_ties_break_by_key() {
        let ctx = QueryContext::default().with_limit(2);
        let mut candidates = vec![
            ScoredRowId::new(11, 0.5),
            ScoredRowId::new(9, 0.5),
            ScoredRowId::new(10, 0.5),
        ]
        .into_iter();
        let top = segment().limit_to_top_k(&ctx, &mut candidates, &exp()).unwrap();
        assert_eq!(ordered(top), vec![(9, 0.5), (10, 0.5)]);
    }

    #[test]
    fn test_nan_scores_never_take_a_slot() {
        let ctx = QueryContext::default().with_limit(1);
        let mut candidates = vec![
            ScoredRowId::new(8, 0.9),
            ScoredRowId::new(6, f32::NAN),
            ScoredRowId::new(10, 0.5),
        ]
        .into_iter();
        let top = segment().limit_to_top_k(&ctx, &mut candidates, &exp()).unwrap();
        assert_eq!(ordered(top), vec![(8, 0.9)]);
        assert_eq!(ctx.stats().candidates_ranked, 2);

        let ctx = QueryContext::default();
        let mut only_nan = vec![ScoredRowId::new(8, f32::NAN)].into_iter();
        let top = segment().limit_to_top_k(&ctx, &mut only_nan, &exp()).unwrap();
        assert!(ordered(top).is_empty());
    }

    #[test]
    fn test_zero_limit_is_empty_not_error() {
        let ctx = QueryContext::default().with_limit(0);
        let mut candidates = vec![ScoredRowId::new(8, 0.2)].into_iter();
        let top = segment().limit_to_top_k(&ctx, &mut candidates, &exp()).unwrap();
        assert!(ordered(top).is_empty());
    }

    #[test]
    fn test_cancelled_query_aborts_ordering() {
        let ctx = QueryContext::default();
        ctx.cancel_handle().cancel();
        let mut candidates = vec![ScoredRowId::new(8, 0.2)].into_iter();
        let err = segment()
            .limit_to_top_k(&ctx, &mut candidates, &exp())
            .unwrap_err();
        assert!(matches!(err, IndexError::Cancelled));
    }

    // ── Memtable ───────────────────────────────────────────────────

    #[test]
    fn test_memtable_expands_shared_ordinals() {
        let mut index = MemtableVectorIndex::new(column());
        let shared = index.add(key(3), &[0.5, 0.5]).unwrap();
        index.add(key(1), &[0.5, 0.5]).unwrap();
        let single = index.add(key(2), &[0.1, 0.9]).unwrap();

        let mut ctx = QueryContext::default().with_limit(10);
        ctx.record_shadowed(key(3));
        let mut candidates = vec![
            ScoredRowId::new(shared as u64, 0.9),
            ScoredRowId::new(single as u64, 0.4),
            ScoredRowId::new(99, 1.0), // not a node
        ]
        .into_iter();
        let top = index.limit_to_top_k(&ctx, &mut candidates, &exp()).unwrap();
        assert_eq!(ordered(top), vec![(1, 0.9), (2, 0.4)]);
    }

    #[test]
    fn test_memtable_limit() {
        let mut index = MemtableVectorIndex::new(column());
        for t in 0..5u128 {
            index.add(key(t), &[t as f32, 0.0]).unwrap();
        }
        let ctx = QueryContext::default().with_limit(2);
        let mut candidates = (0..5u64).map(|o| ScoredRowId::new(o, o as f32)).into_iter();
        let top = index.limit_to_top_k(&ctx, &mut candidates, &exp()).unwrap();
        assert_eq!(ordered(top), vec![(3, 3.0), (4, 4.0)]);
    }
}
