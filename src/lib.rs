//! Annex: shadow-aware result filtering for segmented vector indexes.
//!
//! A query resolves row visibility across memtables and sstables before any
//! vector search runs. Keys found dead during that step form the query's
//! [`ShadowSet`]. Each graph then gets a [`MembershipPredicate`] so the
//! traversal never returns a shadowed row, and each segment limits its own
//! results to the top-K in primary-key order ([`SegmentOrdering`]).

pub mod config;
pub mod context;
pub mod error;
pub mod expression;
pub mod graph;
pub mod key;
pub mod membership;
pub mod memtable;
pub mod ordering;
pub mod segment;
pub mod shadow;

pub use config::SearchConfig;
pub use context::{CancelHandle, QueryContext, QueryStats};
pub use error::{IndexError, Result};
pub use expression::{SimilarityFunction, VectorColumn, VectorExpression};
pub use graph::{DiskAnnGraph, OnHeapGraph, OrdinalMap, OrdinalMapWriter, SegmentGraph};
pub use key::PrimaryKey;
pub use membership::{build_predicate, build_segment_predicates, MembershipPredicate};
pub use memtable::MemtableVectorIndex;
pub use ordering::{KeyRangeIterator, ScoredKey, ScoredRowId, SegmentOrdering, TopK};
pub use segment::{PrimaryKeyMap, SegmentMetadata, SortedKeyMap, VectorSegment};
pub use shadow::ShadowSet;
