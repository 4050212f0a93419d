//! Per-query execution state.
//!
//! `QueryContext` owns the query's [`ShadowSet`]. Shadow discovery needs
//! `&mut QueryContext`; predicate construction and ordering take
//! `&QueryContext`, so discovery is finished before any segment reads the
//! set, and segments can then be processed concurrently.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::SearchConfig;
use crate::error::{IndexError, Result};
use crate::key::PrimaryKey;
use crate::shadow::ShadowSet;

/// Handle that aborts a running query from another thread.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Counters collected while a query runs. Lock-free.
#[derive(Debug, Default)]
struct QueryCounters {
    shadowed_keys_scanned: AtomicU64,
    ordinals_ignored: AtomicU64,
    segments_filtered: AtomicU64,
    candidates_ranked: AtomicU64,
}

/// Point-in-time copy of the query counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QueryStats {
    /// Shadowed keys visited by disk translation passes.
    pub shadowed_keys_scanned: u64,
    /// Ordinals excluded across all negative-list predicates.
    pub ordinals_ignored: u64,
    /// Segments that ended up with a predicate.
    pub segments_filtered: u64,
    /// Candidates that survived filtering and were ranked.
    pub candidates_ranked: u64,
}

/// State of one query execution.
#[derive(Debug)]
pub struct QueryContext {
    shadowed: ShadowSet,
    limit: usize,
    config: SearchConfig,
    cancel: CancelHandle,
    started: Instant,
    timeout: Option<Duration>,
    counters: QueryCounters,
}

impl QueryContext {
    pub fn new(config: SearchConfig) -> Self {
        Self {
            shadowed: ShadowSet::new(),
            limit: config.default_limit,
            config,
            cancel: CancelHandle::default(),
            started: Instant::now(),
            timeout: None,
            counters: QueryCounters::default(),
        }
    }

    /// Override the query's top-K.
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Abort the query once `timeout` has elapsed since creation.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Handle for cancelling this query from elsewhere.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    // ── Shadowed keys ───────────────────────────────────────────────

    /// Record a key found dead during visibility resolution.
    pub fn record_shadowed(&mut self, key: PrimaryKey) {
        self.shadowed.record(key);
    }

    pub fn contains_shadowed(&self, key: &PrimaryKey) -> bool {
        self.shadowed.contains(key)
    }

    pub fn shadowed(&self) -> &ShadowSet {
        &self.shadowed
    }

    // ── Abort ───────────────────────────────────────────────────────

    /// Fail if the query was cancelled or ran past its deadline.
    pub fn checkpoint(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(IndexError::Cancelled);
        }
        if let Some(timeout) = self.timeout {
            let elapsed = self.started.elapsed();
            if elapsed > timeout {
                return Err(IndexError::DeadlineExceeded {
                    elapsed_ms: elapsed.as_millis() as u64,
                });
            }
        }
        Ok(())
    }

    // ── Counters ────────────────────────────────────────────────────

    pub(crate) fn add_keys_scanned(&self, n: u64) {
        self.counters
            .shadowed_keys_scanned
            .fetch_add(n, Ordering::Relaxed);
    }

    pub(crate) fn add_segment_filtered(&self, ignored_ordinals: u64) {
        self.counters.segments_filtered.fetch_add(1, Ordering::Relaxed);
        self.counters
            .ordinals_ignored
            .fetch_add(ignored_ordinals, Ordering::Relaxed);
    }

    pub(crate) fn add_candidates_ranked(&self, n: u64) {
        self.counters.candidates_ranked.fetch_add(n, Ordering::Relaxed);
    }

    pub fn stats(&self) -> QueryStats {
        QueryStats {
            shadowed_keys_scanned: self.counters.shadowed_keys_scanned.load(Ordering::Relaxed),
            ordinals_ignored: self.counters.ordinals_ignored.load(Ordering::Relaxed),
            segments_filtered: self.counters.segments_filtered.load(Ordering::Relaxed),
            candidates_ranked: self.counters.candidates_ranked.load(Ordering::Relaxed),
        }
    }
}

impl Default for QueryContext {
    fn default() -> Self {
        Self::new(SearchConfig::default())
    }
}
