//! Per-query record of shadowed primary keys.
//!
//! A key is shadowed when its row is overwritten or deleted at query time
//! but still present in an immutable graph snapshot. The set only grows
//! during a query and stays `Empty` (no allocation) until the first key is
//! recorded.

use std::collections::BTreeSet;

use crate::error::Result;
use crate::key::PrimaryKey;
use crate::segment::key_map::PrimaryKeyMap;

/// Ordered, append-only set of shadowed keys.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ShadowSet {
    /// Nothing recorded yet. Behaves as the empty set.
    #[default]
    Empty,
    /// At least one key recorded.
    Populated(BTreeSet<PrimaryKey>),
}

impl ShadowSet {
    pub fn new() -> Self {
        Self::Empty
    }

    /// Record a shadowed key. Returns `true` if it was not already present.
    pub fn record(&mut self, key: PrimaryKey) -> bool {
        match self {
            ShadowSet::Empty => {
                *self = ShadowSet::Populated(BTreeSet::from([key]));
                true
            }
            ShadowSet::Populated(keys) => keys.insert(key),
        }
    }

    #[inline]
    pub fn contains(&self, key: &PrimaryKey) -> bool {
        match self {
            ShadowSet::Empty => false,
            ShadowSet::Populated(keys) => keys.contains(key),
        }
    }

    /// Recorded keys in ascending order. Each call starts a fresh pass.
    pub fn ascending(&self) -> impl DoubleEndedIterator<Item = &PrimaryKey> + '_ {
        self.keys().into_iter().flat_map(|keys| keys.iter())
    }

    /// Number of distinct shadowed keys.
    pub fn len(&self) -> usize {
        self.keys().map_or(0, BTreeSet::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Backing set, `None` while nothing has been recorded.
    pub fn keys(&self) -> Option<&BTreeSet<PrimaryKey>> {
        match self {
            ShadowSet::Empty => None,
            ShadowSet::Populated(keys) => Some(keys),
        }
    }

    /// Returns true if the row at `row_id` should be kept, false if its key
    /// is shadowed. Rows the map cannot resolve are kept.
    pub fn should_include(&self, row_id: u64, key_map: &dyn PrimaryKeyMap) -> Result<bool> {
        if self.is_empty() {
            return Ok(true);
        }
        Ok(match key_map.key_for(row_id)? {
            Some(key) => !self.contains(&key),
            None => true,
        })
    }
}

impl Extend<PrimaryKey> for ShadowSet {
    fn extend<I: IntoIterator<Item = PrimaryKey>>(&mut self, iter: I) {
        for key in iter {
            self.record(key);
        }
    }
}

impl FromIterator<PrimaryKey> for ShadowSet {
    fn from_iter<I: IntoIterator<Item = PrimaryKey>>(iter: I) -> Self {
        let mut set = ShadowSet::new();
        set.extend(iter);
        set
    }
}
