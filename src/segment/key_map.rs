//! Row id <-> primary key translation for one sstable.
//!
//! Rows in an sstable are stored in primary-key order, so whole-table row
//! ids ascend with the key. `SortedKeyMap` is the in-memory form of that
//! mapping; readers backed by on-disk sstable indexes implement
//! [`PrimaryKeyMap`] directly.

use crate::error::{IndexError, Result};
use crate::key::PrimaryKey;

/// Translator between primary keys and whole-table row ids.
///
/// Both lookups may touch segment files, so both return `Result`.
/// "Not found" is `Ok(None)`, never an error.
pub trait PrimaryKeyMap: Send + Sync {
    /// Whole-table row id of `key`, or `None` if the sstable has no such row.
    fn row_id_for(&self, key: &PrimaryKey) -> Result<Option<u64>>;

    /// Key stored at `row_id`, or `None` past the end of the sstable.
    fn key_for(&self, row_id: u64) -> Result<Option<PrimaryKey>>;
}

/// Sorted, unique keys; the row id of a key is its position.
#[derive(Debug, Clone, Default)]
pub struct SortedKeyMap {
    keys: Vec<PrimaryKey>,
}

impl SortedKeyMap {
    /// Build from keys already in strictly ascending order.
    pub fn from_sorted(keys: Vec<PrimaryKey>) -> Result<Self> {
        if let Some(pos) = keys.windows(2).position(|w| w[0] >= w[1]) {
            return Err(IndexError::InvalidFormat(format!(
                "keys not strictly ascending at row {}",
                pos + 1
            )));
        }
        Ok(Self { keys })
    }

    /// Build from arbitrary keys (sorted and deduplicated here).
    pub fn from_keys(keys: impl IntoIterator<Item = PrimaryKey>) -> Self {
        let mut keys: Vec<PrimaryKey> = keys.into_iter().collect();
        keys.sort_unstable();
        keys.dedup();
        Self { keys }
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// All keys in row-id order.
    pub fn keys(&self) -> &[PrimaryKey] {
        &self.keys
    }
}

impl PrimaryKeyMap for SortedKeyMap {
    fn row_id_for(&self, key: &PrimaryKey) -> Result<Option<u64>> {
        Ok(self.keys.binary_search(key).ok().map(|pos| pos as u64))
    }

    fn key_for(&self, row_id: u64) -> Result<Option<PrimaryKey>> {
        Ok(usize::try_from(row_id)
            .ok()
            .and_then(|idx| self.keys.get(idx))
            .copied())
    }
}
