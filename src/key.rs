//! Primary keys: the universal coordinate for shadowing decisions.
//!
//! A key orders first by partition token, then by clustering position.
//! Row ids inside an sstable are assigned in this order, which is what
//! lets the disk-resident translation pass stop early.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Logical row identifier (partition token + clustering position).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PrimaryKey {
    /// Partition token. Derived from raw partition-key bytes by [`token_for`].
    pub token: u128,
    /// Position of the row inside its partition.
    pub clustering: u64,
}

impl PrimaryKey {
    pub fn new(token: u128, clustering: u64) -> Self {
        Self { token, clustering }
    }

    /// Build a key from raw partition-key bytes.
    pub fn from_partition(partition_key: &[u8], clustering: u64) -> Self {
        Self::new(token_for(partition_key), clustering)
    }

    /// True if `min <= self <= max` (both bounds inclusive).
    #[inline]
    pub fn within(&self, min: &PrimaryKey, max: &PrimaryKey) -> bool {
        self >= min && self <= max
    }
}

impl fmt::Display for PrimaryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:032x}:{}", self.token, self.clustering)
    }
}

/// Deterministic partition token: first 16 bytes of the BLAKE3 hash.
pub fn token_for(partition_key: &[u8]) -> u128 {
    let hash = blake3::hash(partition_key);
    let mut token = [0u8; 16];
    token.copy_from_slice(&hash.as_bytes()[0..16]);
    u128::from_le_bytes(token)
}
