//! Immutable per-segment bounds.
//!
//! A segment covers an inclusive primary-key range and a contiguous run of
//! whole-table row ids starting at `row_id_offset`. Segment-relative row ids
//! run from 0 to `max_segment_row_id` inclusive and share the graph's
//! 32-bit ordinal space.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{IndexError, Result};
use crate::key::PrimaryKey;

/// Where a whole-table row id lands relative to a segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowPosition {
    /// Precedes the segment's first row.
    Before,
    /// Inside the segment, as a segment-relative row id.
    Within(u32),
    /// Past the segment's last row.
    After,
}

/// Bounds of one immutable segment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentMetadata {
    /// Identifier used in logs.
    pub segment_id: u64,
    /// Smallest primary key in the segment (inclusive).
    pub min_key: PrimaryKey,
    /// Largest primary key in the segment (inclusive).
    pub max_key: PrimaryKey,
    /// First whole-table row id mapped into this segment.
    pub row_id_offset: u64,
    /// Largest segment-relative row id.
    pub max_segment_row_id: u32,
}

impl SegmentMetadata {
    /// Create validated metadata.
    pub fn new(
        segment_id: u64,
        min_key: PrimaryKey,
        max_key: PrimaryKey,
        row_id_offset: u64,
        max_segment_row_id: u32,
    ) -> Result<Self> {
        let meta = Self {
            segment_id,
            min_key,
            max_key,
            row_id_offset,
            max_segment_row_id,
        };
        meta.validate()?;
        Ok(meta)
    }

    /// Check key bounds are ordered and the row-id span fits in u64.
    pub fn validate(&self) -> Result<()> {
        if self.min_key > self.max_key {
            return Err(IndexError::InvalidSegment(format!(
                "segment {}: min key {} > max key {}",
                self.segment_id, self.min_key, self.max_key
            )));
        }
        if self
            .row_id_offset
            .checked_add(self.max_segment_row_id as u64)
            .is_none()
        {
            return Err(IndexError::InvalidSegment(format!(
                "segment {}: row-id span overflows (offset {})",
                self.segment_id, self.row_id_offset
            )));
        }
        Ok(())
    }

    /// True if `key` lies inside the segment's key range (bounds inclusive).
    #[inline]
    pub fn covers_key(&self, key: &PrimaryKey) -> bool {
        key.within(&self.min_key, &self.max_key)
    }

    /// Last whole-table row id in the segment.
    pub fn max_row_id(&self) -> u64 {
        self.row_id_offset + self.max_segment_row_id as u64
    }

    /// Size of the segment's ordinal domain: `1 + max_segment_row_id`.
    pub fn domain_size(&self) -> usize {
        self.max_segment_row_id as usize + 1
    }

    /// Locate a whole-table row id relative to this segment.
    ///
    /// A difference that does not fit the 32-bit segment row-id space is an
    /// inconsistent segment and fails with `RowIdOverflow`.
    pub fn position_of(&self, row_id: u64) -> Result<RowPosition> {
        if row_id < self.row_id_offset {
            return Ok(RowPosition::Before);
        }
        let relative = u32::try_from(row_id - self.row_id_offset).map_err(|_| {
            IndexError::RowIdOverflow {
                row_id,
                offset: self.row_id_offset,
            }
        })?;
        if relative > self.max_segment_row_id {
            Ok(RowPosition::After)
        } else {
            Ok(RowPosition::Within(relative))
        }
    }

    /// Read metadata from a JSON file.
    pub fn read_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let meta: Self = serde_json::from_str(&contents)?;
        meta.validate()?;
        Ok(meta)
    }

    /// Write metadata to a JSON file.
    pub fn write_to(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}
