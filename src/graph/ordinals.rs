//! Segment row id -> graph ordinal mapping.
//!
//! A disk-resident graph numbers its nodes with dense ordinals; rows that
//! had no vector at build time have no ordinal. The mapping is persisted
//! next to the graph and memory-mapped on open.
//!
//! ## Binary format
//!
//! ```text
//! Offset  Size  Field
//! 0       4     magic: b"ORDM"
//! 4       2     version: u16 = 1
//! 6       2     reserved: 0x0000
//! 8       4     entry_count: u32
//! 12      4     ordinal_count: u32 (max ordinal + 1, 0 when empty)
//! 16      8*N   entries: (segment_row_id: u32 LE, ordinal: u32 LE),
//!               strictly ascending by segment_row_id
//! ```

use std::fs::File;
use std::io::Write;
use std::path::Path;

use memmap2::Mmap;

use crate::error::{IndexError, Result};

// ── Constants ──────────────────────────────────────────────────────

pub const ORDINAL_MAP_MAGIC: [u8; 4] = *b"ORDM";
pub const ORDINAL_MAP_VERSION: u16 = 1;
pub const ORDINAL_MAP_HEADER_SIZE: usize = 16;
const ENTRY_SIZE: usize = 8;

#[inline]
fn read_u32_at(data: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        data[offset],
        data[offset + 1],
        data[offset + 2],
        data[offset + 3],
    ])
}

// ── Lookup seam ────────────────────────────────────────────────────

/// Scoped row id -> ordinal lookup, held for one translation pass.
///
/// Dropping the view releases whatever the source acquired for it.
pub trait OrdinalsView {
    /// Ordinal for a segment-relative row id, `None` if the row has no vector.
    fn ordinal_for(&self, segment_row_id: u32) -> Result<Option<u32>>;
}

/// Anything that can hand out an [`OrdinalsView`].
pub trait OrdinalSource {
    type View<'a>: OrdinalsView
    where
        Self: 'a;

    /// Acquire a view. Released when the returned value is dropped.
    fn ordinals_view(&self) -> Result<Self::View<'_>>;
}

// ── Writer ─────────────────────────────────────────────────────────

/// Accumulates (row, ordinal) pairs and writes the binary format.
#[derive(Debug, Default)]
pub struct OrdinalMapWriter {
    entries: Vec<(u32, u32)>,
}

impl OrdinalMapWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map `segment_row_id` to `ordinal`. Order of calls does not matter.
    pub fn add(&mut self, segment_row_id: u32, ordinal: u32) {
        self.entries.push((segment_row_id, ordinal));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sort, validate, and write. Fails if a row id was mapped twice.
    pub fn finish<W: Write>(mut self, writer: &mut W) -> Result<()> {
        self.entries.sort_unstable_by_key(|&(row, _)| row);
        if let Some(pair) = self.entries.windows(2).find(|w| w[0].0 == w[1].0) {
            return Err(IndexError::InvalidFormat(format!(
                "row id {} mapped to more than one ordinal",
                pair[0].0
            )));
        }
        let entry_count = u32::try_from(self.entries.len()).map_err(|_| {
            IndexError::InvalidFormat("too many ordinal map entries".into())
        })?;
        let ordinal_count = match self.entries.iter().map(|&(_, ord)| ord).max() {
            Some(max) => max.checked_add(1).ok_or_else(|| {
                IndexError::InvalidFormat("ordinal u32::MAX is reserved".into())
            })?,
            None => 0,
        };

        writer.write_all(&ORDINAL_MAP_MAGIC)?;
        writer.write_all(&ORDINAL_MAP_VERSION.to_le_bytes())?;
        writer.write_all(&[0u8; 2])?; // reserved
        writer.write_all(&entry_count.to_le_bytes())?;
        writer.write_all(&ordinal_count.to_le_bytes())?;
        for (row, ordinal) in &self.entries {
            writer.write_all(&row.to_le_bytes())?;
            writer.write_all(&ordinal.to_le_bytes())?;
        }
        Ok(())
    }

    /// Write straight to a file at `path`.
    pub fn write_file(self, path: &Path) -> Result<()> {
        let mut file = std::io::BufWriter::new(File::create(path)?);
        self.finish(&mut file)?;
        file.flush()?;
        Ok(())
    }
}

// ── Reader ─────────────────────────────────────────────────────────

#[derive(Debug)]
enum Backing {
    Mapped(Mmap),
    Owned(Vec<u8>),
}

impl Backing {
    fn bytes(&self) -> &[u8] {
        match self {
            Backing::Mapped(mmap) => &mmap[..],
            Backing::Owned(bytes) => &bytes[..],
        }
    }
}

/// Immutable row id -> ordinal map (memory-mapped or from bytes).
#[derive(Debug)]
pub struct OrdinalMap {
    data: Backing,
    entry_count: usize,
    ordinal_count: u32,
}

impl OrdinalMap {
    /// Open an ordinal map file (memory-mapped).
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let mmap = unsafe { Mmap::map(&file) }?;
        Self::from_backing(Backing::Mapped(mmap))
    }

    /// Load from an in-memory buffer.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        Self::from_backing(Backing::Owned(bytes))
    }

    fn from_backing(data: Backing) -> Result<Self> {
        let bytes = data.bytes();
        if bytes.len() < ORDINAL_MAP_HEADER_SIZE {
            return Err(IndexError::InvalidFormat(
                "File too small for ordinal map".into(),
            ));
        }
        if bytes[0..4] != ORDINAL_MAP_MAGIC {
            return Err(IndexError::InvalidFormat(format!(
                "Not an ordinal map: expected ORDM, got {:?}",
                &bytes[0..4]
            )));
        }
        let version = u16::from_le_bytes([bytes[4], bytes[5]]);
        if version != ORDINAL_MAP_VERSION {
            return Err(IndexError::InvalidFormat(format!(
                "Unsupported ordinal map version: {}",
                version
            )));
        }
        let entry_count = read_u32_at(bytes, 8) as usize;
        let ordinal_count = read_u32_at(bytes, 12);
        let expected = ORDINAL_MAP_HEADER_SIZE + entry_count * ENTRY_SIZE;
        if bytes.len() != expected {
            return Err(IndexError::InvalidFormat(format!(
                "Ordinal map size mismatch: expected {} bytes, got {}",
                expected,
                bytes.len()
            )));
        }
        let map = Self {
            data,
            entry_count,
            ordinal_count,
        };
        map.validate_entries()?;
        Ok(map)
    }

    /// One pass over the entries: row ids strictly ascending (lookups
    /// binary-search them) and the header's ordinal count equal to
    /// max ordinal + 1.
    fn validate_entries(&self) -> Result<()> {
        let mut previous_row: Option<u32> = None;
        let mut max_ordinal: Option<u32> = None;
        for (index, (row, ordinal)) in self.iter().enumerate() {
            if let Some(prev) = previous_row.filter(|&prev| prev >= row) {
                return Err(IndexError::InvalidFormat(format!(
                    "Ordinal map entry {} out of order: row {} after row {}",
                    index, row, prev
                )));
            }
            previous_row = Some(row);
            max_ordinal = max_ordinal.max(Some(ordinal));
        }

        let expected = match max_ordinal {
            Some(max) => max.checked_add(1).ok_or_else(|| {
                IndexError::InvalidFormat("Ordinal map uses reserved ordinal u32::MAX".into())
            })?,
            None => 0,
        };
        if self.ordinal_count != expected {
            return Err(IndexError::InvalidFormat(format!(
                "Ordinal map header declares {} ordinals, entries need {}",
                self.ordinal_count, expected
            )));
        }
        Ok(())
    }

    /// Number of rows that have an ordinal.
    pub fn len(&self) -> usize {
        self.entry_count
    }

    pub fn is_empty(&self) -> bool {
        self.entry_count == 0
    }

    /// Number of graph nodes (max ordinal + 1).
    pub fn ordinal_count(&self) -> u32 {
        self.ordinal_count
    }

    #[inline]
    fn row_at(&self, index: usize) -> u32 {
        read_u32_at(self.data.bytes(), ORDINAL_MAP_HEADER_SIZE + index * ENTRY_SIZE)
    }

    #[inline]
    fn ordinal_at(&self, index: usize) -> u32 {
        read_u32_at(
            self.data.bytes(),
            ORDINAL_MAP_HEADER_SIZE + index * ENTRY_SIZE + 4,
        )
    }

    /// Ordinal for `segment_row_id`. O(log N) binary search.
    pub fn lookup(&self, segment_row_id: u32) -> Option<u32> {
        let (mut lo, mut hi) = (0usize, self.entry_count);
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            let row = self.row_at(mid);
            if row == segment_row_id {
                return Some(self.ordinal_at(mid));
            }
            if row < segment_row_id {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        None
    }

    /// All (row, ordinal) pairs in row order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        (0..self.entry_count).map(move |i| (self.row_at(i), self.ordinal_at(i)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(pairs: &[(u32, u32)]) -> OrdinalMap {
        let mut writer = OrdinalMapWriter::new();
        for &(row, ord) in pairs {
            writer.add(row, ord);
        }
        let mut buf = Vec::new();
        writer.finish(&mut buf).unwrap();
        OrdinalMap::from_bytes(buf).unwrap()
    }

    #[test]
    fn test_lookup_present_and_absent() {
        let map = build(&[(50, 7), (3, 0), (10, 1)]);
        assert_eq!(map.len(), 3);
        assert_eq!(map.ordinal_count(), 8);
        assert_eq!(map.lookup(50), Some(7));
        assert_eq!(map.lookup(3), Some(0));
        assert_eq!(map.lookup(10), Some(1));
        assert_eq!(map.lookup(4), None);
        assert_eq!(map.lookup(u32::MAX), None);
    }

    #[test]
    fn test_iter_is_row_ordered() {
        let map = build(&[(9, 2), (1, 0), (5, 1)]);
        assert_eq!(map.iter().collect::<Vec<_>>(), vec![(1, 0), (5, 1), (9, 2)]);
    }

    #[test]
    fn test_empty_map() {
        let map = build(&[]);
        assert!(map.is_empty());
        assert_eq!(map.ordinal_count(), 0);
        assert_eq!(map.lookup(0), None);
    }

    #[test]
    fn test_duplicate_row_rejected() {
        let mut writer = OrdinalMapWriter::new();
        writer.add(1, 0);
        writer.add(1, 1);
        let err = writer.finish(&mut Vec::new()).unwrap_err();
        assert!(matches!(err, IndexError::InvalidFormat(_)));
    }

    #[test]
    fn test_bad_magic_rejected() {
        let mut buf = Vec::new();
        OrdinalMapWriter::new().finish(&mut buf).unwrap();
        buf[0] = b'X';
        assert!(OrdinalMap::from_bytes(buf).is_err());
    }

    #[test]
    fn test_truncated_rejected() {
        let mut writer = OrdinalMapWriter::new();
        writer.add(0, 0);
        writer.add(1, 1);
        let mut buf = Vec::new();
        writer.finish(&mut buf).unwrap();
        buf.truncate(buf.len() - 3);
        assert!(OrdinalMap::from_bytes(buf).is_err());
        assert!(OrdinalMap::from_bytes(vec![0u8; 4]).is_err());
    }

    /// Hand-assembled file: header counts followed by raw entries.
    fn raw(ordinal_count: u32, entries: &[(u32, u32)]) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&ORDINAL_MAP_MAGIC);
        buf.extend_from_slice(&ORDINAL_MAP_VERSION.to_le_bytes());
        buf.extend_from_slice(&[0u8; 2]);
        buf.extend_from_slice(&(entries.len() as u32).to_le_bytes());
        buf.extend_from_slice(&ordinal_count.to_le_bytes());
        for (row, ord) in entries {
            buf.extend_from_slice(&row.to_le_bytes());
            buf.extend_from_slice(&ord.to_le_bytes());
        }
        buf
    }

    #[test]
    fn test_raw_layout_matches_writer() {
        let map = OrdinalMap::from_bytes(raw(8, &[(1, 0), (5, 7), (9, 2)])).unwrap();
        assert_eq!(map.lookup(9), Some(2));
        assert_eq!(map.ordinal_count(), 8);
    }

    #[test]
    fn test_unsorted_entries_rejected() {
        let err = OrdinalMap::from_bytes(raw(8, &[(9, 0), (1, 5), (5, 7)])).unwrap_err();
        assert!(matches!(err, IndexError::InvalidFormat(_)));

        let dup = OrdinalMap::from_bytes(raw(2, &[(3, 0), (3, 1)]));
        assert!(dup.is_err());
    }

    #[test]
    fn test_understated_ordinal_count_rejected() {
        let err = OrdinalMap::from_bytes(raw(1, &[(1, 5), (5, 7), (9, 0)])).unwrap_err();
        assert!(matches!(err, IndexError::InvalidFormat(_)));
        assert!(OrdinalMap::from_bytes(raw(20, &[(1, 5)])).is_err());
        assert!(OrdinalMap::from_bytes(raw(3, &[])).is_err());
    }

    #[test]
    fn test_reserved_ordinal_rejected() {
        assert!(OrdinalMap::from_bytes(raw(0, &[(0, u32::MAX)])).is_err());
    }

    #[test]
    fn test_open_rejects_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("seg_2.ordm");
        std::fs::write(&path, raw(1, &[(9, 0), (1, 5), (5, 7)])).unwrap();
        assert!(matches!(
            OrdinalMap::open(&path),
            Err(IndexError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_open_mmap() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("seg_1.ordm");
        let mut writer = OrdinalMapWriter::new();
        writer.add(0, 0);
        writer.add(2, 1);
        writer.write_file(&path).unwrap();

        let map = OrdinalMap::open(&path).unwrap();
        assert_eq!(map.lookup(2), Some(1));
        assert_eq!(map.lookup(1), None);
    }
}
