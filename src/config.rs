//! Search tuning knobs.
//!
//! Persisted as JSON next to the index when an operator overrides the
//! defaults. Missing fields fall back to `Default`.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Tuning for shadow filtering and per-segment ordering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Shadowed keys scanned between cancellation checks (default: 128).
    pub checkpoint_interval: usize,
    /// Build per-segment predicates on the rayon pool (default: true).
    pub parallel_segments: bool,
    /// Translation passes slower than this are logged at warn (default: 50).
    pub slow_translation_ms: u64,
    /// Top-K used when the query sets no limit (default: 10).
    pub default_limit: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            checkpoint_interval: 128,
            parallel_segments: true,
            slow_translation_ms: 50,
            default_limit: 10,
        }
    }
}

impl SearchConfig {
    /// Read config from a JSON file. Returns None if the file doesn't exist.
    pub fn read_from(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&contents)?;
        Ok(Some(config))
    }

    /// Write config to a JSON file.
    pub fn write_to(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}
