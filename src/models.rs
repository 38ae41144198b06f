//! Core data models for the YouTube URL merge.
//!
//! This module contains the in-memory table, the column roles of both
//! datasets, match-key type aliases and the run statistics.

use anyhow::{bail, Result};
use rustc_hash::FxHashMap;
use serde::Serialize;

// ============================================================================
// Column Names
// ============================================================================

/// Value column copied from source to target.
pub const URL_COLUMN: &str = "youtube_url";

/// Names of the three join-key columns in one dataset.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KeyColumns {
    pub year: &'static str,
    pub country: &'static str,
    pub artist: &'static str,
}

/// Source dataset: `performer` is the artist, `to_country_id` the country.
pub const SOURCE_COLUMNS: KeyColumns = KeyColumns {
    year: "year",
    country: "to_country_id",
    artist: "performer",
};

pub const TARGET_COLUMNS: KeyColumns = KeyColumns {
    year: "year",
    country: "country",
    artist: "artist",
};

// ============================================================================
// Type Aliases
// ============================================================================

/// (year, country_norm, artist_norm)
pub type SpecificKey = (i64, String, String);

/// (year, country_norm)
pub type GeneralKey = (i64, String);

/// Artist-level lookup; first source occurrence wins on duplicate keys.
pub type SpecificMap = FxHashMap<SpecificKey, String>;

/// Country-level lookup holding only keys carried by exactly one source row.
pub type GeneralMap = FxHashMap<GeneralKey, String>;

// ============================================================================
// Table
// ============================================================================

/// Row-oriented table of text cells. `None` is a null cell.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
}

impl Table {
    pub fn new(headers: Vec<String>) -> Self {
        Self {
            headers,
            rows: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position of the first header named `name`.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Like `column_index`, but a missing column is an error naming `dataset`.
    pub fn require_column(&self, name: &str, dataset: &str) -> Result<usize> {
        match self.column_index(name) {
            Some(idx) => Ok(idx),
            None => bail!(
                "{} dataset is missing required column '{}' (found: {})",
                dataset,
                name,
                self.headers.join(", ")
            ),
        }
    }

    /// Appends a column with a null cell in every row, returning its index.
    pub fn add_column(&mut self, name: &str) -> usize {
        self.headers.push(name.to_string());
        for row in &mut self.rows {
            row.push(None);
        }
        self.headers.len() - 1
    }

    /// Raw cell value; `None` only for a null cell. Whitespace is kept, key
    /// normalization decides what blank text means.
    pub fn value(&self, row: usize, col: usize) -> Option<&str> {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .and_then(|cell| cell.as_deref())
    }

    pub fn set(&mut self, row: usize, col: usize, value: String) {
        self.rows[row][col] = Some(value);
    }

    /// Number of rows with a non-null value in `col`.
    pub fn count_non_null(&self, col: usize) -> usize {
        (0..self.rows.len())
            .filter(|&i| self.value(i, col).is_some())
            .count()
    }
}

// ============================================================================
// Match Keys
// ============================================================================

/// Normalized join-key fields of one row. Never written back to a table.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RowKeys {
    pub year: Option<i64>,
    pub country: Option<String>,
    pub artist: Option<String>,
}

impl RowKeys {
    /// Full key, or `None` if any component is null.
    pub fn specific(&self) -> Option<SpecificKey> {
        match (self.year, &self.country, &self.artist) {
            (Some(year), Some(country), Some(artist)) => {
                Some((year, country.clone(), artist.clone()))
            }
            _ => None,
        }
    }

    /// Year/country key, or `None` if either component is null.
    pub fn general(&self) -> Option<GeneralKey> {
        match (self.year, &self.country) {
            (Some(year), Some(country)) => Some((year, country.clone())),
            _ => None,
        }
    }
}

// ============================================================================
// Statistics
// ============================================================================

/// Counters for one merge run. Observability only; not used for decisions.
#[derive(Default, Debug, Clone, Serialize)]
pub struct MergeStats {
    pub source_rows: usize,
    pub target_rows: usize,
    pub created_url_column: bool,

    // Lookup structures
    pub specific_map_entries: usize,
    pub general_map_entries: usize,
    pub ambiguous_general_keys: usize,

    // Fill passes (prefilled = target rows that already had a URL)
    pub prefilled_rows: usize,
    pub pass1_matches: usize,
    pub pass2_matches: usize,

    // Final totals
    pub rows_with_url: usize,

    // Timing
    pub elapsed_seconds: f64,
}

impl MergeStats {
    /// Rows filled by either pass
    pub fn total_matches(&self) -> usize {
        self.pass1_matches + self.pass2_matches
    }

    /// Share of target rows carrying a URL after the merge, as a percentage
    pub fn coverage(&self) -> f64 {
        if self.target_rows == 0 {
            0.0
        } else {
            100.0 * self.rows_with_url as f64 / self.target_rows as f64
        }
    }

    /// Log stats to stderr in JSON format
    pub fn log_phase(&self, phase: &str) {
        if let Ok(json) = serde_json::to_string_pretty(self) {
            eprintln!("[STATS:{}]\n{}", phase, json);
        }
    }
}
