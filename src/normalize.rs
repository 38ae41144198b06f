//! Join-key normalization shared by both datasets.
//!
//! The same rules must run on source and target, otherwise keys that should
//! match will not.

use anyhow::Result;
use rayon::prelude::*;

use crate::models::{KeyColumns, RowKeys, Table};

/// Parse a year cell. Integral decimals ("2019.0") are accepted; anything
/// non-numeric or fractional is a null year.
pub fn normalize_year(raw: &str) -> Option<i64> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(year) = s.parse::<i64>() {
        return Some(year);
    }
    let f = s.parse::<f64>().ok()?;
    if f.is_finite() && f.fract() == 0.0 && f.abs() <= i64::MAX as f64 {
        Some(f as i64)
    } else {
        None
    }
}

/// Trim and lowercase a country or artist cell. Blank text is null.
pub fn normalize_text(raw: &str) -> Option<String> {
    let s = raw.trim();
    if s.is_empty() {
        None
    } else {
        Some(s.to_lowercase())
    }
}

/// Normalized keys for every row of `table`, in row order.
///
/// Fails if any of the key columns is missing.
pub fn compute_row_keys(
    table: &Table,
    columns: KeyColumns,
    dataset: &str,
) -> Result<Vec<RowKeys>> {
    let year_idx = table.require_column(columns.year, dataset)?;
    let country_idx = table.require_column(columns.country, dataset)?;
    let artist_idx = table.require_column(columns.artist, dataset)?;

    Ok((0..table.len())
        .into_par_iter()
        .map(|row| RowKeys {
            year: table.value(row, year_idx).and_then(normalize_year),
            country: table.value(row, country_idx).and_then(normalize_text),
            artist: table.value(row, artist_idx).and_then(normalize_text),
        })
        .collect())
}
