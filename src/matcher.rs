//! Two-pass URL matcher.
//!
//! Pass 1 looks target rows up by (year, country, artist). Pass 2 falls back
//! to (year, country) for rows still empty, but only for keys carried by
//! exactly one source row. A cell that already holds a URL is never touched.

use anyhow::Result;
use rustc_hash::{FxHashMap, FxHashSet};
use std::hash::Hash;

use crate::models::{
    GeneralKey, GeneralMap, MergeStats, RowKeys, SpecificMap, Table, SOURCE_COLUMNS,
    TARGET_COLUMNS, URL_COLUMN,
};
use crate::normalize::compute_row_keys;

/// Enriched target plus the counters gathered while producing it.
#[derive(Debug)]
pub struct MergeOutput {
    pub table: Table,
    pub stats: MergeStats,
}

/// Artist-level map from source rows with a full key and a URL.
/// Duplicate keys keep the first row in source order.
pub fn build_specific_map(source: &Table, keys: &[RowKeys], url_idx: usize) -> SpecificMap {
    let mut map = SpecificMap::default();
    for (row, row_keys) in keys.iter().enumerate() {
        let (Some(key), Some(url)) = (row_keys.specific(), source.value(row, url_idx)) else {
            continue;
        };
        map.entry(key).or_insert_with(|| url.to_string());
    }
    map
}

/// (year, country) pairs shared by two or more source rows.
/// Every row counts, whether or not it has a URL.
pub fn find_ambiguous_keys(keys: &[RowKeys]) -> FxHashSet<GeneralKey> {
    let mut counts: FxHashMap<GeneralKey, usize> = FxHashMap::default();
    for key in keys.iter().filter_map(RowKeys::general) {
        *counts.entry(key).or_default() += 1;
    }
    counts
        .into_iter()
        .filter(|&(_, n)| n > 1)
        .map(|(key, _)| key)
        .collect()
}

/// Country-level map from URL-bearing source rows whose general key is not
/// ambiguous.
pub fn build_general_map(
    source: &Table,
    keys: &[RowKeys],
    url_idx: usize,
    ambiguous: &FxHashSet<GeneralKey>,
) -> GeneralMap {
    let mut map = GeneralMap::default();
    for (row, row_keys) in keys.iter().enumerate() {
        let (Some(key), Some(url)) = (row_keys.general(), source.value(row, url_idx)) else {
            continue;
        };
        if !ambiguous.contains(&key) {
            map.insert(key, url.to_string());
        }
    }
    map
}

/// Fill empty URL cells from `map`. Returns how many cells were filled.
fn fill_pass<K: Eq + Hash>(
    target: &mut Table,
    url_idx: usize,
    keys: &[Option<K>],
    map: &FxHashMap<K, String>,
) -> usize {
    let mut filled = 0;
    for (row, key) in keys.iter().enumerate() {
        if target.value(row, url_idx).is_some() {
            continue;
        }
        if let Some(url) = key.as_ref().and_then(|k| map.get(k)) {
            target.set(row, url_idx, url.clone());
            filled += 1;
        }
    }
    filled
}

/// Copy URLs from `source` into `target`.
///
/// Fails before touching the target if either dataset lacks a required
/// column. Row order, row count and every non-URL cell are preserved; the
/// URL column is appended when the target does not have one.
pub fn merge(source: &Table, mut target: Table) -> Result<MergeOutput> {
    let source_url_idx = source.require_column(URL_COLUMN, "Source")?;
    let source_keys = compute_row_keys(source, SOURCE_COLUMNS, "Source")?;
    let target_keys = compute_row_keys(&target, TARGET_COLUMNS, "Target")?;

    let mut stats = MergeStats {
        source_rows: source.len(),
        target_rows: target.len(),
        ..Default::default()
    };

    let target_url_idx = match target.column_index(URL_COLUMN) {
        Some(idx) => idx,
        None => {
            stats.created_url_column = true;
            target.add_column(URL_COLUMN)
        }
    };
    stats.prefilled_rows = target.count_non_null(target_url_idx);

    let specific_map = build_specific_map(source, &source_keys, source_url_idx);
    let ambiguous = find_ambiguous_keys(&source_keys);
    let general_map = build_general_map(source, &source_keys, source_url_idx, &ambiguous);
    stats.specific_map_entries = specific_map.len();
    stats.general_map_entries = general_map.len();
    stats.ambiguous_general_keys = ambiguous.len();

    let specific_keys: Vec<_> = target_keys.iter().map(RowKeys::specific).collect();
    let general_keys: Vec<_> = target_keys.iter().map(RowKeys::general).collect();

    stats.pass1_matches = fill_pass(&mut target, target_url_idx, &specific_keys, &specific_map);
    stats.pass2_matches = fill_pass(&mut target, target_url_idx, &general_keys, &general_map);
    stats.rows_with_url = target.count_non_null(target_url_idx);

    Ok(MergeOutput {
        table: target,
        stats,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(headers: &[&str], rows: &[&[&str]]) -> Table {
        let mut t = Table::new(headers.iter().map(|h| h.to_string()).collect());
        for row in rows {
            t.rows.push(
                row.iter()
                    .map(|c| if c.is_empty() { None } else { Some(c.to_string()) })
                    .collect(),
            );
        }
        t
    }

    fn source(rows: &[&[&str]]) -> Table {
        table(&["year", "performer", "to_country_id", "youtube_url"], rows)
    }

    fn target(rows: &[&[&str]]) -> Table {
        table(&["year", "artist", "country"], rows)
    }

    fn urls(t: &Table) -> Vec<Option<&str>> {
        let idx = t.column_index(URL_COLUMN).unwrap();
        (0..t.len()).map(|row| t.value(row, idx)).collect()
    }

    #[test]
    fn test_specific_match() {
        let src = source(&[&["2019", "ABC", "se", "u1"]]);
        let tgt = target(&[&["2019", "abc", "SE"]]);

        let out = merge(&src, tgt).unwrap();
        assert_eq!(urls(&out.table), vec![Some("u1")]);
        assert_eq!(out.stats.pass1_matches, 1);
        assert_eq!(out.stats.pass2_matches, 0);
        assert!(out.stats.created_url_column);
    }

    #[test]
    fn test_ambiguous_country_does_not_fall_back() {
        let src = source(&[
            &["2019", "ABC", "se", "u1"],
            &["2019", "XYZ", "se", "u2"],
        ]);
        let tgt = target(&[&["2019", "other", "se"]]);

        let out = merge(&src, tgt).unwrap();
        assert_eq!(urls(&out.table), vec![None]);
        assert_eq!(out.stats.general_map_entries, 0);
        assert_eq!(out.stats.ambiguous_general_keys, 1);
    }

    #[test]
    fn test_general_fallback_for_unambiguous_country() {
        let src = source(&[&["2020", "anyone", "fr", "u3"]]);
        let tgt = target(&[&["2020", "someone else", "fr"]]);

        let out = merge(&src, tgt).unwrap();
        assert_eq!(urls(&out.table), vec![Some("u3")]);
        assert_eq!(out.stats.pass1_matches, 0);
        assert_eq!(out.stats.pass2_matches, 1);
    }

    #[test]
    fn test_ambiguity_counts_rows_without_url() {
        // Only one row has a URL, but the (year, country) pair is still shared.
        let src = source(&[&["2021", "A", "it", "u1"], &["2021", "B", "it", ""]]);
        let tgt = target(&[&["2021", "C", "it"]]);

        let out = merge(&src, tgt).unwrap();
        assert_eq!(urls(&out.table), vec![None]);
    }

    #[test]
    fn test_specific_pass_runs_first() {
        let src = source(&[
            &["2018", "Solo", "pt", "u-specific"],
            &["2017", "Other", "pt", "u-general"],
        ]);
        let tgt = target(&[&["2018", "solo", "pt"], &["2017", "solo", "pt"]]);

        let out = merge(&src, tgt).unwrap();
        assert_eq!(urls(&out.table), vec![Some("u-specific"), Some("u-general")]);
        // Row 0 is matchable by both keys; pass 1 claims it.
        assert_eq!(out.stats.pass1_matches, 1);
        assert_eq!(out.stats.pass2_matches, 1);
    }

    #[test]
    fn test_duplicate_specific_key_keeps_first() {
        let src = source(&[
            &["2019", "ABC", "se", "first"],
            &["2019", " abc", "SE", "second"],
        ]);
        let keys = compute_row_keys(&src, SOURCE_COLUMNS, "Source").unwrap();
        let map = build_specific_map(&src, &keys, 3);

        assert_eq!(map.len(), 1);
        assert_eq!(
            map.get(&(2019, "se".to_string(), "abc".to_string())).map(String::as_str),
            Some("first")
        );
    }

    #[test]
    fn test_specific_map_skips_rows_without_url() {
        let src = source(&[&["2019", "ABC", "se", ""], &["2019", "ABC", "se", "later"]]);
        let keys = compute_row_keys(&src, SOURCE_COLUMNS, "Source").unwrap();
        let map = build_specific_map(&src, &keys, 3);

        assert_eq!(
            map.get(&(2019, "se".to_string(), "abc".to_string())).map(String::as_str),
            Some("later")
        );
    }

    #[test]
    fn test_case_and_whitespace_insensitive_artist() {
        let src = source(&[&["2000", "Céline Dion ", "ca", "u-celine"], &["2000", "x", "ca", "u-x"]]);
        let tgt = target(&[&["2000", "céline dion", "CA"]]);

        let out = merge(&src, tgt).unwrap();
        assert_eq!(urls(&out.table), vec![Some("u-celine")]);
    }

    #[test]
    fn test_different_year_never_matches() {
        let src = source(&[&["1999", "ABC", "se", "u1"]]);
        let tgt = target(&[&["2000", "ABC", "se"], &["not a year", "ABC", "se"]]);

        let out = merge(&src, tgt).unwrap();
        assert_eq!(urls(&out.table), vec![None, None]);
    }

    #[test]
    fn test_existing_url_is_kept() {
        let src = source(&[&["2019", "ABC", "se", "new"]]);
        let tgt = table(
            &["year", "artist", "youtube_url", "country"],
            &[&["2019", "ABC", "old", "se"], &["2019", "ABC", "", "se"]],
        );

        let out = merge(&src, tgt).unwrap();
        assert!(!out.stats.created_url_column);
        assert_eq!(out.stats.prefilled_rows, 1);
        assert_eq!(urls(&out.table), vec![Some("old"), Some("new")]);
        // Existing column position is unchanged.
        assert_eq!(out.table.headers, vec!["year", "artist", "youtube_url", "country"]);
    }

    #[test]
    fn test_whitespace_url_cell_is_kept() {
        let src = source(&[&["2019", "ABC", "se", "u1"]]);
        let tgt = table(
            &["year", "artist", "country", "youtube_url"],
            &[&["2019", "abc", "se", "   "], &["2019", "abc", "se", ""]],
        );

        let out = merge(&src, tgt).unwrap();
        assert_eq!(urls(&out.table), vec![Some("   "), Some("u1")]);
        assert_eq!(out.stats.prefilled_rows, 1);
        assert_eq!(out.stats.pass1_matches, 1);
    }

    #[test]
    fn test_whitespace_key_cells_do_not_match() {
        let src = source(&[&["2019", "  ", "se", "u1"]]);
        let tgt = target(&[&["2019", " ", "se"], &["2019", "abc", "   "]]);

        let out = merge(&src, tgt).unwrap();
        assert_eq!(out.stats.specific_map_entries, 0);
        // Row 0 still falls back on (2019, se); row 1 has no country.
        assert_eq!(urls(&out.table), vec![Some("u1"), None]);
    }

    #[test]
    fn test_other_columns_untouched() {
        let src = source(&[&["2019", "ABC", "se", "u1"]]);
        let tgt = table(
            &["year", "artist", "country", "song", "points"],
            &[&["2019", " ABC ", "SE", "Song A", "12"], &["2020", "B", "no", "", "0"]],
        );
        let before = tgt.clone();

        let out = merge(&src, tgt).unwrap();
        assert_eq!(out.table.len(), before.len());
        assert_eq!(&out.table.headers[..5], &before.headers[..]);
        assert_eq!(out.table.headers.len(), 6);
        for (after, original) in out.table.rows.iter().zip(&before.rows) {
            assert_eq!(&after[..5], &original[..]);
        }
    }

    #[test]
    fn test_merge_is_idempotent() {
        let src = source(&[
            &["2019", "ABC", "se", "u1"],
            &["2020", "anyone", "fr", "u3"],
        ]);
        let tgt = target(&[&["2019", "abc", "se"], &["2020", "x", "fr"], &["2021", "y", "de"]]);

        let first = merge(&src, tgt).unwrap();
        let second = merge(&src, first.table.clone()).unwrap();

        assert_eq!(second.table, first.table);
        assert_eq!(second.stats.total_matches(), 0);
        assert_eq!(second.stats.prefilled_rows, 2);
        assert!(!second.stats.created_url_column);
    }

    #[test]
    fn test_missing_source_column_is_fatal() {
        let src = table(&["year", "performer", "youtube_url"], &[&["2019", "ABC", "u1"]]);
        let tgt = target(&[&["2019", "abc", "se"]]);

        let err = merge(&src, tgt).unwrap_err().to_string();
        assert!(err.contains("Source"));
        assert!(err.contains("'to_country_id'"));
    }

    #[test]
    fn test_missing_source_url_column_is_fatal() {
        let src = table(&["year", "performer", "to_country_id"], &[]);
        let err = merge(&src, target(&[])).unwrap_err().to_string();
        assert!(err.contains("'youtube_url'"));
    }

    #[test]
    fn test_missing_target_column_is_fatal() {
        let src = source(&[]);
        let tgt = table(&["year", "country"], &[&["2019", "se"]]);

        let err = merge(&src, tgt).unwrap_err().to_string();
        assert!(err.contains("Target"));
        assert!(err.contains("'artist'"));
    }

    #[test]
    fn test_empty_target() {
        let src = source(&[&["2019", "ABC", "se", "u1"]]);
        let out = merge(&src, target(&[])).unwrap();
        assert!(out.table.is_empty());
        assert_eq!(out.table.headers.last().map(String::as_str), Some(URL_COLUMN));
        assert_eq!(out.stats.rows_with_url, 0);
    }
}
