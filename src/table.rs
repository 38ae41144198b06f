//! CSV loading and atomic write-back.

use anyhow::{bail, Context, Result};
use std::fs;
use std::path::Path;
use tempfile::NamedTempFile;

use crate::models::Table;

/// Load a comma-separated file with a header row. Every cell is kept as text;
/// empty cells become null.
pub fn read_csv(path: &Path) -> Result<Table> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;

    let headers: Vec<String> = rdr
        .headers()
        .with_context(|| format!("Failed to read header row of {}", path.display()))?
        .iter()
        .map(str::to_string)
        .collect();
    if headers.is_empty() {
        bail!("{} has no header row", path.display());
    }

    let mut table = Table::new(headers);
    for result in rdr.records() {
        let record = result.with_context(|| format!("Failed to parse {}", path.display()))?;
        table.rows.push(
            record
                .iter()
                .map(|field| {
                    if field.is_empty() {
                        None
                    } else {
                        Some(field.to_string())
                    }
                })
                .collect(),
        );
    }

    Ok(table)
}

/// Write `table` to `path`, replacing it only once the full output is on disk.
///
/// Output goes to a temp file in the same directory, which is then renamed
/// over `path`. On any error the existing file is left as it was.
pub fn write_csv_atomic(table: &Table, path: &Path) -> Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    let tmp = NamedTempFile::new_in(dir)
        .with_context(|| format!("Failed to create temp file in {}", dir.display()))?;

    // Keep the mode of the file being replaced
    if let Ok(meta) = fs::metadata(path) {
        tmp.as_file()
            .set_permissions(meta.permissions())
            .with_context(|| format!("Failed to copy permissions of {}", path.display()))?;
    }

    let mut wtr = csv::Writer::from_writer(tmp);
    wtr.write_record(&table.headers)
        .context("Failed to write header row")?;
    for row in &table.rows {
        wtr.write_record(row.iter().map(|cell| cell.as_deref().unwrap_or("")))
            .context("Failed to write row")?;
    }

    let tmp = wtr
        .into_inner()
        .map_err(|e| e.into_error())
        .context("Failed to flush output")?;
    tmp.as_file()
        .sync_all()
        .context("Failed to sync output")?;
    tmp.persist(path)
        .with_context(|| format!("Failed to replace {}", path.display()))?;

    Ok(())
}
