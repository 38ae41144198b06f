//! Input checks run before anything is read or written.
//!
//! The target file is overwritten in place, so both paths are validated up
//! front and a failure here aborts the run with the target untouched.

use anyhow::{bail, Result};
use std::path::Path;

/// Validates that an input path names an existing regular file.
///
/// # Arguments
/// * `path` - The file to check
/// * `role` - Human-readable name used in the error (e.g., "Source")
///
/// # Returns
/// * `Ok(())` if the path is an existing file
/// * `Err` with a descriptive message otherwise
pub fn ensure_input_exists(path: &Path, role: &str) -> Result<()> {
    if !path.exists() {
        bail!("{} file not found at '{}'", role, path.display());
    }
    if !path.is_file() {
        bail!("{} path '{}' is not a regular file", role, path.display());
    }
    Ok(())
}
