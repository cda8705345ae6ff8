//! Path helpers shared by the ifile pipeline and the backup driver.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Strips a leading drive-letter prefix (`C:`) from a path string.
///
/// The prefix is removed only when the second character is `:`; everything
/// after it is preserved verbatim, including whether the next character is a
/// separator. Paths without a drive letter are returned unchanged.
#[must_use]
pub fn strip_drive_letter(path: &str) -> &str {
    if path.as_bytes().get(1) == Some(&b':') {
        &path[2..]
    } else {
        path
    }
}

/// Converts a path string to forward-slash form for ifile serialisation.
///
/// On Unix this is the identity; on Windows backslash separators are
/// rewritten to `/`.
#[must_use]
pub fn to_slash(path: String) -> String {
    if cfg!(windows) {
        path.replace('\\', "/")
    } else {
        path
    }
}

/// Expands a leading `~` to the user's home directory.
///
/// # Errors
///
/// Returns an error if the path starts with `~` but the home directory
/// cannot be determined.
pub fn expand_tilde(path: &Path) -> Result<PathBuf> {
    if let Some(path_str) = path.to_str() {
        if path_str == "~" || path_str.starts_with("~/") {
            let home = dirs::home_dir().context("Could not find home directory")?;
            if path_str == "~" {
                return Ok(home);
            }
            return Ok(home.join(&path_str[2..]));
        }
    }
    Ok(path.to_path_buf())
}

/// Makes a path absolute, resolving relative paths from the current directory.
///
/// # Errors
///
/// Returns an error if the current directory cannot be determined.
pub fn make_absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        let current_dir = std::env::current_dir()?;
        Ok(current_dir.join(path))
    }
}
