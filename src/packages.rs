//! Installed-package lookup and direct inspection.
//!
//! Packages are found by scanning the configured package roots in order. The
//! grep path shells out to `rg`; a missing binary is reported as unavailable
//! rather than a failed search.

use std::path::PathBuf;
use std::process::Command;

use crate::config::PackagesConfig;
use crate::error::{Error, Result};

/// Locates `name` under the configured package roots.
///
/// The first root containing a directory with the package's name wins. A
/// `-`/`_` normalized match also counts, so `typing-extensions` finds a
/// `typing_extensions` directory.
pub fn locate_package(config: &PackagesConfig, name: &str) -> Result<PathBuf> {
    if name.trim().is_empty() {
        return Err(Error::InvalidInput("package name must not be empty".to_string()));
    }

    let wanted = normalize(name);
    for root in &config.roots {
        let direct = root.join(name);
        if direct.is_dir() {
            return Ok(direct);
        }
        if let Ok(entries) = std::fs::read_dir(root) {
            for entry in entries.flatten() {
                if !entry.path().is_dir() {
                    continue;
                }
                if let Some(dir_name) = entry.file_name().to_str() {
                    if normalize(dir_name) == wanted {
                        return Ok(entry.path());
                    }
                }
            }
        }
    }
    Err(Error::NotFound(format!(
        "package '{name}' in configured package roots"
    )))
}

fn normalize(name: &str) -> String {
    name.to_ascii_lowercase().replace('-', "_")
}

/// Regex search over a package's installed tree via the `rg` subprocess.
///
/// Returns rg's matching lines (`--line-number`, at most `max_results` per
/// file). No matches is an empty string, not an error.
pub fn grep_package(
    config: &PackagesConfig,
    package: &str,
    pattern: &str,
    max_results: usize,
) -> Result<String> {
    if pattern.is_empty() {
        return Err(Error::InvalidInput("pattern must not be empty".to_string()));
    }
    let dir = locate_package(config, package)?;

    let output = Command::new("rg")
        .arg("--line-number")
        .arg("--max-count")
        .arg(max_results.max(1).to_string())
        .arg("--")
        .arg(pattern)
        .arg(&dir)
        .output()
        .map_err(|e| Error::Unavailable(format!("cannot run rg: {e}")))?;

    // rg exits 1 for "no matches"; only exit 2 carries a real error.
    if !output.status.success() && output.status.code() != Some(1) {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(Error::InvalidInput(format!(
            "rg failed: {}",
            stderr.trim()
        )));
    }

    tracing::debug!(package, pattern, matched = !output.stdout.is_empty(), "package grep");
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Combines optional start/end line arguments into the range shape
/// [`read_package_file`] takes. An open end reads to EOF; an open start
/// reads from the top.
pub fn line_range(start: Option<usize>, end: Option<usize>) -> Option<(usize, usize)> {
    match (start, end) {
        (None, None) => None,
        (Some(start), Some(end)) => Some((start, end)),
        (Some(start), None) => Some((start, usize::MAX)),
        (None, Some(end)) => Some((1, end)),
    }
}

/// Reads a file inside a package, optionally restricted to a 1-based
/// inclusive line range. An end past EOF is clamped; a start below 1, past
/// EOF, or above the end is an invalid range.
pub fn read_package_file(
    config: &PackagesConfig,
    package: &str,
    file: &str,
    range: Option<(usize, usize)>,
) -> Result<String> {
    let dir = locate_package(config, package)?;
    let path = dir.join(file);

    let canonical = path
        .canonicalize()
        .map_err(|_| Error::NotFound(format!("file '{file}' in package '{package}'")))?;
    let dir_canonical = dir
        .canonicalize()
        .map_err(|e| Error::Unavailable(format!("cannot resolve package directory: {e}")))?;
    if !canonical.starts_with(&dir_canonical) {
        return Err(Error::InvalidInput(
            "file path escapes the package directory".to_string(),
        ));
    }

    let text = std::fs::read_to_string(&canonical)
        .map_err(|e| Error::Unavailable(format!("cannot read {}: {e}", canonical.display())))?;

    match range {
        None => Ok(text),
        Some((start, end)) => {
            let lines: Vec<&str> = text.lines().collect();
            if start < 1 || end < start || start > lines.len() {
                return Err(Error::InvalidInput("invalid line range".to_string()));
            }
            let end = end.min(lines.len());
            Ok(lines[start - 1..end].join("\n"))
        }
    }
}
