//! Local clone management for repository resources.
//!
//! Clones land under the storage clones directory, named after the repository
//! plus a short hash of the URL so repositories sharing a name never collide.
//! An existing clone is reused as-is.

use std::path::{Path, PathBuf};
use std::process::Command;

use sha2::{Digest, Sha256};

use crate::error::{Error, Result};

/// Derives the default identifier for a repository from its URL.
///
/// `https://github.com/org/repo.git`, `git@github.com:org/repo.git`, and
/// `https://host/repo/` all reduce to `repo`.
pub fn repo_name_from_url(url: &str) -> String {
    let tail = url
        .trim_end_matches('/')
        .rsplit(['/', ':'])
        .next()
        .unwrap_or(url);
    let name = tail.trim_end_matches(".git");
    if name.is_empty() {
        url.to_string()
    } else {
        name.to_string()
    }
}

/// Directory the clone of `url` lives in under `clones_root`.
pub fn clone_dir(clones_root: &Path, url: &str) -> PathBuf {
    let name = sanitize(&repo_name_from_url(url));
    clones_root.join(format!("{}-{}", name, short_hash(url)))
}

/// Clones `url` (shallow, single branch) into the clones directory, or
/// returns the existing clone unchanged.
pub fn ensure_clone(url: &str, branch: Option<&str>, clones_root: &Path) -> Result<PathBuf> {
    let dest = clone_dir(clones_root, url);
    if dest.join(".git").exists() {
        tracing::debug!(url, dest = %dest.display(), "reusing existing clone");
        return Ok(dest);
    }

    std::fs::create_dir_all(clones_root).map_err(|e| {
        Error::BuildFailure(format!(
            "cannot create clones directory {}: {e}",
            clones_root.display()
        ))
    })?;

    let mut cmd = Command::new("git");
    cmd.args(["clone", "--depth", "1", "--single-branch"]);
    if let Some(branch) = branch {
        cmd.args(["--branch", branch]);
    }
    cmd.arg(url);
    cmd.arg(&dest);

    tracing::info!(url, branch = branch.unwrap_or("<default>"), "cloning repository");
    let output = cmd
        .output()
        .map_err(|e| Error::Unavailable(format!("cannot run git: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(Error::BuildFailure(format!(
            "git clone of {url} failed: {}",
            stderr.trim()
        )));
    }

    Ok(dest)
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' {
                c
            } else {
                '-'
            }
        })
        .collect()
}

fn short_hash(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    format!("{:x}", hasher.finalize())[..12].to_string()
}
