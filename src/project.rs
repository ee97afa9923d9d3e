//! Editor project bootstrap.
//!
//! Drops an MCP server entry into a project's editor config so the running
//! binary can be launched as a context server. Cursor and VS Code keep that
//! file in different directories, so callers pick profiles by name.

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

const SERVER_NAME: &str = "quarry";

/// Writes MCP client configuration for each requested profile.
///
/// Returns the paths written. Existing files are left alone unless `force`
/// is set; an unknown profile fails the whole call before anything is
/// written.
pub fn initialize_project(
    project_root: &Path,
    profiles: &[String],
    force: bool,
) -> Result<Vec<PathBuf>> {
    if !project_root.is_dir() {
        return Err(Error::InvalidInput(format!(
            "project root {} does not exist",
            project_root.display()
        )));
    }
    if profiles.is_empty() {
        return Err(Error::InvalidInput(
            "at least one profile is required ('cursor' or 'vscode')".to_string(),
        ));
    }

    let mut targets = Vec::with_capacity(profiles.len());
    for profile in profiles {
        let dir = match profile.as_str() {
            "cursor" => ".cursor",
            "vscode" => ".vscode",
            other => {
                return Err(Error::InvalidInput(format!(
                    "unknown profile '{other}' (expected 'cursor' or 'vscode')"
                )))
            }
        };
        targets.push(project_root.join(dir).join("mcp.json"));
    }

    for target in &targets {
        if target.exists() && !force {
            return Err(Error::Conflict(format!(
                "{} already exists (pass force to overwrite)",
                target.display()
            )));
        }
    }

    let body = serde_json::to_string_pretty(&client_config())
        .map_err(|e| Error::Unavailable(format!("cannot serialize client config: {e}")))?;
    for target in &targets {
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                Error::Unavailable(format!("cannot create {}: {e}", parent.display()))
            })?;
        }
        std::fs::write(target, &body)
            .map_err(|e| Error::Unavailable(format!("cannot write {}: {e}", target.display())))?;
        tracing::info!(path = %target.display(), "wrote MCP client config");
    }
    Ok(targets)
}

fn client_config() -> serde_json::Value {
    let command = std::env::current_exe()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|_| "qry".to_string());
    serde_json::json!({
        "mcpServers": {
            SERVER_NAME: {
                "command": command,
                "args": ["serve"],
                "env": {}
            }
        }
    })
}
