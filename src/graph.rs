//! Import-graph extraction for indexed repositories.
//!
//! Walks a repository tree, pulls module references out of each recognized
//! source file with a per-language line scan, and renders a deterministic
//! `file -> imports` adjacency listing. This is a dependency sketch, not a
//! resolver: names are reported as written, without resolving them to files.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use walkdir::WalkDir;

use crate::error::{Error, Result};
use crate::syntax::{language_for_path, Language};

const SKIP_DIRS: &[&str] = &[".git", "node_modules", "target", "__pycache__"];

/// Builds the import adjacency text for the tree rooted at `root`.
///
/// Every file with a recognized language appears in the output, imports or
/// not. Files and imports are sorted, so the output is stable across runs.
pub fn import_graph(root: &Path, name: &str) -> Result<String> {
    if !root.exists() {
        return Err(Error::Unavailable(format!(
            "repository location {} does not exist",
            root.display()
        )));
    }

    let mut adjacency: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    let walker = WalkDir::new(root).sort_by_file_name().into_iter();
    for entry in walker.filter_entry(|e| {
        e.file_name()
            .to_str()
            .map_or(true, |n| !SKIP_DIRS.contains(&n))
    }) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(_) => continue,
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let lang = match language_for_path(entry.path()) {
            Some(lang) => lang,
            None => continue,
        };
        let rel = entry
            .path()
            .strip_prefix(root)
            .unwrap_or(entry.path())
            .to_string_lossy()
            .into_owned();
        let text = match std::fs::read_to_string(entry.path()) {
            Ok(text) => text,
            Err(_) => continue,
        };
        adjacency.insert(rel, imports_for(&text, lang));
    }

    tracing::debug!(name, files = adjacency.len(), "import graph built");
    Ok(render(name, &adjacency))
}

fn render(name: &str, adjacency: &BTreeMap<String, BTreeSet<String>>) -> String {
    let mut out = format!("Import graph for {name}: {} files\n", adjacency.len());
    for (file, imports) in adjacency {
        out.push('\n');
        out.push_str(file);
        out.push_str(":\n");
        for import in imports {
            out.push_str("  ");
            out.push_str(import);
            out.push('\n');
        }
    }
    out
}

fn imports_for(text: &str, lang: Language) -> BTreeSet<String> {
    match lang {
        Language::Rust => rust_imports(text),
        Language::Python => python_imports(text),
        Language::JavaScript | Language::TypeScript => js_imports(text),
        Language::Go => go_imports(text),
    }
}

fn rust_imports(text: &str) -> BTreeSet<String> {
    let mut out = BTreeSet::new();
    for line in text.lines() {
        let line = line.trim();
        let rest = match line.strip_prefix("pub use ").or_else(|| line.strip_prefix("use ")) {
            Some(rest) => rest,
            None => continue,
        };
        let mut path = rest.trim_end_matches(';').trim();
        // `use a::b::{c, d}` contributes the group prefix, `use a as b` the
        // original path.
        if let Some(idx) = path.find("::{") {
            path = &path[..idx];
        }
        if let Some(idx) = path.find(" as ") {
            path = &path[..idx];
        }
        let path = path.trim();
        if !path.is_empty() && path != "{" {
            out.insert(path.to_string());
        }
    }
    out
}

fn python_imports(text: &str) -> BTreeSet<String> {
    let mut out = BTreeSet::new();
    for line in text.lines() {
        let line = line.trim();
        if let Some(rest) = line.strip_prefix("import ") {
            for part in rest.split(',') {
                let name = part.trim().split(" as ").next().unwrap_or("").trim();
                if !name.is_empty() {
                    out.insert(name.to_string());
                }
            }
        } else if let Some(rest) = line.strip_prefix("from ") {
            if let Some(module) = rest.split(" import").next() {
                // Relative imports keep their dotted module but drop the
                // bare-dot form, which names no module at all.
                let module = module.trim();
                if !module.is_empty() && module.trim_start_matches('.') != "" {
                    out.insert(module.to_string());
                }
            }
        }
    }
    out
}

fn js_imports(text: &str) -> BTreeSet<String> {
    let mut out = BTreeSet::new();
    for line in text.lines() {
        let line = line.trim();
        if line.starts_with("import ") || line.starts_with("export ") {
            if let Some(idx) = line.find(" from ") {
                if let Some(name) = quoted(&line[idx + " from ".len()..]) {
                    out.insert(name);
                }
                continue;
            }
            // Side-effect import: `import "./polyfill"`.
            if let Some(rest) = line.strip_prefix("import ") {
                if let Some(name) = quoted(rest) {
                    out.insert(name);
                }
            }
        }
        if let Some(idx) = line.find("require(") {
            if let Some(name) = quoted(&line[idx + "require(".len()..]) {
                out.insert(name);
            }
        }
    }
    out
}

fn go_imports(text: &str) -> BTreeSet<String> {
    let mut out = BTreeSet::new();
    let mut in_block = false;
    for line in text.lines() {
        let line = line.trim();
        if in_block {
            if line.starts_with(')') {
                in_block = false;
            } else if let Some(name) = quoted(line) {
                out.insert(name);
            }
            continue;
        }
        if line == "import (" {
            in_block = true;
        } else if let Some(rest) = line.strip_prefix("import ") {
            if let Some(name) = quoted(rest) {
                out.insert(name);
            }
        }
    }
    out
}

/// First single- or double-quoted literal in `s`, if any.
fn quoted(s: &str) -> Option<String> {
    let open = s.find(['"', '\''])?;
    let quote = s.as_bytes()[open] as char;
    let rest = &s[open + 1..];
    let close = rest.find(quote)?;
    Some(rest[..close].to_string())
}
