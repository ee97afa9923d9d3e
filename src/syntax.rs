//! Structural scanner for source code.
//!
//! Produces function and class/type definition spans for code-mode chunking
//! without a full grammar: brace depth tracking for brace-delimited languages
//! and indentation tracking for Python. Spans are line-aligned byte offsets
//! into the original source.
//!
//! This is deliberately not a parser. String and char literals and `//`
//! comments are skipped when counting braces, but pathological code can still
//! defeat the scan; [`parse`] returns `None` in that case and the chunker
//! falls back to generic chunking. That fallback is part of the contract, not
//! an error.

use std::path::Path;

/// Languages the scanner understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Language {
    Rust,
    Python,
    JavaScript,
    TypeScript,
    Go,
}

/// Map a file extension to a scannable language.
pub fn language_for_path(path: &Path) -> Option<Language> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("rs") => Some(Language::Rust),
        Some("py") => Some(Language::Python),
        Some("js") | Some("jsx") | Some("mjs") => Some(Language::JavaScript),
        Some("ts") | Some("tsx") => Some(Language::TypeScript),
        Some("go") => Some(Language::Go),
        _ => None,
    }
}

/// Kind of definition a node represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Function,
    Class,
}

impl NodeKind {
    pub fn label(&self) -> &'static str {
        match self {
            NodeKind::Function => "function",
            NodeKind::Class => "class",
        }
    }
}

/// One definition span. `start`/`end` are byte offsets, both on line
/// boundaries (`end` exclusive). Children are definitions nested inside.
#[derive(Debug, Clone)]
pub struct Node {
    pub kind: NodeKind,
    pub name: String,
    pub start: usize,
    pub end: usize,
    pub children: Vec<Node>,
}

/// Scan `source` for definitions.
///
/// Returns `None` when the structure cannot be followed (unbalanced braces);
/// `Some(vec![])` when the scan succeeded but found nothing.
pub fn parse(source: &str, lang: Language) -> Option<Vec<Node>> {
    match lang {
        Language::Python => Some(scan_indented(source)),
        _ => scan_braced(source, lang),
    }
}

/// The identifier following `kw` in `line`, if any.
fn ident_after(line: &str, kw: &str) -> Option<String> {
    let rest = line.split(kw).nth(1)?;
    let name = leading_ident(rest.trim_start());
    if name.is_empty() {
        None
    } else {
        Some(name)
    }
}

fn leading_ident(s: &str) -> String {
    s.chars()
        .take_while(|c| c.is_alphanumeric() || *c == '_')
        .collect()
}

/// Classify a line as a definition opener for `lang`.
fn match_opener(line: &str, lang: Language) -> Option<(NodeKind, String)> {
    let t = line.trim_start();
    match lang {
        Language::Rust => {
            // `fn` possibly behind pub/async/unsafe/const/extern qualifiers.
            if let Some(pos) = t.find("fn ") {
                let prefix = &t[..pos];
                let qualifiers_only = prefix.split_whitespace().all(|w| {
                    matches!(w, "pub" | "async" | "unsafe" | "const" | "extern")
                        || w.starts_with("pub(")
                        || w.starts_with('"')
                });
                if qualifiers_only && !prefix.contains('"') {
                    return ident_after(t, "fn ").map(|n| (NodeKind::Function, n));
                }
            }
            for kw in ["struct ", "enum ", "trait ", "impl "] {
                if t.starts_with(kw) || t.starts_with(&format!("pub {}", kw)) {
                    let name = ident_after(t, kw).unwrap_or_else(|| kw.trim().to_string());
                    return Some((NodeKind::Class, name));
                }
            }
            None
        }
        Language::JavaScript | Language::TypeScript => {
            if t.starts_with("function ")
                || t.starts_with("async function ")
                || t.starts_with("export function ")
                || t.starts_with("export async function ")
                || t.starts_with("export default function ")
            {
                let name =
                    ident_after(t, "function ").unwrap_or_else(|| "anonymous".to_string());
                return Some((NodeKind::Function, name));
            }
            for kw in ["class ", "interface "] {
                if t.starts_with(kw)
                    || t.starts_with(&format!("export {}", kw))
                    || t.starts_with(&format!("export default {}", kw))
                {
                    return ident_after(t, kw).map(|n| (NodeKind::Class, n));
                }
            }
            // Arrow function bound to a const/let binding.
            if (t.starts_with("const ")
                || t.starts_with("let ")
                || t.starts_with("export const ")
                || t.starts_with("export let "))
                && t.contains("=>")
            {
                let rest = t
                    .trim_start_matches("export ")
                    .trim_start_matches("const ")
                    .trim_start_matches("let ");
                let name = leading_ident(rest);
                if !name.is_empty() {
                    return Some((NodeKind::Function, name));
                }
            }
            None
        }
        Language::Go => {
            if t.starts_with("func ") {
                // Method receivers look like `func (s *Server) Name(`.
                let after = t.trim_start_matches("func ").trim_start();
                let name = if after.starts_with('(') {
                    after
                        .split(')')
                        .nth(1)
                        .map(|rest| leading_ident(rest.trim_start()))
                        .filter(|n| !n.is_empty())
                } else {
                    ident_after(t, "func ")
                };
                return name.map(|n| (NodeKind::Function, n));
            }
            if t.starts_with("type ") && (t.contains("struct") || t.contains("interface")) {
                return ident_after(t, "type ").map(|n| (NodeKind::Class, n));
            }
            None
        }
        Language::Python => {
            if t.starts_with("def ") || t.starts_with("async def ") {
                return ident_after(t, "def ").map(|n| (NodeKind::Function, n));
            }
            if t.starts_with("class ") {
                return ident_after(t, "class ").map(|n| (NodeKind::Class, n));
            }
            None
        }
    }
}

/// Brace depth change on one line, skipping string/char literals and anything
/// after a `//` comment marker. A bare `'` (a Rust lifetime) is left alone.
fn brace_delta(line: &str) -> (i32, bool) {
    let chars: Vec<char> = line.chars().collect();
    let mut delta = 0i32;
    let mut opened = false;
    let mut i = 0usize;
    while i < chars.len() {
        match chars[i] {
            q @ ('"' | '`') => {
                i += 1;
                while i < chars.len() {
                    if chars[i] == '\\' {
                        i += 2;
                        continue;
                    }
                    if chars[i] == q {
                        break;
                    }
                    i += 1;
                }
            }
            '\'' => {
                if chars.get(i + 1) == Some(&'\\') && chars.get(i + 3) == Some(&'\'') {
                    i += 3;
                } else if chars.get(i + 2) == Some(&'\'') {
                    i += 2;
                }
            }
            '/' if chars.get(i + 1) == Some(&'/') => break,
            '{' => {
                delta += 1;
                opened = true;
            }
            '}' => delta -= 1,
            _ => {}
        }
        i += 1;
    }
    (delta, opened)
}

struct Pending {
    kind: NodeKind,
    name: String,
    start: usize,
    /// Depth the scan must drop back to for this block to close.
    close_at: i32,
    children: Vec<Node>,
}

fn scan_braced(source: &str, lang: Language) -> Option<Vec<Node>> {
    let mut top: Vec<Node> = Vec::new();
    let mut stack: Vec<Pending> = Vec::new();
    let mut depth = 0i32;
    // An opener whose `{` has not appeared yet (multi-line signatures).
    let mut awaiting: Option<(NodeKind, String, usize)> = None;

    let mut offset = 0usize;
    for line in source.split_inclusive('\n') {
        let line_start = offset;
        offset += line.len();
        let (delta, opened) = brace_delta(line);
        let ends_in_semi = line.trim_end().ends_with(';');

        if let Some((kind, name)) = match_opener(line, lang) {
            if opened {
                stack.push(Pending {
                    kind,
                    name,
                    start: line_start,
                    close_at: depth,
                    children: Vec::new(),
                });
                awaiting = None;
            } else if !ends_in_semi {
                // Body-less declarations (`struct Unit;`, trait method
                // signatures) are not blocks.
                awaiting = Some((kind, name, line_start));
            }
        } else if opened {
            if let Some((kind, name, start)) = awaiting.take() {
                stack.push(Pending {
                    kind,
                    name,
                    start,
                    close_at: depth,
                    children: Vec::new(),
                });
            }
        } else if ends_in_semi {
            awaiting = None;
        }

        depth += delta;
        if depth < 0 {
            return None;
        }

        while stack.last().map(|p| depth <= p.close_at).unwrap_or(false) {
            let done = match stack.pop() {
                Some(p) => p,
                None => break,
            };
            let node = Node {
                kind: done.kind,
                name: done.name,
                start: done.start,
                end: offset,
                children: done.children,
            };
            match stack.last_mut() {
                Some(parent) => parent.children.push(node),
                None => top.push(node),
            }
        }
    }

    if depth != 0 || !stack.is_empty() {
        return None;
    }
    Some(top)
}

fn indent_of(line: &str) -> usize {
    line.chars().take_while(|c| *c == ' ' || *c == '\t').count()
}

struct PyPending {
    kind: NodeKind,
    name: String,
    start: usize,
    indent: usize,
    last_end: usize,
    children: Vec<Node>,
}

fn close_python_blocks(stack: &mut Vec<PyPending>, top: &mut Vec<Node>, indent: usize) {
    while stack.last().map(|p| p.indent >= indent).unwrap_or(false) {
        let done = match stack.pop() {
            Some(p) => p,
            None => break,
        };
        let node = Node {
            kind: done.kind,
            name: done.name,
            start: done.start,
            end: done.last_end,
            children: done.children,
        };
        match stack.last_mut() {
            Some(parent) => parent.children.push(node),
            None => top.push(node),
        }
    }
}

fn scan_indented(source: &str) -> Vec<Node> {
    let mut top: Vec<Node> = Vec::new();
    let mut stack: Vec<PyPending> = Vec::new();

    let mut offset = 0usize;
    for line in source.split_inclusive('\n') {
        let line_start = offset;
        offset += line.len();
        if line.trim().is_empty() {
            continue;
        }
        let indent = indent_of(line);

        if let Some((kind, name)) = match_opener(line, Language::Python) {
            close_python_blocks(&mut stack, &mut top, indent);
            stack.push(PyPending {
                kind,
                name,
                start: line_start,
                indent,
                last_end: offset,
                children: Vec::new(),
            });
        } else {
            // A statement at or above a block's indent ends that block.
            close_python_blocks(&mut stack, &mut top, indent);
            for p in stack.iter_mut() {
                p.last_end = offset;
            }
        }
    }
    close_python_blocks(&mut stack, &mut top, 0);
    top
}
