//! Content-aware chunker.
//!
//! Generic mode slides a window of `target_chars` over the text, carrying
//! `overlap_chars` of trailing context into the next chunk and preferring to
//! cut at a sentence boundary when one falls inside the backscan window.
//! Code mode chunks by definition spans from [`crate::syntax`] and silently
//! falls back to generic mode when the scan fails or finds nothing.
//!
//! Chunking is deterministic: the same input and configuration always produce
//! the same chunk sequence, in source order.

use std::path::Path;

use crate::config::ChunkingConfig;
use crate::models::Chunk;
use crate::syntax::{self, Language, Node};

/// Characters that end a sentence for boundary adjustment.
fn is_sentence_boundary(c: char) -> bool {
    matches!(c, '.' | '!' | '?' | '\n')
}

/// Split plain text into overlapping chunks.
///
/// Whitespace-only input yields no chunks; input at or under the target size
/// comes back as a single chunk equal to the input.
pub fn chunk_generic(text: &str, cfg: &ChunkingConfig) -> Vec<Chunk> {
    if text.trim().is_empty() {
        return Vec::new();
    }

    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= cfg.target_chars {
        return vec![Chunk::new(text, Some("paragraph"))];
    }

    let mut chunks = Vec::new();
    let mut start = 0usize;
    while start < chars.len() {
        let end = (start + cfg.target_chars).min(chars.len());
        let mut cut = end;
        if end < chars.len() {
            // Prefer the nearest sentence end within the backscan window.
            let floor = end.saturating_sub(cfg.overlap_chars).max(start + 1);
            for i in (floor..end).rev() {
                if is_sentence_boundary(chars[i]) {
                    cut = i + 1;
                    break;
                }
            }
        }

        let piece: String = chars[start..cut].iter().collect();
        let piece = piece.trim();
        if !piece.is_empty() {
            chunks.push(Chunk::new(piece, Some("paragraph")));
        }

        if cut >= chars.len() {
            break;
        }
        // Carry the overlap window into the next chunk. Short cuts skip the
        // overlap so the scan always advances.
        start = if cut - start > cfg.overlap_chars {
            cut - cfg.overlap_chars
        } else {
            cut
        };
    }

    chunks
}

/// Chunk source code by definition spans.
///
/// Every function and class definition found by the scanner becomes one
/// chunk, nested definitions included, in source order; spans shorter than
/// `min_code_chars` are dropped. A failed or empty scan falls back to
/// [`chunk_generic`] — callers never see the difference.
pub fn chunk_code(text: &str, lang: Language, cfg: &ChunkingConfig) -> Vec<Chunk> {
    match syntax::parse(text, lang) {
        Some(nodes) if !nodes.is_empty() => {
            let mut chunks = Vec::new();
            collect_definition_chunks(&nodes, text, cfg.min_code_chars, &mut chunks);
            if chunks.is_empty() {
                tracing::debug!("definition spans all below threshold, using generic chunking");
                chunk_generic(text, cfg)
            } else {
                chunks
            }
        }
        Some(_) => {
            tracing::debug!("no definitions found, using generic chunking");
            chunk_generic(text, cfg)
        }
        None => {
            tracing::debug!("definition scan failed, using generic chunking");
            chunk_generic(text, cfg)
        }
    }
}

fn collect_definition_chunks(nodes: &[Node], src: &str, min_chars: usize, out: &mut Vec<Chunk>) {
    for node in nodes {
        let span = src[node.start..node.end].trim();
        if span.chars().count() >= min_chars {
            out.push(Chunk::new(span, Some(node.kind.label())));
        }
        collect_definition_chunks(&node.children, src, min_chars, out);
    }
}

/// Chunk a file's contents, choosing code mode for recognized source
/// extensions and generic mode for everything else.
pub fn chunk_file(path: &Path, text: &str, cfg: &ChunkingConfig) -> Vec<Chunk> {
    match syntax::language_for_path(path) {
        Some(lang) => chunk_code(text, lang, cfg),
        None => chunk_generic(text, cfg),
    }
}
