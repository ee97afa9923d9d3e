//! Index build/query seam and the in-process term index.
//!
//! The Index Builder writes through [`IndexWriter`] and the dispatcher reads
//! through [`SearchIndex`]; [`IndexBackend`] ties the two together so a
//! different engine can be plugged in behind the same traits. The default
//! [`TermBackend`] keeps everything in memory and ranks by query-term overlap
//! with min-max normalized scores.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::Result;
use crate::models::{Chunk, SearchHit};

/// Characters of chunk text carried on a hit.
const SNIPPET_CHARS: usize = 300;

/// A finalized, queryable index for one resource.
pub trait SearchIndex: Send + Sync {
    fn identifier(&self) -> &str;
    fn chunk_count(&self) -> usize;
    /// Ranked hits for `text`, best first, at most `limit`.
    ///
    /// The in-process index cannot fail here, but the seam allows backends
    /// that query over a connection, so errors are part of the contract.
    fn query(&self, text: &str, limit: usize) -> Result<Vec<SearchHit>>;
}

/// Accumulates chunks during a build; consumed by `finalize`.
pub trait IndexWriter: Send {
    fn add(&mut self, chunk: Chunk);
    fn finalize(self: Box<Self>) -> Result<Arc<dyn SearchIndex>>;
}

/// Factory for per-resource writers. One backend serves the whole process.
pub trait IndexBackend: Send + Sync {
    fn writer(&self, identifier: &str) -> Box<dyn IndexWriter>;
}

/// Lowercased alphanumeric terms of at least two characters.
///
/// Underscores and punctuation split terms, so `parse_config` yields both
/// halves and a query for either finds it.
pub fn tokenize(text: &str) -> Vec<String> {
    let mut terms = Vec::new();
    let mut current = String::new();
    for c in text.chars() {
        if c.is_alphanumeric() {
            for lc in c.to_lowercase() {
                current.push(lc);
            }
        } else if !current.is_empty() {
            if current.chars().count() >= 2 {
                terms.push(std::mem::take(&mut current));
            } else {
                current.clear();
            }
        }
    }
    if current.chars().count() >= 2 {
        terms.push(current);
    }
    terms
}

// ═══════════════════════════════════════════════════════════════════════════
// In-process term backend
// ═══════════════════════════════════════════════════════════════════════════

/// Default backend: an inverted term index per resource, fully in memory.
#[derive(Debug, Default)]
pub struct TermBackend;

impl IndexBackend for TermBackend {
    fn writer(&self, identifier: &str) -> Box<dyn IndexWriter> {
        Box::new(TermWriter {
            identifier: identifier.to_string(),
            chunks: Vec::new(),
        })
    }
}

struct TermWriter {
    identifier: String,
    chunks: Vec<Chunk>,
}

impl IndexWriter for TermWriter {
    fn add(&mut self, chunk: Chunk) {
        self.chunks.push(chunk);
    }

    fn finalize(self: Box<Self>) -> Result<Arc<dyn SearchIndex>> {
        let mut postings: HashMap<String, Vec<(usize, u32)>> = HashMap::new();
        let mut term_totals = Vec::with_capacity(self.chunks.len());
        for (ordinal, chunk) in self.chunks.iter().enumerate() {
            let terms = tokenize(&chunk.text);
            term_totals.push(terms.len() as u32);
            let mut counts: HashMap<&str, u32> = HashMap::new();
            for term in &terms {
                *counts.entry(term.as_str()).or_insert(0) += 1;
            }
            for (term, count) in counts {
                postings
                    .entry(term.to_string())
                    .or_default()
                    .push((ordinal, count));
            }
        }
        tracing::debug!(
            identifier = %self.identifier,
            chunks = self.chunks.len(),
            terms = postings.len(),
            "finalized term index"
        );
        Ok(Arc::new(TermIndex {
            identifier: self.identifier,
            chunks: self.chunks,
            postings,
            term_totals,
        }))
    }
}

struct TermIndex {
    identifier: String,
    chunks: Vec<Chunk>,
    /// term -> (chunk ordinal, occurrences in that chunk)
    postings: HashMap<String, Vec<(usize, u32)>>,
    /// Total term count per chunk, for the frequency component.
    term_totals: Vec<u32>,
}

impl SearchIndex for TermIndex {
    fn identifier(&self) -> &str {
        &self.identifier
    }

    fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    fn query(&self, text: &str, limit: usize) -> Result<Vec<SearchHit>> {
        let mut query_terms = tokenize(text);
        query_terms.sort();
        query_terms.dedup();
        if query_terms.is_empty() {
            return Ok(Vec::new());
        }

        // ordinal -> (distinct query terms matched, summed occurrences)
        let mut matched: HashMap<usize, (u32, u32)> = HashMap::new();
        for term in &query_terms {
            if let Some(posts) = self.postings.get(term) {
                for &(ordinal, count) in posts {
                    let entry = matched.entry(ordinal).or_insert((0, 0));
                    entry.0 += 1;
                    entry.1 += count;
                }
            }
        }
        if matched.is_empty() {
            return Ok(Vec::new());
        }

        // Distinct-term coverage dominates; the frequency ratio only breaks
        // ties between chunks covering the same terms.
        let mut scored: Vec<(usize, f64)> = matched
            .into_iter()
            .map(|(ordinal, (distinct, occurrences))| {
                let total = self.term_totals[ordinal].max(1) as f64;
                let raw = distinct as f64 + (occurrences as f64 / total).min(0.999);
                (ordinal, raw)
            })
            .collect();

        let max = scored.iter().fold(f64::MIN, |m, &(_, s)| m.max(s));
        let min = scored.iter().fold(f64::MAX, |m, &(_, s)| m.min(s));
        let span = max - min;
        for (_, score) in scored.iter_mut() {
            *score = if span <= f64::EPSILON {
                1.0
            } else {
                (*score - min) / span
            };
        }

        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });
        scored.truncate(limit);

        Ok(scored
            .into_iter()
            .map(|(ordinal, score)| {
                let chunk = &self.chunks[ordinal];
                SearchHit {
                    score,
                    snippet: snippet_of(&chunk.text),
                    source_path: chunk.source_path.clone(),
                    origin: chunk.origin.clone(),
                }
            })
            .collect())
    }
}

fn snippet_of(text: &str) -> String {
    match text.char_indices().nth(SNIPPET_CHARS) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}
