//! Core data models used throughout Quarry.
//!
//! These types represent the resources, chunks, and search results that flow
//! through the registry, index build, and retrieval pipeline. They also define
//! the JSON shape of the registry snapshot, so field names here are part of
//! the on-disk format.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// What kind of knowledge source a resource is, carrying the fields specific
/// to that kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResourceKind {
    /// A source repository cloned to a local path.
    Repository {
        url: String,
        branch: Option<String>,
        path: PathBuf,
    },
    /// A documentation page fetched from the web.
    Documentation { url: String },
    /// An installed package directory.
    Package { path: PathBuf },
}

impl ResourceKind {
    /// Short kind label used in listings and log lines.
    pub fn label(&self) -> &'static str {
        match self {
            ResourceKind::Repository { .. } => "repository",
            ResourceKind::Documentation { .. } => "documentation",
            ResourceKind::Package { .. } => "package",
        }
    }

    /// The location backing this resource: a local path or a URL.
    pub fn location(&self) -> String {
        match self {
            ResourceKind::Repository { path, .. } => path.display().to_string(),
            ResourceKind::Documentation { url } => url.clone(),
            ResourceKind::Package { path } => path.display().to_string(),
        }
    }

    /// The local filesystem path for path-backed kinds.
    pub fn local_path(&self) -> Option<&Path> {
        match self {
            ResourceKind::Repository { path, .. } => Some(path),
            ResourceKind::Package { path } => Some(path),
            ResourceKind::Documentation { .. } => None,
        }
    }
}

/// Build/search state of a resource.
///
/// Transitions: `Pending` → `Indexed` on a successful build, `Pending` →
/// `Error` on a failed one. `Indexed` persists until deletion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ResourceStatus {
    Pending,
    Indexed,
    Error { message: String },
}

impl ResourceStatus {
    /// Short state label used in listings and status responses.
    pub fn label(&self) -> &'static str {
        match self {
            ResourceStatus::Pending => "pending",
            ResourceStatus::Indexed => "indexed",
            ResourceStatus::Error { .. } => "error",
        }
    }
}

/// A registry entry: one named, indexable knowledge source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceRecord {
    /// Stable internal id (UUID). Survives renames.
    pub id: String,
    /// User-facing identifier, unique across the registry.
    pub identifier: String,
    pub kind: ResourceKind,
    pub status: ResourceStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Chunk count of the last successful build.
    #[serde(default)]
    pub chunk_count: Option<usize>,
}

/// A bounded span of content prepared for indexing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub text: String,
    /// Structural origin ("function", "class", "paragraph"). Diagnostics
    /// only; not required for correctness.
    pub origin: Option<String>,
    /// Relative path of the source file this chunk came from, when known.
    pub source_path: Option<String>,
}

impl Chunk {
    pub fn new(text: impl Into<String>, origin: Option<&str>) -> Self {
        Self {
            text: text.into(),
            origin: origin.map(|s| s.to_string()),
            source_path: None,
        }
    }

    pub fn with_source_path(mut self, path: impl Into<String>) -> Self {
        self.source_path = Some(path.into());
        self
    }
}

/// One ranked hit from a resource's index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    /// Normalized score in `[0, 1]`, higher is better.
    pub score: f64,
    pub snippet: String,
    pub source_path: Option<String>,
    pub origin: Option<String>,
}

/// Search outcome for a single requested identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SearchOutcome {
    /// The resource is indexed and its index answered.
    Hits { hits: Vec<HitSummary> },
    /// No live index exists for this identifier.
    NotIndexed,
    /// The index exists but querying it failed.
    Failed { message: String },
}

/// The serializable subset of [`SearchHit`] carried in tool responses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HitSummary {
    pub score: f64,
    pub snippet: String,
    pub source_path: Option<String>,
}

impl From<&SearchHit> for HitSummary {
    fn from(hit: &SearchHit) -> Self {
        Self {
            score: hit.score,
            snippet: hit.snippet.clone(),
            source_path: hit.source_path.clone(),
        }
    }
}

/// Per-resource search result; one per requested identifier, in request order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceResults {
    pub identifier: String,
    #[serde(flatten)]
    pub outcome: SearchOutcome,
}

/// One result from the web-search capability.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebResult {
    pub url: String,
    pub title: String,
    /// At most three excerpt snippets.
    pub excerpts: Vec<String>,
}

/// A completed deep-research run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchReport {
    pub run_id: String,
    pub content: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_serializes_with_type_tag() {
        let kind = ResourceKind::Documentation {
            url: "https://docs.rs/tokio".to_string(),
        };
        let json = serde_json::to_value(&kind).unwrap();
        assert_eq!(json["type"], "documentation");
        assert_eq!(json["url"], "https://docs.rs/tokio");
    }

    #[test]
    fn test_status_labels() {
        assert_eq!(ResourceStatus::Pending.label(), "pending");
        assert_eq!(ResourceStatus::Indexed.label(), "indexed");
        let err = ResourceStatus::Error {
            message: "clone failed".to_string(),
        };
        assert_eq!(err.label(), "error");
    }

    #[test]
    fn test_record_round_trips_through_json() {
        let record = ResourceRecord {
            id: "0000-test".to_string(),
            identifier: "tokio".to_string(),
            kind: ResourceKind::Repository {
                url: "https://github.com/tokio-rs/tokio".to_string(),
                branch: Some("master".to_string()),
                path: PathBuf::from("/tmp/clones/tokio"),
            },
            status: ResourceStatus::Indexed,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            chunk_count: Some(42),
        };
        let json = serde_json::to_string(&record).unwrap();
        let back: ResourceRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back.identifier, "tokio");
        assert_eq!(back.kind, record.kind);
        assert_eq!(back.chunk_count, Some(42));
    }

    #[test]
    fn test_search_outcome_tagging() {
        let results = ResourceResults {
            identifier: "tokio".to_string(),
            outcome: SearchOutcome::NotIndexed,
        };
        let json = serde_json::to_value(&results).unwrap();
        assert_eq!(json["identifier"], "tokio");
        assert_eq!(json["outcome"], "not_indexed");
    }
}
