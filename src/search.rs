//! Search dispatch across resource indexes.
//!
//! Validates the request once, then resolves each requested identifier
//! against the live handles only: a handle yields ranked hits, any
//! identifier without one (unknown, deleted, or not yet built) yields a
//! `not indexed` marker, and a query error on a live handle is captured
//! in place so one bad resource never aborts the batch. Results come
//! back in request order.

use crate::error::{Error, Result};
use crate::ingest::IndexBuilder;
use crate::models::{HitSummary, ResourceResults, SearchOutcome};

/// Queries `identifiers` for `query`, returning one outcome per identifier
/// in the order requested.
///
/// Fails fast with InvalidInput on an empty query or an empty identifier
/// list, before touching any index.
pub fn dispatch_search(
    builder: &IndexBuilder,
    query: &str,
    identifiers: &[String],
    per_resource_limit: usize,
) -> Result<Vec<ResourceResults>> {
    if query.trim().is_empty() {
        return Err(Error::InvalidInput("query must not be empty".to_string()));
    }
    if identifiers.is_empty() {
        return Err(Error::InvalidInput(
            "at least one resource identifier is required".to_string(),
        ));
    }

    let mut results = Vec::with_capacity(identifiers.len());
    for identifier in identifiers {
        let outcome = match builder.handle(identifier) {
            Some(index) => match index.query(query, per_resource_limit) {
                Ok(hits) => SearchOutcome::Hits {
                    hits: hits.iter().map(HitSummary::from).collect(),
                },
                Err(e) => SearchOutcome::Failed {
                    message: e.to_string(),
                },
            },
            None => SearchOutcome::NotIndexed,
        };
        results.push(ResourceResults {
            identifier: identifier.clone(),
            outcome,
        });
    }

    tracing::debug!(
        query,
        resources = identifiers.len(),
        "search dispatch complete"
    );
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{IndexBackend, IndexWriter, SearchIndex, TermBackend};
    use crate::config::{Config, StorageConfig};
    use crate::models::{Chunk, ResourceKind, SearchHit};
    use crate::registry::ResourceRegistry;
    use std::path::Path;
    use std::sync::Arc;

    fn indexed_fixture(root: &Path) -> (ResourceRegistry, IndexBuilder) {
        let config = Config {
            storage: StorageConfig {
                root: root.to_path_buf(),
            },
            ..Config::minimal()
        };
        let registry = ResourceRegistry::load(config.storage.registry_path()).unwrap();
        let builder = IndexBuilder::new(config, Box::new(TermBackend));
        (registry, builder)
    }

    async fn register_and_build(
        registry: &ResourceRegistry,
        builder: &IndexBuilder,
        root: &Path,
        identifier: &str,
        content: &str,
    ) {
        let dir = root.join(identifier);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("doc.md"), content).unwrap();
        registry
            .create_or_get(identifier, ResourceKind::Package { path: dir })
            .unwrap();
        builder.build(registry, identifier).await.unwrap();
    }

    #[tokio::test]
    async fn test_empty_query_fails_fast() {
        let tmp = tempfile::tempdir().unwrap();
        let (_registry, builder) = indexed_fixture(tmp.path());
        let err = dispatch_search(&builder, "   ", &["a".to_string()], 5).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        assert!(err.to_string().contains("query"));
    }

    #[tokio::test]
    async fn test_empty_identifier_list_fails_fast() {
        let tmp = tempfile::tempdir().unwrap();
        let (_registry, builder) = indexed_fixture(tmp.path());
        let err = dispatch_search(&builder, "anything", &[], 5).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_outcomes_follow_request_order() {
        let tmp = tempfile::tempdir().unwrap();
        let (registry, builder) = indexed_fixture(tmp.path());
        register_and_build(
            &registry,
            &builder,
            tmp.path(),
            "built",
            "retry budgets and backoff policies",
        )
        .await;
        registry
            .create_or_get(
                "registered-only",
                ResourceKind::Documentation {
                    url: "https://docs.example/pending".to_string(),
                },
            )
            .unwrap();

        let ids = vec![
            "unknown".to_string(),
            "built".to_string(),
            "registered-only".to_string(),
        ];
        let results = dispatch_search(&builder, "retry backoff", &ids, 5).unwrap();

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].identifier, "unknown");
        assert!(matches!(results[0].outcome, SearchOutcome::NotIndexed));
        assert_eq!(results[1].identifier, "built");
        match &results[1].outcome {
            SearchOutcome::Hits { hits } => {
                assert!(!hits.is_empty());
                assert!(hits[0].snippet.contains("backoff"));
            }
            other => panic!("expected hits, got {other:?}"),
        }
        assert_eq!(results[2].identifier, "registered-only");
        assert!(matches!(results[2].outcome, SearchOutcome::NotIndexed));
    }

    #[tokio::test]
    async fn test_deleted_resource_reports_not_indexed() {
        let tmp = tempfile::tempdir().unwrap();
        let (registry, builder) = indexed_fixture(tmp.path());
        register_and_build(&registry, &builder, tmp.path(), "gone", "ephemeral notes").await;

        registry.delete("gone").unwrap();
        builder.release("gone");

        let results = dispatch_search(&builder, "ephemeral", &["gone".to_string()], 5).unwrap();
        assert!(matches!(results[0].outcome, SearchOutcome::NotIndexed));
    }

    #[tokio::test]
    async fn test_per_resource_limit_is_applied() {
        let tmp = tempfile::tempdir().unwrap();
        let (registry, builder) = indexed_fixture(tmp.path());
        let many: String = (0..10)
            .map(|i| format!("needle paragraph number {i}.\n\n"))
            .collect();
        let dir = tmp.path().join("many");
        std::fs::create_dir_all(&dir).unwrap();
        for i in 0..10 {
            std::fs::write(dir.join(format!("f{i}.md")), &many).unwrap();
        }
        registry
            .create_or_get("many", ResourceKind::Package { path: dir })
            .unwrap();
        builder.build(&registry, "many").await.unwrap();

        let results = dispatch_search(&builder, "needle", &["many".to_string()], 2).unwrap();
        match &results[0].outcome {
            SearchOutcome::Hits { hits } => assert_eq!(hits.len(), 2),
            other => panic!("expected hits, got {other:?}"),
        }
    }

    struct BrokenIndex;

    impl SearchIndex for BrokenIndex {
        fn identifier(&self) -> &str {
            "flaky"
        }

        fn chunk_count(&self) -> usize {
            1
        }

        fn query(&self, _text: &str, _limit: usize) -> Result<Vec<SearchHit>> {
            Err(Error::Unavailable("index storage offline".to_string()))
        }
    }

    struct BrokenWriter;

    impl IndexWriter for BrokenWriter {
        fn add(&mut self, _chunk: Chunk) {}

        fn finalize(self: Box<Self>) -> Result<Arc<dyn SearchIndex>> {
            Ok(Arc::new(BrokenIndex))
        }
    }

    struct BrokenBackend;

    impl IndexBackend for BrokenBackend {
        fn writer(&self, _identifier: &str) -> Box<dyn IndexWriter> {
            Box::new(BrokenWriter)
        }
    }

    #[tokio::test]
    async fn test_query_error_is_captured_per_identifier() {
        let tmp = tempfile::tempdir().unwrap();
        let config = Config {
            storage: StorageConfig {
                root: tmp.path().to_path_buf(),
            },
            ..Config::minimal()
        };
        let registry = ResourceRegistry::load(config.storage.registry_path()).unwrap();
        let builder = IndexBuilder::new(config, Box::new(BrokenBackend));
        register_and_build(&registry, &builder, tmp.path(), "flaky", "some content").await;

        let results = dispatch_search(&builder, "content", &["flaky".to_string()], 5).unwrap();
        match &results[0].outcome {
            SearchOutcome::Failed { message } => assert!(message.contains("unavailable")),
            other => panic!("expected failure, got {other:?}"),
        }
    }
}
