//! Shared application state and the tool extension seam.
//!
//! [`AppState`] owns every long-lived component — configuration, the resource
//! registry, the index builder, the call caches, and the research client —
//! and carries the composed flows that both the CLI and the server dispatch
//! into. [`Tool`] is the trait custom tools implement; [`ToolRegistry`] holds
//! built-ins plus extensions and backs tool discovery over HTTP and MCP.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

use crate::backend::TermBackend;
use crate::cache::ToolCaches;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::fetch;
use crate::graph;
use crate::ingest::IndexBuilder;
use crate::models::{ResearchReport, ResourceKind, ResourceRecord, ResourceResults, WebResult};
use crate::packages;
use crate::registry::ResourceRegistry;
use crate::repo;
use crate::research::ResearchClient;
use crate::search::dispatch_search;

// ═══════════════════════════════════════════════════════════════════════
// Application State
// ═══════════════════════════════════════════════════════════════════════

/// Owned application state, shared across CLI commands, HTTP handlers, and
/// MCP sessions behind one `Arc`.
pub struct AppState {
    pub config: Config,
    pub registry: ResourceRegistry,
    pub builder: IndexBuilder,
    pub caches: ToolCaches,
    pub research: ResearchClient,
    started_at: DateTime<Utc>,
}

impl AppState {
    /// Load the registry snapshot and assemble the component graph.
    pub fn new(config: Config) -> Result<Self> {
        let registry = ResourceRegistry::load(config.storage.registry_path())?;
        let builder = IndexBuilder::new(config.clone(), Box::new(TermBackend::default()));
        let caches = ToolCaches::new(&config.cache);
        let research = ResearchClient::new(config.research.clone())?;
        tracing::debug!(resources = registry.len(), "application state ready");
        Ok(Self {
            config,
            registry,
            builder,
            caches,
            research,
            started_at: Utc::now(),
        })
    }

    /// Register a repository resource. The clone destination is derived from
    /// the URL so re-registering the same repository reuses its clone.
    pub fn register_repository(
        &self,
        name: Option<&str>,
        url: &str,
        branch: Option<&str>,
    ) -> Result<ResourceRecord> {
        if url.trim().is_empty() {
            return Err(Error::InvalidInput("repository url must not be empty".to_string()));
        }
        let identifier = match name {
            Some(name) => name.to_string(),
            None => repo::repo_name_from_url(url),
        };
        require_identifier(&identifier)?;
        let kind = ResourceKind::Repository {
            url: url.to_string(),
            branch: branch.map(|b| b.to_string()),
            path: repo::clone_dir(&self.config.storage.clones_dir(), url),
        };
        self.registry.create_or_get(&identifier, kind)
    }

    /// Register a documentation page resource.
    pub fn register_documentation(&self, name: Option<&str>, url: &str) -> Result<ResourceRecord> {
        if url.trim().is_empty() {
            return Err(Error::InvalidInput("documentation url must not be empty".to_string()));
        }
        let identifier = match name {
            Some(name) => name.to_string(),
            None => doc_identifier(url),
        };
        require_identifier(&identifier)?;
        let kind = ResourceKind::Documentation {
            url: url.to_string(),
        };
        self.registry.create_or_get(&identifier, kind)
    }

    /// Register an installed package resource, resolving it against the
    /// configured package roots.
    pub fn register_package(&self, name: Option<&str>, package: &str) -> Result<ResourceRecord> {
        let path = packages::locate_package(&self.config.packages, package)?;
        let identifier = match name {
            Some(name) => name.to_string(),
            None => package.to_string(),
        };
        require_identifier(&identifier)?;
        self.registry
            .create_or_get(&identifier, ResourceKind::Package { path })
    }

    /// Build (or rebuild after an error) the index for a registered resource.
    pub async fn build_resource(&self, identifier: &str) -> Result<ResourceRecord> {
        self.builder.build(&self.registry, identifier).await
    }

    /// Search the given resources. `limit` overrides the configured
    /// per-resource hit count.
    pub fn search(
        &self,
        query: &str,
        identifiers: &[String],
        limit: Option<usize>,
    ) -> Result<Vec<ResourceResults>> {
        let limit = limit.unwrap_or(self.config.retrieval.per_resource_limit);
        dispatch_search(&self.builder, query, identifiers, limit)
    }

    /// Rename a resource and move its live index handle along. Claims the
    /// build lock so a rename cannot race an in-flight build.
    pub fn rename_resource(&self, old: &str, new: &str) -> Result<ResourceRecord> {
        let _guard = self.builder.try_claim(old)?;
        let record = self.registry.rename(old, new)?;
        self.builder.rename_handle(old, new);
        Ok(record)
    }

    /// Delete a resource and drop its live index handle. Claims the build
    /// lock so a delete cannot race an in-flight build.
    pub fn delete_resource(&self, identifier: &str) -> Result<ResourceRecord> {
        let _guard = self.builder.try_claim(identifier)?;
        let record = self.registry.delete(identifier)?;
        self.builder.release(identifier);
        Ok(record)
    }

    /// Web search with bounded memoization. Only successful calls are cached.
    pub async fn web_search(
        &self,
        query: &str,
        num_results: usize,
        category: Option<&str>,
        days_back: Option<u32>,
    ) -> Result<Vec<WebResult>> {
        let key = (
            query.to_string(),
            num_results,
            category.map(|c| c.to_string()),
            days_back,
        );
        if let Some(hit) = self.caches.web_get(&key) {
            tracing::debug!(query, "web search cache hit");
            return Ok(hit);
        }
        let results = self
            .research
            .web_search(query, num_results, category, days_back)
            .await?;
        self.caches.web_put(key, results.clone());
        Ok(results)
    }

    /// Submit a deep-research run and wait for its report.
    pub async fn deep_research(&self, query: &str) -> Result<ResearchReport> {
        self.research.deep_research(query).await
    }

    /// Package grep with bounded memoization keyed by the full argument
    /// tuple. Only successful calls are cached.
    pub fn package_grep(&self, package: &str, pattern: &str, max_results: usize) -> Result<String> {
        let key = (package.to_string(), pattern.to_string(), max_results);
        if let Some(hit) = self.caches.grep_get(&key) {
            tracing::debug!(package, pattern, "package grep cache hit");
            return Ok(hit);
        }
        let out = packages::grep_package(&self.config.packages, package, pattern, max_results)?;
        self.caches.grep_put(key, out.clone());
        Ok(out)
    }

    /// Read a file (or line range) from an installed package, memoized.
    pub fn package_read(
        &self,
        package: &str,
        file: &str,
        range: Option<(usize, usize)>,
    ) -> Result<String> {
        let key = match range {
            Some((start, end)) => format!("pkg:{package}:{file}:{start}-{end}"),
            None => format!("pkg:{package}:{file}:all"),
        };
        if let Some(hit) = self.caches.read_get(&key) {
            return Ok(hit);
        }
        let out = packages::read_package_file(&self.config.packages, package, file, range)?;
        self.caches.read_put(key, out.clone());
        Ok(out)
    }

    /// The package search selector: `"local"` registers and indexes the
    /// installed package and dispatches the query against it; any other
    /// selector rewrites the query and delegates to web search.
    pub async fn hybrid_package_search(
        &self,
        package: &str,
        query: &str,
        registry: &str,
    ) -> Result<HybridOutcome> {
        if registry == "local" {
            let record = self.register_package(None, package)?;
            self.build_resource(&record.identifier).await?;
            let results = self.search(query, &[record.identifier], None)?;
            Ok(HybridOutcome::Local { results })
        } else {
            let rewritten = format!("In the {package} package: {query}");
            let results = self.web_search(&rewritten, 5, None, None).await?;
            Ok(HybridOutcome::Web { results })
        }
    }

    /// Raw content behind a resource: file contents for file-backed
    /// resources, a directory listing for directory-backed ones, a fresh
    /// page fetch for documentation. Memoized in the read cache.
    pub async fn read_source_content(&self, identifier: &str) -> Result<String> {
        let key = format!("src:{identifier}");
        if let Some(hit) = self.caches.read_get(&key) {
            return Ok(hit);
        }
        let record = self.registry.get(identifier)?;
        let content = match &record.kind {
            ResourceKind::Documentation { url } => {
                fetch::fetch_documentation(url, &self.config.fetch).await?
            }
            kind => {
                let path = kind.local_path().ok_or_else(|| {
                    Error::InvalidInput(format!("resource '{identifier}' has no local content"))
                })?;
                if path.is_file() {
                    std::fs::read_to_string(path).map_err(|e| {
                        Error::Unavailable(format!("cannot read {}: {e}", path.display()))
                    })?
                } else if path.is_dir() {
                    directory_listing(identifier, path)?
                } else {
                    return Err(Error::Unavailable(format!(
                        "location {} does not exist",
                        path.display()
                    )));
                }
            }
        };
        self.caches.read_put(key, content.clone());
        Ok(content)
    }

    /// Import-graph text for a repository or package resource.
    pub fn visualize(&self, identifier: &str) -> Result<String> {
        let record = self.registry.get(identifier)?;
        let path = record.kind.local_path().ok_or_else(|| {
            Error::InvalidInput(format!("resource '{identifier}' has no local source tree"))
        })?;
        graph::import_graph(path, identifier)
    }

    /// Point-in-time server status snapshot.
    pub fn status(&self) -> Value {
        let resources = self.registry.list(None);
        let (mut pending, mut indexed, mut errored) = (0, 0, 0);
        let (mut repositories, mut documentation, mut packages) = (0, 0, 0);
        for record in &resources {
            match record.status {
                crate::models::ResourceStatus::Pending => pending += 1,
                crate::models::ResourceStatus::Indexed => indexed += 1,
                crate::models::ResourceStatus::Error { .. } => errored += 1,
            }
            match record.kind {
                ResourceKind::Repository { .. } => repositories += 1,
                ResourceKind::Documentation { .. } => documentation += 1,
                ResourceKind::Package { .. } => packages += 1,
            }
        }
        let (grep, web, read) = self.caches.occupancy();
        serde_json::json!({
            "status": "ok",
            "version": env!("CARGO_PKG_VERSION"),
            "uptime_secs": (Utc::now() - self.started_at).num_seconds(),
            "storage_root": self.config.storage.root.display().to_string(),
            "resources": {
                "total": resources.len(),
                "pending": pending,
                "indexed": indexed,
                "error": errored,
            },
            "kinds": {
                "repository": repositories,
                "documentation": documentation,
                "package": packages,
            },
            "live_indexes": self.builder.handle_count(),
            "caches": {
                "grep": { "entries": grep, "capacity": self.config.cache.grep_entries },
                "web": { "entries": web, "capacity": self.config.cache.web_entries },
                "read": { "entries": read, "capacity": self.config.cache.read_entries },
            },
        })
    }
}

/// Result of a hybrid package search: local index hits or rewritten web
/// results, tagged so callers can tell which path answered.
#[derive(Debug, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum HybridOutcome {
    Local { results: Vec<ResourceResults> },
    Web { results: Vec<WebResult> },
}

fn require_identifier(identifier: &str) -> Result<()> {
    if identifier.trim().is_empty() {
        return Err(Error::InvalidInput(
            "resource identifier must not be empty".to_string(),
        ));
    }
    Ok(())
}

/// Default identifier for a documentation URL: its last path segment.
fn doc_identifier(url: &str) -> String {
    url.trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|s| !s.is_empty())
        .unwrap_or("doc")
        .to_string()
}

fn directory_listing(identifier: &str, path: &std::path::Path) -> Result<String> {
    let mut names: Vec<String> = std::fs::read_dir(path)
        .map_err(|e| Error::Unavailable(format!("cannot list {}: {e}", path.display())))?
        .flatten()
        .filter_map(|entry| entry.file_name().to_str().map(|s| s.to_string()))
        .collect();
    names.sort();
    Ok(format!(
        "{identifier} is a directory at {}:\n{}",
        path.display(),
        names.join("\n")
    ))
}

// ═══════════════════════════════════════════════════════════════════════
// Tool Trait
// ═══════════════════════════════════════════════════════════════════════

/// A tool that agents can discover and call.
///
/// Implement this trait to add a custom tool. Tools are registered at server
/// startup and exposed via `GET /tools/list` for discovery and
/// `POST /tools/{name}` (or MCP `call_tool`) for invocation.
///
/// # Example
///
/// ```rust
/// use async_trait::async_trait;
/// use serde_json::{json, Value};
/// use quarry::traits::{Tool, ToolContext};
///
/// pub struct PingTool;
///
/// #[async_trait]
/// impl Tool for PingTool {
///     fn name(&self) -> &str { "ping" }
///     fn description(&self) -> &str { "Health probe" }
///
///     fn parameters_schema(&self) -> Value {
///         json!({ "type": "object", "properties": {} })
///     }
///
///     async fn execute(&self, _params: Value, ctx: &ToolContext) -> anyhow::Result<Value> {
///         Ok(json!({ "resources": ctx.state().registry.len() }))
///     }
/// }
/// ```
#[async_trait]
pub trait Tool: Send + Sync {
    /// The tool's name. Used as the route path (`POST /tools/{name}`) and in
    /// discovery responses; a lowercase identifier with underscores.
    fn name(&self) -> &str;

    /// One-line description for agent discovery.
    fn description(&self) -> &str;

    /// Whether this tool ships with the server. Custom tools keep the
    /// default `false` and are marked accordingly in `GET /tools/list`.
    fn is_builtin(&self) -> bool {
        false
    }

    /// JSON Schema for the tool's parameters: an object schema with
    /// `properties` and optionally `required` and per-property `default`s.
    fn parameters_schema(&self) -> Value;

    /// Execute the tool with validated parameters.
    async fn execute(&self, params: Value, ctx: &ToolContext) -> anyhow::Result<Value>;
}

/// Context handed to every tool invocation.
pub struct ToolContext {
    state: Arc<AppState>,
}

impl ToolContext {
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }

    /// The shared application state.
    pub fn state(&self) -> &AppState {
        &self.state
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Tool Metadata and Parameter Validation
// ═══════════════════════════════════════════════════════════════════════

/// Serializable tool descriptor for the `/tools/list` endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct ToolInfo {
    pub name: String,
    pub description: String,
    pub builtin: bool,
    /// JSON Schema for the tool's parameters.
    pub parameters: Value,
}

/// Validate incoming JSON parameters against a tool's schema.
///
/// Checks required fields, type compatibility, and enum constraints, and
/// injects declared defaults for missing optional fields. Returns the
/// validated (and potentially enriched) parameters.
pub fn validate_params(schema: &Value, params: &Value) -> anyhow::Result<Value> {
    let params_obj = params
        .as_object()
        .unwrap_or(&serde_json::Map::new())
        .clone();

    let properties = schema
        .get("properties")
        .and_then(|p| p.as_object())
        .cloned()
        .unwrap_or_default();

    let required: Vec<String> = schema
        .get("required")
        .and_then(|r| r.as_array())
        .map(|arr| {
            arr.iter()
                .filter_map(|v| v.as_str().map(|s| s.to_string()))
                .collect()
        })
        .unwrap_or_default();

    let mut result = params_obj.clone();

    for req_field in &required {
        if !params_obj.contains_key(req_field) {
            anyhow::bail!("missing required parameter: {}", req_field);
        }
    }

    for (prop_name, prop_schema) in &properties {
        if let Some(value) = params_obj.get(prop_name) {
            if let Some(expected_type) = prop_schema.get("type").and_then(|t| t.as_str()) {
                let type_ok = match expected_type {
                    "string" => value.is_string(),
                    "integer" => value.is_i64() || value.is_u64(),
                    "number" => value.is_number(),
                    "boolean" => value.is_boolean(),
                    "array" => value.is_array(),
                    "object" => value.is_object(),
                    _ => true,
                };
                if !type_ok {
                    anyhow::bail!(
                        "parameter '{}' must be of type '{}', got {}",
                        prop_name,
                        expected_type,
                        json_type_name(value)
                    );
                }
            }

            if let Some(enum_values) = prop_schema.get("enum").and_then(|e| e.as_array()) {
                if !enum_values.contains(value) {
                    let allowed: Vec<String> = enum_values.iter().map(|v| v.to_string()).collect();
                    anyhow::bail!(
                        "parameter '{}' must be one of [{}], got {}",
                        prop_name,
                        allowed.join(", "),
                        value
                    );
                }
            }
        } else if let Some(default) = prop_schema.get("default") {
            result.insert(prop_name.clone(), default.clone());
        }
    }

    Ok(Value::Object(result))
}

/// Human-readable name for a JSON value's type.
fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Tool Registry
// ═══════════════════════════════════════════════════════════════════════

/// Registry for tools, built-in and custom.
///
/// Use [`ToolRegistry::with_builtins`] for a registry pre-loaded with the
/// full built-in tool set, then optionally [`register`](ToolRegistry::register)
/// custom ones.
pub struct ToolRegistry {
    tools: Vec<Box<dyn Tool>>,
}

impl ToolRegistry {
    /// Create an empty tool registry.
    pub fn new() -> Self {
        Self { tools: Vec::new() }
    }

    /// Create a registry pre-loaded with all built-in tools.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for tool in crate::tools::builtin_tools() {
            registry.register(tool);
        }
        registry
    }

    /// Register a tool.
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        self.tools.push(tool);
    }

    /// All registered tools.
    pub fn tools(&self) -> &[Box<dyn Tool>] {
        &self.tools
    }

    /// Find a tool by name.
    pub fn find(&self, name: &str) -> Option<&dyn Tool> {
        self.tools
            .iter()
            .find(|t| t.name() == name)
            .map(|t| t.as_ref())
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PackagesConfig, StorageConfig};
    use crate::models::SearchOutcome;

    fn test_state() -> (tempfile::TempDir, AppState) {
        let tmp = tempfile::tempdir().unwrap();
        let pkg = tmp.path().join("site/demo_pkg");
        std::fs::create_dir_all(&pkg).unwrap();
        std::fs::write(
            pkg.join("client.py"),
            "def fetch_with_retry(url):\n    \"\"\"Retry with exponential backoff until the fetch succeeds.\"\"\"\n    return url\n",
        )
        .unwrap();
        let config = Config {
            storage: StorageConfig {
                root: tmp.path().join("data"),
            },
            packages: PackagesConfig {
                roots: vec![tmp.path().join("site")],
            },
            ..Config::minimal()
        };
        let state = AppState::new(config).unwrap();
        (tmp, state)
    }

    #[tokio::test]
    async fn test_register_build_and_search_package() {
        let (_tmp, state) = test_state();
        let record = state.register_package(None, "demo_pkg").unwrap();
        assert_eq!(record.identifier, "demo_pkg");

        state.build_resource("demo_pkg").await.unwrap();
        let results = state
            .search("backoff", &["demo_pkg".to_string()], None)
            .unwrap();
        match &results[0].outcome {
            SearchOutcome::Hits { hits } => assert!(hits[0].snippet.contains("backoff")),
            other => panic!("expected hits, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_delete_drops_handle() {
        let (_tmp, state) = test_state();
        state.register_package(None, "demo_pkg").unwrap();
        state.build_resource("demo_pkg").await.unwrap();
        assert!(state.builder.handle("demo_pkg").is_some());

        state.delete_resource("demo_pkg").unwrap();
        assert!(state.builder.handle("demo_pkg").is_none());
        assert!(state.registry.get("demo_pkg").is_err());
    }

    #[tokio::test]
    async fn test_rename_moves_handle() {
        let (_tmp, state) = test_state();
        state.register_package(None, "demo_pkg").unwrap();
        state.build_resource("demo_pkg").await.unwrap();

        state.rename_resource("demo_pkg", "client-lib").unwrap();
        assert!(state.builder.handle("demo_pkg").is_none());
        assert!(state.builder.handle("client-lib").is_some());
        assert_eq!(state.registry.get("client-lib").unwrap().identifier, "client-lib");
    }

    #[tokio::test]
    async fn test_hybrid_local_indexes_and_searches() {
        let (_tmp, state) = test_state();
        let outcome = state
            .hybrid_package_search("demo_pkg", "backoff", "local")
            .await
            .unwrap();
        match outcome {
            HybridOutcome::Local { results } => {
                assert_eq!(results.len(), 1);
                assert!(matches!(results[0].outcome, SearchOutcome::Hits { .. }));
            }
            HybridOutcome::Web { .. } => panic!("expected local outcome"),
        }
    }

    #[tokio::test]
    async fn test_read_source_content_lists_directories() {
        let (_tmp, state) = test_state();
        state.register_package(None, "demo_pkg").unwrap();
        let listing = state.read_source_content("demo_pkg").await.unwrap();
        assert!(listing.contains("demo_pkg is a directory"));
        assert!(listing.contains("client.py"));

        // Second call answers from the read cache.
        state.read_source_content("demo_pkg").await.unwrap();
        let (_, _, read) = state.caches.occupancy();
        assert_eq!(read, 1);
    }

    #[tokio::test]
    async fn test_status_counts_resources() {
        let (_tmp, state) = test_state();
        state.register_package(None, "demo_pkg").unwrap();
        state.build_resource("demo_pkg").await.unwrap();

        let status = state.status();
        assert_eq!(status["resources"]["total"], 1);
        assert_eq!(status["resources"]["indexed"], 1);
        assert_eq!(status["kinds"]["package"], 1);
        assert_eq!(status["live_indexes"], 1);
        assert_eq!(status["caches"]["grep"]["capacity"], 256);
    }

    #[test]
    fn test_doc_identifier_from_url() {
        assert_eq!(doc_identifier("https://docs.rs/tokio/"), "tokio");
        assert_eq!(doc_identifier("https://example.com/guide.html"), "guide.html");
        assert_eq!(doc_identifier(""), "doc");
    }

    #[test]
    fn test_validate_params_required_and_defaults() {
        let schema = serde_json::json!({
            "type": "object",
            "properties": {
                "query": { "type": "string" },
                "limit": { "type": "integer", "default": 5 }
            },
            "required": ["query"]
        });

        let err = validate_params(&schema, &serde_json::json!({})).unwrap_err();
        assert!(err.to_string().contains("missing required parameter: query"));

        let ok = validate_params(&schema, &serde_json::json!({ "query": "hi" })).unwrap();
        assert_eq!(ok["limit"], 5);
    }

    #[test]
    fn test_validate_params_type_and_enum() {
        let schema = serde_json::json!({
            "type": "object",
            "properties": {
                "limit": { "type": "integer" },
                "registry": { "type": "string", "enum": ["local", "web"] }
            }
        });

        let err = validate_params(&schema, &serde_json::json!({ "limit": "five" })).unwrap_err();
        assert!(err.to_string().contains("must be of type 'integer'"));

        let err =
            validate_params(&schema, &serde_json::json!({ "registry": "ftp" })).unwrap_err();
        assert!(err.to_string().contains("must be one of"));
    }
}
