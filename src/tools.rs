//! Built-in tool implementations.
//!
//! One unit struct per tool, each a thin parameter-parsing shim over an
//! [`AppState`](crate::traits::AppState) flow. Schemas declare defaults so
//! parameter validation fills them in before `execute` runs; the `as_*`
//! accessors here are the second line of defense, not the contract.

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::traits::{Tool, ToolContext};

/// Every tool the server ships with, in discovery order.
pub fn builtin_tools() -> Vec<Box<dyn Tool>> {
    vec![
        Box::new(IndexRepositoryTool),
        Box::new(IndexDocumentationTool),
        Box::new(IndexPackageTool),
        Box::new(SearchCodebaseTool),
        Box::new(SearchDocumentationTool),
        Box::new(ListResourcesTool),
        Box::new(CheckResourceStatusTool),
        Box::new(RenameResourceTool),
        Box::new(DeleteResourceTool),
        Box::new(ReadSourceContentTool),
        Box::new(PackageGrepTool),
        Box::new(PackageReadFileTool),
        Box::new(PackageHybridSearchTool),
        Box::new(WebSearchTool),
        Box::new(DeepResearchTool),
        Box::new(VisualizeCodebaseTool),
        Box::new(GetServerStatusTool),
        Box::new(InitializeProjectTool),
    ]
}

fn str_param<'a>(params: &'a Value, name: &str) -> &'a str {
    params[name].as_str().unwrap_or("")
}

fn opt_str_param<'a>(params: &'a Value, name: &str) -> Option<&'a str> {
    params.get(name).and_then(|v| v.as_str())
}

fn string_list(params: &Value, name: &str) -> Vec<String> {
    params[name]
        .as_array()
        .map(|arr| {
            arr.iter()
                .filter_map(|v| v.as_str().map(|s| s.to_string()))
                .collect()
        })
        .unwrap_or_default()
}

// ═══════════════════════════════════════════════════════════════════════
// Indexing
// ═══════════════════════════════════════════════════════════════════════

/// Register a repository and build its index.
pub struct IndexRepositoryTool;

#[async_trait]
impl Tool for IndexRepositoryTool {
    fn name(&self) -> &str {
        "index_repository"
    }

    fn description(&self) -> &str {
        "Clone a repository and build a searchable index over its files"
    }

    fn is_builtin(&self) -> bool {
        true
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "url": { "type": "string", "description": "Clone URL of the repository" },
                "name": { "type": "string", "description": "Resource identifier (defaults to the repository name)" },
                "branch": { "type": "string", "description": "Branch to clone (defaults to the remote default)" }
            },
            "required": ["url"]
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> anyhow::Result<Value> {
        let state = ctx.state();
        let record = state.register_repository(
            opt_str_param(&params, "name"),
            str_param(&params, "url"),
            opt_str_param(&params, "branch"),
        )?;
        let record = state.build_resource(&record.identifier).await?;
        Ok(json!({ "resource": serde_json::to_value(&record)? }))
    }
}

/// Register a documentation page and build its index.
pub struct IndexDocumentationTool;

#[async_trait]
impl Tool for IndexDocumentationTool {
    fn name(&self) -> &str {
        "index_documentation"
    }

    fn description(&self) -> &str {
        "Fetch a documentation page and build a searchable index over it"
    }

    fn is_builtin(&self) -> bool {
        true
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "url": { "type": "string", "description": "Page URL (HTML, PDF, or plain text)" },
                "name": { "type": "string", "description": "Resource identifier (defaults to the last URL segment)" }
            },
            "required": ["url"]
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> anyhow::Result<Value> {
        let state = ctx.state();
        let record = state
            .register_documentation(opt_str_param(&params, "name"), str_param(&params, "url"))?;
        let record = state.build_resource(&record.identifier).await?;
        Ok(json!({ "resource": serde_json::to_value(&record)? }))
    }
}

/// Register an installed package and build its index.
pub struct IndexPackageTool;

#[async_trait]
impl Tool for IndexPackageTool {
    fn name(&self) -> &str {
        "index_package"
    }

    fn description(&self) -> &str {
        "Index an installed package from the configured package roots"
    }

    fn is_builtin(&self) -> bool {
        true
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "package": { "type": "string", "description": "Package name to look up" },
                "name": { "type": "string", "description": "Resource identifier (defaults to the package name)" }
            },
            "required": ["package"]
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> anyhow::Result<Value> {
        let state = ctx.state();
        let record =
            state.register_package(opt_str_param(&params, "name"), str_param(&params, "package"))?;
        let record = state.build_resource(&record.identifier).await?;
        Ok(json!({ "resource": serde_json::to_value(&record)? }))
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Search
// ═══════════════════════════════════════════════════════════════════════

/// Search indexed repositories and packages.
pub struct SearchCodebaseTool;

#[async_trait]
impl Tool for SearchCodebaseTool {
    fn name(&self) -> &str {
        "search_codebase"
    }

    fn description(&self) -> &str {
        "Search one or more indexed repositories or packages"
    }

    fn is_builtin(&self) -> bool {
        true
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": { "type": "string", "description": "Search query" },
                "repositories": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "Resource identifiers to search"
                },
                "limit": { "type": "integer", "description": "Hits per resource" }
            },
            "required": ["query", "repositories"]
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> anyhow::Result<Value> {
        let identifiers = string_list(&params, "repositories");
        let limit = params["limit"].as_u64().map(|n| n as usize);
        let results = ctx
            .state()
            .search(str_param(&params, "query"), &identifiers, limit)?;
        Ok(json!({ "results": serde_json::to_value(&results)? }))
    }
}

/// Search indexed documentation sources.
pub struct SearchDocumentationTool;

#[async_trait]
impl Tool for SearchDocumentationTool {
    fn name(&self) -> &str {
        "search_documentation"
    }

    fn description(&self) -> &str {
        "Search one or more indexed documentation sources"
    }

    fn is_builtin(&self) -> bool {
        true
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": { "type": "string", "description": "Search query" },
                "sources": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "Resource identifiers to search"
                },
                "limit": { "type": "integer", "description": "Hits per resource" }
            },
            "required": ["query", "sources"]
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> anyhow::Result<Value> {
        let identifiers = string_list(&params, "sources");
        let limit = params["limit"].as_u64().map(|n| n as usize);
        let results = ctx
            .state()
            .search(str_param(&params, "query"), &identifiers, limit)?;
        Ok(json!({ "results": serde_json::to_value(&results)? }))
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Resource Management
// ═══════════════════════════════════════════════════════════════════════

/// List registered resources, optionally by kind.
pub struct ListResourcesTool;

#[async_trait]
impl Tool for ListResourcesTool {
    fn name(&self) -> &str {
        "list_resources"
    }

    fn description(&self) -> &str {
        "List registered resources and their status"
    }

    fn is_builtin(&self) -> bool {
        true
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "kind": {
                    "type": "string",
                    "enum": ["repository", "documentation", "package"],
                    "description": "Restrict the listing to one resource kind"
                }
            }
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> anyhow::Result<Value> {
        let kind = opt_str_param(&params, "kind");
        let resources = ctx.state().registry.list(kind);
        Ok(json!({ "resources": serde_json::to_value(&resources)? }))
    }
}

/// Report one resource's build status.
pub struct CheckResourceStatusTool;

#[async_trait]
impl Tool for CheckResourceStatusTool {
    fn name(&self) -> &str {
        "check_resource_status"
    }

    fn description(&self) -> &str {
        "Check the build status of a registered resource"
    }

    fn is_builtin(&self) -> bool {
        true
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "identifier": { "type": "string", "description": "Resource identifier" }
            },
            "required": ["identifier"]
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> anyhow::Result<Value> {
        let record = ctx.state().registry.get(str_param(&params, "identifier"))?;
        Ok(json!({
            "identifier": record.identifier,
            "status": serde_json::to_value(&record.status)?,
            "chunk_count": record.chunk_count,
            "updated_at": record.updated_at,
        }))
    }
}

/// Rename a resource, moving its live index handle.
pub struct RenameResourceTool;

#[async_trait]
impl Tool for RenameResourceTool {
    fn name(&self) -> &str {
        "rename_resource"
    }

    fn description(&self) -> &str {
        "Rename a registered resource"
    }

    fn is_builtin(&self) -> bool {
        true
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "identifier": { "type": "string", "description": "Current identifier" },
                "new_name": { "type": "string", "description": "New identifier" }
            },
            "required": ["identifier", "new_name"]
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> anyhow::Result<Value> {
        let record = ctx
            .state()
            .rename_resource(str_param(&params, "identifier"), str_param(&params, "new_name"))?;
        Ok(json!({ "resource": serde_json::to_value(&record)? }))
    }
}

/// Delete a resource and release its index.
pub struct DeleteResourceTool;

#[async_trait]
impl Tool for DeleteResourceTool {
    fn name(&self) -> &str {
        "delete_resource"
    }

    fn description(&self) -> &str {
        "Delete a registered resource and drop its index"
    }

    fn is_builtin(&self) -> bool {
        true
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "identifier": { "type": "string", "description": "Resource identifier" }
            },
            "required": ["identifier"]
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> anyhow::Result<Value> {
        let record = ctx.state().delete_resource(str_param(&params, "identifier"))?;
        Ok(json!({ "deleted": record.identifier }))
    }
}

/// Raw content behind a resource.
pub struct ReadSourceContentTool;

#[async_trait]
impl Tool for ReadSourceContentTool {
    fn name(&self) -> &str {
        "read_source_content"
    }

    fn description(&self) -> &str {
        "Read the raw content behind a resource (file, directory listing, or page)"
    }

    fn is_builtin(&self) -> bool {
        true
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "identifier": { "type": "string", "description": "Resource identifier" }
            },
            "required": ["identifier"]
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> anyhow::Result<Value> {
        let content = ctx
            .state()
            .read_source_content(str_param(&params, "identifier"))
            .await?;
        Ok(json!({ "content": content }))
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Package Inspection
// ═══════════════════════════════════════════════════════════════════════

/// Regex search over an installed package.
pub struct PackageGrepTool;

#[async_trait]
impl Tool for PackageGrepTool {
    fn name(&self) -> &str {
        "package_grep"
    }

    fn description(&self) -> &str {
        "Regex search over an installed package's files"
    }

    fn is_builtin(&self) -> bool {
        true
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "package": { "type": "string", "description": "Package name" },
                "pattern": { "type": "string", "description": "Regex pattern" },
                "max_results": { "type": "integer", "description": "Match cap per file", "default": 50 }
            },
            "required": ["package", "pattern"]
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> anyhow::Result<Value> {
        let max_results = params["max_results"].as_u64().unwrap_or(50) as usize;
        let matches = ctx.state().package_grep(
            str_param(&params, "package"),
            str_param(&params, "pattern"),
            max_results,
        )?;
        Ok(json!({ "matches": matches }))
    }
}

/// Read a file or line range from an installed package.
pub struct PackageReadFileTool;

#[async_trait]
impl Tool for PackageReadFileTool {
    fn name(&self) -> &str {
        "package_read_file"
    }

    fn description(&self) -> &str {
        "Read a file (or line range) from an installed package"
    }

    fn is_builtin(&self) -> bool {
        true
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "package": { "type": "string", "description": "Package name" },
                "file": { "type": "string", "description": "File path relative to the package root" },
                "start_line": { "type": "integer", "description": "First line, 1-based (omit for whole file)" },
                "end_line": { "type": "integer", "description": "Last line, inclusive (omit to read to EOF)" }
            },
            "required": ["package", "file"]
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> anyhow::Result<Value> {
        let start = params["start_line"].as_u64().map(|n| n as usize);
        let end = params["end_line"].as_u64().map(|n| n as usize);
        let range = crate::packages::line_range(start, end);
        let content = ctx.state().package_read(
            str_param(&params, "package"),
            str_param(&params, "file"),
            range,
        )?;
        Ok(json!({ "content": content }))
    }
}

/// Local-or-web package search selector.
pub struct PackageHybridSearchTool;

#[async_trait]
impl Tool for PackageHybridSearchTool {
    fn name(&self) -> &str {
        "package_hybrid_search"
    }

    fn description(&self) -> &str {
        "Search a package locally when installed, or rewrite the query for web search"
    }

    fn is_builtin(&self) -> bool {
        true
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "package": { "type": "string", "description": "Package name" },
                "query": { "type": "string", "description": "Search query" },
                "registry": {
                    "type": "string",
                    "enum": ["local", "web"],
                    "default": "local",
                    "description": "Where to answer from"
                }
            },
            "required": ["package", "query"]
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> anyhow::Result<Value> {
        let outcome = ctx
            .state()
            .hybrid_package_search(
                str_param(&params, "package"),
                str_param(&params, "query"),
                params["registry"].as_str().unwrap_or("local"),
            )
            .await?;
        Ok(serde_json::to_value(&outcome)?)
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Remote Research
// ═══════════════════════════════════════════════════════════════════════

/// Web search through the research API.
pub struct WebSearchTool;

#[async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &str {
        "web_search"
    }

    fn description(&self) -> &str {
        "Web search for content not indexed locally"
    }

    fn is_builtin(&self) -> bool {
        true
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": { "type": "string", "description": "Search objective" },
                "num_results": { "type": "integer", "description": "Result count (capped at 10)", "default": 5 },
                "category": { "type": "string", "description": "Source category refinement" },
                "days_back": { "type": "integer", "description": "Only results newer than this many days" }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> anyhow::Result<Value> {
        let num_results = params["num_results"].as_u64().unwrap_or(5) as usize;
        let days_back = params["days_back"].as_u64().map(|n| n as u32);
        let results = ctx
            .state()
            .web_search(
                str_param(&params, "query"),
                num_results,
                opt_str_param(&params, "category"),
                days_back,
            )
            .await?;
        Ok(json!({ "results": serde_json::to_value(&results)? }))
    }
}

/// Long-form research run.
pub struct DeepResearchTool;

#[async_trait]
impl Tool for DeepResearchTool {
    fn name(&self) -> &str {
        "deep_research"
    }

    fn description(&self) -> &str {
        "Run a long-form research task and wait for its report"
    }

    fn is_builtin(&self) -> bool {
        true
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": { "type": "string", "description": "Research objective" }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> anyhow::Result<Value> {
        let report = ctx.state().deep_research(str_param(&params, "query")).await?;
        Ok(serde_json::to_value(&report)?)
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Development Tools
// ═══════════════════════════════════════════════════════════════════════

/// Import graph for a local resource.
pub struct VisualizeCodebaseTool;

#[async_trait]
impl Tool for VisualizeCodebaseTool {
    fn name(&self) -> &str {
        "visualize_codebase"
    }

    fn description(&self) -> &str {
        "Render the import graph of a repository or package resource"
    }

    fn is_builtin(&self) -> bool {
        true
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "identifier": { "type": "string", "description": "Resource identifier" }
            },
            "required": ["identifier"]
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> anyhow::Result<Value> {
        let graph = ctx.state().visualize(str_param(&params, "identifier"))?;
        Ok(json!({ "graph": graph }))
    }
}

/// Server status snapshot.
pub struct GetServerStatusTool;

#[async_trait]
impl Tool for GetServerStatusTool {
    fn name(&self) -> &str {
        "get_server_status"
    }

    fn description(&self) -> &str {
        "Resource counts, live indexes, cache occupancy, and uptime"
    }

    fn is_builtin(&self) -> bool {
        true
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {}
        })
    }

    async fn execute(&self, _params: Value, ctx: &ToolContext) -> anyhow::Result<Value> {
        Ok(ctx.state().status())
    }
}

/// Editor MCP config bootstrap.
pub struct InitializeProjectTool;

#[async_trait]
impl Tool for InitializeProjectTool {
    fn name(&self) -> &str {
        "initialize_project"
    }

    fn description(&self) -> &str {
        "Write MCP client configuration into a project for Cursor or VS Code"
    }

    fn is_builtin(&self) -> bool {
        true
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "project_root": { "type": "string", "description": "Project directory" },
                "profiles": {
                    "type": "array",
                    "items": { "type": "string", "enum": ["cursor", "vscode"] },
                    "default": ["cursor"],
                    "description": "Editor profiles to configure"
                },
                "force": { "type": "boolean", "default": false, "description": "Overwrite existing config files" }
            },
            "required": ["project_root"]
        })
    }

    async fn execute(&self, params: Value, _ctx: &ToolContext) -> anyhow::Result<Value> {
        let profiles = string_list(&params, "profiles");
        let force = params["force"].as_bool().unwrap_or(false);
        let written = crate::project::initialize_project(
            std::path::Path::new(str_param(&params, "project_root")),
            &profiles,
            force,
        )?;
        let written: Vec<String> = written.iter().map(|p| p.display().to_string()).collect();
        Ok(json!({ "written": written }))
    }
}
