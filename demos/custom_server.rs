//! Example: custom Quarry server binary with a Rust tool extension.
//!
//! Demonstrates building a custom binary that extends the tool server with
//! a **`best_hit`** tool: it searches a set of resources and returns only
//! the single strongest hit per resource, a compact shape for agents that
//! want one answer, not a ranked list.
//!
//! # Running
//!
//! ```bash
//! # 1. Create a config file
//! mkdir -p /tmp/quarry-demo
//! cat > /tmp/quarry-demo/quarry.toml << 'EOF'
//! [storage]
//! root = "/tmp/quarry-demo/data"
//!
//! [packages]
//! roots = ["/usr/lib/python3/dist-packages"]
//!
//! [server]
//! bind = "127.0.0.1:7400"
//! EOF
//!
//! # 2. Run the custom server
//! cargo run --example custom_server -- /tmp/quarry-demo/quarry.toml
//!
//! # 3. Call the extension tool
//! curl -s -X POST http://127.0.0.1:7400/tools/best_hit \
//!   -H 'Content-Type: application/json' \
//!   -d '{"query": "retry backoff", "resources": ["requests"]}'
//! ```

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

use quarry::config;
use quarry::models::SearchOutcome;
use quarry::server::run_server_with_extensions;
use quarry::traits::{AppState, Tool, ToolContext, ToolRegistry};

/// Returns the strongest hit per resource instead of a ranked list.
struct BestHitTool;

#[async_trait]
impl Tool for BestHitTool {
    fn name(&self) -> &str {
        "best_hit"
    }

    fn description(&self) -> &str {
        "Return only the single best hit per resource for a query"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": { "type": "string", "description": "Search query" },
                "resources": {
                    "type": "array",
                    "description": "Resource identifiers to search"
                }
            },
            "required": ["query", "resources"]
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value> {
        let query = params["query"].as_str().unwrap_or("");
        let resources: Vec<String> = params["resources"]
            .as_array()
            .map(|a| {
                a.iter()
                    .filter_map(|v| v.as_str().map(String::from))
                    .collect()
            })
            .unwrap_or_default();

        let results = ctx.state().search(query, &resources, Some(1))?;
        let best: Vec<Value> = results
            .iter()
            .map(|r| match &r.outcome {
                SearchOutcome::Hits { hits } if !hits.is_empty() => json!({
                    "identifier": r.identifier,
                    "score": hits[0].score,
                    "snippet": hits[0].snippet,
                    "source_path": hits[0].source_path,
                }),
                _ => json!({ "identifier": r.identifier, "snippet": null }),
            })
            .collect();

        Ok(json!({ "best": best }))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "./quarry.toml".to_string());
    let cfg = config::load_config(std::path::Path::new(&config_path))?;
    let state = Arc::new(AppState::new(cfg)?);

    let mut tools = ToolRegistry::new();
    tools.register(Box::new(BestHitTool));

    run_server_with_extensions(state, Arc::new(tools)).await
}
