//! HTTP tool server.
//!
//! Exposes every registered tool over a JSON HTTP API suitable for Cursor,
//! Claude, and other MCP-compatible clients. Built-in tools and custom
//! [`Tool`](crate::traits::Tool) implementations are dispatched through the
//! same `POST /tools/{name}` handler.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/tools/list` | List all registered tools with schemas |
//! | `POST` | `/tools/{name}` | Call any registered tool by name |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! Error responses carry a machine-readable code and a message:
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "query must not be empty" } }
//! ```
//!
//! Codes map from the error taxonomy: `bad_request` (400), `not_found` (404),
//! `conflict` (409), `unavailable` (503), `remote_failure` (502),
//! `build_failure` (500), `still_processing` (202), `tool_error` (500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted to support browser-based
//! clients and cross-origin tool calls.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::error::Error;
use crate::traits::{AppState, ToolContext, ToolInfo, ToolRegistry, validate_params};

/// Shared state passed to all route handlers via Axum's `State` extractor.
#[derive(Clone)]
struct ServerState {
    app: Arc<AppState>,
    /// Built-in tools plus any registered at startup.
    tools: Arc<ToolRegistry>,
}

/// Starts the HTTP tool server with the built-in tool set.
///
/// Binds to the address configured in `[server].bind` and runs until the
/// process is terminated.
pub async fn run_server(app: Arc<AppState>) -> anyhow::Result<()> {
    run_server_with_extensions(app, Arc::new(ToolRegistry::new())).await
}

/// Starts the HTTP tool server with custom tool extensions.
///
/// Extension tools appear in `GET /tools/list` alongside the built-ins and
/// can be called via `POST /tools/{name}`. A built-in wins a name collision.
pub async fn run_server_with_extensions(
    app: Arc<AppState>,
    extra_tools: Arc<ToolRegistry>,
) -> anyhow::Result<()> {
    let bind_addr = app.config.server.bind.clone();
    let registry = ToolRegistry::with_builtins();

    println!("Registered {} tools:", registry.len() + extra_tools.len());
    for t in registry.tools() {
        println!("  POST /tools/{} — {}", t.name(), t.description());
    }
    for t in extra_tools.tools() {
        println!("  POST /tools/{} — {} (extension)", t.name(), t.description());
    }

    let state = ServerState {
        app,
        tools: Arc::new(registry),
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let router = Router::new()
        .route("/tools/list", get(handle_list_tools))
        .route("/tools/{name}", post(handle_tool_call))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state((state, extra_tools));

    println!("Tool server listening on http://{}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, router).await?;

    Ok(())
}

// ============ Error response ============

/// JSON error response body.
#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    /// Machine-readable error code (e.g., `"bad_request"`, `"not_found"`).
    code: String,
    /// Human-readable error message.
    message: String,
}

/// Internal error type that converts into an Axum HTTP response.
struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found".to_string(),
        message: message.into(),
    }
}

fn tool_error(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "tool_error".to_string(),
        message: message.into(),
    }
}

/// Maps tool execution errors to HTTP responses. Typed errors from the
/// taxonomy carry their own status; anything else falls back to a message
/// sniff so extension tools using plain `anyhow` still get sane codes.
fn classify_tool_error(tool_name: &str, err: anyhow::Error) -> AppError {
    if let Some(app_err) = err.downcast_ref::<Error>() {
        let (status, code) = match app_err {
            Error::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            Error::Conflict(_) => (StatusCode::CONFLICT, "conflict"),
            Error::InvalidInput(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            Error::Unavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, "unavailable"),
            Error::RemoteFailure(_) => (StatusCode::BAD_GATEWAY, "remote_failure"),
            Error::BuildFailure(_) => (StatusCode::INTERNAL_SERVER_ERROR, "build_failure"),
            Error::StillProcessing { .. } => (StatusCode::ACCEPTED, "still_processing"),
        };
        return AppError {
            status,
            code: code.to_string(),
            message: format!("{}: {}", tool_name, app_err),
        };
    }

    let msg = err.to_string();
    if msg.contains("not found") {
        not_found(format!("{}: {}", tool_name, msg))
    } else if msg.contains("must not be empty") || msg.contains("invalid") {
        bad_request(format!("{}: {}", tool_name, msg))
    } else {
        tool_error(format!("{}: {}", tool_name, msg))
    }
}

// ============ GET /health ============

/// JSON response body for `GET /health`.
#[derive(Serialize)]
struct HealthResponse {
    /// Always `"ok"` when the server is running.
    status: String,
    /// The crate version from `Cargo.toml`.
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ GET /tools/list ============

/// JSON response body for `GET /tools/list`.
#[derive(Serialize)]
struct ToolListResponse {
    tools: Vec<ToolInfo>,
}

/// Returns all registered tools with their parameter schemas.
async fn handle_list_tools(
    State((state, extras)): State<(ServerState, Arc<ToolRegistry>)>,
) -> Json<ToolListResponse> {
    let mut tools: Vec<ToolInfo> = state
        .tools
        .tools()
        .iter()
        .map(|t| ToolInfo {
            name: t.name().to_string(),
            description: t.description().to_string(),
            builtin: t.is_builtin(),
            parameters: t.parameters_schema(),
        })
        .collect();

    for t in extras.tools() {
        tools.push(ToolInfo {
            name: t.name().to_string(),
            description: t.description().to_string(),
            builtin: t.is_builtin(),
            parameters: t.parameters_schema(),
        });
    }

    Json(ToolListResponse { tools })
}

// ============ POST /tools/{name} ============

/// Unified tool dispatch: look up the tool (built-ins first, then
/// extensions), validate parameters against its schema, execute.
async fn handle_tool_call(
    State((state, extras)): State<(ServerState, Arc<ToolRegistry>)>,
    Path(name): Path<String>,
    Json(params): Json<serde_json::Value>,
) -> Result<Json<serde_json::Value>, AppError> {
    let tool = state
        .tools
        .find(&name)
        .or_else(|| extras.find(&name))
        .ok_or_else(|| not_found(format!("no tool registered with name: {}", name)))?;

    let validated_params = validate_params(&tool.parameters_schema(), &params)
        .map_err(|e| bad_request(e.to_string()))?;

    let ctx = ToolContext::new(state.app.clone());
    let result = tool
        .execute(validated_params, &ctx)
        .await
        .map_err(|e| classify_tool_error(&name, e))?;

    Ok(Json(serde_json::json!({ "result": result })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typed_errors_map_to_status_codes() {
        let cases = [
            (Error::NotFound("x".into()), StatusCode::NOT_FOUND, "not_found"),
            (Error::Conflict("x".into()), StatusCode::CONFLICT, "conflict"),
            (Error::InvalidInput("x".into()), StatusCode::BAD_REQUEST, "bad_request"),
            (Error::Unavailable("x".into()), StatusCode::SERVICE_UNAVAILABLE, "unavailable"),
            (Error::RemoteFailure("x".into()), StatusCode::BAD_GATEWAY, "remote_failure"),
            (Error::BuildFailure("x".into()), StatusCode::INTERNAL_SERVER_ERROR, "build_failure"),
            (
                Error::StillProcessing { run_id: "r1".into() },
                StatusCode::ACCEPTED,
                "still_processing",
            ),
        ];
        for (err, status, code) in cases {
            let mapped = classify_tool_error("demo", anyhow::Error::new(err));
            assert_eq!(mapped.status, status);
            assert_eq!(mapped.code, code);
            assert!(mapped.message.starts_with("demo: "));
        }
    }

    #[test]
    fn test_untyped_errors_fall_back_to_message_sniff() {
        let mapped = classify_tool_error("demo", anyhow::anyhow!("thing not found"));
        assert_eq!(mapped.status, StatusCode::NOT_FOUND);

        let mapped = classify_tool_error("demo", anyhow::anyhow!("query must not be empty"));
        assert_eq!(mapped.status, StatusCode::BAD_REQUEST);

        let mapped = classify_tool_error("demo", anyhow::anyhow!("boom"));
        assert_eq!(mapped.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(mapped.code, "tool_error");
    }
}
