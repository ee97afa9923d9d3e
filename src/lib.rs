//! # Quarry
//!
//! A knowledge-source registry and retrieval server for coding agents.
//!
//! Quarry registers external knowledge sources (Git repositories,
//! documentation pages, installed packages), chunks their content, builds an
//! in-process searchable index per source, and answers search requests over a
//! CLI, an HTTP tool API, and MCP. When local sources can't answer, it falls
//! back to a remote research API for web search and deep research.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌───────────┐
//! │  Resources   │──▶│   Builder    │──▶│  Indexes  │
//! │ repo/doc/pkg │   │ fetch+chunk  │   │ in memory │
//! └──────────────┘   └──────────────┘   └─────┬─────┘
//!                                             │
//!                        ┌────────────────────┤
//!                        ▼                    ▼
//!                  ┌──────────┐         ┌──────────┐
//!                  │   CLI    │         │   HTTP   │
//!                  │  (qry)   │         │  + MCP   │
//!                  └──────────┘         └──────────┘
//!                        │                    │
//!                        └───────┬────────────┘
//!                                ▼
//!                         ┌────────────┐
//!                         │  Research  │
//!                         │ web/deep   │
//!                         └────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! qry index repo https://github.com/tokio-rs/tokio
//! qry index docs https://docs.python.org/3/library/asyncio.html
//! qry search "spawn a task" tokio
//! qry pkg grep requests "def get"
//! qry web "rust async cancellation"
//! qry serve                      # start the HTTP tool server
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`registry`] | Persistent resource registry |
//! | [`chunk`] | Content chunking |
//! | [`syntax`] | Structural scanning for code-mode chunking |
//! | [`ingest`] | Index builds with per-resource claims |
//! | [`backend`] | Index build/query seam and the term index |
//! | [`search`] | Per-resource search dispatch |
//! | [`repo`] | Repository cloning |
//! | [`fetch`] | Documentation fetching |
//! | [`extract`] | HTML/PDF text extraction |
//! | [`packages`] | Installed-package lookup, grep, and reads |
//! | [`graph`] | Import-graph rendering |
//! | [`research`] | Remote research API client |
//! | [`cache`] | Bounded LRU caches for tool calls |
//! | [`tools`] | Built-in tool implementations |
//! | [`traits`] | Application state and the tool abstraction |
//! | [`server`] | HTTP tool server |
//! | [`mcp`] | MCP bridge over the tool registry |
//! | [`project`] | Editor MCP configuration bootstrap |

pub mod backend;
pub mod cache;
pub mod chunk;
pub mod config;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod graph;
pub mod ingest;
pub mod mcp;
pub mod models;
pub mod packages;
pub mod project;
pub mod registry;
pub mod repo;
pub mod research;
pub mod search;
pub mod server;
pub mod syntax;
pub mod tools;
pub mod traits;
