//! # Quarry CLI (`qry`)
//!
//! The `qry` binary is the primary interface for Quarry. It registers and
//! indexes knowledge sources, searches them, inspects installed packages,
//! reaches out to the research API, and starts the tool server.
//!
//! ## Usage
//!
//! ```bash
//! qry --config ./quarry.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `qry index repo <url>` | Clone a repository and build its index |
//! | `qry index docs <url>` | Fetch a documentation page and build its index |
//! | `qry index package <name>` | Index an installed package |
//! | `qry search "<query>" <resources...>` | Search indexed resources |
//! | `qry resources` | List registered resources |
//! | `qry status <identifier>` | Show one resource's build status |
//! | `qry rename <old> <new>` | Rename a resource |
//! | `qry delete <identifier>` | Delete a resource and its index |
//! | `qry pkg grep <package> <pattern>` | Regex search over an installed package |
//! | `qry pkg read <package> <file>` | Read a file from an installed package |
//! | `qry web "<query>"` | Web search through the research API |
//! | `qry research "<query>"` | Run a deep-research task |
//! | `qry graph <identifier>` | Render a resource's import graph |
//! | `qry init-project <root>` | Write editor MCP configuration |
//! | `qry serve` | Start the HTTP tool server |
//!
//! Search output is human-readable on a terminal and JSON when piped, so
//! scripts can consume it directly.

use anyhow::Context;
use clap::{CommandFactory, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use quarry::config::{self, Config};
use quarry::models::{ResourceResults, SearchOutcome};
use quarry::project;
use quarry::server;
use quarry::traits::AppState;

/// Quarry — a knowledge-source registry and retrieval server for coding
/// agents.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/quarry.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "qry",
    about = "Quarry — register, index, and search repositories, documentation, and packages",
    version,
    long_about = "Quarry keeps a registry of knowledge sources (repositories, documentation \
    pages, installed packages), builds searchable indexes over their content, and serves \
    search plus web-research fallback to coding agents over a CLI, an HTTP tool API, and MCP."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./quarry.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Register a knowledge source and build its index.
    Index {
        #[command(subcommand)]
        target: IndexTarget,
    },

    /// Search one or more indexed resources.
    ///
    /// Prints ranked hits per resource. Resources that are registered but
    /// not yet indexed are reported as such rather than failing the search.
    Search {
        /// The search query string.
        query: String,

        /// Resource identifiers to search.
        #[arg(required = true)]
        resources: Vec<String>,

        /// Maximum hits per resource.
        #[arg(long)]
        limit: Option<usize>,
    },

    /// List registered resources and their status.
    Resources {
        /// Restrict the listing to one kind: repository, documentation, package.
        #[arg(long)]
        kind: Option<String>,
    },

    /// Show one resource's build status.
    Status {
        /// Resource identifier.
        identifier: String,
    },

    /// Rename a resource, keeping its index live.
    Rename {
        /// Current identifier.
        identifier: String,
        /// New identifier.
        new_name: String,
    },

    /// Delete a resource and drop its index.
    Delete {
        /// Resource identifier.
        identifier: String,
    },

    /// Inspect installed packages directly.
    Pkg {
        #[command(subcommand)]
        action: PkgAction,
    },

    /// Web search through the research API.
    Web {
        /// Search objective.
        query: String,

        /// Result count (capped at 10).
        #[arg(long, default_value_t = 5)]
        num_results: usize,

        /// Source category refinement.
        #[arg(long)]
        category: Option<String>,

        /// Only results newer than this many days.
        #[arg(long)]
        days_back: Option<u32>,
    },

    /// Run a deep-research task and wait for its report.
    Research {
        /// Research objective.
        query: String,
    },

    /// Render the import graph of a repository or package resource.
    Graph {
        /// Resource identifier.
        identifier: String,
    },

    /// Write MCP client configuration into a project.
    InitProject {
        /// Project directory.
        root: PathBuf,

        /// Editor profiles to configure: cursor, vscode. Repeatable.
        #[arg(long = "profile", default_values_t = [String::from("cursor")])]
        profiles: Vec<String>,

        /// Overwrite existing config files.
        #[arg(long)]
        force: bool,
    },

    /// Start the HTTP tool server.
    ///
    /// Binds to the address configured in `[server].bind` and serves the
    /// tool API endpoints until the process is terminated.
    Serve,

    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for.
        shell: clap_complete::Shell,
    },
}

/// What kind of knowledge source to index.
#[derive(Subcommand)]
enum IndexTarget {
    /// Clone a repository and index its files.
    Repo {
        /// Clone URL.
        url: String,
        /// Resource identifier (defaults to the repository name).
        #[arg(long)]
        name: Option<String>,
        /// Branch to clone (defaults to the remote default).
        #[arg(long)]
        branch: Option<String>,
    },
    /// Fetch a documentation page and index it.
    Docs {
        /// Page URL (HTML, PDF, or plain text).
        url: String,
        /// Resource identifier (defaults to the last URL segment).
        #[arg(long)]
        name: Option<String>,
    },
    /// Index an installed package from the configured package roots.
    Package {
        /// Package name to look up.
        package: String,
        /// Resource identifier (defaults to the package name).
        #[arg(long)]
        name: Option<String>,
    },
}

/// Package inspection subcommands.
#[derive(Subcommand)]
enum PkgAction {
    /// Regex search over a package's installed files.
    Grep {
        /// Package name.
        package: String,
        /// Regex pattern.
        pattern: String,
        /// Match cap per file.
        #[arg(long, default_value_t = 50)]
        max_results: usize,
    },
    /// Read a file (or line range) from an installed package.
    Read {
        /// Package name.
        package: String,
        /// File path relative to the package root.
        file: String,
        /// First line, 1-based (omit for whole file).
        #[arg(long)]
        start: Option<usize>,
        /// Last line, inclusive (omit to read to EOF).
        #[arg(long)]
        end: Option<usize>,
    },
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("quarry=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    // Commands that don't require config
    match &cli.command {
        Commands::Completions { shell } => {
            clap_complete::generate(*shell, &mut Cli::command(), "qry", &mut std::io::stdout());
            return Ok(());
        }
        Commands::InitProject {
            root,
            profiles,
            force,
        } => {
            let written = project::initialize_project(root, profiles, *force)?;
            for path in written {
                println!("Wrote {}", path.display());
            }
            return Ok(());
        }
        _ => {}
    }

    let cfg = load_or_default(&cli.config)?;
    let state = Arc::new(AppState::new(cfg)?);

    match cli.command {
        Commands::Index { target } => {
            let record = match target {
                IndexTarget::Repo { url, name, branch } => {
                    let record =
                        state.register_repository(name.as_deref(), &url, branch.as_deref())?;
                    state.build_resource(&record.identifier).await?
                }
                IndexTarget::Docs { url, name } => {
                    let record = state.register_documentation(name.as_deref(), &url)?;
                    state.build_resource(&record.identifier).await?
                }
                IndexTarget::Package { package, name } => {
                    let record = state.register_package(name.as_deref(), &package)?;
                    state.build_resource(&record.identifier).await?
                }
            };
            println!(
                "Indexed {} ({} chunks)",
                record.identifier,
                record.chunk_count.unwrap_or(0)
            );
        }
        Commands::Search {
            query,
            resources,
            limit,
        } => {
            let results = state.search(&query, &resources, limit)?;
            print_search_results(&results)?;
        }
        Commands::Resources { kind } => {
            let resources = state.registry.list(kind.as_deref());
            if resources.is_empty() {
                println!("No resources registered.");
            } else {
                println!(
                    "{:<28} {:<14} {:<8} {:>7}  LOCATION",
                    "IDENTIFIER", "KIND", "STATUS", "CHUNKS"
                );
                for record in resources {
                    println!(
                        "{:<28} {:<14} {:<8} {:>7}  {}",
                        record.identifier,
                        record.kind.label(),
                        record.status.label(),
                        record
                            .chunk_count
                            .map(|n| n.to_string())
                            .unwrap_or_else(|| "-".to_string()),
                        record.kind.location(),
                    );
                }
            }
        }
        Commands::Status { identifier } => {
            let record = state.registry.get(&identifier)?;
            println!("{}: {}", record.identifier, record.status.label());
            if let quarry::models::ResourceStatus::Error { message } = &record.status {
                println!("  {}", message);
            }
            if let Some(count) = record.chunk_count {
                println!("  {} chunks, updated {}", count, record.updated_at);
            }
        }
        Commands::Rename {
            identifier,
            new_name,
        } => {
            let record = state.rename_resource(&identifier, &new_name)?;
            println!("Renamed {} to {}", identifier, record.identifier);
        }
        Commands::Delete { identifier } => {
            let record = state.delete_resource(&identifier)?;
            println!("Deleted {}", record.identifier);
        }
        Commands::Pkg { action } => match action {
            PkgAction::Grep {
                package,
                pattern,
                max_results,
            } => {
                let matches = state.package_grep(&package, &pattern, max_results)?;
                if matches.is_empty() {
                    println!("No matches.");
                } else {
                    print!("{}", matches);
                }
            }
            PkgAction::Read {
                package,
                file,
                start,
                end,
            } => {
                let range = quarry::packages::line_range(start, end);
                let content = state.package_read(&package, &file, range)?;
                print!("{}", content);
                if !content.ends_with('\n') {
                    println!();
                }
            }
        },
        Commands::Web {
            query,
            num_results,
            category,
            days_back,
        } => {
            let results = state
                .web_search(&query, num_results, category.as_deref(), days_back)
                .await?;
            if results.is_empty() {
                println!("No results.");
            }
            for result in results {
                println!("{}\n  {}", result.title, result.url);
                for excerpt in &result.excerpts {
                    println!("  > {}", excerpt.replace('\n', " "));
                }
            }
        }
        Commands::Research { query } => {
            let report = state.deep_research(&query).await?;
            println!("run {}\n", report.run_id);
            println!("{}", report.content);
        }
        Commands::Graph { identifier } => {
            println!("{}", state.visualize(&identifier)?);
        }
        Commands::Serve => {
            server::run_server(state).await?;
        }
        Commands::Completions { .. } | Commands::InitProject { .. } => {
            // Handled above (before config loading)
            unreachable!()
        }
    }

    Ok(())
}

/// Load config, falling back to defaults when no config file exists so
/// first-run commands work out of the box.
fn load_or_default(path: &PathBuf) -> anyhow::Result<Config> {
    if path.exists() {
        config::load_config(path).with_context(|| format!("loading {}", path.display()))
    } else {
        Ok(Config::minimal())
    }
}

/// Human-readable search output on a terminal, JSON when piped.
fn print_search_results(results: &[ResourceResults]) -> anyhow::Result<()> {
    if !atty::is(atty::Stream::Stdout) {
        println!("{}", serde_json::to_string_pretty(results)?);
        return Ok(());
    }

    for result in results {
        match &result.outcome {
            SearchOutcome::Hits { hits } => {
                println!("{} ({} hits)", result.identifier, hits.len());
                for hit in hits {
                    let path = hit.source_path.as_deref().unwrap_or("-");
                    println!("  [{:.3}] {}", hit.score, path);
                    println!("      {}", hit.snippet.replace('\n', " "));
                }
            }
            SearchOutcome::NotIndexed => {
                println!("{}: not indexed", result.identifier);
            }
            SearchOutcome::Failed { message } => {
                println!("{}: failed ({})", result.identifier, message);
            }
        }
    }
    Ok(())
}
