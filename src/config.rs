use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub storage: StorageConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub walk: WalkConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub packages: PackagesConfig,
    #[serde(default)]
    pub research: ResearchConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    /// Root directory for the registry snapshot and clone cache.
    pub root: PathBuf,
}

impl StorageConfig {
    /// Path of the registry snapshot file.
    pub fn registry_path(&self) -> PathBuf {
        self.root.join("registry.json")
    }

    /// Directory repositories are cloned into.
    pub fn clones_dir(&self) -> PathBuf {
        self.root.join("clones")
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_target_chars")]
    pub target_chars: usize,
    #[serde(default = "default_overlap_chars")]
    pub overlap_chars: usize,
    /// Minimum span length for a code-mode definition chunk.
    #[serde(default = "default_min_code_chars")]
    pub min_code_chars: usize,
    /// Upper bound on chunks taken from a single document.
    #[serde(default = "default_max_chunks_per_doc")]
    pub max_chunks_per_doc: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            target_chars: default_target_chars(),
            overlap_chars: default_overlap_chars(),
            min_code_chars: default_min_code_chars(),
            max_chunks_per_doc: default_max_chunks_per_doc(),
        }
    }
}

fn default_target_chars() -> usize {
    1000
}
fn default_overlap_chars() -> usize {
    200
}
fn default_min_code_chars() -> usize {
    50
}
fn default_max_chunks_per_doc() -> usize {
    1000
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    /// Hits returned per resource in a search.
    #[serde(default = "default_per_resource_limit")]
    pub per_resource_limit: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            per_resource_limit: default_per_resource_limit(),
        }
    }
}

fn default_per_resource_limit() -> usize {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct WalkConfig {
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    #[serde(default = "default_exclude_globs")]
    pub exclude_globs: Vec<String>,
    /// Files larger than this are skipped during indexing.
    #[serde(default = "default_max_file_bytes")]
    pub max_file_bytes: u64,
}

impl Default for WalkConfig {
    fn default() -> Self {
        Self {
            include_globs: default_include_globs(),
            exclude_globs: default_exclude_globs(),
            max_file_bytes: default_max_file_bytes(),
        }
    }
}

fn default_include_globs() -> Vec<String> {
    vec!["**/*".to_string()]
}

fn default_exclude_globs() -> Vec<String> {
    [
        "**/.git/**",
        "**/target/**",
        "**/node_modules/**",
        "**/dist/**",
        "**/vendor/**",
        "**/*.lock",
        "**/*.min.js",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_max_file_bytes() -> u64 {
    512 * 1024
}

#[derive(Debug, Deserialize, Clone)]
pub struct FetchConfig {
    /// Timeout for documentation page downloads.
    #[serde(default = "default_fetch_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_fetch_timeout_secs(),
        }
    }
}

fn default_fetch_timeout_secs() -> u64 {
    10
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct PackagesConfig {
    /// Directories scanned for installed packages, in priority order
    /// (e.g. a virtualenv `site-packages`, `node_modules`, a vendor dir).
    #[serde(default)]
    pub roots: Vec<PathBuf>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ResearchConfig {
    #[serde(default = "default_research_base_url")]
    pub base_url: String,
    /// Environment variable holding the research API credential.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_research_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_poll_attempts")]
    pub poll_attempts: u32,
}

impl Default for ResearchConfig {
    fn default() -> Self {
        Self {
            base_url: default_research_base_url(),
            api_key_env: default_api_key_env(),
            timeout_secs: default_research_timeout_secs(),
            poll_interval_ms: default_poll_interval_ms(),
            poll_attempts: default_poll_attempts(),
        }
    }
}

fn default_research_base_url() -> String {
    "https://api.parallel.ai".to_string()
}
fn default_api_key_env() -> String {
    "PARALLEL_API_KEY".to_string()
}
fn default_research_timeout_secs() -> u64 {
    30
}
fn default_poll_interval_ms() -> u64 {
    2000
}
fn default_poll_attempts() -> u32 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct CacheConfig {
    #[serde(default = "default_grep_entries")]
    pub grep_entries: usize,
    #[serde(default = "default_web_entries")]
    pub web_entries: usize,
    #[serde(default = "default_read_entries")]
    pub read_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            grep_entries: default_grep_entries(),
            web_entries: default_web_entries(),
            read_entries: default_read_entries(),
        }
    }
}

fn default_grep_entries() -> usize {
    256
}
fn default_web_entries() -> usize {
    128
}
fn default_read_entries() -> usize {
    64
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:7400".to_string()
}

impl Config {
    /// A configuration with every default, rooted at `./quarry-data`.
    ///
    /// Used by tests and by commands that can run without a config file.
    pub fn minimal() -> Self {
        Self {
            storage: StorageConfig {
                root: PathBuf::from("./quarry-data"),
            },
            chunking: ChunkingConfig::default(),
            retrieval: RetrievalConfig::default(),
            walk: WalkConfig::default(),
            fetch: FetchConfig::default(),
            packages: PackagesConfig::default(),
            research: ResearchConfig::default(),
            cache: CacheConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

/// Expand a leading `~` to `$HOME`.
fn expand_tilde(path: &Path) -> PathBuf {
    if let Ok(stripped) = path.strip_prefix("~") {
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home).join(stripped);
        }
    }
    path.to_path_buf()
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let mut config: Config =
        toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    config.storage.root = expand_tilde(&config.storage.root);

    // Validate chunking
    if config.chunking.target_chars == 0 {
        anyhow::bail!("chunking.target_chars must be > 0");
    }
    if config.chunking.overlap_chars >= config.chunking.target_chars {
        anyhow::bail!("chunking.overlap_chars must be smaller than chunking.target_chars");
    }
    if config.chunking.max_chunks_per_doc == 0 {
        anyhow::bail!("chunking.max_chunks_per_doc must be > 0");
    }

    // Validate retrieval
    if config.retrieval.per_resource_limit < 1 {
        anyhow::bail!("retrieval.per_resource_limit must be >= 1");
    }

    // Validate research polling
    if config.research.poll_attempts == 0 {
        anyhow::bail!("research.poll_attempts must be > 0");
    }

    // Validate cache bounds
    if config.cache.grep_entries == 0 || config.cache.web_entries == 0 || config.cache.read_entries == 0
    {
        anyhow::bail!("cache capacities must be >= 1");
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(content: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("quarry.toml");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(content.as_bytes()).unwrap();
        (dir, path)
    }

    #[test]
    fn test_defaults_fill_in() {
        let (_dir, path) = write_config("[storage]\nroot = \"/tmp/quarry\"\n");
        let cfg = load_config(&path).unwrap();
        assert_eq!(cfg.chunking.target_chars, 1000);
        assert_eq!(cfg.chunking.overlap_chars, 200);
        assert_eq!(cfg.cache.grep_entries, 256);
        assert_eq!(cfg.research.poll_attempts, 30);
        assert_eq!(cfg.server.bind, "127.0.0.1:7400");
        assert_eq!(cfg.storage.registry_path(), PathBuf::from("/tmp/quarry/registry.json"));
    }

    #[test]
    fn test_overlap_must_stay_below_target() {
        let (_dir, path) = write_config(
            "[storage]\nroot = \"/tmp/quarry\"\n[chunking]\ntarget_chars = 100\noverlap_chars = 100\n",
        );
        let err = load_config(&path).unwrap_err();
        assert!(err.to_string().contains("overlap_chars"));
    }

    #[test]
    fn test_zero_cache_capacity_rejected() {
        let (_dir, path) =
            write_config("[storage]\nroot = \"/tmp/quarry\"\n[cache]\ngrep_entries = 0\n");
        assert!(load_config(&path).is_err());
    }
}
