//! TOML configuration parsing and validation.
//!
//! All provider settings are explicit configuration values; nothing is
//! pulled from ambient environment variables at call sites.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use shareindex_core::security::Severity;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    pub share: ShareConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub reasoning: Option<ReasoningConfig>,
    #[serde(default)]
    pub security: SecurityConfig,
    #[serde(default)]
    pub workflow: WorkflowConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

/// Local mount point of the remote file share.
#[derive(Debug, Deserialize, Clone)]
pub struct ShareConfig {
    pub root: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default)]
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            overlap: 0,
        }
    }
}

fn default_chunk_size() -> usize {
    500
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_alpha")]
    pub alpha: f64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            alpha: default_alpha(),
        }
    }
}

fn default_top_k() -> usize {
    5
}
fn default_alpha() -> f64 {
    0.6
}

/// OpenAI-compatible embedding endpoint.
#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    /// Base URL, e.g. `"http://localhost:11434"`.
    pub base_url: String,
    pub model: String,
    pub dims: usize,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Bearer token, if the endpoint requires one.
    #[serde(default)]
    pub api_key: Option<String>,
}

fn default_timeout_secs() -> u64 {
    30
}
fn default_max_retries() -> u32 {
    5
}

/// OpenAI-compatible chat-completions endpoint for log analysis.
#[derive(Debug, Deserialize, Clone)]
pub struct ReasoningConfig {
    pub base_url: String,
    pub model: String,
    #[serde(default = "default_reasoning_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_tool_turns")]
    pub max_tool_turns: u32,
}

fn default_reasoning_timeout_secs() -> u64 {
    120
}
fn default_max_tool_turns() -> u32 {
    15
}

#[derive(Debug, Deserialize, Clone)]
pub struct SecurityConfig {
    #[serde(default = "default_log_directory")]
    pub log_directory: String,
    #[serde(default)]
    pub recipients: Vec<String>,
    #[serde(default = "default_threshold")]
    pub threshold: String,
    /// Alert webhook; alerts are skipped when unset.
    #[serde(default)]
    pub webhook_url: Option<String>,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            log_directory: default_log_directory(),
            recipients: Vec::new(),
            threshold: default_threshold(),
            webhook_url: None,
        }
    }
}

fn default_log_directory() -> String {
    "logs".to_string()
}
fn default_threshold() -> String {
    "medium".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct WorkflowConfig {
    #[serde(default = "default_ingest_budget_secs")]
    pub ingest_budget_secs: u64,
    #[serde(default = "default_scan_budget_secs")]
    pub scan_budget_secs: u64,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            ingest_budget_secs: default_ingest_budget_secs(),
            scan_budget_secs: default_scan_budget_secs(),
        }
    }
}

fn default_ingest_budget_secs() -> u64 {
    600
}
fn default_scan_budget_secs() -> u64 {
    300
}

impl SecurityConfig {
    pub fn threshold(&self) -> Result<Severity> {
        self.threshold
            .parse()
            .map_err(|e| anyhow::anyhow!("security.threshold: {e}"))
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    if config.chunking.chunk_size == 0 {
        anyhow::bail!("chunking.chunk_size must be > 0");
    }
    if config.chunking.overlap >= config.chunking.chunk_size {
        anyhow::bail!("chunking.overlap must be < chunking.chunk_size");
    }

    if config.retrieval.top_k == 0 {
        anyhow::bail!("retrieval.top_k must be >= 1");
    }
    if !(0.0..=1.0).contains(&config.retrieval.alpha) {
        anyhow::bail!("retrieval.alpha must be in [0.0, 1.0]");
    }

    if config.embedding.dims == 0 {
        anyhow::bail!("embedding.dims must be > 0");
    }
    if config.embedding.base_url.is_empty() {
        anyhow::bail!("embedding.base_url must not be empty");
    }

    config.security.threshold()?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(body: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(body.as_bytes()).unwrap();
        file
    }

    const MINIMAL: &str = r#"
[db]
path = "data/sidx.db"

[share]
root = "/mnt/share"

[embedding]
base_url = "http://localhost:11434"
model = "nomic-embed-text"
dims = 768
"#;

    #[test]
    fn test_minimal_config_with_defaults() {
        let file = write_config(MINIMAL);
        let config = load_config(file.path()).unwrap();
        assert_eq!(config.chunking.chunk_size, 500);
        assert_eq!(config.chunking.overlap, 0);
        assert_eq!(config.retrieval.top_k, 5);
        assert_eq!(config.retrieval.alpha, 0.6);
        assert_eq!(config.security.log_directory, "logs");
        assert_eq!(config.security.threshold().unwrap(), Severity::Medium);
        assert_eq!(config.workflow.ingest_budget_secs, 600);
        assert!(config.reasoning.is_none());
    }

    #[test]
    fn test_rejects_bad_alpha() {
        let body = format!("{MINIMAL}\n[retrieval]\nalpha = 1.5\n");
        let file = write_config(&body);
        let err = load_config(file.path()).unwrap_err();
        assert!(err.to_string().contains("alpha"));
    }

    #[test]
    fn test_rejects_overlap_ge_chunk_size() {
        let body = format!("{MINIMAL}\n[chunking]\nchunk_size = 10\noverlap = 10\n");
        let file = write_config(&body);
        assert!(load_config(file.path()).is_err());
    }

    #[test]
    fn test_rejects_unknown_threshold() {
        let body = format!("{MINIMAL}\n[security]\nthreshold = \"urgent\"\n");
        let file = write_config(&body);
        assert!(load_config(file.path()).is_err());
    }
}
