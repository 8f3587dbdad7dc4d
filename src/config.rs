use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub library: LibraryConfig,
    pub db: DbConfig,
    #[serde(default)]
    pub ollama: OllamaConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub memory: MemoryConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LibraryConfig {
    /// Directory holding the source volumes (.pdf, .txt, .md).
    pub docs_dir: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
    pub registry_path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct OllamaConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_llm_model")]
    pub llm_model: String,
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_summary_temperature")]
    pub summary_temperature: f32,
    #[serde(default = "default_num_ctx")]
    pub num_ctx: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            llm_model: default_llm_model(),
            embedding_model: default_embedding_model(),
            temperature: default_temperature(),
            summary_temperature: default_summary_temperature(),
            num_ctx: default_num_ctx(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            batch_size: default_batch_size(),
        }
    }
}

fn default_base_url() -> String {
    "http://localhost:11434".to_string()
}
fn default_llm_model() -> String {
    "llama3.2:latest".to_string()
}
fn default_embedding_model() -> String {
    "mxbai-embed-large".to_string()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_summary_temperature() -> f32 {
    0.3
}
fn default_num_ctx() -> u32 {
    8192
}
fn default_timeout_secs() -> u64 {
    120
}
fn default_max_retries() -> u32 {
    5
}
fn default_batch_size() -> usize {
    64
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
        }
    }
}

fn default_chunk_size() -> usize {
    1000
}
fn default_chunk_overlap() -> usize {
    200
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_k")]
    pub k: usize,
    #[serde(default = "default_search_type")]
    pub search_type: String,
    #[serde(default = "default_fetch_k")]
    pub fetch_k: usize,
    #[serde(default = "default_lambda_mult")]
    pub lambda_mult: f32,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            k: default_k(),
            search_type: default_search_type(),
            fetch_k: default_fetch_k(),
            lambda_mult: default_lambda_mult(),
        }
    }
}

fn default_k() -> usize {
    5
}
fn default_search_type() -> String {
    "similarity".to_string()
}
fn default_fetch_k() -> usize {
    20
}
fn default_lambda_mult() -> f32 {
    0.5
}

#[derive(Debug, Deserialize, Clone)]
pub struct MemoryConfig {
    #[serde(default = "default_max_messages")]
    pub max_messages: usize,
    #[serde(default = "default_display_turns")]
    pub display_turns: usize,
    #[serde(default = "default_display_truncate")]
    pub display_truncate: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            max_messages: default_max_messages(),
            display_turns: default_display_turns(),
            display_truncate: default_display_truncate(),
        }
    }
}

fn default_max_messages() -> usize {
    20
}
fn default_display_turns() -> usize {
    10
}
fn default_display_truncate() -> usize {
    200
}

impl Config {
    /// Minimal config for tests: temp-path stores, default everything else.
    pub fn minimal(root: &Path) -> Self {
        Self {
            library: LibraryConfig {
                docs_dir: root.join("volumes"),
            },
            db: DbConfig {
                path: root.join("shiori.sqlite"),
                registry_path: root.join("registry.json"),
            },
            ollama: OllamaConfig::default(),
            chunking: ChunkingConfig::default(),
            retrieval: RetrievalConfig::default(),
            memory: MemoryConfig::default(),
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    // Validate chunking
    if config.chunking.chunk_size == 0 {
        anyhow::bail!("chunking.chunk_size must be > 0");
    }
    if config.chunking.chunk_overlap >= config.chunking.chunk_size {
        anyhow::bail!(
            "chunking.chunk_overlap ({}) must be smaller than chunking.chunk_size ({})",
            config.chunking.chunk_overlap,
            config.chunking.chunk_size
        );
    }

    // Validate retrieval
    if config.retrieval.k < 1 {
        anyhow::bail!("retrieval.k must be >= 1");
    }
    if config.retrieval.fetch_k < config.retrieval.k {
        anyhow::bail!(
            "retrieval.fetch_k ({}) must be >= retrieval.k ({})",
            config.retrieval.fetch_k,
            config.retrieval.k
        );
    }
    if !(0.0..=1.0).contains(&config.retrieval.lambda_mult) {
        anyhow::bail!("retrieval.lambda_mult must be in [0.0, 1.0]");
    }
    match config.retrieval.search_type.as_str() {
        "similarity" | "mmr" => {}
        other => anyhow::bail!(
            "Unknown retrieval.search_type: '{}'. Must be similarity or mmr.",
            other
        ),
    }

    // Validate memory
    if config.memory.max_messages == 0 {
        anyhow::bail!("memory.max_messages must be > 0");
    }

    Ok(config)
}
