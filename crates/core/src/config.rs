use crate::error::ConfigError;
use crate::llm::LlmProvider;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Directory,
    Qdrant,
}

impl FromStr for StoreBackend {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "directory" => Ok(Self::Directory),
            "qdrant" => Ok(Self::Qdrant),
            other => Err(ConfigError::Invalid(format!("unknown store backend: {other}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingBackend {
    #[default]
    Local,
    Http,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub backend: EmbeddingBackend,
    pub model: String,
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    pub dimensions: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            backend: EmbeddingBackend::Local,
            model: "all-MiniLM-L6-v2".to_string(),
            endpoint: None,
            api_key: None,
            dimensions: 128,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub provider: LlmProvider,
    pub model: Option<String>,
    pub together_api_key: Option<String>,
    pub groq_api_key: Option<String>,
}

impl LlmConfig {
    pub fn api_key(&self) -> Option<&str> {
        let key = match self.provider {
            LlmProvider::Together => self.together_api_key.as_deref(),
            LlmProvider::Groq => self.groq_api_key.as_deref(),
        };
        key.map(str::trim).filter(|key| !key.is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub max_results: usize,
    pub scholar_delay_ms: u64,
    pub semantic_scholar_api_key: Option<String>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_results: 10,
            scholar_delay_ms: 1_000,
            semantic_scholar_api_key: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub timeout_secs: u64,
    pub backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            timeout_secs: 30,
            backoff_ms: 500,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResearchConfig {
    pub vector_store_path: PathBuf,
    pub store_backend: StoreBackend,
    pub qdrant_url: String,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub retrieval_limit: usize,
    pub embedding: EmbeddingConfig,
    pub llm: LlmConfig,
    pub search: SearchConfig,
    pub retry: RetryConfig,
}

impl Default for ResearchConfig {
    fn default() -> Self {
        Self {
            vector_store_path: PathBuf::from("./vector_store"),
            store_backend: StoreBackend::Directory,
            qdrant_url: "http://localhost:6333".to_string(),
            chunk_size: 1_000,
            chunk_overlap: 200,
            retrieval_limit: 5,
            embedding: EmbeddingConfig::default(),
            llm: LlmConfig::default(),
            search: SearchConfig::default(),
            retry: RetryConfig::default(),
        }
    }
}

impl ResearchConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chunk_size == 0 {
            return Err(ConfigError::Invalid("chunk_size must be positive".to_string()));
        }
        if self.embedding.dimensions == 0 {
            return Err(ConfigError::Invalid(
                "embedding.dimensions must be positive".to_string(),
            ));
        }
        if self.embedding.backend == EmbeddingBackend::Http && self.embedding.endpoint.is_none() {
            return Err(ConfigError::Invalid(
                "embedding.endpoint is required for the http backend".to_string(),
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "retry.max_attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
