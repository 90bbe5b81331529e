use thiserror::Error;
use tokio::time::error::Elapsed;

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("pdf parse error: {0}")]
    PdfParse(String),
}

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("collection not found: {0}")]
    CollectionNotFound(String),

    #[error("collection already exists: {0}")]
    CollectionExists(String),

    #[error("invalid collection name: {0}")]
    InvalidCollectionName(String),

    #[error("query is empty")]
    EmptyQuery,

    #[error("collection {collection} was embedded with {stored}, index uses {configured}")]
    EmbeddingModelMismatch {
        collection: String,
        stored: String,
        configured: String,
    },

    #[error("embedding failed: {0}")]
    Embedding(String),

    #[error("invalid response from {backend}: {details}")]
    BackendResponse { backend: String, details: String },

    #[error("{backend} returned status {status}")]
    BackendStatus { backend: String, status: u16 },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("index request timed out")]
    Timeout(#[from] Elapsed),
}

#[derive(Debug, Error)]
pub enum SourceQueryError {
    #[error("{source_name} rate limited the request")]
    RateLimited { source_name: &'static str },

    #[error("{source_name} returned status {status}")]
    Status { source_name: &'static str, status: u16 },

    #[error("{source_name} response could not be parsed: {details}")]
    Parse {
        source_name: &'static str,
        details: String,
    },

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("source request timed out")]
    Timeout(#[from] Elapsed),
}

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("no API key configured for {provider}")]
    Authentication { provider: String },

    #[error("provider returned {status}: {body}")]
    Provider { status: u16, body: String },

    #[error("provider response had no message content")]
    EmptyResponse,

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("llm request timed out")]
    Timeout(#[from] Elapsed),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Error)]
pub enum ResearchError {
    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("pattern error: {0}")]
    Pattern(#[from] regex::Error),

    #[error("analysis cancelled")]
    Cancelled,
}

pub type Result<T, E = ResearchError> = std::result::Result<T, E>;
