pub mod chunking;
pub mod citations;
pub mod config;
pub mod embeddings;
pub mod error;
pub mod extractor;
pub mod index;
pub mod ingest;
pub mod literature;
pub mod llm;
pub mod models;
pub mod orchestrator;
pub mod retry;
pub mod sections;
pub mod stores;
pub mod traits;

#[cfg(test)]
mod canned_http;

pub use chunking::{chunk_text, normalize_whitespace, split_sentences, ChunkingConfig};
pub use citations::CitationExtractor;
pub use config::{
    EmbeddingBackend, EmbeddingConfig, LlmConfig, ResearchConfig, RetryConfig, SearchConfig,
    StoreBackend,
};
pub use embeddings::{cosine_distance, embedder_from_config, CharacterNgramEmbedder, Embedder, HttpEmbedder};
pub use error::{
    ConfigError, ExtractionError, IndexError, LlmError, ResearchError, SourceQueryError,
};
pub use extractor::{extract_text, extract_text_lossy, LopdfExtractor, PageText, PdfExtractor};
pub use index::{generate_collection_id, VectorIndex};
pub use ingest::DocumentIngestor;
pub use literature::{
    ArxivSource, GoogleScholarSource, KeyTermExtractor, LiteratureSearch, SemanticScholarSource,
};
pub use llm::{ChatCompletionClient, GenerateOptions, LlmProvider};
pub use models::{
    AnalysisOutcome, ChunkRecord, CitationReport, CitationSet, CollectionInfo, IngestedDocument,
    Metadata, PaperAnalysis, PaperRecord, SearchResult, SectionMap, SectionName, StoredDocument,
};
pub use orchestrator::ResearchOrchestrator;
pub use retry::RetryPolicy;
pub use sections::SectionSegmenter;
pub use stores::{store_from_config, DirectoryStore, QdrantStore};
pub use traits::{CollectionStore, LanguageModel, LiteratureSource};
