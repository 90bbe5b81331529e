use crate::error::{IndexError, LlmError, SourceQueryError};
use crate::llm::GenerateOptions;
use crate::models::{ChunkRecord, CollectionInfo, PaperRecord, SearchResult};
use async_trait::async_trait;

#[async_trait]
pub trait CollectionStore: Send + Sync {
    fn backend_name(&self) -> &'static str;

    async fn create_collection(&self, info: &CollectionInfo) -> Result<(), IndexError>;

    async fn add_chunks(
        &self,
        collection: &str,
        chunks: &[ChunkRecord],
        embeddings: &[Vec<f32>],
    ) -> Result<(), IndexError>;

    /// Removing a collection that does not exist is not an error.
    async fn delete_collection(&self, collection: &str) -> Result<(), IndexError>;

    async fn collection_info(&self, collection: &str) -> Result<CollectionInfo, IndexError>;

    async fn list_collections(&self) -> Result<Vec<CollectionInfo>, IndexError>;

    async fn query(
        &self,
        collection: &str,
        embedding: &[f32],
        limit: usize,
    ) -> Result<Vec<SearchResult>, IndexError>;
}

#[async_trait]
pub trait LiteratureSource: Send + Sync {
    fn name(&self) -> &'static str;

    async fn search(&self, query: &str, max_results: usize)
        -> Result<Vec<PaperRecord>, SourceQueryError>;
}

#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn generate(&self, prompt: &str, options: &GenerateOptions) -> Result<String, LlmError>;
}
