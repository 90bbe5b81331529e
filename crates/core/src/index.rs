use crate::chunking::{chunk_text, ChunkingConfig};
use crate::config::ResearchConfig;
use crate::embeddings::{embedder_from_config, Embedder};
use crate::error::{ConfigError, IndexError};
use crate::models::{
    ChunkRecord, CitationSet, CollectionInfo, Metadata, SearchResult, SectionMap, StoredDocument,
};
use crate::retry::RetryPolicy;
use crate::stores::store_from_config;
use crate::traits::CollectionStore;
use chrono::Utc;
use futures::future::join_all;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

const EMBED_BATCH_SIZE: usize = 64;

pub fn generate_collection_id() -> String {
    let token = Uuid::new_v4().simple().to_string();
    format!("doc_{}", &token[..8])
}

pub struct VectorIndex {
    store: Arc<dyn CollectionStore>,
    embedder: Arc<dyn Embedder>,
    chunking: ChunkingConfig,
}

impl VectorIndex {
    pub fn new(
        store: Arc<dyn CollectionStore>,
        embedder: Arc<dyn Embedder>,
        chunking: ChunkingConfig,
    ) -> Self {
        Self {
            store,
            embedder,
            chunking,
        }
    }

    pub fn from_config(config: &ResearchConfig) -> Result<Self, ConfigError> {
        let embedder = embedder_from_config(&config.embedding, RetryPolicy::from(&config.retry))?;
        Ok(Self::new(
            store_from_config(config),
            embedder,
            ChunkingConfig::try_from(config)?,
        ))
    }

    pub fn embedding_model(&self) -> &str {
        self.embedder.model_name()
    }

    pub async fn store(
        &self,
        source: &str,
        text: &str,
        citations: &CitationSet,
        sections: &SectionMap,
        extra: Option<&Metadata>,
    ) -> Result<StoredDocument, IndexError> {
        let collection_id = generate_collection_id();
        let chunks = chunk_text(text, self.chunking);

        let citations_json = serde_json::to_string(&citations.to_vec())?;
        let sections_json = serde_json::to_string(sections)?;
        let records = chunks
            .into_iter()
            .enumerate()
            .map(|(index, document)| {
                let mut metadata = Metadata::new();
                metadata.insert("chunk_id".to_string(), json!(index));
                metadata.insert("source".to_string(), json!(source));
                metadata.insert("citations".to_string(), Value::String(citations_json.clone()));
                metadata.insert("sections".to_string(), Value::String(sections_json.clone()));
                if let Some(extra) = extra {
                    for (key, value) in extra {
                        metadata.insert(key.clone(), value.clone());
                    }
                }

                ChunkRecord {
                    id: format!("{collection_id}_{index}"),
                    index,
                    document,
                    metadata,
                }
            })
            .collect::<Vec<_>>();

        let embeddings = self.embed_records(&records).await?;

        let info = CollectionInfo {
            name: collection_id.clone(),
            source: source.to_string(),
            embedding_model: self.embedder.model_name().to_string(),
            dimensions: self.embedder.dimensions(),
            created_at: Utc::now(),
        };
        self.store.create_collection(&info).await?;
        if let Err(error) = self
            .store
            .add_chunks(&collection_id, &records, &embeddings)
            .await
        {
            if let Err(cleanup) = self.store.delete_collection(&collection_id).await {
                warn!(collection = %collection_id, error = %cleanup, "could not remove partially stored collection");
            }
            return Err(error);
        }

        info!(
            collection = %collection_id,
            source,
            chunks = records.len(),
            backend = self.store.backend_name(),
            "stored document"
        );
        Ok(StoredDocument {
            collection_id,
            chunk_count: records.len(),
        })
    }

    async fn embed_records(&self, records: &[ChunkRecord]) -> Result<Vec<Vec<f32>>, IndexError> {
        let texts = records
            .iter()
            .map(|record| record.document.clone())
            .collect::<Vec<_>>();

        let mut embeddings = Vec::with_capacity(texts.len());
        for batch in texts.chunks(EMBED_BATCH_SIZE) {
            embeddings.extend(self.embedder.embed(batch).await?);
        }

        if embeddings.len() != texts.len() {
            return Err(IndexError::Embedding(format!(
                "embedder returned {} vectors for {} chunks",
                embeddings.len(),
                texts.len()
            )));
        }
        Ok(embeddings)
    }

    /// A missing distance ranks as `0.0`. Collections that fail to answer are skipped.
    pub async fn search(
        &self,
        query: &str,
        collection: Option<&str>,
        limit: usize,
    ) -> Result<Vec<SearchResult>, IndexError> {
        if query.trim().is_empty() {
            return Err(IndexError::EmptyQuery);
        }

        let targets = match collection {
            Some(name) => vec![self.store.collection_info(name).await?],
            None => self.store.list_collections().await?,
        };
        if targets.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }

        let query_embedding = match self.embedder.embed(&[query.to_string()]).await {
            Ok(mut embeddings) => match embeddings.pop() {
                Some(embedding) => embedding,
                None => {
                    warn!("embedder returned no vector for the query");
                    return Ok(Vec::new());
                }
            },
            Err(error) => {
                warn!(error = %error, "query embedding failed, returning no results");
                return Ok(Vec::new());
            }
        };

        let outcomes = join_all(
            targets
                .iter()
                .map(|info| self.query_collection(info, &query_embedding, limit)),
        )
        .await;

        let mut results = Vec::new();
        for (info, outcome) in targets.iter().zip(outcomes) {
            match outcome {
                Ok(hits) => results.extend(hits),
                Err(error) => {
                    warn!(collection = %info.name, error = %error, "collection search failed, skipping")
                }
            }
        }

        results.sort_by(|left, right| {
            left.distance
                .unwrap_or(0.0)
                .total_cmp(&right.distance.unwrap_or(0.0))
        });
        results.truncate(limit);
        debug!(collections = targets.len(), results = results.len(), "search finished");
        Ok(results)
    }

    async fn query_collection(
        &self,
        info: &CollectionInfo,
        embedding: &[f32],
        limit: usize,
    ) -> Result<Vec<SearchResult>, IndexError> {
        if info.embedding_model != self.embedder.model_name() {
            return Err(IndexError::EmbeddingModelMismatch {
                collection: info.name.clone(),
                stored: info.embedding_model.clone(),
                configured: self.embedder.model_name().to_string(),
            });
        }
        self.store.query(&info.name, embedding, limit).await
    }

    pub async fn list_collections(&self) -> Result<Vec<CollectionInfo>, IndexError> {
        self.store.list_collections().await
    }

    pub async fn collection_info(&self, collection: &str) -> Result<CollectionInfo, IndexError> {
        self.store.collection_info(collection).await
    }
}
