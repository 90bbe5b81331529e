use crate::embeddings::cosine_distance;
use crate::error::IndexError;
use crate::models::{ChunkRecord, CollectionInfo, Metadata, SearchResult};
use crate::traits::CollectionStore;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::PathBuf;
use tokio::sync::Mutex;
use tracing::{debug, warn};

const COLLECTION_FILE: &str = "collection.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredChunk {
    id: String,
    index: usize,
    document: String,
    metadata: Metadata,
    embedding: Vec<f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CollectionFile {
    info: CollectionInfo,
    #[serde(default)]
    records: Vec<StoredChunk>,
}

pub struct DirectoryStore {
    root: PathBuf,
    write_lock: Mutex<()>,
}

pub(crate) fn validate_collection_name(name: &str) -> Result<(), IndexError> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if valid {
        Ok(())
    } else {
        Err(IndexError::InvalidCollectionName(name.to_string()))
    }
}

impl DirectoryStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            write_lock: Mutex::new(()),
        }
    }

    fn collection_path(&self, name: &str) -> PathBuf {
        self.root.join(name).join(COLLECTION_FILE)
    }

    async fn read_collection(&self, name: &str) -> Result<CollectionFile, IndexError> {
        validate_collection_name(name)?;
        let raw = match tokio::fs::read(self.collection_path(name)).await {
            Ok(raw) => raw,
            Err(error) if error.kind() == ErrorKind::NotFound => {
                return Err(IndexError::CollectionNotFound(name.to_string()))
            }
            Err(error) => return Err(error.into()),
        };
        Ok(serde_json::from_slice(&raw)?)
    }

    async fn write_collection(&self, file: &CollectionFile) -> Result<(), IndexError> {
        let path = self.collection_path(&file.info.name);
        let tmp = path.with_extension("json.tmp");
        let bytes = serde_json::to_vec(file)?;
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }
}

#[async_trait]
impl CollectionStore for DirectoryStore {
    fn backend_name(&self) -> &'static str {
        "directory"
    }

    async fn create_collection(&self, info: &CollectionInfo) -> Result<(), IndexError> {
        validate_collection_name(&info.name)?;
        let _guard = self.write_lock.lock().await;

        if tokio::fs::try_exists(self.collection_path(&info.name)).await? {
            return Err(IndexError::CollectionExists(info.name.clone()));
        }
        tokio::fs::create_dir_all(self.root.join(&info.name)).await?;
        self.write_collection(&CollectionFile {
            info: info.clone(),
            records: Vec::new(),
        })
        .await?;

        debug!(collection = %info.name, root = %self.root.display(), "created collection");
        Ok(())
    }

    async fn add_chunks(
        &self,
        collection: &str,
        chunks: &[ChunkRecord],
        embeddings: &[Vec<f32>],
    ) -> Result<(), IndexError> {
        if chunks.len() != embeddings.len() {
            return Err(IndexError::Embedding(format!(
                "embedding count {} doesn't match chunk count {}",
                embeddings.len(),
                chunks.len()
            )));
        }

        let _guard = self.write_lock.lock().await;
        let mut file = self.read_collection(collection).await?;
        for (chunk, embedding) in chunks.iter().zip(embeddings) {
            if embedding.len() != file.info.dimensions {
                return Err(IndexError::Embedding(format!(
                    "embedding dimension {} != {}",
                    embedding.len(),
                    file.info.dimensions
                )));
            }
            file.records.push(StoredChunk {
                id: chunk.id.clone(),
                index: chunk.index,
                document: chunk.document.clone(),
                metadata: chunk.metadata.clone(),
                embedding: embedding.clone(),
            });
        }
        self.write_collection(&file).await
    }

    async fn delete_collection(&self, collection: &str) -> Result<(), IndexError> {
        validate_collection_name(collection)?;
        let _guard = self.write_lock.lock().await;
        match tokio::fs::remove_dir_all(self.root.join(collection)).await {
            Ok(()) => {
                debug!(collection, "deleted collection");
                Ok(())
            }
            Err(error) if error.kind() == ErrorKind::NotFound => Ok(()),
            Err(error) => Err(error.into()),
        }
    }

    async fn collection_info(&self, collection: &str) -> Result<CollectionInfo, IndexError> {
        Ok(self.read_collection(collection).await?.info)
    }

    async fn list_collections(&self) -> Result<Vec<CollectionInfo>, IndexError> {
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(error) if error.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(error) => return Err(error.into()),
        };

        let mut collections = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            match self.read_collection(&name).await {
                Ok(file) => collections.push(file.info),
                Err(error) => warn!(collection = %name, error = %error, "skipping unreadable collection"),
            }
        }

        collections.sort_by(|left, right| left.name.cmp(&right.name));
        Ok(collections)
    }

    async fn query(
        &self,
        collection: &str,
        embedding: &[f32],
        limit: usize,
    ) -> Result<Vec<SearchResult>, IndexError> {
        let file = self.read_collection(collection).await?;
        if embedding.len() != file.info.dimensions {
            return Err(IndexError::Embedding(format!(
                "query vector dim {} is not {}",
                embedding.len(),
                file.info.dimensions
            )));
        }

        let mut results = file
            .records
            .into_iter()
            .map(|record| SearchResult {
                distance: Some(cosine_distance(embedding, &record.embedding)),
                id: record.id,
                collection: collection.to_string(),
                content: record.document,
                metadata: record.metadata,
            })
            .collect::<Vec<_>>();

        results.sort_by(|left, right| {
            left.distance
                .unwrap_or(0.0)
                .total_cmp(&right.distance.unwrap_or(0.0))
        });
        results.truncate(limit);
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tempfile::tempdir;

    fn info(name: &str) -> CollectionInfo {
        CollectionInfo {
            name: name.to_string(),
            source: format!("{name}.pdf"),
            embedding_model: "char-ngram-2".to_string(),
            dimensions: 2,
            created_at: Utc::now(),
        }
    }

    fn chunk(id: &str, index: usize) -> ChunkRecord {
        ChunkRecord {
            id: id.to_string(),
            index,
            document: format!("text of {id}"),
            metadata: Metadata::new(),
        }
    }

    #[tokio::test]
    async fn query_orders_by_distance() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let store = DirectoryStore::new(dir.path());
        store.create_collection(&info("doc_a")).await?;
        store
            .add_chunks(
                "doc_a",
                &[chunk("far", 0), chunk("near", 1)],
                &[vec![0.0, 1.0], vec![1.0, 0.1]],
            )
            .await?;

        let results = store.query("doc_a", &[1.0, 0.0], 5).await?;
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].id, "near");
        assert_eq!(results[0].collection, "doc_a");
        assert!(results[0].distance < results[1].distance);

        assert_eq!(store.query("doc_a", &[1.0, 0.0], 1).await?.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn collections_survive_reopening() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        {
            let store = DirectoryStore::new(dir.path());
            store.create_collection(&info("doc_b")).await?;
            store.create_collection(&info("doc_a")).await?;
            store.add_chunks("doc_a", &[chunk("c0", 0)], &[vec![1.0, 0.0]]).await?;
        }

        let reopened = DirectoryStore::new(dir.path());
        let names = reopened
            .list_collections()
            .await?
            .into_iter()
            .map(|info| info.name)
            .collect::<Vec<_>>();
        assert_eq!(names, vec!["doc_a", "doc_b"]);
        assert_eq!(reopened.query("doc_a", &[1.0, 0.0], 3).await?.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn missing_root_lists_nothing() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let store = DirectoryStore::new(dir.path().join("not-created"));
        assert!(store.list_collections().await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn unknown_collection_is_reported() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let store = DirectoryStore::new(dir.path());
        let result = store.collection_info("doc_missing").await;
        assert!(matches!(result, Err(IndexError::CollectionNotFound(_))));
        Ok(())
    }

    #[tokio::test]
    async fn duplicate_and_invalid_names_are_rejected() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let store = DirectoryStore::new(dir.path());
        store.create_collection(&info("doc_a")).await?;

        assert!(matches!(
            store.create_collection(&info("doc_a")).await,
            Err(IndexError::CollectionExists(_))
        ));
        assert!(matches!(
            store.create_collection(&info("../escape")).await,
            Err(IndexError::InvalidCollectionName(_))
        ));
        Ok(())
    }

    #[tokio::test]
    async fn mismatched_embedding_counts_are_rejected() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let store = DirectoryStore::new(dir.path());
        store.create_collection(&info("doc_a")).await?;

        let result = store.add_chunks("doc_a", &[chunk("c0", 0)], &[]).await;
        assert!(matches!(result, Err(IndexError::Embedding(_))));
        Ok(())
    }

    #[tokio::test]
    async fn deleted_collection_is_gone_and_delete_is_idempotent() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let store = DirectoryStore::new(dir.path());
        store.create_collection(&info("doc_a")).await?;
        store.create_collection(&info("doc_b")).await?;

        store.delete_collection("doc_a").await?;
        store.delete_collection("doc_a").await?;

        let names = store
            .list_collections()
            .await?
            .into_iter()
            .map(|info| info.name)
            .collect::<Vec<_>>();
        assert_eq!(names, vec!["doc_b"]);
        assert!(matches!(
            store.collection_info("doc_a").await,
            Err(IndexError::CollectionNotFound(_))
        ));
        Ok(())
    }
}
