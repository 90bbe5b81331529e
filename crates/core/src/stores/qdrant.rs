use crate::error::IndexError;
use crate::models::{ChunkRecord, CollectionInfo, Metadata, SearchResult};
use crate::retry::RetryPolicy;
use crate::stores::directory::validate_collection_name;
use crate::traits::CollectionStore;
use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode};
use serde_json::{json, Value};
use tracing::{debug, warn};

/// Point 0 of every collection carries the `CollectionInfo` manifest; chunk
/// `i` is stored as point `i + 1`.
const MANIFEST_POINT_ID: u64 = 0;

pub struct QdrantStore {
    endpoint: String,
    client: Client,
    retry: RetryPolicy,
}

impl QdrantStore {
    pub fn new(endpoint: impl Into<String>, retry: RetryPolicy) -> Self {
        Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            client: Client::new(),
            retry,
        }
    }

    async fn send(
        &self,
        method: Method,
        url: &str,
        body: Option<&Value>,
    ) -> Result<Option<Value>, IndexError> {
        let mut request = self.client.request(method, url);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(IndexError::BackendStatus {
                backend: "qdrant".to_string(),
                status: status.as_u16(),
            });
        }
        Ok(Some(response.json().await?))
    }

    async fn call(
        &self,
        operation: &str,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<Option<Value>, IndexError> {
        let url = format!("{}{}", self.endpoint, path);
        let url = url.as_str();
        let body = body.as_ref();
        self.retry
            .run(operation, move || self.send(method.clone(), url, body))
            .await
    }

    async fn upsert(&self, collection: &str, points: Vec<Value>) -> Result<(), IndexError> {
        if points.is_empty() {
            return Ok(());
        }
        self.call(
            "qdrant upsert",
            Method::PUT,
            &format!("/collections/{collection}/points?wait=true"),
            Some(json!({ "points": points })),
        )
        .await?
        .ok_or_else(|| IndexError::CollectionNotFound(collection.to_string()))?;
        Ok(())
    }
}

fn manifest_point(info: &CollectionInfo) -> Result<Value, IndexError> {
    let mut vector = vec![0f32; info.dimensions.max(1)];
    vector[0] = 1.0;
    Ok(json!({
        "id": MANIFEST_POINT_ID,
        "vector": vector,
        "payload": { "manifest": serde_json::to_value(info)? },
    }))
}

fn chunk_point(chunk: &ChunkRecord, embedding: &[f32]) -> Value {
    json!({
        "id": chunk.index as u64 + 1,
        "vector": embedding,
        "payload": {
            "chunk_id": chunk.id,
            "document": chunk.document,
            "metadata": chunk.metadata,
        },
    })
}

fn parse_manifest(collection: &str, response: &Value) -> Result<CollectionInfo, IndexError> {
    let manifest = response
        .pointer("/result/payload/manifest")
        .cloned()
        .ok_or_else(|| IndexError::BackendResponse {
            backend: "qdrant".to_string(),
            details: format!("collection {collection} has no manifest point"),
        })?;
    Ok(serde_json::from_value(manifest)?)
}

fn parse_collection_names(response: &Value) -> Vec<String> {
    response
        .pointer("/result/collections")
        .and_then(Value::as_array)
        .map(|collections| {
            collections
                .iter()
                .filter_map(|collection| collection.get("name").and_then(Value::as_str))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn parse_hits(collection: &str, response: &Value) -> Vec<SearchResult> {
    let hits = response
        .pointer("/result")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    hits.into_iter()
        .map(|hit| {
            let id = hit
                .pointer("/payload/chunk_id")
                .and_then(Value::as_str)
                .map(str::to_string)
                .or_else(|| hit.pointer("/id").map(Value::to_string))
                .unwrap_or_default();
            let content = hit
                .pointer("/payload/document")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            let metadata = hit
                .pointer("/payload/metadata")
                .and_then(Value::as_object)
                .cloned()
                .unwrap_or_else(Metadata::new);
            let distance = hit.pointer("/score").and_then(Value::as_f64).map(|score| 1.0 - score);

            SearchResult {
                id,
                collection: collection.to_string(),
                content,
                distance,
                metadata,
            }
        })
        .collect()
}

#[async_trait]
impl CollectionStore for QdrantStore {
    fn backend_name(&self) -> &'static str {
        "qdrant"
    }

    async fn create_collection(&self, info: &CollectionInfo) -> Result<(), IndexError> {
        validate_collection_name(&info.name)?;
        let path = format!("/collections/{}", info.name);

        if self.call("qdrant get collection", Method::GET, &path, None).await?.is_some() {
            return Err(IndexError::CollectionExists(info.name.clone()));
        }

        self.call(
            "qdrant create collection",
            Method::PUT,
            &path,
            Some(json!({
                "vectors": { "size": info.dimensions, "distance": "Cosine" },
            })),
        )
        .await?;
        self.upsert(&info.name, vec![manifest_point(info)?]).await?;

        debug!(collection = %info.name, "created qdrant collection");
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

        let points = chunks
            .iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| chunk_point(chunk, embedding))
            .collect();
        self.upsert(collection, points).await
    }

    async fn delete_collection(&self, collection: &str) -> Result<(), IndexError> {
        validate_collection_name(collection)?;
        self.call(
            "qdrant delete collection",
            Method::DELETE,
            &format!("/collections/{collection}"),
            None,
        )
        .await?;
        Ok(())
    }

    async fn collection_info(&self, collection: &str) -> Result<CollectionInfo, IndexError> {
        validate_collection_name(collection)?;
        let response = self
            .call(
                "qdrant get manifest",
                Method::GET,
                &format!("/collections/{collection}/points/{MANIFEST_POINT_ID}"),
                None,
            )
            .await?
            .ok_or_else(|| IndexError::CollectionNotFound(collection.to_string()))?;
        parse_manifest(collection, &response)
    }

    async fn list_collections(&self) -> Result<Vec<CollectionInfo>, IndexError> {
        let response = self
            .call("qdrant list collections", Method::GET, "/collections", None)
            .await?
            .unwrap_or(Value::Null);

        let mut collections = Vec::new();
        for name in parse_collection_names(&response) {
            match self.collection_info(&name).await {
                Ok(info) => collections.push(info),
                Err(error) => warn!(collection = %name, error = %error, "skipping collection without manifest"),
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
        validate_collection_name(collection)?;
        let response = self
            .call(
                "qdrant search",
                Method::POST,
                &format!("/collections/{collection}/points/search"),
                Some(json!({
                    "vector": embedding,
                    "limit": limit,
                    "with_payload": true,
                    "filter": { "must_not": [{ "has_id": [MANIFEST_POINT_ID] }] },
                })),
            )
            .await?
            .ok_or_else(|| IndexError::CollectionNotFound(collection.to_string()))?;

        let mut results = parse_hits(collection, &response);
        results.truncate(limit);
        Ok(results)
    }
}
