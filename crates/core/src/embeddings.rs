use crate::config::{EmbeddingBackend, EmbeddingConfig};
use crate::error::{ConfigError, IndexError};
use crate::retry::RetryPolicy;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

pub const DEFAULT_EMBEDDING_DIMENSIONS: usize = 128;

/// Collections remember the model that embedded them; searches only compare
/// vectors produced by the same `model_name`.
#[async_trait]
pub trait Embedder: Send + Sync {
    fn model_name(&self) -> &str;
    fn dimensions(&self) -> usize;
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, IndexError>;
}

#[derive(Debug, Clone)]
pub struct CharacterNgramEmbedder {
    dimensions: usize,
    model_name: String,
}

impl Default for CharacterNgramEmbedder {
    fn default() -> Self {
        Self::new(DEFAULT_EMBEDDING_DIMENSIONS)
    }
}

impl CharacterNgramEmbedder {
    pub fn new(dimensions: usize) -> Self {
        let dimensions = dimensions.max(1);
        Self {
            dimensions,
            model_name: format!("char-ngram-{dimensions}"),
        }
    }

    pub fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0f32; self.dimensions];
        let lowered = text.to_lowercase();
        let chars: Vec<char> = lowered.chars().collect();

        if chars.is_empty() {
            return vector;
        }

        for window in chars.windows(3) {
            let token = window.iter().collect::<String>();
            let mut hash = 1469598103934665603u64;
            for byte in token.bytes() {
                hash ^= byte as u64;
                hash = hash.wrapping_mul(1099511628211);
            }
            let bucket = (hash % vector.len() as u64) as usize;
            vector[bucket] += 1.0;
        }

        let magnitude = vector.iter().map(|value| value * value).sum::<f32>().sqrt();
        if magnitude > 0.0 {
            for value in &mut vector {
                *value /= magnitude;
            }
        }

        vector
    }
}

#[async_trait]
impl Embedder for CharacterNgramEmbedder {
    fn model_name(&self) -> &str {
        &self.model_name
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, IndexError> {
        Ok(texts.iter().map(|text| self.embed_one(text)).collect())
    }
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingRow>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingRow {
    #[serde(default)]
    index: Option<usize>,
    embedding: Vec<f32>,
}

pub struct HttpEmbedder {
    endpoint: String,
    model: String,
    api_key: Option<String>,
    dimensions: usize,
    client: Client,
    retry: RetryPolicy,
}

impl HttpEmbedder {
    pub fn new(
        endpoint: impl Into<String>,
        model: impl Into<String>,
        api_key: Option<String>,
        dimensions: usize,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            model: model.into(),
            api_key,
            dimensions,
            client: Client::new(),
            retry,
        }
    }

    async fn request(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, IndexError> {
        let mut request = self
            .client
            .post(format!("{}/embeddings", self.endpoint))
            .json(&json!({ "model": self.model, "input": texts }));
        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(IndexError::BackendStatus {
                backend: "embeddings".to_string(),
                status: response.status().as_u16(),
            });
        }

        let payload: EmbeddingResponse = response.json().await?;
        order_embeddings(payload, texts.len(), self.dimensions)
    }
}

fn order_embeddings(
    payload: EmbeddingResponse,
    expected: usize,
    dimensions: usize,
) -> Result<Vec<Vec<f32>>, IndexError> {
    if payload.data.len() != expected {
        return Err(IndexError::Embedding(format!(
            "expected {expected} embeddings, received {}",
            payload.data.len()
        )));
    }

    let mut rows = payload
        .data
        .into_iter()
        .enumerate()
        .map(|(position, row)| (row.index.unwrap_or(position), row.embedding))
        .collect::<Vec<_>>();
    rows.sort_by_key(|(index, _)| *index);

    rows.into_iter()
        .map(|(_, embedding)| {
            if embedding.len() == dimensions {
                Ok(embedding)
            } else {
                Err(IndexError::Embedding(format!(
                    "embedding dimension {} != {dimensions}",
                    embedding.len()
                )))
            }
        })
        .collect()
}

#[async_trait]
impl Embedder for HttpEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, IndexError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        self.retry.run("embeddings", || self.request(texts)).await
    }
}

pub fn embedder_from_config(
    config: &EmbeddingConfig,
    retry: RetryPolicy,
) -> Result<Arc<dyn Embedder>, ConfigError> {
    match config.backend {
        EmbeddingBackend::Local => Ok(Arc::new(CharacterNgramEmbedder::new(config.dimensions))),
        EmbeddingBackend::Http => {
            let endpoint = config.endpoint.clone().ok_or_else(|| {
                ConfigError::Invalid("embedding.endpoint is required for the http backend".to_string())
            })?;
            Ok(Arc::new(HttpEmbedder::new(
                endpoint,
                config.model.clone(),
                config.api_key.clone(),
                config.dimensions,
                retry,
            )))
        }
    }
}

pub fn cosine_distance(left: &[f32], right: &[f32]) -> f64 {
    let mut dot = 0f64;
    let mut left_norm = 0f64;
    let mut right_norm = 0f64;
    for (a, b) in left.iter().zip(right.iter()) {
        let (a, b) = (f64::from(*a), f64::from(*b));
        dot += a * b;
        left_norm += a * a;
        right_norm += b * b;
    }

    if left_norm == 0.0 || right_norm == 0.0 {
        return 1.0;
    }
    1.0 - dot / (left_norm.sqrt() * right_norm.sqrt())
}
