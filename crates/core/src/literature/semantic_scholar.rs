use crate::error::SourceQueryError;
use crate::models::PaperRecord;
use crate::retry::RetryPolicy;
use crate::traits::LiteratureSource;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use tracing::{debug, instrument};

const SEARCH_URL: &str = "https://api.semanticscholar.org/graph/v1/paper/search";
const SEARCH_FIELDS: &str = "title,authors,abstract,year,url,citationCount,venue,publicationTypes";
const SOURCE_NAME: &str = "Semantic Scholar";

pub struct SemanticScholarSource {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    retry: RetryPolicy,
}

impl SemanticScholarSource {
    pub fn new(api_key: Option<String>, retry: RetryPolicy) -> Self {
        Self {
            client: Client::new(),
            base_url: SEARCH_URL.to_string(),
            api_key: api_key.filter(|key| !key.trim().is_empty()),
            retry,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn fetch(&self, query: &str, max_results: usize) -> Result<Vec<PaperRecord>, SourceQueryError> {
        let limit = max_results.to_string();
        let mut request = self.client.get(&self.base_url).query(&[
            ("query", query),
            ("limit", limit.as_str()),
            ("fields", SEARCH_FIELDS),
        ]);
        if let Some(key) = &self.api_key {
            request = request.header("x-api-key", key);
        }

        let response = request.send().await?;
        match response.status() {
            StatusCode::OK => {}
            StatusCode::TOO_MANY_REQUESTS => {
                return Err(SourceQueryError::RateLimited {
                    source_name: SOURCE_NAME,
                })
            }
            status => {
                return Err(SourceQueryError::Status {
                    source_name: SOURCE_NAME,
                    status: status.as_u16(),
                })
            }
        }

        let body: Value = response.json().await?;
        let papers = parse_search_response(&body);
        debug!(count = papers.len(), "Semantic Scholar returned papers");
        Ok(papers)
    }
}

#[async_trait]
impl LiteratureSource for SemanticScholarSource {
    fn name(&self) -> &'static str {
        SOURCE_NAME
    }

    #[instrument(skip(self))]
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<PaperRecord>, SourceQueryError> {
        self.retry
            .run("semantic scholar search", || self.fetch(query, max_results))
            .await
    }
}

fn text_field(paper: &Value, key: &str) -> Option<String> {
    paper.get(key).and_then(Value::as_str).map(str::to_string)
}

pub(crate) fn parse_search_response(body: &Value) -> Vec<PaperRecord> {
    let Some(data) = body.get("data").and_then(Value::as_array) else {
        return Vec::new();
    };

    data.iter()
        .map(|paper| {
            let authors = paper
                .get("authors")
                .and_then(Value::as_array)
                .map(|authors| {
                    authors
                        .iter()
                        .map(|author| {
                            text_field(author, "name").unwrap_or_else(|| "Unknown".to_string())
                        })
                        .collect()
                })
                .unwrap_or_default();
            let published = match paper.get("year") {
                Some(Value::Number(year)) => year.to_string(),
                Some(Value::String(year)) => year.clone(),
                _ => "Unknown".to_string(),
            };

            PaperRecord {
                title: text_field(paper, "title").unwrap_or_else(|| "Unknown Title".to_string()),
                authors,
                abstract_text: text_field(paper, "abstract")
                    .unwrap_or_else(|| "No abstract available".to_string()),
                url: text_field(paper, "url").unwrap_or_default(),
                published,
                source: SOURCE_NAME.to_string(),
                citations: Some(paper.get("citationCount").and_then(Value::as_u64).unwrap_or(0)),
                venue: Some(text_field(paper, "venue").unwrap_or_else(|| "Unknown Venue".to_string())),
                categories: Vec::new(),
            }
        })
        .collect()
}
