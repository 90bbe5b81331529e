use crate::chunking::normalize_whitespace;
use crate::error::SourceQueryError;
use crate::models::PaperRecord;
use crate::retry::RetryPolicy;
use crate::traits::LiteratureSource;
use async_trait::async_trait;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use reqwest::{Client, StatusCode};
use tracing::{debug, instrument};

const ARXIV_API_URL: &str = "http://export.arxiv.org/api/query";
const SOURCE_NAME: &str = "ArXiv";

pub struct ArxivSource {
    client: Client,
    base_url: String,
    retry: RetryPolicy,
}

impl ArxivSource {
    pub fn new(retry: RetryPolicy) -> Self {
        Self {
            client: Client::new(),
            base_url: ARXIV_API_URL.to_string(),
            retry,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn fetch(&self, query: &str, max_results: usize) -> Result<Vec<PaperRecord>, SourceQueryError> {
        let params = [
            ("search_query", format!("all:{query}")),
            ("start", "0".to_string()),
            ("max_results", max_results.to_string()),
            ("sortBy", "relevance".to_string()),
            ("sortOrder", "descending".to_string()),
        ];

        let response = self.client.get(&self.base_url).query(&params).send().await?;
        match response.status() {
            StatusCode::TOO_MANY_REQUESTS => {
                return Err(SourceQueryError::RateLimited {
                    source_name: SOURCE_NAME,
                })
            }
            status if !status.is_success() => {
                return Err(SourceQueryError::Status {
                    source_name: SOURCE_NAME,
                    status: status.as_u16(),
                })
            }
            _ => {}
        }

        let xml = response.text().await?;
        let mut papers = parse_atom_feed(&xml)?;
        papers.truncate(max_results);
        debug!(count = papers.len(), "arXiv returned entries");
        Ok(papers)
    }
}

#[async_trait]
impl LiteratureSource for ArxivSource {
    fn name(&self) -> &'static str {
        SOURCE_NAME
    }

    #[instrument(skip(self))]
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<PaperRecord>, SourceQueryError> {
        self.retry
            .run("arxiv search", || self.fetch(query, max_results))
            .await
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Id,
    Published,
    Title,
    Summary,
    AuthorName,
}

#[derive(Debug, Default)]
struct EntryBuilder {
    id: String,
    published: String,
    title: String,
    summary: String,
    authors: Vec<String>,
    categories: Vec<String>,
}

impl EntryBuilder {
    fn push_category(&mut self, element: &BytesStart<'_>) -> Result<(), SourceQueryError> {
        for attribute in element.attributes() {
            let attribute = attribute.map_err(parse_error)?;
            if attribute.key.local_name().as_ref() == b"term" {
                let term = attribute.unescape_value().map_err(parse_error)?;
                self.categories.push(term.into_owned());
            }
        }
        Ok(())
    }

    fn finish(self) -> PaperRecord {
        let title = normalize_whitespace(&self.title);
        let summary = self.summary.trim().to_string();
        let published = self.published.trim().chars().take(10).collect::<String>();

        PaperRecord {
            title: if title.is_empty() { "Unknown Title".to_string() } else { title },
            authors: self.authors,
            abstract_text: if summary.is_empty() {
                "No abstract available".to_string()
            } else {
                summary
            },
            url: self.id.trim().to_string(),
            published: if published.is_empty() { "Unknown".to_string() } else { published },
            source: SOURCE_NAME.to_string(),
            citations: None,
            venue: None,
            categories: self.categories,
        }
    }
}

fn parse_error(error: impl std::fmt::Display) -> SourceQueryError {
    SourceQueryError::Parse {
        source_name: SOURCE_NAME,
        details: error.to_string(),
    }
}

fn field_for(name: &[u8], in_author: bool) -> Option<Field> {
    match name {
        b"id" => Some(Field::Id),
        b"published" => Some(Field::Published),
        b"title" => Some(Field::Title),
        b"summary" => Some(Field::Summary),
        b"name" if in_author => Some(Field::AuthorName),
        _ => None,
    }
}

pub(crate) fn parse_atom_feed(xml: &str) -> Result<Vec<PaperRecord>, SourceQueryError> {
    let mut reader = Reader::from_str(xml);
    let mut papers = Vec::new();
    let mut current: Option<EntryBuilder> = None;
    let mut field: Option<Field> = None;
    let mut in_author = false;
    let mut text = String::new();

    loop {
        match reader.read_event().map_err(parse_error)? {
            Event::Start(element) => match element.local_name().as_ref() {
                b"entry" => current = Some(EntryBuilder::default()),
                b"author" => in_author = true,
                b"category" => {
                    if let Some(entry) = current.as_mut() {
                        entry.push_category(&element)?;
                    }
                }
                name => {
                    if current.is_some() {
                        field = field_for(name, in_author);
                        text.clear();
                    }
                }
            },
            Event::Empty(element) => {
                if element.local_name().as_ref() == b"category" {
                    if let Some(entry) = current.as_mut() {
                        entry.push_category(&element)?;
                    }
                }
            }
            Event::Text(content) => {
                if field.is_some() {
                    text.push_str(&content.unescape().map_err(parse_error)?);
                }
            }
            Event::CData(content) => {
                if field.is_some() {
                    text.push_str(&String::from_utf8_lossy(&content.into_inner()));
                }
            }
            Event::End(element) => match element.local_name().as_ref() {
                b"entry" => {
                    if let Some(entry) = current.take() {
                        papers.push(entry.finish());
                    }
                    field = None;
                }
                b"author" => in_author = false,
                _ => {
                    if let (Some(done), Some(entry)) = (field.take(), current.as_mut()) {
                        let value = std::mem::take(&mut text);
                        match done {
                            Field::Id => entry.id = value,
                            Field::Published => entry.published = value,
                            Field::Title => entry.title = value,
                            Field::Summary => entry.summary = value,
                            Field::AuthorName => entry.authors.push(value.trim().to_string()),
                        }
                    }
                }
            },
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(papers)
}
