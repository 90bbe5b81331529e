pub mod arxiv;
pub mod google_scholar;
pub mod pacer;
pub mod semantic_scholar;
pub mod terms;

pub use arxiv::ArxivSource;
pub use google_scholar::GoogleScholarSource;
pub use pacer::FixedDelayPacer;
pub use semantic_scholar::SemanticScholarSource;
pub use terms::{title_similarity, KeyTermExtractor};

use crate::config::SearchConfig;
use crate::models::PaperRecord;
use crate::retry::RetryPolicy;
use crate::traits::LiteratureSource;
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

const QUERY_TERMS: usize = 5;
const DUPLICATE_TITLE_THRESHOLD: f64 = 0.8;

pub struct LiteratureSearch {
    sources: Vec<Arc<dyn LiteratureSource>>,
}

impl LiteratureSearch {
    pub fn new(sources: Vec<Arc<dyn LiteratureSource>>) -> Self {
        Self { sources }
    }

    pub fn from_config(config: &SearchConfig, retry: RetryPolicy) -> Self {
        Self::new(vec![
            Arc::new(ArxivSource::new(retry)),
            Arc::new(SemanticScholarSource::new(
                config.semantic_scholar_api_key.clone(),
                retry,
            )),
            Arc::new(GoogleScholarSource::new(
                Duration::from_millis(config.scholar_delay_ms),
                retry,
            )),
        ])
    }

    pub fn source_names(&self) -> Vec<&'static str> {
        self.sources.iter().map(|source| source.name()).collect()
    }

    pub async fn search_papers(&self, key_terms: &[String], max_results: usize) -> Vec<PaperRecord> {
        let query = key_terms
            .iter()
            .take(QUERY_TERMS)
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(" ");
        let per_source = max_results / 3;
        if query.trim().is_empty() || per_source == 0 {
            return Vec::new();
        }

        let outcomes = join_all(
            self.sources
                .iter()
                .map(|source| source.search(&query, per_source)),
        )
        .await;

        let mut papers = Vec::new();
        for (source, outcome) in self.sources.iter().zip(outcomes) {
            match outcome {
                Ok(found) => papers.extend(found),
                Err(error) => warn!(source = source.name(), error = %error, "literature source failed"),
            }
        }

        let mut ranked = deduplicate_by_title(papers);
        rank_papers(&mut ranked);
        ranked.truncate(max_results);
        info!(query = %query, results = ranked.len(), "literature search finished");
        ranked
    }
}

pub fn deduplicate_by_title(papers: Vec<PaperRecord>) -> Vec<PaperRecord> {
    let mut seen_titles: Vec<String> = Vec::new();
    let mut unique = Vec::new();

    for paper in papers {
        let title = paper.title.to_lowercase();
        let duplicate = seen_titles
            .iter()
            .any(|seen| title_similarity(&title, seen) > DUPLICATE_TITLE_THRESHOLD);
        if !duplicate {
            seen_titles.push(title);
            unique.push(paper);
        }
    }

    unique
}

pub fn rank_papers(papers: &mut [PaperRecord]) {
    papers.sort_by(|left, right| {
        (right.citation_count(), right.publication_year())
            .cmp(&(left.citation_count(), left.publication_year()))
    });
}
