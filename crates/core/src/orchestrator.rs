use crate::config::ResearchConfig;
use crate::error::{LlmError, ResearchError};
use crate::extractor::LopdfExtractor;
use crate::index::VectorIndex;
use crate::ingest::DocumentIngestor;
use crate::literature::{KeyTermExtractor, LiteratureSearch};
use crate::llm::GenerateOptions;
use crate::models::{
    AnalysisOutcome, CitationReport, CitationSet, IngestedDocument, Metadata, PaperAnalysis,
    PaperRecord, SearchResult, SectionMap,
};
use crate::retry::RetryPolicy;
use crate::traits::LanguageModel;
use regex::Regex;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

const NO_CONTEXT_ANSWER: &str = "No relevant information found in the paper.";
const METHODOLOGY_MISSING: &str = "Methodology section not clearly identified in the paper.";
const RESULTS_MISSING: &str = "Results section not clearly identified in the paper.";
const SIMILAR_PAPER_TERMS: usize = 10;
const CONTEXT_CHUNKS: usize = 3;
const MAX_PROMPT_CITATIONS: usize = 50;
const EXCERPT_MIN_CHARS: usize = 500;
const EXCERPT_MAX_CHARS: usize = 2_000;

#[derive(Debug, Clone)]
struct ExcerptRules {
    introduction: Regex,
    methodology: Regex,
    results: Regex,
}

impl ExcerptRules {
    fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            introduction: Regex::new(r"(?i)introduction\s*")?,
            methodology: Regex::new(r"(?i)(?:methodology|methods?|approach)\s*")?,
            results: Regex::new(r"(?i)(?:results|findings)\s*")?,
        })
    }
}

fn excerpt_after(pattern: &Regex, text: &str) -> Option<String> {
    pattern.find_iter(text).find_map(|heading| {
        let rest = &text[heading.end()..];
        (rest.chars().count() >= EXCERPT_MIN_CHARS)
            .then(|| rest.chars().take(EXCERPT_MAX_CHARS).collect())
    })
}

fn head_chars(text: &str, count: usize) -> &str {
    match text.char_indices().nth(count) {
        Some((offset, _)) => &text[..offset],
        None => text,
    }
}

fn tail_chars(text: &str, count: usize) -> &str {
    let total = text.chars().count();
    if total <= count {
        return text;
    }
    match text.char_indices().nth(total - count) {
        Some((offset, _)) => &text[offset..],
        None => text,
    }
}

/// Parses everything from the first `{` to the last `}` of a model reply.
fn parse_citation_report(reply: &str) -> Option<CitationReport> {
    let start = reply.find('{')?;
    let end = reply.rfind('}')?;
    if end < start {
        return None;
    }
    serde_json::from_str(&reply[start..=end]).ok()
}

fn paper_title(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().replace(".pdf", ""))
        .unwrap_or_default()
}

pub struct ResearchOrchestrator<L: LanguageModel> {
    llm: L,
    ingestor: DocumentIngestor,
    literature: LiteratureSearch,
    key_terms: KeyTermExtractor,
    excerpts: ExcerptRules,
    retrieval_limit: usize,
    max_similar: usize,
}

impl<L: LanguageModel> ResearchOrchestrator<L> {
    pub fn new(
        llm: L,
        ingestor: DocumentIngestor,
        literature: LiteratureSearch,
        retrieval_limit: usize,
        max_similar: usize,
    ) -> Result<Self, regex::Error> {
        Ok(Self {
            llm,
            ingestor,
            literature,
            key_terms: KeyTermExtractor::new()?,
            excerpts: ExcerptRules::new()?,
            retrieval_limit,
            max_similar,
        })
    }

    pub fn from_config(config: &ResearchConfig, llm: L) -> Result<Self, ResearchError> {
        config.validate()?;
        let index = Arc::new(VectorIndex::from_config(config)?);
        let ingestor = DocumentIngestor::new(Arc::new(LopdfExtractor), index)?;
        let literature = LiteratureSearch::from_config(&config.search, RetryPolicy::from(&config.retry));
        Ok(Self::new(
            llm,
            ingestor,
            literature,
            config.retrieval_limit,
            config.search.max_results,
        )?)
    }

    pub fn index(&self) -> &VectorIndex {
        self.ingestor.index()
    }

    pub async fn ingest(
        &self,
        path: &Path,
        metadata: Option<&Metadata>,
    ) -> Result<IngestedDocument, ResearchError> {
        Ok(self.ingestor.ingest_path(path, metadata).await?)
    }

    pub async fn retrieve(
        &self,
        query: &str,
        collection: Option<&str>,
        limit: usize,
    ) -> Result<Vec<SearchResult>, ResearchError> {
        Ok(self.index().search(query, collection, limit).await?)
    }

    pub async fn find_similar(&self, title: &str, text: Option<&str>) -> Vec<PaperRecord> {
        let mut terms = self.key_terms.extract(title);
        if let Some(text) = text {
            let sections = self.ingestor.segmenter().segment(text);
            if !sections.abstract_text.is_empty() {
                terms.extend(self.key_terms.extract(&sections.abstract_text));
            }
        }
        terms.truncate(SIMILAR_PAPER_TERMS);
        self.literature.search_papers(&terms, self.max_similar).await
    }

    async fn ask(&self, prompt: String, max_tokens: u32) -> Result<String, LlmError> {
        self.llm
            .generate(&prompt, &GenerateOptions::with_max_tokens(max_tokens))
            .await
    }

    pub async fn summarize(&self, text: &str) -> Result<String, LlmError> {
        let words = 500;
        self.ask(
            format!(
                "Summarize this research paper in at most {words} words.\n\
                 Cover the research question, the methodology, the main findings, \
                 why the work matters and its conclusions.\n\n\
                 Paper text:\n{}...\n\nSummary:",
                head_chars(text, 4_000)
            ),
            words / 2,
        )
        .await
    }

    pub async fn categorize_citations(&self, text: &str, citations: &CitationSet) -> CitationReport {
        let listed = citations.iter().take(MAX_PROMPT_CITATIONS).collect::<Vec<_>>();
        let prompt = format!(
            "Categorize the citations of a research paper. Reply with a JSON object holding \
             \"in_text_citations\" (list of in-text citations), \"reference_list\" \
             (list of full references, if any) and \"citation_count\" (total number).\n\n\
             Citations found: {listed:?}\n\n\
             End of the paper, where references usually are:\n{}\n\n\
             Reply with JSON only:",
            tail_chars(text, 2_000)
        );

        match self.ask(prompt, 1_000).await {
            Ok(reply) => match parse_citation_report(&reply) {
                Some(report) => return report,
                None => warn!("citation reply was not valid JSON, using extracted citations"),
            },
            Err(error) => warn!(error = %error, "citation categorization failed, using extracted citations"),
        }
        CitationReport::from(citations)
    }

    pub async fn extract_objective(&self, text: &str) -> Result<String, LlmError> {
        self.ask(
            format!(
                "State the main research objective, question or hypothesis of this paper. \
                 Be specific and concise, and list each objective if there are several.\n\n\
                 Paper text:\n{}\n\nResearch objective(s):",
                head_chars(text, 3_000)
            ),
            300,
        )
        .await
    }

    pub async fn summarize_introduction(&self, text: &str, sections: &SectionMap) -> Result<String, LlmError> {
        let introduction = if sections.introduction.is_empty() {
            excerpt_after(&self.excerpts.introduction, text)
                .unwrap_or_else(|| head_chars(text, 1_500).to_string())
        } else {
            sections.introduction.clone()
        };

        self.ask(
            format!(
                "Summarize the introduction of this research paper: background, problem \
                 statement, the research gap it identifies and the proposed solution.\n\n\
                 Introduction text:\n{introduction}\n\nIntroduction summary:"
            ),
            400,
        )
        .await
    }

    pub async fn summarize_methodology(&self, text: &str, sections: &SectionMap) -> Result<String, LlmError> {
        let methodology = if sections.methodology.is_empty() {
            excerpt_after(&self.excerpts.methodology, text)
        } else {
            Some(sections.methodology.clone())
        };
        let Some(methodology) = methodology else {
            return Ok(METHODOLOGY_MISSING.to_string());
        };

        self.ask(
            format!(
                "Summarize the methodology of this research paper: research design, data \
                 collection, analysis techniques, tools used and the experimental setup if any.\n\n\
                 Methodology text:\n{methodology}\n\nMethodology summary:"
            ),
            400,
        )
        .await
    }

    pub async fn summarize_results(&self, text: &str, sections: &SectionMap) -> Result<String, LlmError> {
        let results = if sections.results.is_empty() {
            excerpt_after(&self.excerpts.results, text)
        } else {
            Some(sections.results.clone())
        };
        let Some(results) = results else {
            return Ok(RESULTS_MISSING.to_string());
        };

        self.ask(
            format!(
                "Summarize the results of this research paper: key findings, statistical \
                 results, performance metrics and other observations.\n\n\
                 Results text:\n{results}\n\nResults summary:"
            ),
            400,
        )
        .await
    }

    pub async fn identify_research_gap(&self, text: &str) -> Result<String, LlmError> {
        self.ask(
            format!(
                "Identify the research gaps in this paper: limitations of the work, areas for \
                 future research, unsolved problems and gaps in the existing literature.\n\n\
                 Paper text:\n{}\n\nResearch gaps:",
                head_chars(text, 4_000)
            ),
            350,
        )
        .await
    }

    /// Runs every stage in order. Never fails: errors and cancellation come
    /// back as [`AnalysisOutcome::Failed`].
    pub async fn analyze_paper(&self, path: &Path, cancel: &CancellationToken) -> AnalysisOutcome {
        match self.run_analysis(path, cancel).await {
            Ok(analysis) => AnalysisOutcome::Completed(Box::new(analysis)),
            Err(ResearchError::Cancelled) => {
                warn!(path = %path.display(), "analysis cancelled");
                AnalysisOutcome::Failed {
                    error: ResearchError::Cancelled.to_string(),
                }
            }
            Err(error) => {
                warn!(path = %path.display(), error = %error, "analysis failed");
                AnalysisOutcome::Failed {
                    error: format!("Error analyzing paper: {error}"),
                }
            }
        }
    }

    async fn run_analysis(&self, path: &Path, cancel: &CancellationToken) -> Result<PaperAnalysis, ResearchError> {
        let checkpoint = || {
            if cancel.is_cancelled() {
                Err(ResearchError::Cancelled)
            } else {
                Ok(())
            }
        };

        checkpoint()?;
        let document = self.ingest(path, None).await?;
        let text = document.text.as_str();
        let title = paper_title(path);

        checkpoint()?;
        let summary = self.summarize(text).await?;
        checkpoint()?;
        let citations = self.categorize_citations(text, &document.citations).await;
        checkpoint()?;
        let objective = self.extract_objective(text).await?;
        checkpoint()?;
        let introduction = self.summarize_introduction(text, &document.sections).await?;
        checkpoint()?;
        let methodology = self.summarize_methodology(text, &document.sections).await?;
        checkpoint()?;
        let results = self.summarize_results(text, &document.sections).await?;
        checkpoint()?;
        let research_gap = self.identify_research_gap(text).await?;
        checkpoint()?;
        let similar_papers = self.find_similar(&title, Some(text)).await;

        info!(collection = %document.collection_id, title = %title, "analysis complete");
        Ok(PaperAnalysis {
            title,
            summary,
            citations,
            objective,
            introduction,
            methodology,
            results,
            research_gap,
            similar_papers,
            sections: document.sections,
            collection_name: document.collection_id,
        })
    }

    pub async fn query_paper(&self, question: &str, collection: Option<&str>) -> Result<String, ResearchError> {
        let results = self.retrieve(question, collection, self.retrieval_limit).await?;
        if results.is_empty() {
            return Ok(NO_CONTEXT_ANSWER.to_string());
        }

        let context = results
            .iter()
            .take(CONTEXT_CHUNKS)
            .map(|result| result.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");
        let prompt = format!(
            "Answer the question using the following context from a research paper.\n\n\
             Question: {question}\n\nContext:\n{context}\n\nAnswer:"
        );
        Ok(self.ask(prompt, 500).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunking::ChunkingConfig;
    use crate::embeddings::CharacterNgramEmbedder;
    use crate::error::SourceQueryError;
    use crate::extractor::test_support::synthetic_pdf;
    use crate::stores::DirectoryStore;
    use crate::traits::LiteratureSource;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tempfile::{tempdir, TempDir};

    #[derive(Default)]
    struct ScriptedModel {
        citation_reply: Option<String>,
        fail: bool,
        prompts: Mutex<Vec<(String, u32)>>,
    }

    impl ScriptedModel {
        fn prompts(&self) -> Vec<(String, u32)> {
            self.prompts.lock().expect("prompt log").clone()
        }
    }

    #[async_trait]
    impl LanguageModel for ScriptedModel {
        async fn generate(&self, prompt: &str, options: &GenerateOptions) -> Result<String, LlmError> {
            self.prompts
                .lock()
                .expect("prompt log")
                .push((prompt.to_string(), options.max_tokens));
            if self.fail {
                return Err(LlmError::Authentication {
                    provider: "together".to_string(),
                });
            }
            if prompt.starts_with("Categorize the citations") {
                if let Some(reply) = &self.citation_reply {
                    return Ok(reply.clone());
                }
            }
            Ok(format!("generated {}", options.max_tokens))
        }
    }

    #[async_trait]
    impl LanguageModel for Arc<ScriptedModel> {
        async fn generate(&self, prompt: &str, options: &GenerateOptions) -> Result<String, LlmError> {
            self.as_ref().generate(prompt, options).await
        }
    }

    struct RecordingSource {
        queries: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl LiteratureSource for RecordingSource {
        fn name(&self) -> &'static str {
            "Recording"
        }

        async fn search(&self, query: &str, _max_results: usize) -> Result<Vec<PaperRecord>, SourceQueryError> {
            self.queries.lock().expect("query log").push(query.to_string());
            Ok(vec![PaperRecord {
                title: "A related paper".to_string(),
                authors: vec!["R. Searcher".to_string()],
                abstract_text: "No abstract available".to_string(),
                url: String::new(),
                published: "2021".to_string(),
                source: "Recording".to_string(),
                citations: Some(3),
                venue: None,
                categories: Vec::new(),
            }])
        }
    }

    struct Fixture {
        _dir: TempDir,
        pdf: std::path::PathBuf,
        model: Arc<ScriptedModel>,
        source: Arc<RecordingSource>,
        orchestrator: ResearchOrchestrator<Arc<ScriptedModel>>,
    }

    fn fixture(model: ScriptedModel) -> Result<Fixture, Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let pdf = dir.path().join("graph_retrieval.pdf");
        std::fs::write(
            &pdf,
            synthetic_pdf(&[
                &["Graph Retrieval for Scientific Papers", "Abstract", "We index scientific papers as citation graphs."],
                &["1. Introduction", "Earlier systems [1] ignore citation structure."],
                &["References", "[1] A. Author. Citation indexing. 2020."],
            ])?,
        )?;

        let index = VectorIndex::new(
            Arc::new(DirectoryStore::new(dir.path().join("store"))),
            Arc::new(CharacterNgramEmbedder::default()),
            ChunkingConfig::default(),
        );
        let ingestor = DocumentIngestor::new(Arc::new(LopdfExtractor), Arc::new(index))?;
        let source = Arc::new(RecordingSource {
            queries: Mutex::new(Vec::new()),
        });
        let literature = LiteratureSearch::new(vec![source.clone()]);
        let model = Arc::new(model);
        let orchestrator = ResearchOrchestrator::new(model.clone(), ingestor, literature, 5, 9)?;

        Ok(Fixture {
            _dir: dir,
            pdf,
            model,
            source,
            orchestrator,
        })
    }

    #[tokio::test]
    async fn full_analysis_fills_every_field() -> Result<(), Box<dyn std::error::Error>> {
        let fixture = fixture(ScriptedModel {
            citation_reply: Some(
                "Sure: {\"in_text_citations\": [\"[1]\"], \"reference_list\": [\"A. Author. Citation indexing. 2020.\"], \"citation_count\": 1} done"
                    .to_string(),
            ),
            ..ScriptedModel::default()
        })?;

        let outcome = fixture
            .orchestrator
            .analyze_paper(&fixture.pdf, &CancellationToken::new())
            .await;
        let AnalysisOutcome::Completed(analysis) = outcome else {
            panic!("analysis failed: {outcome:?}");
        };

        assert_eq!(analysis.title, "graph_retrieval");
        assert!(analysis.collection_name.starts_with("doc_"));
        assert!(!analysis.sections.abstract_text.is_empty());
        assert_eq!(analysis.summary, "generated 250");
        assert_eq!(analysis.objective, "generated 300");
        assert_eq!(analysis.introduction, "generated 400");
        assert_eq!(analysis.methodology, METHODOLOGY_MISSING);
        assert_eq!(analysis.results, RESULTS_MISSING);
        assert_eq!(analysis.research_gap, "generated 350");
        assert_eq!(analysis.citations.citation_count, 1);
        assert_eq!(analysis.citations.reference_list.len(), 1);
        assert_eq!(analysis.similar_papers.len(), 1);

        let prompts = fixture.model.prompts();
        assert_eq!(prompts.len(), 5);
        assert!(prompts.iter().all(|(prompt, _)| !prompt.starts_with("Summarize the methodology")));
        Ok(())
    }

    #[tokio::test]
    async fn invalid_citation_json_falls_back_to_extracted_set() -> Result<(), Box<dyn std::error::Error>> {
        let fixture = fixture(ScriptedModel {
            citation_reply: Some("I could not find any JSON to give you".to_string()),
            ..ScriptedModel::default()
        })?;
        let mut citations = CitationSet::default();
        citations.insert("1");
        citations.insert("Smith, 2020");

        let report = fixture
            .orchestrator
            .categorize_citations("text [1] and Smith, 2020", &citations)
            .await;
        assert_eq!(report, CitationReport::from(&citations));
        assert_eq!(report.citation_count, 2);
        Ok(())
    }

    #[tokio::test]
    async fn model_failure_becomes_an_error_outcome() -> Result<(), Box<dyn std::error::Error>> {
        let fixture = fixture(ScriptedModel {
            fail: true,
            ..ScriptedModel::default()
        })?;

        let outcome = fixture
            .orchestrator
            .analyze_paper(&fixture.pdf, &CancellationToken::new())
            .await;
        match outcome {
            AnalysisOutcome::Failed { error } => {
                assert!(error.starts_with("Error analyzing paper:"), "{error}");
                assert!(error.contains("together"));
            }
            AnalysisOutcome::Completed(_) => panic!("expected a failed outcome"),
        }
        Ok(())
    }

    #[tokio::test]
    async fn cancelled_analysis_stops_before_any_stage() -> Result<(), Box<dyn std::error::Error>> {
        let fixture = fixture(ScriptedModel::default())?;
        let cancel = CancellationToken::new();
        cancel.cancel();

        let outcome = fixture.orchestrator.analyze_paper(&fixture.pdf, &cancel).await;
        assert!(matches!(
            outcome,
            AnalysisOutcome::Failed { ref error } if error == "analysis cancelled"
        ));
        assert!(fixture.model.prompts().is_empty());
        assert!(fixture.orchestrator.index().list_collections().await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn query_without_documents_skips_the_model() -> Result<(), Box<dyn std::error::Error>> {
        let fixture = fixture(ScriptedModel::default())?;
        let answer = fixture.orchestrator.query_paper("What is indexed?", None).await?;

        assert_eq!(answer, NO_CONTEXT_ANSWER);
        assert!(fixture.model.prompts().is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn query_sends_retrieved_context() -> Result<(), Box<dyn std::error::Error>> {
        let fixture = fixture(ScriptedModel::default())?;
        let document = fixture.orchestrator.ingest(&fixture.pdf, None).await?;

        let answer = fixture
            .orchestrator
            .query_paper("citation graphs", Some(&document.collection_id))
            .await?;
        assert_eq!(answer, "generated 500");

        let prompts = fixture.model.prompts();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].0.contains("Question: citation graphs"));
        assert!(prompts[0].0.contains("citation graphs."));
        Ok(())
    }

    #[tokio::test]
    async fn query_against_unknown_collection_is_an_error() -> Result<(), Box<dyn std::error::Error>> {
        let fixture = fixture(ScriptedModel::default())?;
        let result = fixture.orchestrator.query_paper("anything", Some("doc_ffffffff")).await;
        assert!(matches!(result, Err(ResearchError::Index(_))));
        Ok(())
    }

    #[tokio::test]
    async fn similar_papers_use_title_then_abstract_terms() -> Result<(), Box<dyn std::error::Error>> {
        let fixture = fixture(ScriptedModel::default())?;
        let papers = fixture
            .orchestrator
            .find_similar(
                "Sparse Transformers",
                Some("Abstract\nHierarchical attention for documents.\n\nBody"),
            )
            .await;

        assert_eq!(papers.len(), 1);
        let queries = fixture.source.queries.lock().expect("query log").clone();
        assert_eq!(
            queries,
            vec!["transformers sparse hierarchical attention documents".to_string()]
        );
        Ok(())
    }

    #[test]
    fn excerpts_need_enough_following_text() -> Result<(), regex::Error> {
        let rules = ExcerptRules::new()?;
        assert_eq!(excerpt_after(&rules.results, "Results are short."), None);

        let long = format!("Findings {}", "x".repeat(2_500));
        let excerpt = excerpt_after(&rules.results, &long).unwrap_or_default();
        assert_eq!(excerpt.chars().count(), EXCERPT_MAX_CHARS);
        Ok(())
    }

    #[test]
    fn char_windows_respect_boundaries() {
        assert_eq!(head_chars("héllo", 2), "hé");
        assert_eq!(tail_chars("héllo", 3), "llo");
        assert_eq!(tail_chars("hi", 10), "hi");
        assert_eq!(paper_title(Path::new("/tmp/attention.pdf")), "attention");
    }
}
