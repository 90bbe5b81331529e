use crate::citations::CitationExtractor;
use crate::error::IndexError;
use crate::extractor::{extract_text_lossy, PdfExtractor};
use crate::index::VectorIndex;
use crate::models::{IngestedDocument, Metadata};
use crate::sections::SectionSegmenter;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

pub struct DocumentIngestor {
    extractor: Arc<dyn PdfExtractor>,
    segmenter: SectionSegmenter,
    citations: CitationExtractor,
    index: Arc<VectorIndex>,
}

impl DocumentIngestor {
    pub fn new(extractor: Arc<dyn PdfExtractor>, index: Arc<VectorIndex>) -> Result<Self, regex::Error> {
        Ok(Self {
            extractor,
            segmenter: SectionSegmenter::new()?,
            citations: CitationExtractor::new()?,
            index,
        })
    }

    pub fn index(&self) -> &Arc<VectorIndex> {
        &self.index
    }

    pub fn segmenter(&self) -> &SectionSegmenter {
        &self.segmenter
    }

    /// An unreadable PDF is ingested as empty text; only index failures are errors.
    pub async fn ingest_path(
        &self,
        path: &Path,
        metadata: Option<&Metadata>,
    ) -> Result<IngestedDocument, IndexError> {
        let text = extract_text_lossy(self.extractor.as_ref(), path);
        self.ingest_text(&path.to_string_lossy(), text, metadata).await
    }

    pub async fn ingest_text(
        &self,
        source: &str,
        text: String,
        metadata: Option<&Metadata>,
    ) -> Result<IngestedDocument, IndexError> {
        let sections = self.segmenter.segment(&text);
        let citations = self.citations.extract(&text);
        let stored = self
            .index
            .store(source, &text, &citations, &sections, metadata)
            .await?;

        info!(
            collection = %stored.collection_id,
            source,
            citations = citations.len(),
            chunks = stored.chunk_count,
            "ingested document"
        );
        Ok(IngestedDocument {
            collection_id: stored.collection_id,
            source_path: source.to_string(),
            sections,
            citations,
            chunk_count: stored.chunk_count,
            text,
        })
    }
}
