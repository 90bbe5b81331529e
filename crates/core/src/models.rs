use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

pub type Metadata = serde_json::Map<String, serde_json::Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SectionName {
    Abstract,
    Introduction,
    Methodology,
    Results,
    Conclusion,
    References,
}

impl SectionName {
    pub const ALL: [SectionName; 6] = [
        SectionName::Abstract,
        SectionName::Introduction,
        SectionName::Methodology,
        SectionName::Results,
        SectionName::Conclusion,
        SectionName::References,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SectionName::Abstract => "abstract",
            SectionName::Introduction => "introduction",
            SectionName::Methodology => "methodology",
            SectionName::Results => "results",
            SectionName::Conclusion => "conclusion",
            SectionName::References => "references",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionMap {
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    pub introduction: String,
    pub methodology: String,
    pub results: String,
    pub conclusion: String,
    pub references: String,
}

impl SectionMap {
    pub fn get(&self, name: SectionName) -> &str {
        match name {
            SectionName::Abstract => &self.abstract_text,
            SectionName::Introduction => &self.introduction,
            SectionName::Methodology => &self.methodology,
            SectionName::Results => &self.results,
            SectionName::Conclusion => &self.conclusion,
            SectionName::References => &self.references,
        }
    }

    pub fn set(&mut self, name: SectionName, text: String) {
        let slot = match name {
            SectionName::Abstract => &mut self.abstract_text,
            SectionName::Introduction => &mut self.introduction,
            SectionName::Methodology => &mut self.methodology,
            SectionName::Results => &mut self.results,
            SectionName::Conclusion => &mut self.conclusion,
            SectionName::References => &mut self.references,
        };
        *slot = text;
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CitationSet(BTreeSet<String>);

impl CitationSet {
    pub fn insert(&mut self, citation: impl Into<String>) -> bool {
        self.0.insert(citation.into())
    }

    pub fn contains(&self, citation: &str) -> bool {
        self.0.contains(citation)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.0.iter().cloned().collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkRecord {
    pub id: String,
    pub index: usize,
    pub document: String,
    pub metadata: Metadata,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionInfo {
    pub name: String,
    pub source: String,
    pub embedding_model: String,
    pub dimensions: usize,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub id: String,
    pub collection: String,
    pub content: String,
    /// Lower is more similar. Backends that report no distance leave this empty.
    pub distance: Option<f64>,
    pub metadata: Metadata,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredDocument {
    pub collection_id: String,
    pub chunk_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestedDocument {
    pub collection_id: String,
    pub source_path: String,
    pub sections: SectionMap,
    pub citations: CitationSet,
    pub chunk_count: usize,
    #[serde(skip)]
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaperRecord {
    pub title: String,
    pub authors: Vec<String>,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    pub url: String,
    pub published: String,
    pub source: String,
    pub citations: Option<u64>,
    pub venue: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub categories: Vec<String>,
}

impl PaperRecord {
    pub fn citation_count(&self) -> u64 {
        self.citations.unwrap_or(0)
    }

    pub fn publication_year(&self) -> i32 {
        self.published
            .split('-')
            .next()
            .and_then(|year| year.trim().parse().ok())
            .unwrap_or(0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CitationReport {
    pub in_text_citations: Vec<String>,
    pub reference_list: Vec<String>,
    pub citation_count: usize,
}

impl From<&CitationSet> for CitationReport {
    fn from(value: &CitationSet) -> Self {
        Self {
            in_text_citations: value.to_vec(),
            reference_list: Vec::new(),
            citation_count: value.len(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaperAnalysis {
    pub title: String,
    pub summary: String,
    pub citations: CitationReport,
    pub objective: String,
    pub introduction: String,
    pub methodology: String,
    pub results: String,
    pub research_gap: String,
    pub similar_papers: Vec<PaperRecord>,
    pub sections: SectionMap,
    pub collection_name: String,
}

/// Result of a full paper analysis. Failures serialize as `{"error": "..."}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnalysisOutcome {
    Completed(Box<PaperAnalysis>),
    Failed { error: String },
}

impl AnalysisOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, AnalysisOutcome::Failed { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn section_map_always_serializes_all_keys() -> Result<(), serde_json::Error> {
        let value = serde_json::to_value(SectionMap::default())?;
        let object = value.as_object().map(|map| map.len());
        assert_eq!(object, Some(6));
        for name in SectionName::ALL {
            assert_eq!(value[name.as_str()], "");
        }
        Ok(())
    }

    #[test]
    fn publication_year_handles_dates_years_and_unknown() {
        let mut paper = PaperRecord {
            title: "T".to_string(),
            authors: Vec::new(),
            abstract_text: String::new(),
            url: String::new(),
            published: "2021-03-04".to_string(),
            source: "ArXiv".to_string(),
            citations: None,
            venue: None,
            categories: Vec::new(),
        };
        assert_eq!(paper.publication_year(), 2021);

        paper.published = "2019".to_string();
        assert_eq!(paper.publication_year(), 2019);

        paper.published = "Unknown".to_string();
        assert_eq!(paper.publication_year(), 0);
        assert_eq!(paper.citation_count(), 0);
    }

    #[test]
    fn failed_outcome_serializes_as_error_object() -> Result<(), serde_json::Error> {
        let outcome = AnalysisOutcome::Failed {
            error: "boom".to_string(),
        };
        assert_eq!(serde_json::to_string(&outcome)?, r#"{"error":"boom"}"#);
        Ok(())
    }
}
