use crate::models::CitationSet;
use regex::Regex;

const CITATION_PATTERNS: [&str; 5] = [
    // [1]
    r"\[(\d+)\]",
    // (Author, 2023)
    r"\(([^)]+,\s*\d{4})\)",
    // Author et al., 2023
    r"\b([A-Z][a-z]+\s+et\s+al\.,\s*\d{4})\b",
    // Author and Author, 2023
    r"\b([A-Z][a-z]+\s+and\s+[A-Z][a-z]+,\s*\d{4})\b",
    // Author, 2023
    r"\b([A-Z][a-z]+,\s*\d{4})\b",
];

#[derive(Debug, Clone)]
pub struct CitationExtractor {
    patterns: Vec<Regex>,
}

impl CitationExtractor {
    pub fn new() -> Result<Self, regex::Error> {
        let patterns = CITATION_PATTERNS
            .iter()
            .map(|pattern| Regex::new(pattern))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    pub fn extract(&self, text: &str) -> CitationSet {
        let mut citations = CitationSet::default();
        for pattern in &self.patterns {
            for captures in pattern.captures_iter(text) {
                if let Some(citation) = captures.get(1) {
                    citations.insert(citation.as_str());
                }
            }
        }
        citations
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extractor() -> CitationExtractor {
        CitationExtractor::new().expect("citation patterns compile")
    }

    #[test]
    fn mixed_citation_styles_are_found() {
        let citations = extractor().extract("[1] Smith, 2020 and Jones et al., 2021");

        assert!(citations.contains("1"));
        assert!(citations.iter().any(|citation| citation.contains("2020")));
        assert!(citations.iter().any(|citation| citation.contains("2021")));
        assert!(citations.contains("Jones et al., 2021"));
    }

    #[test]
    fn deduplication_is_exact_and_stable() {
        let text = "As shown (Smith, 2020) and again Smith, 2020 or [2] [2] [10].";
        let first = extractor().extract(text);
        let second = extractor().extract(text);

        assert_eq!(first, second);
        assert_eq!(first.to_vec(), vec!["10", "2", "Smith, 2020"]);
    }

    #[test]
    fn variants_are_not_merged() {
        let citations = extractor().extract("(Lee and Kim, 2019) versus Kim et al., 2019");

        assert!(citations.contains("Lee and Kim, 2019"));
        assert!(citations.contains("Kim, 2019"));
        assert!(citations.contains("Kim et al., 2019"));
    }

    #[test]
    fn plain_text_has_no_citations() {
        assert!(extractor().extract("no references in this sentence").is_empty());
    }
}
