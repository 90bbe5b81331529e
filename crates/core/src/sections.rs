//! Each section has a header rule and a boundary rule. The body is the shortest
//! non-empty run after the header that ends at the boundary, a paragraph break,
//! or the end of the text. Rules run independently, so spans may overlap.

use crate::models::{SectionMap, SectionName};
use regex::Regex;

const SECTION_RULES: [(SectionName, &str, &str); 6] = [
    (
        SectionName::Abstract,
        r"(?i)abstract\s*",
        r"(?i)\n\n|\n(?:introduction|1\.|keywords)",
    ),
    (
        SectionName::Introduction,
        r"(?i)(?:introduction|1\.?\s*introduction)\s*",
        r"(?i)\n\n|\n(?:2\.|methodology|method|literature)",
    ),
    (
        SectionName::Methodology,
        r"(?i)(?:methodology|methods?|2\.?\s*(?:methodology|methods?))\s*",
        r"(?i)\n\n|\n(?:3\.|results|findings)",
    ),
    (
        SectionName::Results,
        r"(?i)(?:results|findings|3\.?\s*(?:results|findings))\s*",
        r"(?i)\n\n|\n(?:4\.|discussion|conclusion)",
    ),
    (
        SectionName::Conclusion,
        r"(?i)(?:conclusion|conclusions?|4\.?\s*conclusion)\s*",
        r"(?i)\n\n|\n(?:references|bibliography)",
    ),
    (
        SectionName::References,
        r"(?i)(?:references|bibliography)\s*",
        r"\n\n",
    ),
];

#[derive(Debug, Clone)]
struct SectionRule {
    name: SectionName,
    header: Regex,
    boundary: Regex,
}

impl SectionRule {
    fn capture(&self, text: &str) -> Option<String> {
        self.header.find_iter(text).find_map(|header| {
            let start = header.end();
            let first = text[start..].chars().next()?;
            let end = self
                .boundary
                .find_at(text, start + first.len_utf8())
                .map_or(text.len(), |boundary| boundary.start());
            Some(text[start..end].trim().to_string())
        })
    }
}

#[derive(Debug, Clone)]
pub struct SectionSegmenter {
    rules: Vec<SectionRule>,
}

impl SectionSegmenter {
    pub fn new() -> Result<Self, regex::Error> {
        let rules = SECTION_RULES
            .iter()
            .map(|(name, header, boundary)| {
                Ok(SectionRule {
                    name: *name,
                    header: Regex::new(header)?,
                    boundary: Regex::new(boundary)?,
                })
            })
            .collect::<Result<Vec<_>, regex::Error>>()?;

        Ok(Self { rules })
    }

    pub fn segment(&self, text: &str) -> SectionMap {
        let mut sections = SectionMap::default();
        for rule in &self.rules {
            if let Some(body) = rule.capture(text) {
                sections.set(rule.name, body);
            }
        }
        sections
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segmenter() -> SectionSegmenter {
        SectionSegmenter::new().expect("section rules compile")
    }

    #[test]
    fn empty_text_yields_every_key_empty() {
        let sections = segmenter().segment("");
        for name in SectionName::ALL {
            assert_eq!(sections.get(name), "");
        }
    }

    #[test]
    fn abstract_stops_at_numbered_heading() {
        let text = "Title\nAbstract\nWe study retrieval over papers.\n1. Introduction\nPapers are long.";
        let sections = segmenter().segment(text);

        assert_eq!(sections.abstract_text, "We study retrieval over papers.");
        assert_eq!(sections.introduction, "Papers are long.");
    }

    #[test]
    fn headers_are_case_insensitive() {
        let sections = segmenter().segment("ABSTRACT: Short summary.\n\nBody");
        assert_eq!(sections.abstract_text, ": Short summary.");
    }

    #[test]
    fn paragraph_break_ends_a_section() {
        let text = "Results\nAccuracy improved by 4 points.\n\nUnrelated trailing text.";
        let sections = segmenter().segment(text);
        assert_eq!(sections.results, "Accuracy improved by 4 points.");
    }

    #[test]
    fn section_runs_to_end_of_text_without_boundary() {
        let sections = segmenter().segment("Conclusion\nIt works.");
        assert_eq!(sections.conclusion, "It works.");
    }

    #[test]
    fn missing_sections_stay_empty() {
        let sections = segmenter().segment("Abstract\nOnly an abstract here.");
        assert_eq!(sections.abstract_text, "Only an abstract here.");
        assert_eq!(sections.methodology, "");
        assert_eq!(sections.references, "");
    }

    #[test]
    fn conclusion_stops_before_references() {
        let text = "4. Conclusion\nRetrieval helps.\nReferences\n[1] A. Author. A paper. 2020.";
        let sections = segmenter().segment(text);

        assert_eq!(sections.conclusion, "Retrieval helps.");
        assert_eq!(sections.references, "[1] A. Author. A paper. 2020.");
    }

    #[test]
    fn header_at_end_of_text_is_ignored() {
        let sections = segmenter().segment("see the references");
        assert_eq!(sections.references, "");
    }
}
