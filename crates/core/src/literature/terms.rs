use regex::Regex;
use std::collections::HashSet;

const STOP_WORDS: [&str; 54] = [
    "the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by",
    "this", "that", "these", "those", "is", "are", "was", "were", "be", "been", "being", "have",
    "has", "had", "do", "does", "did", "will", "would", "could", "should", "may", "might",
    "must", "can", "cannot", "using", "based", "approach", "method", "paper", "study",
    "research", "analysis", "application", "system", "model", "framework", "algorithm",
    "technique",
];

#[derive(Debug, Clone)]
pub struct KeyTermExtractor {
    word: Regex,
    stop_words: HashSet<&'static str>,
}

impl KeyTermExtractor {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            word: Regex::new(r"\b[a-z]+\b")?,
            stop_words: STOP_WORDS.into_iter().collect(),
        })
    }

    pub fn extract(&self, text: &str) -> Vec<String> {
        let lowered = text.to_lowercase();
        let mut terms = self
            .word
            .find_iter(&lowered)
            .map(|word| word.as_str())
            .filter(|word| word.len() > 3 && !self.stop_words.contains(word))
            .collect::<Vec<_>>();
        terms.sort_by(|left, right| right.len().cmp(&left.len()));

        let mut seen = HashSet::new();
        terms
            .into_iter()
            .filter(|term| seen.insert(*term))
            .map(str::to_string)
            .collect()
    }
}

pub fn title_similarity(left: &str, right: &str) -> f64 {
    let left = left.split_whitespace().collect::<HashSet<_>>();
    let right = right.split_whitespace().collect::<HashSet<_>>();
    if left.is_empty() || right.is_empty() {
        return 0.0;
    }

    let intersection = left.intersection(&right).count();
    let union = left.union(&right).count();
    intersection as f64 / union as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract(text: &str) -> Vec<String> {
        KeyTermExtractor::new()
            .expect("word pattern compiles")
            .extract(text)
    }

    #[test]
    fn stop_words_and_short_words_are_dropped() {
        let terms = extract("The transformer model is used for retrieval and ranking");
        assert_eq!(terms, vec!["transformer", "retrieval", "ranking", "used"]);
    }

    #[test]
    fn longer_terms_come_first_and_ties_keep_order() {
        let terms = extract("graph nodes edges graph embeddings");
        assert_eq!(terms, vec!["embeddings", "graph", "nodes", "edges"]);
    }

    #[test]
    fn words_glued_to_digits_are_skipped() {
        let terms = extract("BERT-based, GPT4 (large-scale) retrieval!");
        assert_eq!(terms, vec!["retrieval", "large", "scale", "bert"]);
    }

    #[test]
    fn similar_titles_overlap_partially() {
        let similarity = title_similarity(
            "deep learning for nlp",
            "deep learning for natural language processing",
        );
        assert!((similarity - 3.0 / 7.0).abs() < 1e-9);
    }

    #[test]
    fn identical_titles_are_fully_similar() {
        assert_eq!(title_similarity("graph neural networks", "graph neural networks"), 1.0);
        assert_eq!(title_similarity("", "graph"), 0.0);
    }
}
