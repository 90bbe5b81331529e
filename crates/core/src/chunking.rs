use crate::config::ResearchConfig;
use crate::error::ConfigError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkingConfig {
    pub chunk_size: usize,
    /// Accepted for compatibility. Sentence accumulation never repeats content.
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1_000,
            overlap: 200,
        }
    }
}

impl ChunkingConfig {
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self, ConfigError> {
        if chunk_size == 0 {
            return Err(ConfigError::Invalid("chunk_size must be positive".to_string()));
        }
        Ok(Self {
            chunk_size,
            overlap,
        })
    }
}

impl TryFrom<&ResearchConfig> for ChunkingConfig {
    type Error = ConfigError;

    fn try_from(value: &ResearchConfig) -> Result<Self, Self::Error> {
        Self::new(value.chunk_size, value.chunk_overlap)
    }
}

pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((offset, current)) = chars.next() {
        if !matches!(current, '.' | '!' | '?') {
            continue;
        }
        let end = offset + current.len_utf8();
        if !chars.peek().is_some_and(|(_, next)| next.is_whitespace()) {
            continue;
        }

        sentences.push(&text[start..end]);
        start = end;
        while let Some((position, next)) = chars.peek().copied() {
            if next.is_whitespace() {
                chars.next();
                start = position + next.len_utf8();
            } else {
                break;
            }
        }
    }

    sentences.push(&text[start..]);
    sentences
}

pub fn chunk_text(text: &str, config: ChunkingConfig) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for sentence in split_sentences(text) {
        if sentence.trim().is_empty() {
            continue;
        }

        let sentence_len = sentence.chars().count();
        if current_len + sentence_len >= config.chunk_size && !current.trim().is_empty() {
            chunks.push(current.trim().to_string());
            current.clear();
            current_len = 0;
        }

        current.push_str(sentence);
        current.push(' ');
        current_len += sentence_len + 1;
    }

    if !current.trim().is_empty() {
        chunks.push(current.trim().to_string());
    }

    chunks
}
