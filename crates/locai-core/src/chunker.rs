//! Word-window chunking.
//!
//! The same function runs at build time and at query time; the metadata store
//! only remembers `(source_path, ordinal)`, so this must stay a pure function of
//! the text and the configuration.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Both fields are required when deserialised; `Settings` supplies defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkingConfig {
    /// Words per window.
    pub chunk_size: usize,
    /// Words shared by consecutive windows.
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self { chunk_size: 500, overlap: 50 }
    }
}

impl ChunkingConfig {
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self> {
        let config = Self { chunk_size, overlap };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(Error::InvalidConfig("chunk_size must be at least 1".to_string()));
        }
        if self.overlap >= self.chunk_size {
            return Err(Error::InvalidConfig(format!(
                "overlap ({}) must be smaller than chunk_size ({})",
                self.overlap, self.chunk_size
            )));
        }
        Ok(())
    }

    pub fn stride(&self) -> usize {
        self.chunk_size - self.overlap
    }
}

/// Split `text` into overlapping windows of whitespace-delimited words.
///
/// Windows advance by `chunk_size - overlap` words and the last window is the
/// first one that reaches the final word. Text with fewer words than
/// `chunk_size` yields a single chunk; blank text yields none.
pub fn chunk_text(text: &str, config: &ChunkingConfig) -> Result<Vec<String>> {
    config.validate()?;
    let words: Vec<&str> = text.split_whitespace().collect();
    let mut chunks = Vec::new();
    let mut start = 0;
    while start < words.len() {
        let end = (start + config.chunk_size).min(words.len());
        let chunk = words[start..end].join(" ");
        if !chunk.trim().is_empty() {
            chunks.push(chunk);
        }
        if end == words.len() {
            break;
        }
        start += config.stride();
    }
    Ok(chunks)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg(size: usize, overlap: usize) -> ChunkingConfig {
        ChunkingConfig::new(size, overlap).unwrap()
    }

    #[test]
    fn windows_share_overlap_words() {
        let chunks = chunk_text("w1 w2 w3 w4 w5", &cfg(3, 1)).unwrap();
        assert_eq!(chunks, vec!["w1 w2 w3", "w3 w4 w5"]);
    }

    #[test]
    fn short_text_is_one_chunk() {
        let chunks = chunk_text("machine learning is great", &ChunkingConfig::default()).unwrap();
        assert_eq!(chunks, vec!["machine learning is great"]);
    }

    #[test]
    fn whitespace_only_yields_nothing() {
        assert!(chunk_text("", &cfg(3, 1)).unwrap().is_empty());
        assert!(chunk_text(" \n\t  ", &cfg(3, 1)).unwrap().is_empty());
    }

    #[test]
    fn whitespace_runs_collapse_to_single_spaces() {
        let chunks = chunk_text("a\n\nb\t c   d", &cfg(10, 0)).unwrap();
        assert_eq!(chunks, vec!["a b c d"]);
    }

    #[test]
    fn zero_overlap_tiles_the_text() {
        let chunks = chunk_text("a b c d e f g", &cfg(3, 0)).unwrap();
        assert_eq!(chunks, vec!["a b c", "d e f", "g"]);
    }

    #[test]
    fn overlap_not_smaller_than_size_is_rejected() {
        assert!(matches!(ChunkingConfig::new(3, 3), Err(Error::InvalidConfig(_))));
        assert!(matches!(ChunkingConfig::new(0, 0), Err(Error::InvalidConfig(_))));
        let bad = ChunkingConfig { chunk_size: 2, overlap: 5 };
        assert!(matches!(chunk_text("a b c", &bad), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn every_word_is_covered() {
        let text: String = (0..1234).map(|i| format!("w{i} ")).collect();
        let chunks = chunk_text(&text, &ChunkingConfig::default()).unwrap();
        assert_eq!(chunks.len(), 3);
        assert!(chunks[0].starts_with("w0 "));
        assert!(chunks[1].starts_with("w450 "));
        assert!(chunks.last().unwrap().ends_with("w1233"));
    }
}
