//! Document chunking strategies.
//!
//! This module provides the [`Chunker`] trait and two implementations:
//!
//! - [`SentenceChunker`] — splits at sentence-ending punctuation, skipping abbreviations
//! - [`WordWindowChunker`] — splits into non-overlapping windows of N words
//!
//! A corpus is always built with exactly one strategy; the strategy is recorded
//! in the [`CorpusManifest`](crate::CorpusManifest) next to the index.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::document::Chunk;

/// Default number of words per chunk for [`ChunkingStrategy::WordWindow`].
pub const DEFAULT_WINDOW_WORDS: usize = 300;

/// Which chunker to build a corpus with.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum ChunkingStrategy {
    /// One chunk per sentence.
    #[default]
    Sentence,
    /// Fixed windows of `words` whitespace-separated words.
    WordWindow {
        /// Words per chunk.
        words: usize,
    },
}

impl ChunkingStrategy {
    /// Instantiate the chunker for this strategy.
    pub fn chunker(self) -> Box<dyn Chunker> {
        match self {
            Self::Sentence => Box::new(SentenceChunker),
            Self::WordWindow { words } => Box::new(WordWindowChunker::new(words)),
        }
    }
}

impl fmt::Display for ChunkingStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sentence => f.write_str("sentence"),
            Self::WordWindow { words } => write!(f, "word_window({words})"),
        }
    }
}

/// A strategy for splitting cleaned document text into chunks.
///
/// Implementations return chunks in document order with ids `0..n` and never
/// return empty or whitespace-only chunks.
pub trait Chunker: Send + Sync {
    /// Split text into chunks. Returns an empty `Vec` for blank input.
    fn chunk(&self, text: &str) -> Vec<Chunk>;

    /// The strategy this chunker implements.
    fn strategy(&self) -> ChunkingStrategy;
}

/// Number fragments in order, dropping ones without a letter or digit
/// (blank text, or separators left behind by the contact scrub).
fn number_fragments<'a>(fragments: impl IntoIterator<Item = &'a str>) -> Vec<Chunk> {
    fragments
        .into_iter()
        .map(str::trim)
        .filter(|text| text.chars().any(char::is_alphanumeric))
        .enumerate()
        .map(|(id, text)| Chunk { id, text: text.to_string() })
        .collect()
}

/// Splits text into sentences.
///
/// A boundary is whitespace directly after `.`, `!` or `?`, unless the text
/// before it ends in an abbreviation: a dotted initialism such as `e.g.` or
/// `U.S.`, or a capitalised two-letter title such as `Mr.` or `Dr.`.
///
/// # Example
///
/// ```rust,ignore
/// use resume_rag::{Chunker, SentenceChunker};
///
/// let chunks = SentenceChunker.chunk("Built services. Led e.g. migrations.");
/// assert_eq!(chunks.len(), 2);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct SentenceChunker;

impl SentenceChunker {
    fn split(text: &str) -> Vec<&str> {
        let chars: Vec<(usize, char)> = text.char_indices().collect();
        let mut pieces = Vec::new();
        let mut start = 0;

        for i in 1..chars.len() {
            let (pos, ch) = chars[i];
            if !ch.is_whitespace() || !matches!(chars[i - 1].1, '.' | '!' | '?') {
                continue;
            }
            if ends_with_abbreviation(&chars[..i]) {
                continue;
            }
            pieces.push(&text[start..pos]);
            start = pos + ch.len_utf8();
        }

        if start < text.len() {
            pieces.push(&text[start..]);
        }
        pieces
    }
}

fn is_word_char(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '_'
}

/// `before` ends with the punctuation mark that precedes a candidate boundary.
fn ends_with_abbreviation(before: &[(usize, char)]) -> bool {
    let n = before.len();
    if n >= 4 {
        let (a, dot, b) = (before[n - 4].1, before[n - 3].1, before[n - 2].1);
        if is_word_char(a) && dot == '.' && is_word_char(b) {
            return true;
        }
    }
    if n >= 3 {
        let (upper, lower, dot) = (before[n - 3].1, before[n - 2].1, before[n - 1].1);
        if upper.is_uppercase() && lower.is_lowercase() && dot == '.' {
            return true;
        }
    }
    false
}

impl Chunker for SentenceChunker {
    fn chunk(&self, text: &str) -> Vec<Chunk> {
        if text.trim().is_empty() {
            return Vec::new();
        }
        number_fragments(Self::split(text))
    }

    fn strategy(&self) -> ChunkingStrategy {
        ChunkingStrategy::Sentence
    }
}

/// Splits text into non-overlapping windows of a fixed number of words.
///
/// Words are separated by any whitespace; each chunk joins its words with a
/// single space, so line structure is not preserved.
#[derive(Debug, Clone)]
pub struct WordWindowChunker {
    words: usize,
}

impl WordWindowChunker {
    /// Create a chunker producing windows of `words` words (at least 1).
    pub fn new(words: usize) -> Self {
        Self { words: words.max(1) }
    }
}

impl Default for WordWindowChunker {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW_WORDS)
    }
}

impl Chunker for WordWindowChunker {
    fn chunk(&self, text: &str) -> Vec<Chunk> {
        let words: Vec<&str> = text.split_whitespace().collect();
        if words.is_empty() {
            return Vec::new();
        }

        let windows: Vec<String> =
            words.chunks(self.words).map(|window| window.join(" ")).collect();
        number_fragments(windows.iter().map(String::as_str))
    }

    fn strategy(&self) -> ChunkingStrategy {
        ChunkingStrategy::WordWindow { words: self.words }
    }
}
