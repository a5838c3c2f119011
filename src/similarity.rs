//! Nearest-neighbour search over a corpus of known spam.
//!
//! The index is built lazily on first use. A failed build disables the
//! corpus for the rest of the process; it is never retried.

use crate::error::{CorpusError, SignalError};
use crate::vectorizer::{SparseVector, TfidfVectorizer};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

/// Best similarity must exceed this for a corpus entry to count as a match
pub const SIMILARITY_MATCH_THRESHOLD: f64 = 0.1;

#[derive(Debug, Clone, PartialEq)]
pub struct SimilarityMatch {
    pub text: Option<String>,
    pub score: f64,
}

impl SimilarityMatch {
    pub fn none() -> Self {
        Self {
            text: None,
            score: 0.0,
        }
    }

    pub fn is_match(&self) -> bool {
        self.text.is_some()
    }
}

pub trait SpamCorpus: Send + Sync {
    /// Closest known spam text and its cosine similarity, or no match.
    fn most_similar_spam(&self, text: &str) -> Result<SimilarityMatch, SignalError>;
}

/// Vectorized spam corpus ready for queries.
#[derive(Debug)]
pub struct SpamIndex {
    vectorizer: Arc<TfidfVectorizer>,
    messages: Vec<String>,
    vectors: Vec<SparseVector>,
}

impl SpamIndex {
    pub fn build(
        vectorizer: Arc<TfidfVectorizer>,
        messages: Vec<String>,
    ) -> Result<Self, CorpusError> {
        if messages.is_empty() {
            return Err(CorpusError::Empty);
        }

        let vectors = messages.iter().map(|m| vectorizer.transform(m)).collect();

        Ok(Self {
            vectorizer,
            messages,
            vectors,
        })
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn most_similar(&self, text: &str) -> SimilarityMatch {
        let query = self.vectorizer.transform(text);

        let mut best: Option<(usize, f64)> = None;
        for (index, vector) in self.vectors.iter().enumerate() {
            let score = query.cosine(vector);
            if best.map_or(true, |(_, best_score)| score > best_score) {
                best = Some((index, score));
            }
        }

        match best {
            Some((index, score)) if score > SIMILARITY_MATCH_THRESHOLD => SimilarityMatch {
                text: Some(self.messages[index].clone()),
                score,
            },
            _ => SimilarityMatch::none(),
        }
    }
}

/// Produces the spam index on first use.
pub trait IndexLoader: Send + Sync {
    fn load(&self) -> Result<SpamIndex, CorpusError>;
}

/// Loads spam messages from a two-column (label, message) CSV file.
#[derive(Debug)]
pub struct CsvCorpusLoader {
    path: PathBuf,
    delimiter: u8,
    has_headers: bool,
    vectorizer: Option<Arc<TfidfVectorizer>>,
}

impl CsvCorpusLoader {
    pub fn new(path: impl Into<PathBuf>, vectorizer: Option<Arc<TfidfVectorizer>>) -> Self {
        Self {
            path: path.into(),
            delimiter: b',',
            has_headers: true,
            vectorizer,
        }
    }

    pub fn delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn has_headers(mut self, has_headers: bool) -> Self {
        self.has_headers = has_headers;
        self
    }

    /// Read the spam-labelled messages, skipping rows that fail to parse.
    pub fn read_spam_messages(&self) -> Result<Vec<String>, CorpusError> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(self.delimiter)
            .has_headers(self.has_headers)
            .flexible(true)
            .from_path(&self.path)?;

        let mut messages = Vec::new();
        let mut skipped = 0usize;

        for (line, record) in reader.byte_records().enumerate() {
            let record = match record {
                Ok(record) => record,
                Err(e) => {
                    log::debug!("Skipping malformed corpus row {}: {}", line + 1, e);
                    skipped += 1;
                    continue;
                }
            };

            let (Some(label), Some(message)) = (record.get(0), record.get(1)) else {
                skipped += 1;
                continue;
            };

            if decode_field(label).trim().eq_ignore_ascii_case("spam") {
                messages.push(decode_field(message));
            }
        }

        if skipped > 0 {
            log::warn!(
                "Skipped {} unusable rows in spam corpus {}",
                skipped,
                self.path.display()
            );
        }

        Ok(messages)
    }
}

impl IndexLoader for CsvCorpusLoader {
    fn load(&self) -> Result<SpamIndex, CorpusError> {
        let vectorizer = self.vectorizer.clone().ok_or(CorpusError::NoVectorizer)?;
        let messages = self.read_spam_messages()?;
        let index = SpamIndex::build(vectorizer, messages)?;

        log::info!(
            "Spam corpus index built from {} ({} messages)",
            self.path.display(),
            index.len()
        );
        Ok(index)
    }
}

/// UTF-8 when valid, otherwise Latin-1 (every byte maps to one code point).
fn decode_field(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => bytes.iter().map(|&b| b as char).collect(),
    }
}

#[derive(Debug)]
enum IndexState {
    Uninitialized,
    Ready(Arc<SpamIndex>),
    Disabled,
}

/// Similarity port backed by a lazily built [`SpamIndex`].
pub struct LazySpamIndex {
    loader: Box<dyn IndexLoader>,
    state: Mutex<IndexState>,
}

impl LazySpamIndex {
    pub fn new(loader: impl IndexLoader + 'static) -> Self {
        Self {
            loader: Box::new(loader),
            state: Mutex::new(IndexState::Uninitialized),
        }
    }

    pub fn is_disabled(&self) -> bool {
        matches!(
            self.state.lock().as_deref(),
            Ok(IndexState::Disabled) | Err(_)
        )
    }

    /// Ready index, building it on the first call. The lock is held across
    /// the build so concurrent first callers wait instead of building twice.
    fn index(&self) -> Option<Arc<SpamIndex>> {
        let mut state = match self.state.lock() {
            Ok(state) => state,
            Err(_) => {
                log::error!("Spam corpus state lock poisoned, similarity disabled");
                return None;
            }
        };

        match &*state {
            IndexState::Ready(index) => return Some(Arc::clone(index)),
            IndexState::Disabled => return None,
            IndexState::Uninitialized => {}
        }

        match self.loader.load() {
            Ok(index) => {
                let index = Arc::new(index);
                *state = IndexState::Ready(Arc::clone(&index));
                Some(index)
            }
            Err(e) => {
                log::error!("Error loading spam corpus, similarity search disabled: {e}");
                *state = IndexState::Disabled;
                None
            }
        }
    }
}

impl SpamCorpus for LazySpamIndex {
    fn most_similar_spam(&self, text: &str) -> Result<SimilarityMatch, SignalError> {
        Ok(self
            .index()
            .map(|index| index.most_similar(text))
            .unwrap_or_else(SimilarityMatch::none))
    }
}
