//! TF-IDF transform over a persisted vocabulary.
//!
//! Only the transform half lives here. Vocabulary, idf weights and stop words
//! come from the trained model artifact, so query vectors produced for the
//! classifier and for the similarity index are directly comparable.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};

/// Persisted vectorizer parameters as stored in the model artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorizerParams {
    pub vocabulary: HashMap<String, usize>,
    pub idf: Vec<f64>,
    #[serde(default)]
    pub stop_words: Vec<String>,
    #[serde(default)]
    pub sublinear_tf: bool,
}

/// Sparse feature vector, entries sorted by feature index.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SparseVector {
    entries: Vec<(usize, f64)>,
}

impl SparseVector {
    pub fn from_map(map: BTreeMap<usize, f64>) -> Self {
        Self {
            entries: map.into_iter().filter(|(_, w)| *w != 0.0).collect(),
        }
    }

    pub fn entries(&self) -> &[(usize, f64)] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn norm(&self) -> f64 {
        self.entries.iter().map(|(_, w)| w * w).sum::<f64>().sqrt()
    }

    pub fn dot(&self, other: &SparseVector) -> f64 {
        let (mut i, mut j) = (0, 0);
        let mut sum = 0.0;

        while i < self.entries.len() && j < other.entries.len() {
            let (a_idx, a_w) = self.entries[i];
            let (b_idx, b_w) = other.entries[j];
            match a_idx.cmp(&b_idx) {
                std::cmp::Ordering::Less => i += 1,
                std::cmp::Ordering::Greater => j += 1,
                std::cmp::Ordering::Equal => {
                    sum += a_w * b_w;
                    i += 1;
                    j += 1;
                }
            }
        }

        sum
    }

    /// Cosine similarity; 0.0 when either vector is all zeros.
    pub fn cosine(&self, other: &SparseVector) -> f64 {
        let denominator = self.norm() * other.norm();
        if denominator == 0.0 {
            0.0
        } else {
            self.dot(other) / denominator
        }
    }
}

pub struct TfidfVectorizer {
    vocabulary: HashMap<String, usize>,
    idf: Vec<f64>,
    stop_words: HashSet<String>,
    sublinear_tf: bool,
    token_regex: Regex,
}

impl std::fmt::Debug for TfidfVectorizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TfidfVectorizer")
            .field("features", &self.idf.len())
            .field("stop_words", &self.stop_words.len())
            .field("sublinear_tf", &self.sublinear_tf)
            .finish()
    }
}

impl TfidfVectorizer {
    /// Build a vectorizer from persisted parameters. The caller is expected to
    /// have validated that every vocabulary index addresses `idf`.
    pub fn from_params(params: VectorizerParams) -> Self {
        Self {
            vocabulary: params.vocabulary,
            idf: params.idf,
            stop_words: params
                .stop_words
                .into_iter()
                .map(|w| w.to_lowercase())
                .collect(),
            sublinear_tf: params.sublinear_tf,
            // Tokens of two or more word characters
            token_regex: Regex::new(r"\b\w\w+\b").unwrap(),
        }
    }

    pub fn feature_count(&self) -> usize {
        self.idf.len()
    }

    pub fn tokenize(&self, text: &str) -> Vec<String> {
        let lowered = text.to_lowercase();
        self.token_regex
            .find_iter(&lowered)
            .map(|m| m.as_str().to_string())
            .filter(|token| !self.stop_words.contains(token))
            .collect()
    }

    pub fn transform(&self, text: &str) -> SparseVector {
        let mut counts: BTreeMap<usize, f64> = BTreeMap::new();
        for token in self.tokenize(text) {
            if let Some(&index) = self.vocabulary.get(&token) {
                if index < self.idf.len() {
                    *counts.entry(index).or_insert(0.0) += 1.0;
                }
            }
        }

        for (index, weight) in counts.iter_mut() {
            let tf = if self.sublinear_tf {
                1.0 + weight.ln()
            } else {
                *weight
            };
            *weight = tf * self.idf[*index];
        }

        let norm = counts.values().map(|w| w * w).sum::<f64>().sqrt();
        if norm > 0.0 {
            for weight in counts.values_mut() {
                *weight /= norm;
            }
        }

        SparseVector::from_map(counts)
    }
}
