//! Fixtures and port stubs shared by the unit tests.

use crate::classifier::{ModelArtifact, NaiveBayesParams, SpamClassifier};
use crate::error::SignalError;
use crate::similarity::{SimilarityMatch, SpamCorpus};
use crate::vectorizer::{TfidfVectorizer, VectorizerParams};
use std::sync::atomic::{AtomicUsize, Ordering};

pub fn sample_vectorizer_params() -> VectorizerParams {
    let vocabulary = ["claim", "prize", "money", "meeting", "tomorrow", "report"]
        .iter()
        .enumerate()
        .map(|(i, t)| (t.to_string(), i))
        .collect();

    VectorizerParams {
        vocabulary,
        idf: vec![1.0; 6],
        stop_words: vec!["the".to_string(), "your".to_string()],
        sublinear_tf: false,
    }
}

pub fn sample_vectorizer() -> TfidfVectorizer {
    TfidfVectorizer::from_params(sample_vectorizer_params())
}

/// Two-class model: spam-leaning on claim/prize/money, ham-leaning on
/// meeting/tomorrow/report. Priors are 0.7 ham / 0.3 spam.
pub fn sample_artifact() -> ModelArtifact {
    let ham = [0.05, 0.05, 0.05, 0.3, 0.3, 0.25];
    let spam = [0.3, 0.3, 0.3, 0.03, 0.03, 0.04];

    ModelArtifact {
        vectorizer: sample_vectorizer_params(),
        classifier: NaiveBayesParams {
            class_log_prior: vec![0.7f64.ln(), 0.3f64.ln()],
            feature_log_prob: vec![
                ham.iter().map(|p: &f64| p.ln()).collect(),
                spam.iter().map(|p: &f64| p.ln()).collect(),
            ],
        },
    }
}

/// Classifier stub returning a fixed probability and counting its calls.
pub struct FixedClassifier {
    probability: f64,
    pub calls: AtomicUsize,
}

impl FixedClassifier {
    pub fn new(probability: f64) -> Self {
        Self {
            probability,
            calls: AtomicUsize::new(0),
        }
    }
}

impl SpamClassifier for FixedClassifier {
    fn spam_probability(&self, _text: &str) -> Result<f64, SignalError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.probability)
    }

    fn name(&self) -> &str {
        "fixed"
    }
}

pub struct FailingClassifier;

impl SpamClassifier for FailingClassifier {
    fn spam_probability(&self, _text: &str) -> Result<f64, SignalError> {
        Err(SignalError::Inference("model exploded".to_string()))
    }

    fn name(&self) -> &str {
        "failing"
    }
}

/// Corpus stub returning a fixed match.
pub struct FixedCorpus {
    matched: SimilarityMatch,
}

impl FixedCorpus {
    pub fn new(text: Option<&str>, score: f64) -> Self {
        Self {
            matched: SimilarityMatch {
                text: text.map(str::to_string),
                score,
            },
        }
    }

    pub fn empty() -> Self {
        Self::new(None, 0.0)
    }
}

impl SpamCorpus for FixedCorpus {
    fn most_similar_spam(&self, _text: &str) -> Result<SimilarityMatch, SignalError> {
        Ok(self.matched.clone())
    }
}

pub struct FailingCorpus;

impl SpamCorpus for FailingCorpus {
    fn most_similar_spam(&self, _text: &str) -> Result<SimilarityMatch, SignalError> {
        Err(SignalError::Unavailable("corpus offline".to_string()))
    }
}
