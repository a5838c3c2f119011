use crate::error::{ModelError, SignalError};
use crate::vectorizer::{SparseVector, TfidfVectorizer, VectorizerParams};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

/// Index of the spam class in the persisted classifier tables
pub const SPAM_CLASS: usize = 1;

/// Trained model that answers "how likely is this text spam".
pub trait SpamClassifier: Send + Sync {
    /// Probability in `[0, 1]` that `text` is spam.
    fn spam_probability(&self, text: &str) -> Result<f64, SignalError>;

    fn name(&self) -> &str;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NaiveBayesParams {
    /// Log prior per class, `[ham, spam]`
    pub class_log_prior: Vec<f64>,
    /// Log likelihood of each feature per class, `[ham, spam]`
    pub feature_log_prob: Vec<Vec<f64>>,
}

/// On-disk model artifact produced by the training step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub vectorizer: VectorizerParams,
    pub classifier: NaiveBayesParams,
}

impl ModelArtifact {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ModelError> {
        let content = std::fs::read_to_string(path)?;
        let artifact: ModelArtifact = serde_json::from_str(&content)?;
        artifact.validate()?;
        Ok(artifact)
    }

    pub fn validate(&self) -> Result<(), ModelError> {
        let features = self.vectorizer.idf.len();

        if self.classifier.class_log_prior.len() != 2 {
            return Err(ModelError::Shape(format!(
                "expected 2 classes, found {}",
                self.classifier.class_log_prior.len()
            )));
        }
        if self.classifier.feature_log_prob.len() != 2 {
            return Err(ModelError::Shape(format!(
                "expected 2 feature rows, found {}",
                self.classifier.feature_log_prob.len()
            )));
        }
        for (class, row) in self.classifier.feature_log_prob.iter().enumerate() {
            if row.len() != features {
                return Err(ModelError::Shape(format!(
                    "class {} has {} features, vectorizer has {}",
                    class,
                    row.len(),
                    features
                )));
            }
        }
        if let Some((token, index)) = self
            .vectorizer
            .vocabulary
            .iter()
            .find(|(_, &index)| index >= features)
        {
            return Err(ModelError::Shape(format!(
                "token '{}' maps to feature {} outside {} idf weights",
                token, index, features
            )));
        }

        Ok(())
    }
}

/// Multinomial naive Bayes over TF-IDF features.
#[derive(Debug)]
pub struct NaiveBayesModel {
    vectorizer: Arc<TfidfVectorizer>,
    class_log_prior: Vec<f64>,
    feature_log_prob: Vec<Vec<f64>>,
}

impl NaiveBayesModel {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ModelError> {
        let path = path.as_ref();
        let model = Self::from_artifact(ModelArtifact::from_file(path)?)?;
        log::info!(
            "Loaded spam model from {} ({} features)",
            path.display(),
            model.vectorizer.feature_count()
        );
        Ok(model)
    }

    pub fn from_artifact(artifact: ModelArtifact) -> Result<Self, ModelError> {
        artifact.validate()?;
        Ok(Self {
            vectorizer: Arc::new(TfidfVectorizer::from_params(artifact.vectorizer)),
            class_log_prior: artifact.classifier.class_log_prior,
            feature_log_prob: artifact.classifier.feature_log_prob,
        })
    }

    /// The vectorizer the model was trained with, shared with the similarity index.
    pub fn vectorizer(&self) -> Arc<TfidfVectorizer> {
        Arc::clone(&self.vectorizer)
    }

    fn joint_log_likelihood(&self, features: &SparseVector) -> Vec<f64> {
        self.class_log_prior
            .iter()
            .zip(&self.feature_log_prob)
            .map(|(prior, row)| {
                prior
                    + features
                        .entries()
                        .iter()
                        .map(|(index, weight)| weight * row[*index])
                        .sum::<f64>()
            })
            .collect()
    }
}

impl SpamClassifier for NaiveBayesModel {
    fn spam_probability(&self, text: &str) -> Result<f64, SignalError> {
        let jll = self.joint_log_likelihood(&self.vectorizer.transform(text));

        // log-sum-exp normalisation
        let max = jll.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        if !max.is_finite() {
            return Err(SignalError::Inference(
                "joint log likelihood is not finite".to_string(),
            ));
        }
        let total: f64 = jll.iter().map(|v| (v - max).exp()).sum();
        let probability = (jll[SPAM_CLASS] - max).exp() / total;

        if probability.is_finite() {
            Ok(probability)
        } else {
            Err(SignalError::Inference(format!(
                "probability {} is not finite",
                probability
            )))
        }
    }

    fn name(&self) -> &str {
        "naive-bayes"
    }
}

/// Stand-in used when no model artifact could be loaded at start-up.
#[derive(Debug, Clone)]
pub struct DisabledClassifier {
    reason: String,
}

impl DisabledClassifier {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl SpamClassifier for DisabledClassifier {
    fn spam_probability(&self, _text: &str) -> Result<f64, SignalError> {
        Err(SignalError::Unavailable(self.reason.clone()))
    }

    fn name(&self) -> &str {
        "disabled"
    }
}
