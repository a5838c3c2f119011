//! Hybrid Decision Engine
//!
//! Merges the keyword heuristic, the trained classifier and the known-spam
//! similarity search into one verdict with an ordered list of reasons.
//! Signals are evaluated in a fixed order and can only escalate the verdict:
//! neither `is_spam` nor `score` ever decreases from one stage to the next.

use crate::classifier::{DisabledClassifier, NaiveBayesModel, SpamClassifier};
use crate::config::Config;
use crate::heuristics::KeywordScanner;
use crate::message::LEGITIMATE_REASON;
use crate::similarity::{CsvCorpusLoader, LazySpamIndex, SimilarityMatch, SpamCorpus};
use std::sync::Arc;

/// Model probability above which the classifier alone flags spam
pub const MODEL_SPAM_THRESHOLD: f64 = 0.5;
/// Similarity above which a match escalates a clean verdict to spam
pub const SIMILARITY_ESCALATION_THRESHOLD: f64 = 0.3;
/// Minimum score assigned when similarity escalates the verdict
pub const SIMILARITY_ESCALATION_SCORE: f64 = 0.8;

pub const REASON_SEPARATOR: &str = " | ";

#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    pub is_spam: bool,
    pub score: f64,
    pub reasons: Vec<String>,
    pub similar_spam: Option<String>,
}

impl Decision {
    fn legitimate() -> Self {
        Self {
            is_spam: false,
            score: 0.0,
            reasons: Vec::new(),
            similar_spam: None,
        }
    }

    /// Reasons joined in the order they triggered, or the legitimate sentinel.
    pub fn reason_text(&self) -> String {
        if self.reasons.is_empty() {
            LEGITIMATE_REASON.to_string()
        } else {
            self.reasons.join(REASON_SEPARATOR)
        }
    }
}

/// Truncated integer percentage used in reason strings (0.876 -> 87).
fn percent(value: f64) -> u32 {
    (value * 100.0).trunc() as u32
}

/// Shared, read-only classification context.
#[derive(Clone)]
pub struct DecisionEngine {
    scanner: KeywordScanner,
    classifier: Arc<dyn SpamClassifier>,
    corpus: Arc<dyn SpamCorpus>,
}

impl DecisionEngine {
    pub fn new(
        scanner: KeywordScanner,
        classifier: Arc<dyn SpamClassifier>,
        corpus: Arc<dyn SpamCorpus>,
    ) -> Self {
        log::info!(
            "DecisionEngine initialized - {} keywords, classifier '{}'",
            scanner.keywords().len(),
            classifier.name()
        );
        Self {
            scanner,
            classifier,
            corpus,
        }
    }

    /// Wire the engine from configuration: load the model once and point the
    /// lazy corpus index at the same vectorizer. A missing model degrades to a
    /// disabled classifier instead of failing start-up.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let (classifier, vectorizer) = match NaiveBayesModel::load(&config.model_path) {
            Ok(model) => {
                let vectorizer = model.vectorizer();
                let classifier: Arc<dyn SpamClassifier> = Arc::new(model);
                (classifier, Some(vectorizer))
            }
            Err(e) => {
                log::warn!(
                    "Failed to load spam model {}, classifier disabled: {}",
                    config.model_path,
                    e
                );
                let classifier: Arc<dyn SpamClassifier> =
                    Arc::new(DisabledClassifier::new(e.to_string()));
                (classifier, None)
            }
        };

        let loader = CsvCorpusLoader::new(&config.corpus.path, vectorizer)
            .delimiter(config.corpus.delimiter_byte()?)
            .has_headers(config.corpus.has_headers);

        Ok(Self::new(
            KeywordScanner::with_keywords(&config.heuristics.keywords),
            classifier,
            Arc::new(LazySpamIndex::new(loader)),
        ))
    }

    pub fn classify(&self, subject: &str, body: &str) -> Decision {
        let text = format!("{} {}", subject, body);
        let mut decision = Decision::legitimate();

        self.apply_heuristic(&text, &mut decision);
        self.apply_model(&text, &mut decision);
        self.apply_similarity(&text, &mut decision);

        decision
    }

    fn apply_heuristic(&self, text: &str, decision: &mut Decision) {
        if let Some(keyword) = self.scanner.first_match(text) {
            log::debug!("Keyword '{}' matched", keyword);
            decision.is_spam = true;
            decision.score = 1.0;
            decision
                .reasons
                .push("suspicious keyword detected".to_string());
        }
    }

    fn apply_model(&self, text: &str, decision: &mut Decision) {
        let probability = match self.classifier.spam_probability(text) {
            Ok(p) if (0.0..=1.0).contains(&p) => p,
            Ok(p) => {
                log::warn!(
                    "Classifier '{}' returned out-of-range probability {}, ignoring",
                    self.classifier.name(),
                    p
                );
                return;
            }
            Err(e) => {
                log::log!(
                    e.log_level(),
                    "Classifier '{}' skipped: {}",
                    self.classifier.name(),
                    e
                );
                return;
            }
        };

        if decision.is_spam {
            decision
                .reasons
                .push(format!("AI confirms suspicion ({}%)", percent(probability)));
        } else {
            decision.score = probability;
            if probability > MODEL_SPAM_THRESHOLD {
                decision.is_spam = true;
                decision.reasons.push(format!(
                    "AI detects spam patterns ({}%)",
                    percent(probability)
                ));
            }
        }
    }

    fn apply_similarity(&self, text: &str, decision: &mut Decision) {
        let matched = self.corpus.most_similar_spam(text).unwrap_or_else(|e| {
            log::log!(e.log_level(), "Similarity search skipped: {}", e);
            SimilarityMatch::none()
        });

        let Some(similar) = matched.text else {
            return;
        };

        decision.reasons.push(format!(
            "similar to known spam in DB ({}%)",
            percent(matched.score)
        ));
        if matched.score > SIMILARITY_ESCALATION_THRESHOLD && !decision.is_spam {
            decision.is_spam = true;
            decision.score = decision.score.max(SIMILARITY_ESCALATION_SCORE);
        }
        decision.similar_spam = Some(similar);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::NaiveBayesModel;
    use crate::error::SignalError;
    use crate::test_support::{
        sample_artifact, FailingClassifier, FailingCorpus, FixedClassifier, FixedCorpus,
    };

    fn build_engine(
        classifier: impl SpamClassifier + 'static,
        corpus: impl SpamCorpus + 'static,
    ) -> DecisionEngine {
        DecisionEngine::new(
            KeywordScanner::new(),
            Arc::new(classifier),
            Arc::new(corpus),
        )
    }

    #[test]
    fn test_keyword_short_circuits_to_full_score() {
        let engine = build_engine(FixedClassifier::new(0.87), FixedCorpus::empty());
        let decision = engine.classify("YOU WON!", "Click here to claim your prize.");

        assert!(decision.is_spam);
        assert_eq!(decision.score, 1.0);
        assert_eq!(
            decision.reason_text(),
            "suspicious keyword detected | AI confirms suspicion (87%)"
        );
    }

    #[test]
    fn test_keyword_wins_regardless_of_other_signals() {
        for probability in [0.0, 0.3, 0.99] {
            for corpus in [FixedCorpus::empty(), FixedCorpus::new(Some("spam"), 0.95)] {
                let engine = build_engine(FixedClassifier::new(probability), corpus);
                let decision = engine.classify("Totally", "free lunch");

                assert!(decision.is_spam);
                assert_eq!(decision.score, 1.0);
            }
        }
    }

    #[test]
    fn test_legitimate_message_keeps_model_score() {
        let engine = build_engine(FixedClassifier::new(0.05), FixedCorpus::empty());
        let decision = engine.classify("Meeting", "Don't forget the meeting tomorrow.");

        assert!(!decision.is_spam);
        assert_eq!(decision.score, 0.05);
        assert!(decision.reasons.is_empty());
        assert_eq!(decision.reason_text(), "Parece legitimo");
        assert_eq!(decision.similar_spam, None);
    }

    #[test]
    fn test_model_flags_spam_above_threshold() {
        let engine = build_engine(FixedClassifier::new(0.876), FixedCorpus::empty());
        let decision = engine.classify("Investment", "You have been selected.");

        assert!(decision.is_spam);
        assert_eq!(decision.score, 0.876);
        assert_eq!(decision.reasons, vec!["AI detects spam patterns (87%)"]);
    }

    #[test]
    fn test_model_threshold_is_exclusive() {
        let engine = build_engine(FixedClassifier::new(0.5), FixedCorpus::empty());
        let decision = engine.classify("Hello", "Just checking in.");

        assert!(!decision.is_spam);
        assert_eq!(decision.score, 0.5);
    }

    #[test]
    fn test_similarity_escalates_clean_verdict() {
        let engine = build_engine(
            FixedClassifier::new(0.2),
            FixedCorpus::new(Some("Congratulations you have been selected"), 0.45),
        );
        let decision = engine.classify("Hello", "You have been selected");

        assert!(decision.is_spam);
        assert_eq!(decision.score, 0.8);
        assert_eq!(decision.reasons, vec!["similar to known spam in DB (45%)"]);
        assert_eq!(
            decision.similar_spam.as_deref(),
            Some("Congratulations you have been selected")
        );
    }

    #[test]
    fn test_weak_similarity_only_adds_reason() {
        let engine = build_engine(
            FixedClassifier::new(0.2),
            FixedCorpus::new(Some("old spam"), 0.25),
        );
        let decision = engine.classify("Hello", "Some text");

        assert!(!decision.is_spam);
        assert_eq!(decision.score, 0.2);
        assert_eq!(decision.reason_text(), "similar to known spam in DB (25%)");
        assert_eq!(decision.similar_spam.as_deref(), Some("old spam"));
    }

    #[test]
    fn test_similarity_never_lowers_model_score() {
        let engine = build_engine(
            FixedClassifier::new(0.9),
            FixedCorpus::new(Some("old spam"), 0.6),
        );
        let decision = engine.classify("Hello", "Some text");

        assert!(decision.is_spam);
        assert_eq!(decision.score, 0.9);
        assert_eq!(
            decision.reason_text(),
            "AI detects spam patterns (90%) | similar to known spam in DB (60%)"
        );
    }

    #[test]
    fn test_failed_signals_are_neutral() {
        let engine = build_engine(FailingClassifier, FailingCorpus);
        let decision = engine.classify("Report needed", "Can you send me the monthly report?");

        assert_eq!(decision, Decision::legitimate());
        assert_eq!(decision.reason_text(), "Parece legitimo");
    }

    #[test]
    fn test_disabled_model_is_quiet_per_message() {
        let disabled = DisabledClassifier::new("model.json not found");
        let err = disabled.spam_probability("anything").unwrap_err();

        assert_eq!(err.log_level(), log::Level::Debug);
        assert_eq!(
            SignalError::Inference("bad input".to_string()).log_level(),
            log::Level::Warn
        );

        let engine = build_engine(disabled, FixedCorpus::empty());
        assert_eq!(
            engine.classify("Hello", "Some text"),
            Decision::legitimate()
        );
    }

    #[test]
    fn test_failed_model_still_allows_similarity() {
        let engine = build_engine(FailingClassifier, FixedCorpus::new(Some("old spam"), 0.31));
        let decision = engine.classify("Hello", "Some text");

        assert!(decision.is_spam);
        assert_eq!(decision.score, 0.8);
    }

    #[test]
    fn test_out_of_range_probability_is_ignored() {
        let engine = build_engine(FixedClassifier::new(1.7), FixedCorpus::empty());
        let decision = engine.classify("Hello", "Some text");

        assert!(!decision.is_spam);
        assert_eq!(decision.score, 0.0);

        let engine = build_engine(FixedClassifier::new(f64::NAN), FixedCorpus::empty());
        assert_eq!(engine.classify("Hello", "Some text").score, 0.0);
    }

    #[test]
    fn test_verdict_is_monotonic_across_stages() {
        let probabilities = [0.0, 0.05, 0.5, 0.51, 0.99];
        let similarities = [0.0, 0.1, 0.2, 0.3, 0.31, 0.9];
        let texts = [("Hello", "plain text"), ("Hola", "gratis para ti")];

        for &p in &probabilities {
            for &s in &similarities {
                for (subject, body) in texts {
                    let text = format!("{} {}", subject, body);
                    let scanner = KeywordScanner::new();
                    let corpus_text = (s > 0.1).then_some("old spam");
                    let engine =
                        build_engine(FixedClassifier::new(p), FixedCorpus::new(corpus_text, s));

                    let mut stage = Decision::legitimate();
                    engine.apply_heuristic(&text, &mut stage);
                    let after_heuristic = stage.clone();
                    engine.apply_model(&text, &mut stage);
                    let after_model = stage.clone();
                    engine.apply_similarity(&text, &mut stage);

                    assert!(after_model.score >= after_heuristic.score);
                    assert!(stage.score >= after_model.score);
                    assert!(after_model.is_spam >= after_heuristic.is_spam);
                    assert!(stage.is_spam >= after_model.is_spam);
                    assert_eq!(stage, engine.classify(subject, body));
                    assert_eq!(after_heuristic.is_spam, scanner.scan(&text));
                }
            }
        }
    }

    #[test]
    fn test_from_config_wires_model_and_corpus() {
        let dir = tempfile::tempdir().unwrap();
        let model_path = dir.path().join("model.json");
        let corpus_path = dir.path().join("spam.csv");
        std::fs::write(
            &model_path,
            serde_json::to_string(&sample_artifact()).unwrap(),
        )
        .unwrap();
        std::fs::write(
            &corpus_path,
            "label,message\nspam,claim the prize money\nham,meeting tomorrow\n",
        )
        .unwrap();

        let mut config = Config::default();
        config.model_path = model_path.to_string_lossy().into_owned();
        config.corpus.path = corpus_path.to_string_lossy().into_owned();

        let engine = DecisionEngine::from_config(&config).unwrap();
        let decision = engine.classify("Prize", "claim money");

        assert!(decision.is_spam);
        assert_eq!(
            decision.similar_spam.as_deref(),
            Some("claim the prize money")
        );
        assert_eq!(decision.reasons.len(), 2);
    }

    #[test]
    fn test_from_config_without_model_uses_keywords_only() {
        let dir = tempfile::tempdir().unwrap();
        let model_path = dir.path().join("absent.json");
        let corpus_path = dir.path().join("absent.csv");
        let mut config = Config::default();
        config.model_path = model_path.to_string_lossy().into_owned();
        config.corpus.path = corpus_path.to_string_lossy().into_owned();

        let engine = DecisionEngine::from_config(&config).unwrap();

        let spam = engine.classify("Gratis", "para ti");
        assert!(spam.is_spam);
        assert_eq!(spam.reasons, vec!["suspicious keyword detected"]);

        let ham = engine.classify("Meeting", "Don't forget the meeting tomorrow.");
        assert_eq!(ham, Decision::legitimate());
    }

    #[test]
    fn test_with_trained_model() {
        let model = NaiveBayesModel::from_artifact(sample_artifact()).unwrap();
        let engine = build_engine(model, FixedCorpus::empty());

        let spam = engine.classify("Money", "claim money prize");
        assert!(spam.is_spam);
        assert!(spam.reasons[0].starts_with("AI detects spam patterns ("));

        let ham = engine.classify("Meeting", "meeting tomorrow report");
        assert!(!ham.is_spam);
        assert!(ham.score < MODEL_SPAM_THRESHOLD);
    }
}
