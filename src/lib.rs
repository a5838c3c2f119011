pub mod classifier;
pub mod config;
pub mod decision;
pub mod error;
pub mod folders;
pub mod heuristics;
pub mod message;
pub mod pipeline;
pub mod similarity;
pub mod source;
pub mod vectorizer;

#[cfg(test)]
mod test_support;

pub use classifier::{DisabledClassifier, NaiveBayesModel, SpamClassifier};
pub use config::Config;
pub use decision::{Decision, DecisionEngine};
pub use folders::{Folder, FolderStore, FolderSummary};
pub use heuristics::KeywordScanner;
pub use message::NormalizedMessage;
pub use pipeline::{IntakePipeline, IntakeReport, Mailroom};
pub use similarity::{LazySpamIndex, SimilarityMatch, SpamCorpus};
pub use source::{IntakeRecord, MessageSource, RawMessage, SpoolDirectory, SyntheticSource};
