use serde::{Deserialize, Serialize};

pub const UNKNOWN_SENDER: &str = "Unknown";
pub const NO_SUBJECT: &str = "No Subject";
pub const LEGITIMATE_REASON: &str = "Parece legitimo";
pub const NO_SIMILAR_SPAM: &str = "Ninguno";

/// Maximum number of characters kept in the display snippet
pub const SNIPPET_LENGTH: usize = 200;

/// Canonical message record passed through the intake pipeline.
///
/// Sources populate `id`, `sender`, `subject`, `body` and `full_body`. The
/// classification fields are filled in exactly once by the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedMessage {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub sender: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub full_body: String,
    #[serde(default)]
    pub spam_score: f64,
    #[serde(default)]
    pub spam_reason: Option<String>,
    #[serde(default)]
    pub similar_spam: Option<String>,
}

impl NormalizedMessage {
    /// Build an unclassified message, deriving the snippet from `full_body`.
    pub fn new(
        id: impl Into<String>,
        sender: impl Into<String>,
        subject: impl Into<String>,
        full_body: impl Into<String>,
    ) -> Self {
        let full_body = full_body.into();
        Self {
            id: id.into(),
            sender: sender.into(),
            subject: subject.into(),
            body: snippet(&full_body),
            full_body,
            spam_score: 0.0,
            spam_reason: None,
            similar_spam: None,
        }
    }

    pub fn display_sender(&self) -> &str {
        if self.sender.trim().is_empty() {
            UNKNOWN_SENDER
        } else {
            &self.sender
        }
    }

    pub fn display_subject(&self) -> &str {
        if self.subject.trim().is_empty() {
            NO_SUBJECT
        } else {
            &self.subject
        }
    }

    /// Text the classifiers see: subject and snippet joined by one space.
    pub fn analysis_text(&self) -> String {
        format!("{} {}", self.subject, self.body)
    }

    /// Closest known spam recorded at classification, if there was one.
    pub fn similar_spam_match(&self) -> Option<&str> {
        self.similar_spam
            .as_deref()
            .filter(|similar| *similar != NO_SIMILAR_SPAM)
    }

    /// Start of the full body on one line, for analysis views.
    pub fn excerpt(&self, max_chars: usize) -> String {
        let flat: String = self
            .full_body
            .chars()
            .map(|c| if c == '\n' || c == '\r' { ' ' } else { c })
            .collect();
        let flat = flat.trim();
        if flat.chars().count() <= max_chars {
            flat.to_string()
        } else {
            let kept: String = flat.chars().take(max_chars).collect();
            format!("{}...", kept.trim_end())
        }
    }

    pub fn is_classified(&self) -> bool {
        self.spam_reason.is_some()
    }

    /// Whether this message shares a dedup identity with `other`.
    /// Messages without an id are never considered the same.
    pub fn same_id(&self, other: &str) -> bool {
        !self.id.is_empty() && !other.is_empty() && self.id == other
    }
}

/// First [`SNIPPET_LENGTH`] characters of `text` with line breaks flattened.
pub fn snippet(text: &str) -> String {
    text.chars()
        .take(SNIPPET_LENGTH)
        .map(|c| if c == '\n' || c == '\r' { ' ' } else { c })
        .collect()
}
