//! Producers of [`NormalizedMessage`] records for the intake queue.
//!
//! Mailbox protocols and MIME decoding live outside this crate; a source only
//! has to hand over already-decoded fields as a [`RawMessage`] or an
//! [`IntakeRecord`].

use crate::message::{NormalizedMessage, NO_SUBJECT, UNKNOWN_SENDER};
use anyhow::Context;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

pub trait MessageSource {
    fn fetch(&mut self) -> anyhow::Result<Vec<NormalizedMessage>>;

    fn name(&self) -> &str;
}

/// Decoded message fields as delivered by a mailbox collaborator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawMessage {
    #[serde(default)]
    pub message_id: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub text_body: Option<String>,
    #[serde(default)]
    pub html_body: Option<String>,
}

impl RawMessage {
    pub fn normalize(&self) -> NormalizedMessage {
        let sender = non_blank(self.from.as_deref()).unwrap_or(UNKNOWN_SENDER);
        let subject = non_blank(self.subject.as_deref()).unwrap_or(NO_SUBJECT);

        let id = match non_blank(self.message_id.as_deref()) {
            Some(raw_id) => raw_id.trim().replace(['<', '>'], ""),
            None => {
                let fingerprint = format!(
                    "{}-{}-{}",
                    self.date.as_deref().unwrap_or(""),
                    sender,
                    subject
                );
                format!("{:x}", md5::compute(fingerprint.as_bytes()))
            }
        };

        let text_body = non_blank(self.text_body.as_deref());
        let body = match (text_body, self.html_body.as_deref()) {
            (Some(text), _) => text.to_string(),
            (None, Some(html)) if !html.trim().is_empty() => strip_html(html),
            _ => self.text_body.clone().unwrap_or_default(),
        };

        NormalizedMessage::new(id, sender, subject, body)
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

static TAG_REGEX: OnceLock<Regex> = OnceLock::new();

/// Replace every tag with a space. Crude, but only used for analysis text.
pub fn strip_html(html: &str) -> String {
    let tag_regex = TAG_REGEX.get_or_init(|| Regex::new(r"<[^<]+?>").unwrap());
    tag_regex.replace_all(html, " ").into_owned()
}

/// Record already in intake shape, as exported by another mailsift instance
/// or a collaborator that did its own decoding.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IntakeRecord {
    pub id: String,
    #[serde(default)]
    pub sender: Option<String>,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub full_body: Option<String>,
}

impl IntakeRecord {
    /// Keep the given id (empty ids stay empty and skip dedup) and fill the
    /// snippet or full body from whichever one is present.
    pub fn normalize(&self) -> NormalizedMessage {
        let sender = non_blank(self.sender.as_deref()).unwrap_or(UNKNOWN_SENDER);
        let subject = non_blank(self.subject.as_deref()).unwrap_or(NO_SUBJECT);
        let id = self.id.trim().replace(['<', '>'], "");

        let full_body = self
            .full_body
            .as_deref()
            .or(self.body.as_deref())
            .unwrap_or("");
        let mut message = NormalizedMessage::new(id, sender, subject, full_body);
        if let Some(body) = &self.body {
            message.body = body.clone();
        }
        message
    }
}

struct Template {
    sender: &'static str,
    subject: &'static str,
    body: &'static str,
}

const LEGITIMATE_TEMPLATES: &[Template] = &[
    Template {
        sender: "Boss",
        subject: "Meeting pending",
        body: "Don't forget the meeting tomorrow at 10am.",
    },
    Template {
        sender: "Hr Dept",
        subject: "Report needed",
        body: "Can you send me the monthly report please?",
    },
    Template {
        sender: "Google Calendar",
        subject: "Reminder",
        body: "Reminder about your class today at 3pm.",
    },
    Template {
        sender: "Friend",
        subject: "Weekend?",
        body: "Let's work on the project later, maybe grab a beer?",
    },
];

const SPAM_TEMPLATES: &[Template] = &[
    Template {
        sender: "Lottery",
        subject: "YOU WON!",
        body: "You won a lottery claim now. Click here to claim your prize.",
    },
    Template {
        sender: "Cheap Meds",
        subject: "Free money",
        body: "Free money click here to get your pharmacy discount.",
    },
    Template {
        sender: "Nigerian Prince",
        subject: "Investment",
        body: "Congratulations you have been selected for this investment.",
    },
    Template {
        sender: "Winner",
        subject: "Urgent prize",
        body: "Urgent prize waiting for you. Verify your account.",
    },
];

/// Demo source: one random message per fetch, spam or legitimate with equal odds.
pub struct SyntheticSource {
    rng: StdRng,
}

impl Default for SyntheticSource {
    fn default() -> Self {
        Self::new()
    }
}

impl SyntheticSource {
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn next_message(&mut self) -> NormalizedMessage {
        let templates = if self.rng.gen_bool(0.5) {
            SPAM_TEMPLATES
        } else {
            LEGITIMATE_TEMPLATES
        };
        // both template lists are non-empty constants
        let template = templates
            .choose(&mut self.rng)
            .unwrap_or(&LEGITIMATE_TEMPLATES[0]);

        NormalizedMessage::new(
            uuid::Uuid::new_v4().to_string(),
            template.sender,
            template.subject,
            template.body,
        )
    }
}

impl MessageSource for SyntheticSource {
    fn fetch(&mut self) -> anyhow::Result<Vec<NormalizedMessage>> {
        Ok(vec![self.next_message()])
    }

    fn name(&self) -> &str {
        "synthetic"
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum IncomingMessage {
    Record(IntakeRecord),
    Raw(RawMessage),
}

impl IncomingMessage {
    fn normalize(&self) -> NormalizedMessage {
        match self {
            IncomingMessage::Record(record) => record.normalize(),
            IncomingMessage::Raw(raw) => raw.normalize(),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawBatch {
    Many(Vec<IncomingMessage>),
    One(IncomingMessage),
}

/// Parse a JSON document holding one message or an array of them. Each
/// message is either an intake record (`id`, `sender`, `subject`, `body`,
/// `full_body`) or a raw message (`message_id`, `from`, `text_body`, ...).
/// Objects with fields from neither shape are rejected.
pub fn parse_raw_messages(content: &str) -> anyhow::Result<Vec<NormalizedMessage>> {
    let batch: RawBatch = serde_json::from_str(content)
        .context("expected a message object or an array of them")?;
    let incoming = match batch {
        RawBatch::One(message) => vec![message],
        RawBatch::Many(messages) => messages,
    };
    Ok(incoming.iter().map(IncomingMessage::normalize).collect())
}

pub fn read_raw_messages<P: AsRef<Path>>(path: P) -> anyhow::Result<Vec<NormalizedMessage>> {
    let path = path.as_ref();
    let display = path.display();
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read messages from {display}"))?;
    parse_raw_messages(&content)
        .with_context(|| format!("Invalid message file {display}"))
}

/// Directory of `*.json` message files, re-read in full on every fetch.
/// Messages seen before are filtered out later by the intake dedup.
pub struct SpoolDirectory {
    directory: PathBuf,
}

impl SpoolDirectory {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    fn message_files(&self) -> anyhow::Result<Vec<PathBuf>> {
        let display = self.directory.display();
        let entries = std::fs::read_dir(&self.directory)
            .with_context(|| format!("Failed to read spool directory {display}"))?;

        let mut files: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file())
            .filter(|path| path.extension().map_or(false, |ext| ext == "json"))
            .collect();
        files.sort();
        Ok(files)
    }
}

impl MessageSource for SpoolDirectory {
    fn fetch(&mut self) -> anyhow::Result<Vec<NormalizedMessage>> {
        let mut messages = Vec::new();

        for path in self.message_files()? {
            match read_raw_messages(&path) {
                Ok(batch) => messages.extend(batch),
                Err(e) => log::warn!("Skipping spool file: {e:#}"),
            }
        }

        log::debug!(
            "Fetched {} messages from spool {}",
            messages.len(),
            self.directory.display()
        );
        Ok(messages)
    }

    fn name(&self) -> &str {
        "spool"
    }
}
